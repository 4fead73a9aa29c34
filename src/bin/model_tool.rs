//! Key generation and artifact signing for Heartsense classifiers.
//!
//! # Usage
//!
//! ```bash
//! model_tool keygen --out-seed <path> [--out-pub <path>] [--force]
//! model_tool sign <model_dir> [--serial <n>]
//! ```
//!
//! `sign` reads the base64 Ed25519 seed from the file named by
//! `HEARTSENSE_MODEL_SIGNING_KEY_B64_FILE` (or, in debug builds only, from
//! `HEARTSENSE_MODEL_SIGNING_KEY_B64`) and writes `manifest.json` and
//! `model.sig` next to `classifier.json`.
//!
//! # Security
//!
//! - Uses OS entropy (OsRng) for key generation
//! - Seed files are created with 0600 permissions (Unix only)
//! - Seed material is zeroized after use
//! - Only non-secret material is printed

use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use heartsense::adapters::model::manifest::{MANIFEST_FILE, SIGNATURE_FILE};
use heartsense::adapters::model::{LoadedClassifier, SignedManifest, ARTIFACT_FILE};
use heartsense::ClassifierHandle;

const USAGE: &str = "Usage:\n  model_tool keygen --out-seed <path> [--out-pub <path>] [--force]\n  model_tool sign <model_dir> [--serial <u64>]";

const KEY_FILE_ENV: &str = "HEARTSENSE_MODEL_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "HEARTSENSE_MODEL_SIGNING_KEY_B64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn write_restricted(path: &Path, contents: &[u8], mode: u32, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {parent:?}"))?;
    }

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(contents)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn keygen(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut out_seed: Option<PathBuf> = None;
    let mut out_pub: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-seed" => out_seed = Some(args.next().context(USAGE)?.into()),
            "--out-pub" => out_pub = Some(args.next().context(USAGE)?.into()),
            "--force" => force = true,
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }
    let out_seed = out_seed.context(USAGE)?;

    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);

    let signing_key = SigningKey::from_bytes(&seed.0);
    let verifying_key = signing_key.verifying_key();
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    if let Some(pub_path) = &out_pub {
        if pub_path.exists() && !force {
            bail!("Refusing to overwrite existing file {pub_path:?}. Use --force.");
        }
    }

    write_restricted(&out_seed, seed_b64.as_bytes(), 0o600, force)?;
    println!("Wrote signing seed (base64) to {out_seed:?}");

    if let Some(pub_path) = &out_pub {
        // Public key is non-secret; allow read access.
        write_restricted(pub_path, pub_b64.as_bytes(), 0o644, force)?;
        println!("Wrote public key (base64) to {pub_path:?}");
    }
    println!("PUBKEY (b64)={pub_b64}");
    println!("PUBKEY (hex)={}", to_hex(verifying_key.as_bytes()));

    Ok(())
}

fn read_signing_seed() -> Result<Seed> {
    let secret = if let Ok(path) = env::var(KEY_FILE_ENV) {
        Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        )
    } else if cfg!(debug_assertions) {
        // Dev-only fallback for convenience.
        Zeroizing::new(env::var(KEY_ENV).map_err(|_| {
            anyhow!("Missing signing key. Set {KEY_FILE_ENV} (or {KEY_ENV} in debug builds).")
        })?)
    } else {
        bail!("Missing signing key. Set {KEY_FILE_ENV}.");
    };

    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(secret.trim())
            .context("Invalid base64 in signing key")?,
    );
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        )
    })?;
    Ok(Seed(bytes))
}

fn sign(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut model_dir: Option<PathBuf> = None;
    let mut serial: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--serial" => {
                let v = args.next().context(USAGE)?;
                serial = Some(v.trim().parse().context("--serial must be a u64")?);
            }
            _ if model_dir.is_none() && !arg.starts_with("--") => {
                model_dir = Some(PathBuf::from(arg));
            }
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }
    let model_dir = model_dir.context(USAGE)?;

    // Refuse to sign an artifact the loader would reject anyway.
    let artifact = model_dir.join(ARTIFACT_FILE);
    let json = fs::read_to_string(&artifact)
        .with_context(|| format!("Failed to read {artifact:?}"))?;
    let classifier = LoadedClassifier::from_json_str(&json)
        .with_context(|| format!("{artifact:?} is not a valid classifier artifact"))?;

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let mut manifest = SignedManifest::for_files(&model_dir, &[ARTIFACT_FILE], 0)?;
    manifest.serial = serial.unwrap_or_else(|| u64::try_from(manifest.created_at).unwrap_or(1));
    manifest.write_signed(&model_dir, &signing_key)?;

    let descriptor = classifier.descriptor();
    println!(
        "Signed {} {} (serial {})",
        descriptor.name, descriptor.version, manifest.serial
    );
    println!("Wrote {:?}", model_dir.join(MANIFEST_FILE));
    println!("Wrote {:?}", model_dir.join(SIGNATURE_FILE));
    println!(
        "PUBKEY (b64)={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );

    Ok(())
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("keygen") => keygen(args),
        Some("sign") => sign(args),
        Some("-h" | "--help") => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!("{USAGE}"),
    }
}
