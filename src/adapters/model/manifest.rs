//! Signed manifests binding classifier artifacts to their SHA-256 digests.
//!
//! Layout of a signed model directory:
//! - `classifier.json`: the artifact
//! - `manifest.json`: `{version, serial, created_at, nonce_b64, files: {name: sha256_hex}}`
//! - `model.sig`: 64-byte Ed25519 signature over the exact manifest bytes

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ModelLoadError, ARTIFACT_FILE};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

const MANIFEST_VERSION: u32 = 1;

/// Allowed clock skew for `created_at`, in seconds.
const MAX_FUTURE_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub version: u32,
    /// Monotonic release number of the artifact set.
    pub serial: u64,
    /// Unix timestamp (seconds) of signing.
    pub created_at: i64,
    /// Random 16-byte nonce, base64.
    pub nonce_b64: String,
    pub files: BTreeMap<String, String>,
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// Constant-time compare for hex digests.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

fn read(path: &Path) -> Result<Vec<u8>, ModelLoadError> {
    fs::read(path).map_err(|source| ModelLoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a base64-encoded 32-byte Ed25519 verifying key.
///
/// # Errors
/// Returns `ModelLoadError::VerifyingKey` on bad base64, length or point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ModelLoadError> {
    let bytes = general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ModelLoadError::VerifyingKey("invalid base64".into()))?;
    let raw: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ModelLoadError::VerifyingKey(format!("expected 32 bytes, got {}", bytes.len()))
    })?;
    VerifyingKey::from_bytes(&raw)
        .map_err(|_| ModelLoadError::VerifyingKey("not a valid Ed25519 point".into()))
}

/// Whether `dir` carries a manifest or a signature.
#[must_use]
pub fn is_signed(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).exists() || dir.join(SIGNATURE_FILE).exists()
}

impl SignedManifest {
    /// Hash `files` (relative to `dir`) into a fresh manifest.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Read` if a file cannot be read.
    pub fn for_files(dir: &Path, files: &[&str], serial: u64) -> Result<Self, ModelLoadError> {
        let mut map = BTreeMap::new();
        for rel in files {
            map.insert((*rel).to_string(), sha256_hex(&read(&dir.join(rel))?));
        }

        let mut nonce = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        Ok(Self {
            version: MANIFEST_VERSION,
            serial,
            created_at: unix_now(),
            nonce_b64: general_purpose::STANDARD.encode(nonce),
            files: map,
        })
    }

    /// Write `manifest.json` and its detached signature into `dir`.
    ///
    /// # Errors
    /// Returns `ModelLoadError::Write` if either file cannot be written.
    pub fn write_signed(&self, dir: &Path, signing_key: &SigningKey) -> Result<(), ModelLoadError> {
        let manifest_bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| ModelLoadError::Manifest(format!("serialize: {e}")))?;
        let signature: Signature = signing_key.sign(&manifest_bytes);
        let signature_bytes = signature.to_bytes();

        for (name, bytes) in [
            (MANIFEST_FILE, manifest_bytes.as_slice()),
            (SIGNATURE_FILE, signature_bytes.as_slice()),
        ] {
            let path = dir.join(name);
            fs::write(&path, bytes).map_err(|source| ModelLoadError::Write { path, source })?;
        }
        Ok(())
    }

    /// Verify the signature over `manifest.json` and every bound digest.
    ///
    /// Fails closed: a missing file, bad signature, unknown manifest version,
    /// future timestamp or digest mismatch is an error.
    ///
    /// # Errors
    /// Returns the first verification failure.
    pub fn verify(dir: &Path, key: &VerifyingKey) -> Result<Self, ModelLoadError> {
        let sig_bytes = read(&dir.join(SIGNATURE_FILE))?;
        let sig_bytes: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
            ModelLoadError::Signature(format!(
                "expected 64 signature bytes, got {}",
                sig_bytes.len()
            ))
        })?;
        let signature = Signature::from_bytes(&sig_bytes);

        let manifest_bytes = read(&dir.join(MANIFEST_FILE))?;
        key.verify(&manifest_bytes, &signature)
            .map_err(|_| ModelLoadError::Signature("manifest signature does not verify".into()))?;

        let manifest: Self = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| ModelLoadError::Manifest(format!("invalid format: {e}")))?;

        if manifest.version != MANIFEST_VERSION {
            return Err(ModelLoadError::Manifest(format!(
                "unsupported version {}",
                manifest.version
            )));
        }
        if manifest.created_at > unix_now() + MAX_FUTURE_SKEW_SECS {
            return Err(ModelLoadError::Manifest("created_at is in the future".into()));
        }
        let nonce = general_purpose::STANDARD
            .decode(manifest.nonce_b64.trim())
            .map_err(|_| ModelLoadError::Manifest("nonce_b64 is not base64".into()))?;
        if nonce.len() != 16 {
            return Err(ModelLoadError::Manifest("nonce must be 16 bytes".into()));
        }
        if !manifest.files.contains_key(ARTIFACT_FILE) {
            return Err(ModelLoadError::Manifest(format!(
                "manifest does not bind {ARTIFACT_FILE}"
            )));
        }

        for (rel, expected) in &manifest.files {
            let actual = sha256_hex(&read(&dir.join(rel))?);
            if !constant_time_eq_str(&actual, &expected.to_ascii_lowercase()) {
                return Err(ModelLoadError::DigestMismatch(rel.clone()));
            }
        }

        tracing::info!(
            serial = manifest.serial,
            files = manifest.files.len(),
            "Model manifest signature and digests verified"
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn signed_dir(key: &SigningKey) -> tempfile::TempDir {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join(ARTIFACT_FILE), br#"{"stub": true}"#).unwrap();
        SignedManifest::for_files(temp.path(), &[ARTIFACT_FILE], 7)
            .expect("manifest")
            .write_signed(temp.path(), key)
            .expect("sign");
        temp
    }

    #[test]
    fn test_sign_then_verify() {
        let key = signing_key(1);
        let dir = signed_dir(&key);
        let manifest =
            SignedManifest::verify(dir.path(), &key.verifying_key()).expect("Should verify");
        assert_eq!(manifest.serial, 7);
        assert!(manifest.files.contains_key(ARTIFACT_FILE));
        assert!(is_signed(dir.path()));
    }

    #[test]
    fn test_wrong_key_fails() {
        let dir = signed_dir(&signing_key(1));
        let err = SignedManifest::verify(dir.path(), &signing_key(2).verifying_key()).unwrap_err();
        assert!(matches!(err, ModelLoadError::Signature(_)));
    }

    #[test]
    fn test_tampered_artifact_fails() {
        let key = signing_key(3);
        let dir = signed_dir(&key);
        fs::write(dir.path().join(ARTIFACT_FILE), br#"{"stub": false}"#).unwrap();
        let err = SignedManifest::verify(dir.path(), &key.verifying_key()).unwrap_err();
        assert!(matches!(err, ModelLoadError::DigestMismatch(ref f) if f == ARTIFACT_FILE));
    }

    #[test]
    fn test_tampered_manifest_fails() {
        let key = signing_key(4);
        let dir = signed_dir(&key);
        let path = dir.path().join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).unwrap().replace("\"serial\": 7", "\"serial\": 8");
        fs::write(&path, text).unwrap();
        assert!(SignedManifest::verify(dir.path(), &key.verifying_key()).is_err());
    }

    #[test]
    fn test_manifest_must_bind_artifact() {
        let key = signing_key(5);
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), b"hello").unwrap();
        SignedManifest::for_files(temp.path(), &["notes.txt"], 1)
            .unwrap()
            .write_signed(temp.path(), &key)
            .unwrap();
        let err = SignedManifest::verify(temp.path(), &key.verifying_key()).unwrap_err();
        assert!(matches!(err, ModelLoadError::Manifest(_)));
    }

    #[test]
    fn test_verifying_key_from_b64() {
        let key = signing_key(6).verifying_key();
        let b64 = general_purpose::STANDARD.encode(key.to_bytes());
        assert_eq!(verifying_key_from_b64(&format!("{b64}\n")).unwrap(), key);
        assert!(verifying_key_from_b64("not base64!").is_err());
        assert!(verifying_key_from_b64(&general_purpose::STANDARD.encode([0u8; 16])).is_err());
    }
}
