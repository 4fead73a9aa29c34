//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundary
//! between the pipeline and the pre-trained model it consults.

mod classifier;

pub use classifier::{ClassifierError, ClassifierHandle, ModelDescriptor};
