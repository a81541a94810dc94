//! Model bundle and registry
//!
//! A trained pipeline is persisted as one directory:
//! - JSON artifacts for the codec and scaler (portable, human-readable)
//! - bincode for the classifier (compact)
//! - a manifest with SHA-256 checksums of every artifact

mod bundle;
mod registry;

pub use bundle::{BundleMetadata, ModelBundle, BUNDLE_FORMAT_VERSION};
pub use registry::{
    compute_sha256, BundleManifest, ModelRegistry, CLASSIFIER_FILE, CODEC_FILE, MANIFEST_FILE, SCALER_FILE,
};
