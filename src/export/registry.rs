//! Bundle persistence with write-then-rename publication
//!
//! A bundle directory holds four files:
//!
//! - `manifest.json`: format version, column order, artifact checksums and metadata
//! - `codec.json`: vocabularies, column order and derived feature definitions
//! - `scaler.json`: fitted means, stds and degenerate columns
//! - `classifier.bin`: the trained classifier (bincode)
//!
//! Saving writes everything into a hidden sibling staging directory and renames it
//! over the target, so readers see the old bundle, the new bundle, or no bundle at all.

use super::bundle::{BundleMetadata, ModelBundle, BUNDLE_FORMAT_VERSION};
use crate::error::{ChurnError, Result};
use crate::preprocessing::{describe_column_diff, FeatureCodec, ScalerState, StandardScaler};
use crate::schema::Schema;
use crate::training::TrainedClassifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CODEC_FILE: &str = "codec.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.bin";

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub columns: Vec<String>,
    /// Artifact file name to hex SHA-256
    pub artifacts: BTreeMap<String, String>,
    pub metadata: BundleMetadata,
}

/// Compute SHA-256 hash of data
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Saves and loads model bundles for one schema
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    schema: Schema,
}

impl ModelRegistry {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Publish `bundle` at `location`, replacing any bundle already there as a whole.
    pub fn save(&self, bundle: &ModelBundle, location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        let (parent, name) = split_location(location)?;
        fs::create_dir_all(&parent)?;

        let staging = parent.join(format!(".{}.staging-{}", name, Uuid::new_v4()));
        if let Err(e) = write_bundle(&staging, bundle) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        let retired = if location.exists() {
            let retired = parent.join(format!(".{}.retired-{}", name, Uuid::new_v4()));
            if let Err(e) = fs::rename(location, &retired) {
                let _ = fs::remove_dir_all(&staging);
                return Err(e.into());
            }
            Some(retired)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, location) {
            if let Some(retired) = &retired {
                // put the previous bundle back
                let _ = fs::rename(retired, location);
            }
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        if let Some(retired) = retired {
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!(path = %retired.display(), error = %e, "could not remove retired bundle");
            }
        }

        info!(
            location = %location.display(),
            model = %bundle.metadata().model_type,
            columns = bundle.columns().len(),
            "bundle saved"
        );
        Ok(())
    }

    /// Read only the manifest of the bundle at `location`.
    pub fn inspect(&self, location: impl AsRef<Path>) -> Result<BundleManifest> {
        read_manifest(location.as_ref())
    }

    /// Load and verify the whole bundle at `location`.
    pub fn load(&self, location: impl AsRef<Path>) -> Result<ModelBundle> {
        let location = location.as_ref();
        let manifest = read_manifest(location)?;

        if manifest.format_version != BUNDLE_FORMAT_VERSION {
            return Err(ChurnError::BundleVersionMismatch(format!(
                "bundle format {} but this build reads format {}",
                manifest.format_version, BUNDLE_FORMAT_VERSION
            )));
        }
        let expected = FeatureCodec::expected_columns(&self.schema);
        if manifest.columns != expected {
            return Err(ChurnError::BundleVersionMismatch(describe_column_diff(
                &expected,
                &manifest.columns,
            )));
        }

        let codec_bytes = read_artifact(location, &manifest, CODEC_FILE)?;
        let scaler_bytes = read_artifact(location, &manifest, SCALER_FILE)?;
        let classifier_bytes = read_artifact(location, &manifest, CLASSIFIER_FILE)?;

        let codec: FeatureCodec = serde_json::from_slice(&codec_bytes).map_err(|e| corrupted(CODEC_FILE, e))?;
        if codec.columns() != manifest.columns.as_slice() {
            return Err(ChurnError::BundleVersionMismatch(format!(
                "codec and manifest disagree: {}",
                describe_column_diff(&manifest.columns, codec.columns())
            )));
        }
        codec.verify(&self.schema)?;

        let state: ScalerState =
            serde_json::from_slice(&scaler_bytes).map_err(|e| corrupted(SCALER_FILE, e))?;
        let scaler = StandardScaler::from_state(state).map_err(|e| corrupted(SCALER_FILE, e))?;

        let classifier =
            TrainedClassifier::from_bytes(&classifier_bytes).map_err(|e| corrupted(CLASSIFIER_FILE, e))?;

        let bundle = ModelBundle::new(codec, scaler, classifier, manifest.metadata)?;
        debug!(location = %location.display(), "bundle loaded");
        Ok(bundle)
    }
}

fn corrupted(artifact: &str, reason: impl std::fmt::Display) -> ChurnError {
    ChurnError::BundleCorrupted {
        artifact: artifact.to_string(),
        reason: reason.to_string(),
    }
}

fn split_location(location: &Path) -> Result<(PathBuf, String)> {
    let name = location
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ChurnError::InvalidInput(format!("invalid bundle location: {}", location.display())))?
        .to_string();
    let parent = match location.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<String> {
    let mut file = File::create(dir.join(file_name))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(compute_sha256(bytes))
}

fn write_bundle(dir: &Path, bundle: &ModelBundle) -> Result<()> {
    fs::create_dir(dir)?;

    let state = bundle
        .scaler()
        .state()
        .ok_or_else(|| ChurnError::NotFitted("scaler".to_string()))?;

    let mut artifacts = BTreeMap::new();
    let codec_json = serde_json::to_vec_pretty(bundle.codec())?;
    artifacts.insert(CODEC_FILE.to_string(), write_artifact(dir, CODEC_FILE, &codec_json)?);
    let scaler_json = serde_json::to_vec_pretty(state)?;
    artifacts.insert(SCALER_FILE.to_string(), write_artifact(dir, SCALER_FILE, &scaler_json)?);
    let classifier_bin = bundle.classifier().to_bytes()?;
    artifacts.insert(
        CLASSIFIER_FILE.to_string(),
        write_artifact(dir, CLASSIFIER_FILE, &classifier_bin)?,
    );

    // manifest last: a staging dir without one is never a complete bundle
    let manifest = BundleManifest {
        format_version: BUNDLE_FORMAT_VERSION,
        columns: bundle.columns().to_vec(),
        artifacts,
        metadata: bundle.metadata().clone(),
    };
    write_artifact(dir, MANIFEST_FILE, &serde_json::to_vec_pretty(&manifest)?)?;
    Ok(())
}

fn read_manifest(location: &Path) -> Result<BundleManifest> {
    let path = location.join(MANIFEST_FILE);
    let bytes = fs::read(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ChurnError::BundleNotFound {
            path: location.display().to_string(),
            artifact: MANIFEST_FILE.to_string(),
        },
        _ => ChurnError::IoError(e),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| corrupted(MANIFEST_FILE, e))
}

fn read_artifact(location: &Path, manifest: &BundleManifest, file_name: &str) -> Result<Vec<u8>> {
    let bytes = fs::read(location.join(file_name)).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ChurnError::BundleNotFound {
            path: location.display().to_string(),
            artifact: file_name.to_string(),
        },
        _ => ChurnError::IoError(e),
    })?;
    let recorded = manifest
        .artifacts
        .get(file_name)
        .ok_or_else(|| corrupted(file_name, "no checksum in manifest"))?;
    let actual = compute_sha256(&bytes);
    if &actual != recorded {
        return Err(corrupted(
            file_name,
            format!("checksum mismatch (manifest {}, file {})", recorded, actual),
        ));
    }
    Ok(bytes)
}
