//! Data preprocessing module
//!
//! Everything between a raw customer record and the classifier input:
//! - Per-field category vocabularies (label encoding)
//! - Fixed-edge binning and derived ratio features
//! - The feature codec tying them into one fixed column order
//! - Standard scaling fitted on the training split

mod codec;
mod encoder;
mod scaler;
pub mod transforms;

pub use codec::{describe_column_diff, FeatureCodec};
pub use encoder::CategoryVocabulary;
pub use scaler::{ScalerState, StandardScaler};
pub use transforms::{Binner, DerivedFeature};
