//! Derived feature transforms: fixed-edge binning and guarded ratios

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Fixed-edge binner producing ordinal bucket indices.
///
/// Buckets are closed-open `[edges[i], edges[i + 1])`, so a value sitting exactly
/// on an interior edge lands in the higher bucket. Values below the first edge
/// fall in bucket 0 and values at or above the last edge fall in the last bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binner {
    edges: Vec<f64>,
}

impl Binner {
    /// Create a binner from strictly increasing, finite edges (at least two).
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(ChurnError::InvalidParameter {
                name: "edges".to_string(),
                value: format!("{:?}", edges),
                reason: "need at least two edges".to_string(),
            });
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(ChurnError::InvalidParameter {
                name: "edges".to_string(),
                value: format!("{:?}", edges),
                reason: "edges must be finite".to_string(),
            });
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ChurnError::InvalidParameter {
                name: "edges".to_string(),
                value: format!("{:?}", edges),
                reason: "edges must be strictly increasing".to_string(),
            });
        }
        Ok(Self { edges })
    }

    /// Binner over constant edges known to be valid.
    pub(crate) fn from_trusted(edges: Vec<f64>) -> Self {
        debug_assert!(edges.len() >= 2 && edges.windows(2).all(|w| w[0] < w[1]));
        Self { edges }
    }

    /// Number of buckets
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bucket index for a value: the number of interior edges at or below it.
    pub fn bucket(&self, value: f64) -> usize {
        let interior = &self.edges[1..self.edges.len() - 1];
        interior.iter().filter(|&&edge| value >= edge).count()
    }
}

/// A feature computed from raw numeric fields rather than supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DerivedFeature {
    /// `numerator / (denominator + offset)`
    Ratio {
        name: String,
        numerator: String,
        denominator: String,
        offset: f64,
    },
    /// Ordinal bucket of `source`
    Bucket {
        name: String,
        source: String,
        binner: Binner,
    },
}

impl DerivedFeature {
    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        offset: f64,
    ) -> Self {
        DerivedFeature::Ratio {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
            offset,
        }
    }

    pub fn bucket(name: impl Into<String>, source: impl Into<String>, edges: Vec<f64>) -> Result<Self> {
        Ok(DerivedFeature::Bucket {
            name: name.into(),
            source: source.into(),
            binner: Binner::new(edges)?,
        })
    }

    /// Output column name
    pub fn name(&self) -> &str {
        match self {
            DerivedFeature::Ratio { name, .. } | DerivedFeature::Bucket { name, .. } => name,
        }
    }

    /// Raw fields this feature reads
    pub fn sources(&self) -> Vec<&str> {
        match self {
            DerivedFeature::Ratio { numerator, denominator, .. } => vec![numerator.as_str(), denominator.as_str()],
            DerivedFeature::Bucket { source, .. } => vec![source.as_str()],
        }
    }

    /// Compute the feature, reading raw numeric fields through `lookup`.
    pub fn evaluate<F>(&self, lookup: F) -> Result<f64>
    where
        F: Fn(&str) -> Result<f64>,
    {
        match self {
            DerivedFeature::Ratio { name, numerator, denominator, offset } => {
                let top = lookup(numerator)?;
                let bottom = lookup(denominator)? + offset;
                let value = top / bottom;
                if bottom == 0.0 || !value.is_finite() {
                    return Err(ChurnError::InvalidFieldValue {
                        field: denominator.clone(),
                        value: (bottom - offset).to_string(),
                        reason: format!("'{}' is undefined for this value", name),
                    });
                }
                Ok(value)
            }
            DerivedFeature::Bucket { source, binner, .. } => Ok(binner.bucket(lookup(source)?) as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenure_edges() {
        let binner = Binner::new(vec![0.0, 12.0, 24.0, 48.0, 72.0]).unwrap();
        assert_eq!(binner.n_bins(), 4);
        assert_eq!(binner.bucket(0.0), 0);
        assert_eq!(binner.bucket(11.999), 0);
        assert_eq!(binner.bucket(12.0), 1);
        assert_eq!(binner.bucket(23.0), 1);
        assert_eq!(binner.bucket(24.0), 2);
        assert_eq!(binner.bucket(47.5), 2);
        assert_eq!(binner.bucket(48.0), 3);
        assert_eq!(binner.bucket(72.0), 3);
        assert_eq!(binner.bucket(90.0), 3);
    }

    #[test]
    fn test_below_first_edge_goes_to_first_bucket() {
        let binner = Binner::new(vec![0.0, 35.0, 70.0, 105.0, 120.0]).unwrap();
        assert_eq!(binner.bucket(-5.0), 0);
        assert_eq!(binner.bucket(35.0), 1);
        assert_eq!(binner.bucket(70.0), 2);
        assert_eq!(binner.bucket(105.0), 3);
        assert_eq!(binner.bucket(150.0), 3);
    }

    #[test]
    fn test_invalid_edges() {
        assert!(Binner::new(vec![1.0]).is_err());
        assert!(Binner::new(vec![0.0, 10.0, 10.0]).is_err());
        assert!(Binner::new(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_ratio_with_offset() {
        let feature = DerivedFeature::ratio("AvgMonthlyCharges", "TotalCharges", "tenure", 1.0);
        let value = feature
            .evaluate(|name| match name {
                "TotalCharges" => Ok(100.0),
                "tenure" => Ok(0.0),
                other => Err(ChurnError::MissingField(other.to_string())),
            })
            .unwrap();
        assert_eq!(value, 100.0);
        assert_eq!(feature.sources(), vec!["TotalCharges", "tenure"]);
    }

    #[test]
    fn test_ratio_zero_denominator_rejected() {
        let feature = DerivedFeature::ratio("avg", "a", "b", 1.0);
        let result = feature.evaluate(|name| if name == "a" { Ok(5.0) } else { Ok(-1.0) });
        assert!(matches!(result, Err(ChurnError::InvalidFieldValue { .. })));
    }
}
