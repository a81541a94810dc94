//! Retention recommendations from churn probability bands

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Suggested action for a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    HighTouchRetention,
    TargetedOffer,
    EngagementSurvey,
    Maintain,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::HighTouchRetention => {
                "Very high churn risk: act immediately with a retention package."
            }
            Recommendation::TargetedOffer => {
                "Elevated churn risk: reach out with an offer tailored to this customer."
            }
            Recommendation::EngagementSurvey => {
                "Moderate churn risk: check in on satisfaction and reward loyalty."
            }
            Recommendation::Maintain => {
                "Low churn risk: the customer looks satisfied, keep service quality and regular contact."
            }
        }
    }

    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            Recommendation::HighTouchRetention => &[
                "Offer a loyalty discount on the current plan",
                "Present upgrade benefits at no extra cost for a trial period",
                "Assign a personal account manager",
            ],
            Recommendation::TargetedOffer => &[
                "Send a targeted offer based on current services",
                "Recommend services matching the usage profile",
            ],
            Recommendation::EngagementSurvey => &[
                "Send a short satisfaction survey",
                "Grant reward points for continued service",
            ],
            Recommendation::Maintain => &["Keep regular engagement through the usual channels"],
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Recommendation::HighTouchRetention => "high-touch retention",
            Recommendation::TargetedOffer => "targeted offer",
            Recommendation::EngagementSurvey => "engagement survey",
            Recommendation::Maintain => "maintain",
        };
        f.write_str(label)
    }
}

/// Probability bands. Every comparison is strictly greater-than.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    high_touch: f64,
    targeted: f64,
    survey: f64,
    churn_threshold: f64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            high_touch: 0.8,
            targeted: 0.6,
            survey: 0.4,
            churn_threshold: 0.5,
        }
    }
}

impl RetentionPolicy {
    /// Bands must satisfy `0 <= survey <= targeted <= high_touch <= 1`.
    pub fn new(high_touch: f64, targeted: f64, survey: f64, churn_threshold: f64) -> Result<Self> {
        let ordered = 0.0 <= survey && survey <= targeted && targeted <= high_touch && high_touch <= 1.0;
        if !ordered || !(0.0..=1.0).contains(&churn_threshold) {
            return Err(ChurnError::InvalidParameter {
                name: "retention bands".to_string(),
                value: format!("{}/{}/{}/{}", high_touch, targeted, survey, churn_threshold),
                reason: "need 0 <= survey <= targeted <= high_touch <= 1 and threshold in [0, 1]"
                    .to_string(),
            });
        }
        Ok(Self {
            high_touch,
            targeted,
            survey,
            churn_threshold,
        })
    }

    pub fn recommend(&self, probability: f64) -> Recommendation {
        let p = probability.clamp(0.0, 1.0);
        if p > self.high_touch {
            Recommendation::HighTouchRetention
        } else if p > self.targeted {
            Recommendation::TargetedOffer
        } else if p > self.survey {
            Recommendation::EngagementSurvey
        } else {
            Recommendation::Maintain
        }
    }

    pub fn is_likely_churn(&self, probability: f64) -> bool {
        probability.clamp(0.0, 1.0) > self.churn_threshold
    }
}
