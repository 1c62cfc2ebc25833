//! Reward tiers unlocked by accumulated points.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTier {
    pub points_threshold: u32,
    pub reward_name: String,
    pub benefits: Vec<String>,
}

impl RewardTier {
    pub fn new(points_threshold: u32, reward_name: impl Into<String>, benefits: &[&str]) -> Self {
        Self {
            points_threshold,
            reward_name: reward_name.into(),
            benefits: benefits.iter().map(|b| b.to_string()).collect(),
        }
    }
}

/// Maps points to a tier. Thresholds are strictly increasing.
#[derive(Debug, Clone)]
pub struct RewardTierCalculator {
    tiers: Vec<RewardTier>,
}

impl Default for RewardTierCalculator {
    fn default() -> Self {
        Self::reference()
    }
}

impl RewardTierCalculator {
    pub fn new(tiers: Vec<RewardTier>) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::NoTiers);
        }
        for pair in tiers.windows(2) {
            if pair[1].points_threshold <= pair[0].points_threshold {
                return Err(CatalogError::NonIncreasingTier {
                    tier: pair[1].reward_name.clone(),
                    threshold: pair[1].points_threshold,
                });
            }
        }
        Ok(Self { tiers })
    }

    /// Tiers sized for the reference catalog (170 points in total).
    pub fn reference() -> Self {
        Self {
            tiers: vec![
                RewardTier::new(0, "Newcomer", &["Basic profile visibility"]),
                RewardTier::new(
                    40,
                    "Rising Star",
                    &["Appear in nearby suggestions", "See who viewed your profile"],
                ),
                RewardTier::new(
                    100,
                    "Connector",
                    &["Priority in match recommendations", "Profile badge"],
                ),
                RewardTier::new(
                    150,
                    "Trailblazer",
                    &[
                        "Top placement in discovery",
                        "Early access to community events",
                        "Verified-complete badge",
                    ],
                ),
            ],
        }
    }

    pub fn tiers(&self) -> &[RewardTier] {
        &self.tiers
    }

    /// Highest tier whose threshold is ≤ `points`; the lowest tier if none
    /// qualifies.
    pub fn tier_for(&self, points: u32) -> &RewardTier {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.points_threshold <= points)
            .unwrap_or(&self.tiers[0])
    }

    /// The next tier above the current one, if any.
    pub fn next_tier(&self, points: u32) -> Option<&RewardTier> {
        self.tiers.iter().find(|t| t.points_threshold > points)
    }
}
