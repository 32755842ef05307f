//! Element-count tiers
//!
//! A record is credited to the highest threshold its element count strictly
//! exceeds. Thresholds must be strictly increasing; [`LengthTiers::new`]
//! rejects anything else.

use crate::error::ConfigError;

/// Default tier thresholds
pub const DEFAULT_TIERS: [u64; 5] = [100, 1_000, 10_000, 100_000, 1_000_000];

/// Strictly increasing element-count thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthTiers {
    thresholds: Vec<u64>,
}

impl LengthTiers {
    /// Validate and build a tier set
    pub fn new(thresholds: Vec<u64>) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTiers {
            tiers: format!("{:?}", thresholds),
            reason: reason.to_string(),
        };

        if thresholds.is_empty() {
            return Err(invalid("at least one threshold is required"));
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("thresholds must be strictly increasing"));
        }

        Ok(Self { thresholds })
    }

    /// Highest threshold strictly exceeded by `num_of_elem`
    pub fn classify(&self, num_of_elem: u64) -> Option<u64> {
        self.thresholds
            .iter()
            .rev()
            .copied()
            .find(|&threshold| num_of_elem > threshold)
    }

    /// Tier label used as the dimension key, or `None` for no tier
    pub fn label(&self, num_of_elem: u64) -> Option<String> {
        self.classify(num_of_elem).map(|t| t.to_string())
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }
}

impl Default for LengthTiers {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_TIERS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_tier_wins() {
        let tiers = LengthTiers::default();
        assert_eq!(tiers.classify(1_000_001), Some(1_000_000));
        assert_eq!(tiers.classify(150_000), Some(100_000));
        assert_eq!(tiers.classify(101), Some(100));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let tiers = LengthTiers::default();
        assert_eq!(tiers.classify(100), None);
        assert_eq!(tiers.classify(1_000), Some(100));
        assert_eq!(tiers.classify(1_000_000), Some(100_000));
    }

    #[test]
    fn test_below_lowest_tier() {
        let tiers = LengthTiers::default();
        assert_eq!(tiers.classify(50), None);
        assert_eq!(tiers.label(0), None);
    }

    #[test]
    fn test_label_format() {
        assert_eq!(LengthTiers::default().label(20_000), Some("10000".to_string()));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        assert!(LengthTiers::new(vec![100, 100, 1000]).is_err());
        assert!(LengthTiers::new(vec![1000, 100]).is_err());
        assert!(LengthTiers::new(vec![]).is_err());
        assert!(LengthTiers::new(vec![5, 50]).is_ok());
    }
}
