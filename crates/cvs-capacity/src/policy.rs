//! Policy parameters for one planning pass.

use serde::{Deserialize, Serialize};

use crate::error::{CapacityError, Result};

/// Largest accepted margin, in percent.
pub const MAX_MARGIN_PERCENT: u32 = 99;

/// How new sizes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizingMode {
    /// Keep `margin` percent of the new allocation free.
    StaticMargin,
    /// Size for the worst-case fill rate until the next run.
    Dynamic {
        /// Minutes until the next planning run.
        duration_minutes: u32,
    },
}

/// Validated, immutable policy for a planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    duration_minutes: u32,
    margin_percent: u32,
    dry_run: bool,
}

impl Policy {
    /// Creates a policy. A duration of 0 selects static-margin mode.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::InvalidPolicy`] if `margin_percent` exceeds 99.
    pub fn new(duration_minutes: u32, margin_percent: u32, dry_run: bool) -> Result<Self> {
        if margin_percent > MAX_MARGIN_PERCENT {
            return Err(CapacityError::invalid_policy(format!(
                "margin must be between 0 and {MAX_MARGIN_PERCENT}, got {margin_percent}"
            )));
        }
        Ok(Self {
            duration_minutes,
            margin_percent,
            dry_run,
        })
    }

    /// Static-margin policy, as used for single-volume alerts.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::InvalidPolicy`] if `margin_percent` exceeds 99.
    pub fn static_margin(margin_percent: u32, dry_run: bool) -> Result<Self> {
        Self::new(0, margin_percent, dry_run)
    }

    /// Minutes until the next run.
    #[must_use]
    pub const fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Requested headroom in percent.
    #[must_use]
    pub const fn margin_percent(&self) -> u32 {
        self.margin_percent
    }

    /// True if resizes are only reported.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// The sizing mode implied by the duration.
    #[must_use]
    pub const fn mode(&self) -> SizingMode {
        if self.duration_minutes == 0 {
            SizingMode::StaticMargin
        } else {
            SizingMode::Dynamic {
                duration_minutes: self.duration_minutes,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 ; "zero margin")]
    #[test_case(20 ; "default margin")]
    #[test_case(99 ; "upper bound")]
    fn accepts_valid_margin(margin: u32) {
        assert!(Policy::new(60, margin, false).is_ok());
    }

    #[test_case(100 ; "division by zero")]
    #[test_case(250 ; "way out of range")]
    fn rejects_invalid_margin(margin: u32) {
        let err = Policy::new(60, margin, false).expect_err("should reject");
        assert!(matches!(err, CapacityError::InvalidPolicy { .. }));
    }

    #[test]
    fn zero_duration_selects_static_margin() {
        let policy = Policy::new(0, 20, false).expect("policy");
        assert_eq!(policy.mode(), SizingMode::StaticMargin);
        assert_eq!(Policy::static_margin(20, false).expect("policy"), policy);
    }

    #[test]
    fn positive_duration_selects_dynamic() {
        let policy = Policy::new(60, 20, true).expect("policy");
        assert_eq!(policy.mode(), SizingMode::Dynamic { duration_minutes: 60 });
        assert!(policy.dry_run());
    }
}
