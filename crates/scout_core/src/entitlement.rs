use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Store that issues valid licenses for this product.
pub const STORE_ID: u64 = 162254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Monthly,
    Yearly,
    Onetime,
    Unknown,
}

impl LicenseType {
    pub fn from_product_id(product_id: u64) -> Self {
        match product_id {
            622075 => LicenseType::Monthly,
            622076 => LicenseType::Yearly,
            709187 => LicenseType::Onetime,
            _ => LicenseType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LicenseType::Monthly => "monthly",
            LicenseType::Yearly => "yearly",
            LicenseType::Onetime => "onetime",
            LicenseType::Unknown => "unknown",
        }
    }
}

/// Free trial bounds, recorded when the trial was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialWindow {
    pub started_at: DateTime<Utc>,
    pub length_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialStatus {
    pub has_started: bool,
    pub is_active: bool,
    /// Whole days left, rounded up; zero once expired.
    pub days_left: i64,
}

impl TrialWindow {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::days(i64::from(self.length_days))
    }

    pub fn status(&self, now: DateTime<Utc>) -> TrialStatus {
        let remaining = self.ends_at() - now;
        if remaining <= Duration::zero() {
            return TrialStatus {
                has_started: true,
                is_active: false,
                days_left: 0,
            };
        }
        let whole = remaining.num_days();
        let days_left = if remaining > Duration::days(whole) {
            whole + 1
        } else {
            whole
        };
        TrialStatus {
            has_started: true,
            is_active: true,
            days_left,
        }
    }
}

pub fn trial_status(window: Option<&TrialWindow>, now: DateTime<Utc>) -> TrialStatus {
    window.map(|w| w.status(now)).unwrap_or_default()
}

/// Combined permission gate: a purchased license or a running trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entitlement {
    pub licensed: bool,
    pub trial: TrialStatus,
}

impl Entitlement {
    pub fn is_entitled(&self) -> bool {
        self.licensed || self.trial.is_active
    }

    /// Trial-only users are told how long they have left.
    pub fn trial_notice(&self) -> Option<String> {
        if self.trial.is_active && !self.licensed {
            Some(format!(
                "Trial mode: {} days remaining.",
                self.trial.days_left
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn product_ids_map_to_license_types() {
        assert_eq!(LicenseType::from_product_id(622076), LicenseType::Yearly);
        assert_eq!(LicenseType::from_product_id(1), LicenseType::Unknown);
    }

    #[test]
    fn trial_days_round_up_and_expire() {
        let window = TrialWindow {
            started_at: start(),
            length_days: 3,
        };
        let status = window.status(start() + Duration::hours(1));
        assert!(status.is_active);
        assert_eq!(status.days_left, 3);

        let status = window.status(start() + Duration::days(2));
        assert_eq!(status.days_left, 1);

        let status = window.status(start() + Duration::days(3));
        assert!(!status.is_active);
        assert!(status.has_started);
    }

    #[test]
    fn license_or_trial_grants_entitlement() {
        let none = Entitlement::default();
        assert!(!none.is_entitled());
        let licensed = Entitlement {
            licensed: true,
            ..Entitlement::default()
        };
        assert!(licensed.is_entitled());
        assert_eq!(licensed.trial_notice(), None);
    }
}
