use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

/// Inclusive validity period of a sale or coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self, ValidationErrors> {
        if starts_at > ends_at {
            return Err(ValidationErrors::single("ends_at", "must not be before starts_at"));
        }
        Ok(Self { starts_at, ends_at })
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// Returns true if `now` falls within the window, bounds included.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now <= self.ends_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let start = Utc::now();
        let end = start + Duration::days(1);
        let window = DateWindow::new(start, end).unwrap();

        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(start - Duration::seconds(1)));
        assert!(!window.contains(end + Duration::seconds(1)));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let start = Utc::now();
        assert!(DateWindow::new(start, start - Duration::hours(1)).is_err());
        assert!(DateWindow::new(start, start).is_ok());
    }
}
