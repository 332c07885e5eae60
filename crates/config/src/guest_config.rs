//! Guest mode configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Guest profile retention
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuestSettings {
    /// Non-upgraded profiles idle for longer than this are removed by cleanup
    pub inactive_days: u32,

    /// Run the cleanup whenever the store is opened
    pub cleanup_on_start: bool,
}

impl Default for GuestSettings {
    fn default() -> Self {
        Self {
            inactive_days: 30,
            cleanup_on_start: false,
        }
    }
}

impl ConfigSection for GuestSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![Validator::in_range(
            self.inactive_days,
            1,
            3650,
            "guest.inactive_days",
        )])
    }

    fn section_name(&self) -> &'static str {
        "guest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GuestSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_inactive_days() {
        let config = GuestSettings {
            inactive_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
