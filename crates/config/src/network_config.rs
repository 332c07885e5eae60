//! Network configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Remote service endpoint and connectivity probing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    /// Base URL events are posted under
    pub base_url: String,

    /// Bearer token for the remote service
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// URLs probed to decide whether the device is online
    pub probe_urls: Vec<String>,

    /// Probe timeout in milliseconds
    pub probe_timeout_ms: u64,

    /// Seconds between background probes, 0 disables the monitor
    pub monitor_interval_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
            probe_urls: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
            ],
            probe_timeout_ms: 5000,
            monitor_interval_secs: 30,
        }
    }
}

impl ConfigSection for NetworkSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::http_url(&self.base_url, "network.base_url"),
            Validator::in_range(self.request_timeout_secs, 1, 300, "network.request_timeout_secs"),
            Validator::in_range(self.probe_timeout_ms, 100, 60_000, "network.probe_timeout_ms"),
            Validator::in_range(self.monitor_interval_secs, 0, 3600, "network.monitor_interval_secs"),
        ];

        for (i, url) in self.probe_urls.iter().enumerate() {
            results.push(Validator::http_url(url, &format!("network.probe_urls[{}]", i)));
        }

        Validator::collect_errors(results)
    }

    fn section_name(&self) -> &'static str {
        "network"
    }
}
