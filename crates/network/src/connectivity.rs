// crates/network/src/connectivity.rs
//! Network connectivity checks

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use laboursync_resilience::with_timeout;
use std::time::Duration;

/// Network connectivity checker
#[derive(Clone)]
pub struct ConnectivityChecker {
    client: Client,
    check_urls: Vec<String>,
}

impl ConnectivityChecker {
    /// Creates a new connectivity checker with default URLs
    pub fn new(client: Client) -> Self {
        Self {
            client,
            check_urls: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
            ],
        }
    }

    /// Creates a connectivity checker with custom URLs
    pub fn with_urls(client: Client, urls: Vec<String>) -> Self {
        Self {
            client,
            check_urls: urls,
        }
    }

    /// URLs probed, in order
    pub fn urls(&self) -> &[String] {
        &self.check_urls
    }

    /// Checks if any probe URL answers
    pub async fn is_online(&self) -> bool {
        for url in &self.check_urls {
            if self.client.is_accessible(url).await {
                return true;
            }
        }
        false
    }

    /// Like [`is_online`](Self::is_online), but gives up after `timeout`
    pub async fn probe(&self, timeout: Duration) -> bool {
        match with_timeout(timeout, self.is_online()).await {
            Ok(online) => online,
            Err(e) => {
                log::debug!("Connectivity probe gave up: {}", e);
                false
            }
        }
    }

    /// Checks network connectivity and returns error if offline
    pub async fn check(&self, timeout: Duration) -> NetworkResult<()> {
        if self.probe(timeout).await {
            Ok(())
        } else {
            Err(NetworkError::NetworkUnavailable)
        }
    }

    /// Estimates network latency by timing a HEAD request
    pub async fn estimate_latency(&self, url: &str) -> NetworkResult<Duration> {
        let start = std::time::Instant::now();
        self.client.head(url).await?;
        Ok(start.elapsed())
    }
}
