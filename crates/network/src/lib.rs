// crates/network/src/lib.rs
//! Network awareness and HTTP plumbing for the sync core
//!
//! - [`NetworkDetector`]: current connectivity, change notifications, syncability
//! - [`ConnectivityChecker`]: active HEAD probes
//! - [`HttpRemoteService`]: [`laboursync_core::RemoteService`] over JSON/HTTP

mod client;
mod connectivity;
mod detector;
mod error;
mod remote;

pub use client::{Client, ClientConfig};
pub use connectivity::ConnectivityChecker;
pub use detector::{ConnectionType, EffectiveType, NetworkDetector, NetworkState, Subscription};
pub use error::{NetworkError, NetworkResult};
pub use remote::HttpRemoteService;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let client = Client::new().expect("Failed to create client");
        let checker = ConnectivityChecker::new(client.clone());
        let _: NetworkDetector = NetworkDetector::new(checker);
        let _: HttpRemoteService = HttpRemoteService::new(client, "http://localhost");
        let _: NetworkState = NetworkState::offline();
    }
}
