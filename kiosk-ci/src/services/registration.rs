//! Device registration with the control plane
//!
//! The device announces its externally reachable URL so the control plane
//! knows where to push content. The URL either comes from configuration or is
//! discovered from the local tunnel agent's introspection API. Registration is
//! repeated on a heartbeat timer that fires immediately and then every
//! interval; discovery and registration failures are logged and retried on
//! the next tick and never affect content ingestion.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("no tunnels found in tunnel agent response")]
    NoTunnels,

    #[error("tunnel entry has no public_url")]
    MissingPublicUrl,

    #[error("registration rejected: status={status} body={body}")]
    Rejected { status: u16, body: String },
}

/// Reported device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// Registration payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub device_id: String,
    pub ip_address: String,
    pub status: DeviceStatus,
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelEntry>,
}

#[derive(Debug, Deserialize)]
struct TunnelEntry {
    public_url: Option<String>,
}

/// Ask the local tunnel agent for the device's public URL
pub async fn discover_public_url(
    http_client: &reqwest::Client,
    tunnel_api_url: &str,
) -> Result<String, RegistrationError> {
    let response = http_client
        .get(tunnel_api_url)
        .send()
        .await
        .map_err(|e| RegistrationError::Network(format!("failed to fetch tunnel URL: {}", e)))?;

    let list: TunnelList = response
        .json()
        .await
        .map_err(|e| RegistrationError::Parse(format!("failed to parse tunnel response: {}", e)))?;

    let first = list.tunnels.into_iter().next().ok_or(RegistrationError::NoTunnels)?;
    let public_url = first.public_url.ok_or(RegistrationError::MissingPublicUrl)?;

    info!(public_url = %public_url, "Discovered public URL");
    Ok(public_url)
}

/// Posts registrations to the device registry
pub struct RegistrationClient {
    http_client: reqwest::Client,
    endpoint: String,
    device_id: String,
}

impl RegistrationClient {
    pub fn new(endpoint: &str, device_id: &str, timeout: Duration) -> Result<Self, RegistrationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistrationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
            device_id: device_id.to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// HTTP client carrying the configured registration timeout
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Register the device at `public_url` with the given status
    pub async fn register(&self, public_url: &str, status: DeviceStatus) -> Result<(), RegistrationError> {
        let registration = DeviceRegistration {
            device_id: self.device_id.clone(),
            ip_address: public_url.to_string(),
            status,
        };
        debug!(?registration, endpoint = %self.endpoint, "Sending registration");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&registration)
            .send()
            .await
            .map_err(|e| RegistrationError::Network(format!("failed to send registration request: {}", e)))?;

        let status_code = response.status();
        let body = response.text().await.unwrap_or_default();
        if status_code != reqwest::StatusCode::OK {
            return Err(RegistrationError::Rejected {
                status: status_code.as_u16(),
                body,
            });
        }

        info!(device_id = %self.device_id, ?status, "Device registered");
        Ok(())
    }
}

/// Where the heartbeat gets the URL it registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicUrlSource {
    /// Configured URL, used as is
    Fixed(String),
    /// Tunnel agent introspection endpoint, queried on every tick
    Tunnel(String),
}

impl PublicUrlSource {
    async fn resolve(&self, http_client: &reqwest::Client) -> Result<String, RegistrationError> {
        match self {
            PublicUrlSource::Fixed(url) => Ok(url.clone()),
            PublicUrlSource::Tunnel(api_url) => discover_public_url(http_client, api_url).await,
        }
    }
}

/// Running heartbeat task
pub struct Heartbeat {
    handle: JoinHandle<()>,
    public_url: watch::Receiver<Option<String>>,
}

impl Heartbeat {
    /// Last URL the device registered with, if any registration got that far
    pub fn public_url(&self) -> Option<String> {
        self.public_url.borrow().clone()
    }

    /// Stop the task, returning the last registered URL
    pub async fn stop(self) -> Option<String> {
        self.handle.abort();
        let _ = self.handle.await;
        let url = self.public_url.borrow().clone();
        url
    }
}

/// Register now, then again on every interval, until stopped
///
/// A tunnel URL is rediscovered on each tick, so a tunnel agent that comes up
/// late (or restarts with a new URL) is picked up without restarting.
pub fn spawn_heartbeat(
    client: Arc<RegistrationClient>,
    source: PublicUrlSource,
    interval: Duration,
) -> Heartbeat {
    let (url_tx, url_rx) = watch::channel(None);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let public_url = match source.resolve(client.http_client()).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(device_id = %client.device_id(), error = %e, "Unable to determine public URL, retrying next tick");
                    continue;
                }
            };

            match client.register(&public_url, DeviceStatus::Online).await {
                Ok(()) => {
                    url_tx.send_replace(Some(public_url));
                }
                Err(e) => {
                    warn!(device_id = %client.device_id(), error = %e, "Heartbeat registration failed");
                }
            }
        }
    });

    Heartbeat {
        handle,
        public_url: url_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_payload_shape() {
        let registration = DeviceRegistration {
            device_id: "kiosk-001".to_string(),
            ip_address: "https://abc.tunnel.example".to_string(),
            status: DeviceStatus::Online,
        };
        assert_eq!(
            serde_json::to_value(&registration).unwrap(),
            serde_json::json!({
                "deviceId": "kiosk-001",
                "ipAddress": "https://abc.tunnel.example",
                "status": "online"
            })
        );
    }

    #[test]
    fn test_tunnel_list_tolerates_missing_field() {
        let list: TunnelList = serde_json::from_str(r#"{"uri": "/api/tunnels"}"#).unwrap();
        assert!(list.tunnels.is_empty());
    }
}
