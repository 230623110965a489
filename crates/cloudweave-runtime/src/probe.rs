//! Guest readiness probe

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Checks whether a started VM accepts connections
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `address` is `host:port`
    async fn is_ready(&self, address: &str) -> bool;
}

/// Succeeds once a TCP connection to the address can be opened
#[derive(Debug, Clone)]
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn is_ready(&self, address: &str) -> bool {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("Probe {} refused: {}", address, e);
                false
            }
            Err(_) => {
                tracing::debug!("Probe {} timed out", address);
                false
            }
        }
    }
}

/// Address to probe for a VM: its SSH access point, else the public IP on port 22
pub fn ssh_address(public_ip: &str, ssh_access_point: &str) -> Option<String> {
    if !ssh_access_point.is_empty() {
        return Some(ssh_access_point.to_string());
    }
    if public_ip.is_empty() {
        return None;
    }
    Some(format!("{}:{}", public_ip, DEFAULT_SSH_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_port_is_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(TcpProbe::default().is_ready(&addr).await);
    }

    #[tokio::test]
    async fn test_closed_port_is_not_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(!TcpProbe::default().is_ready(&addr).await);
    }

    #[test]
    fn test_ssh_address() {
        assert_eq!(ssh_address("10.0.0.1", "").as_deref(), Some("10.0.0.1:22"));
        assert_eq!(
            ssh_address("10.0.0.1", "10.0.0.1:2222").as_deref(),
            Some("10.0.0.1:2222")
        );
        assert_eq!(ssh_address("", ""), None);
    }
}
