//! # Network Configuration
//!
//! Configuration options for the map-server networking layer.
//!
//! # Example
//!
//! ```rust
//! use roserver_network::NetworkConfig;
//! use roserver_core::PacketVer;
//!
//! let config = NetworkConfig {
//!     bind_address: "0.0.0.0:5121".parse().unwrap(),
//!     max_sessions: 1000,
//!     packet_ver: PacketVer::new(20180620),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use roserver_core::PacketVer;
use std::net::SocketAddr;
use std::time::Duration;

/// Network layer configuration.
///
/// # Default Values
///
/// The defaults are chosen for a typical map server:
/// - Port 5121 (the family's conventional map-server port)
/// - 1000 max sessions
/// - 60-second idle timeout
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address and port to bind the TCP listener to.
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent sessions allowed. Further accepts
    /// are refused until a slot frees up.
    pub max_sessions: usize,

    /// Client build date the process serves. Drives the inbound opcode
    /// table and the default outbound layouts; individual sessions may
    /// negotiate their own during the handshake.
    pub packet_ver: PacketVer,

    /// Idle sessions are closed after this duration without traffic.
    pub session_timeout: Duration,

    /// Size of each connection's read buffer.
    pub read_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5121".parse().expect("static address"),
            max_sessions: 1000,
            packet_ver: PacketVer::new(20180620),
            session_timeout: Duration::from_secs(60),
            read_buffer_size: 4096,
        }
    }
}

impl NetworkConfig {
    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_sessions == 0 {
            return Err("max_sessions must be at least 1".into());
        }
        if self.read_buffer_size < 64 {
            return Err("read_buffer_size below a single packet".into());
        }
        self.packet_ver.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(NetworkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_sessions() {
        let config = NetworkConfig {
            max_sessions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_packet_ver() {
        let config = NetworkConfig {
            packet_ver: PacketVer::new(123),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
