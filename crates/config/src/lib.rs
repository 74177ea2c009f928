//! RoServer Configuration Management
//!
//! Loads the map server's configuration from the family's native plain
//! text format: one `key: value` pair per line, `//` comments, blank
//! lines ignored.
//!
//! ```text
//! // conf/map_server.conf
//! server_name: roserver
//! bind_ip: 0.0.0.0
//! bind_port: 5121
//! packet_ver: 20180620
//! max_connections: 1000
//! session_timeout: 60
//! log_level: info
//! ```
//!
//! Unknown keys are warned about but tolerated, so one config file can
//! serve several server builds.

use roserver_core::{PacketVer, Result, ServerError};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Map-server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server display name (from "server_name")
    pub server_name: String,

    /// Listen address (from "bind_ip")
    pub bind_ip: String,

    /// Listen port (from "bind_port", default: 5121)
    pub bind_port: u16,

    /// Maximum concurrent connections (from "max_connections")
    pub max_connections: usize,

    /// Targeted client build date (from "packet_ver", YYYYMMDD)
    pub packet_ver: u32,

    /// Idle session timeout in seconds (from "session_timeout")
    pub session_timeout_secs: u64,

    /// Log filter (from "log_level": trace/debug/info/warn/error)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "roserver".into(),
            bind_ip: "0.0.0.0".into(),
            bind_port: 5121,
            max_connections: 1000,
            packet_ver: 20180620,
            session_timeout_secs: 60,
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a `key: value` text file.
    ///
    /// Missing keys keep their defaults. A malformed value is an error:
    /// silently running with a half-read configuration is how servers
    /// end up speaking the wrong client version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Parse the config text. Separated from `load` for testability.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::default();

        for (line_no, raw) in text.lines().enumerate() {
            let line = match raw.find("//") {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line.split_once(':').ok_or_else(|| {
                ServerError::Config(format!("line {}: expected `key: value`", line_no + 1))
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "server_name" => config.server_name = value.to_string(),
                "bind_ip" => config.bind_ip = value.to_string(),
                "bind_port" => {
                    config.bind_port = value.parse().map_err(|_| {
                        ServerError::Config(format!("bind_port: `{}` is not a port", value))
                    })?;
                }
                "max_connections" => {
                    config.max_connections = value.parse().map_err(|_| {
                        ServerError::Config(format!(
                            "max_connections: `{}` is not a number",
                            value
                        ))
                    })?;
                }
                "packet_ver" => {
                    config.packet_ver = PacketVer::parse(value)
                        .map_err(|e| ServerError::Config(format!("packet_ver: {}", e)))?
                        .get();
                }
                "session_timeout" => {
                    config.session_timeout_secs = value.parse().map_err(|_| {
                        ServerError::Config(format!(
                            "session_timeout: `{}` is not a number of seconds",
                            value
                        ))
                    })?;
                }
                "log_level" => config.log_level = value.to_string(),
                unknown => {
                    tracing::warn!(key = unknown, "ignoring unknown config key");
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the assembled configuration.
    pub fn validate(&self) -> Result<()> {
        if self.bind_port == 0 {
            return Err(ServerError::Config("bind_port must be non-zero".into()));
        }
        if self.max_connections == 0 {
            return Err(ServerError::Config(
                "max_connections must be at least 1".into(),
            ));
        }
        PacketVer::new(self.packet_ver)
            .validate()
            .map_err(|e| ServerError::Config(format!("packet_ver: {}", e)))?;
        Ok(())
    }

    /// The assembled listen address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_ip, self.bind_port)
            .parse()
            .map_err(|e| {
                ServerError::Config(format!(
                    "bind address {}:{}: {}",
                    self.bind_ip, self.bind_port, e
                ))
            })
    }

    /// Log the effective configuration at startup.
    pub fn display(&self) {
        tracing::info!("server name      : {}", self.server_name);
        tracing::info!("listen address   : {}:{}", self.bind_ip, self.bind_port);
        tracing::info!("max connections  : {}", self.max_connections);
        tracing::info!("client version   : {}", self.packet_ver);
        tracing::info!("session timeout  : {}s", self.session_timeout_secs);
    }
}
