//! Connection configuration.
//!
//! ```
//! use mqlink::Config;
//!
//! let config = Config::new("127.0.0.1:11181")
//!     .with_password("secret")
//!     .with_keepalive(30);
//!
//! assert!(config.credential_digest().is_some());
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default broker address.
pub const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:11181";

/// Default keep-alive interval in seconds.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 60;

/// Default number of idle connections kept by a client.
pub const DEFAULT_MAX_IDLE_CONNS: usize = 16;

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `host:port`, or a socket path (anything containing `/`).
    pub broker_addr: String,
    /// Broker password. Empty or absent skips authentication.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keepalive: u64,
    /// Idle connections kept by [`Client`](crate::Client).
    pub max_idle_conns: usize,
    /// Largest accepted fields + body size of an incoming frame.
    pub max_frame_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_addr: DEFAULT_BROKER_ADDR.to_string(),
            password: None,
            keepalive: DEFAULT_KEEPALIVE_SECS,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            max_frame_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl Config {
    /// Config for the given broker address with default settings.
    pub fn new(broker_addr: &str) -> Self {
        Self {
            broker_addr: broker_addr.to_string(),
            ..Self::default()
        }
    }

    /// Set the broker password.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set the keep-alive interval in seconds.
    pub fn with_keepalive(mut self, secs: u64) -> Self {
        self.keepalive = secs;
        self
    }

    /// Set the idle connection limit.
    pub fn with_max_idle_conns(mut self, limit: usize) -> Self {
        self.max_idle_conns = limit;
        self
    }

    /// Set the incoming frame size limit.
    pub fn with_max_frame_size(mut self, bytes: u32) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Keep-alive interval as a duration.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive)
    }

    /// Lower-case hex MD5 of the password, sent during authentication.
    pub fn credential_digest(&self) -> Option<String> {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => {
                Some(format!("{:x}", md5::compute(password.as_bytes())))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.broker_addr, DEFAULT_BROKER_ADDR);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(60));
        assert_eq!(config.max_idle_conns, DEFAULT_MAX_IDLE_CONNS);
        assert_eq!(config.max_frame_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert!(config.credential_digest().is_none());
    }

    #[test]
    fn test_config_method_chaining() {
        let config = Config::new("/var/run/broker.sock")
            .with_password("pw")
            .with_keepalive(10)
            .with_max_idle_conns(2)
            .with_max_frame_size(1024);

        assert_eq!(config.broker_addr, "/var/run/broker.sock");
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.keepalive, 10);
        assert_eq!(config.max_idle_conns, 2);
        assert_eq!(config.max_frame_size, 1024);
    }

    #[test]
    fn test_credential_digest_is_md5_hex() {
        let config = Config::default().with_password("password");
        assert_eq!(
            config.credential_digest().as_deref(),
            Some("5f4dcc3b5aa765d61d8327deb882cf99")
        );
    }

    #[test]
    fn test_empty_password_skips_digest() {
        let config = Config::default().with_password("");
        assert!(config.credential_digest().is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config =
            serde_json::from_str(r#"{"broker_addr": "10.0.0.5:11181", "keepalive": 5}"#).unwrap();

        assert_eq!(config.broker_addr, "10.0.0.5:11181");
        assert_eq!(config.keepalive, 5);
        assert_eq!(config.max_idle_conns, DEFAULT_MAX_IDLE_CONNS);
        assert!(config.password.is_none());
    }
}
