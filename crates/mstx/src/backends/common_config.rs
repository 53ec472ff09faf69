//! 📦 Common backend config, the knobs every HTTP-speaking backend shares.
//!
//! Lives in `backends` rather than `app_config` so backends can embed it without
//! importing the application config (and the application config can embed backends
//! without a circular import). The module system has opinions. 🦆

use std::time::Duration;

use serde::Deserialize;

/// ⏱️ Timeouts for the HTTP client. The only waiting we ever agree to.
///
/// There is no retry knob. On purpose. A failed call fails the task, and the workflow
/// engine upstream decides whether to run it again.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommonHttpConfig {
    /// 🔌 How long to wait for the TCP handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 📡 How long a whole request/response may take.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// 🔌 10s: if Meilisearch cannot shake hands in ten seconds, it is not in the mood.
fn default_connect_timeout_secs() -> u64 {
    10
}

// 📡 30s: search is fast, but document payloads can be chunky.
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CommonHttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CommonHttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_missing_fields_fall_back_to_the_defaults() {
        let config: CommonHttpConfig = toml::from_str("connect_timeout_secs = 3").expect("💀 parse");
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(CommonHttpConfig::default().connect_timeout_secs, 10);
    }
}
