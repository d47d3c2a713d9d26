//! Configuration for the session-state cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of requests the server processes concurrently.
/// Capacity defaults to twice this.
pub const DEFAULT_MAX_REQUESTS: usize = 1024;

/// Default upper bound on the time spent processing one request.
pub const DEFAULT_MAX_REQUEST_TIME: Duration = Duration::from_secs(30);

/// Entry lifetime is this many multiples of the maximum request time.
pub const LIFETIME_FACTOR: u32 = 10;

/// Configuration for the session-state cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateConfig {
    /// Maximum number of live entries. Creation fails once this is reached.
    pub max_sessions: usize,

    /// Maximum time the server takes to process one request.
    /// Entries live for [`LIFETIME_FACTOR`] times this.
    pub max_request_time: Duration,

    /// Optional octet written into every fresh token at
    /// [`crate::SEED_OFFSET`], for load-balancer routing.
    pub token_seed: Option<u8>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_REQUESTS * 2,
            max_request_time: DEFAULT_MAX_REQUEST_TIME,
            token_seed: None,
        }
    }
}

impl StateConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live entries.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the maximum request processing time.
    pub fn with_max_request_time(mut self, time: Duration) -> Self {
        self.max_request_time = time;
        self
    }

    /// Set the token seed octet.
    pub fn with_token_seed(mut self, seed: u8) -> Self {
        self.token_seed = Some(seed);
        self
    }

    /// Leave fresh tokens fully random.
    pub fn without_token_seed(mut self) -> Self {
        self.token_seed = None;
        self
    }

    /// How long a new entry stays valid.
    pub fn lifetime(&self) -> Duration {
        self.max_request_time.saturating_mul(LIFETIME_FACTOR)
    }
}

/// The `[state]` section of a server config file.
///
/// ```toml
/// [state]
/// max_requests = 1024
/// max_sessions = 4096
/// max_request_time_secs = 30
/// token_seed = 7
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSection {
    /// Concurrent request limit. Capacity defaults to twice this.
    pub max_requests: usize,
    /// Explicit capacity, overriding the `max_requests` default.
    pub max_sessions: Option<usize>,
    /// Maximum time to process one request, in seconds.
    pub max_request_time_secs: u64,
    /// Optional token seed octet (0-255).
    pub token_seed: Option<u8>,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            max_sessions: None,
            max_request_time_secs: DEFAULT_MAX_REQUEST_TIME.as_secs(),
            token_seed: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    state: StateSection,
}

impl StateSection {
    /// Parse the `[state]` table out of a TOML document. A missing table
    /// yields the defaults; other tables are ignored.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let doc: Document = toml::from_str(toml_str)?;
        Ok(doc.state)
    }

    /// Effective capacity.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
            .unwrap_or_else(|| self.max_requests.saturating_mul(2))
    }
}

impl TryFrom<StateSection> for StateConfig {
    type Error = Error;

    fn try_from(section: StateSection) -> Result<Self> {
        let max_sessions = section.max_sessions();
        if max_sessions == 0 {
            return Err(Error::InvalidConfig(
                "max_sessions must be greater than zero".to_string(),
            ));
        }
        if section.max_request_time_secs == 0 {
            return Err(Error::InvalidConfig(
                "max_request_time_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            max_sessions,
            max_request_time: Duration::from_secs(section.max_request_time_secs),
            token_seed: section.token_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StateConfig::new();
        assert_eq!(config.max_sessions, 2048);
        assert_eq!(config.lifetime(), Duration::from_secs(300));
        assert_eq!(config.token_seed, None);
    }

    #[test]
    fn test_builder() {
        let config = StateConfig::new()
            .with_max_sessions(2)
            .with_max_request_time(Duration::from_secs(5))
            .with_token_seed(9);
        assert_eq!(config.max_sessions, 2);
        assert_eq!(config.lifetime(), Duration::from_secs(50));
        assert_eq!(config.token_seed, Some(9));
        assert_eq!(config.without_token_seed().token_seed, None);
    }

    #[test]
    fn test_parse_section() {
        let toml = r#"
[server]
listen = "0.0.0.0:1812"

[state]
max_requests = 100
max_request_time_secs = 10
token_seed = 200
"#;
        let section = StateSection::from_toml(toml).unwrap();
        assert_eq!(section.max_sessions(), 200);

        let config = StateConfig::try_from(section).unwrap();
        assert_eq!(config.max_sessions, 200);
        assert_eq!(config.max_request_time, Duration::from_secs(10));
        assert_eq!(config.token_seed, Some(200));
    }

    #[test]
    fn test_explicit_max_sessions_wins() {
        let section = StateSection::from_toml("[state]\nmax_requests = 100\nmax_sessions = 7\n")
            .unwrap();
        assert_eq!(section.max_sessions(), 7);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let section = StateSection::from_toml("").unwrap();
        assert_eq!(section, StateSection::default());
        let config = StateConfig::try_from(section).unwrap();
        assert_eq!(config, StateConfig::default());
    }

    #[test]
    fn test_seed_out_of_range_rejected() {
        let result = StateSection::from_toml("[state]\ntoken_seed = 256\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let section = StateSection::from_toml("[state]\nmax_sessions = 0\n").unwrap();
        assert!(matches!(
            StateConfig::try_from(section),
            Err(Error::InvalidConfig(_))
        ));
    }
}
