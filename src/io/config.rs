//! Activation configuration
//!
//! Where to connect, how long activation may take in total, and how many
//! attempts to spread that budget over.

use crate::protocol::message::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use crate::protocol::types::ApiVersion;
use std::time::Duration;

/// Activation parameters
///
/// # Examples
///
/// ```
/// use gazelink::io::config::ActivationConfig;
/// use std::time::Duration;
///
/// let config = ActivationConfig::default()
///     .with_timeout(Duration::from_millis(9_000))
///     .with_retries(3);
/// assert_eq!(config.attempt_window(), Duration::from_millis(3_000));
/// ```
#[derive(Debug, Clone)]
pub struct ActivationConfig {
    /// Protocol version declared in the handshake
    pub api_version: ApiVersion,
    /// Server host name
    pub host: String,
    /// Server port
    pub port: u16,
    /// Total time budget for activation across all attempts
    pub timeout: Duration,
    /// Number of connection attempts
    pub retries: u32,
    /// How long blocking operations wait for their result
    pub request_timeout: Duration,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::V1,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retries: 1,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl ActivationConfig {
    /// Config for a specific server endpoint
    ///
    /// # Examples
    ///
    /// ```
    /// use gazelink::io::config::ActivationConfig;
    ///
    /// let config = ActivationConfig::with_endpoint("127.0.0.1", 7000);
    /// assert_eq!(config.addr(), "127.0.0.1:7000");
    /// ```
    pub fn with_endpoint(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of attempts actually made (at least one)
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Time allotted to each attempt: `timeout / retries`
    pub fn attempt_window(&self) -> Duration {
        self.timeout / self.attempts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ActivationConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6555);
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert_eq!(config.request_timeout, Duration::from_millis(10_000));
        assert_eq!(config.api_version, ApiVersion::V1);
        assert_eq!(config.attempts(), 1);
    }

    #[test]
    fn test_attempt_window() {
        let config = ActivationConfig::default()
            .with_timeout(Duration::from_millis(9_000))
            .with_retries(3);
        assert_eq!(config.attempt_window(), Duration::from_millis(3_000));
    }

    #[test]
    fn test_zero_retries_means_one_attempt() {
        let config = ActivationConfig::default().with_retries(0);
        assert_eq!(config.attempts(), 1);
        assert_eq!(config.attempt_window(), config.timeout);
    }
}
