//! Configuration types for Reqbin
//!
//! [`CaptureSettings`] is the raw, user-facing form. It becomes an immutable
//! [`CaptureConfig`] only through [`CaptureConfig::validate`], which is the
//! single place where the "at least one termination policy" rule is enforced.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ReqbinError, Result};

/// Status code used when none is configured
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Default maximum request body size
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Raw capture settings, before validation
///
/// Zero means "unset" for every termination field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Status code the endpoint answers every request with (0 = default 200)
    pub response_status_code: u16,
    /// Seconds after the function under test returns at which capture stops
    pub global_timeout_secs: u64,
    /// Seconds without a new request after which capture stops
    pub request_idle_timeout_secs: u64,
    /// Number of captured requests after which capture stops
    pub max_request_count: usize,
    /// Largest request body accepted into the capture
    pub max_body_size: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            response_status_code: DEFAULT_STATUS_CODE,
            global_timeout_secs: 0,
            request_idle_timeout_secs: 0,
            max_request_count: 0,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl CaptureSettings {
    /// Set the response status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.response_status_code = status;
        self
    }

    /// Set the global timeout in seconds
    #[must_use]
    pub fn with_global_timeout(mut self, secs: u64) -> Self {
        self.global_timeout_secs = secs;
        self
    }

    /// Set the idle timeout in seconds
    #[must_use]
    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.request_idle_timeout_secs = secs;
        self
    }

    /// Set the maximum number of requests to capture
    #[must_use]
    pub fn with_max_requests(mut self, count: usize) -> Self {
        self.max_request_count = count;
        self
    }

    /// Set the maximum accepted body size
    #[must_use]
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}

/// Validated, immutable capture configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    response_status_code: u16,
    global_timeout_secs: u64,
    request_idle_timeout_secs: u64,
    max_request_count: usize,
    max_body_size: usize,
}

impl CaptureConfig {
    /// Validate raw settings into a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ReqbinError::Config`] if no termination policy is set, the
    /// status code is not a valid HTTP status, or the body limit is zero
    pub fn validate(settings: CaptureSettings) -> Result<Self> {
        let response_status_code = if settings.response_status_code == 0 {
            DEFAULT_STATUS_CODE
        } else {
            settings.response_status_code
        };

        if settings.global_timeout_secs == 0
            && settings.request_idle_timeout_secs == 0
            && settings.max_request_count == 0
        {
            return Err(ReqbinError::Config(
                "At least one of global_timeout_secs, request_idle_timeout_secs or max_request_count must be set"
                    .to_string(),
            ));
        }

        if !(100..=999).contains(&response_status_code) {
            return Err(ReqbinError::Config(format!(
                "Invalid response status code: {response_status_code}"
            )));
        }

        if settings.max_body_size == 0 {
            return Err(ReqbinError::Config(
                "max_body_size must be > 0".to_string(),
            ));
        }

        Ok(Self {
            response_status_code,
            global_timeout_secs: settings.global_timeout_secs,
            request_idle_timeout_secs: settings.request_idle_timeout_secs,
            max_request_count: settings.max_request_count,
            max_body_size: settings.max_body_size,
        })
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReqbinError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be parsed or validated
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: CaptureSettings = toml::from_str(content)
            .map_err(|e| ReqbinError::Config(format!("Failed to parse config: {e}")))?;

        Self::validate(settings)
    }

    /// Status code the endpoint answers with
    #[must_use]
    pub fn response_status_code(&self) -> u16 {
        self.response_status_code
    }

    /// Maximum accepted body size in bytes
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Termination policy derived from this configuration
    #[must_use]
    pub fn policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            global_timeout: non_zero_secs(self.global_timeout_secs),
            idle_timeout: non_zero_secs(self.request_idle_timeout_secs),
            max_requests: (self.max_request_count > 0).then_some(self.max_request_count),
        }
    }
}

impl TryFrom<CaptureSettings> for CaptureConfig {
    type Error = ReqbinError;

    fn try_from(settings: CaptureSettings) -> Result<Self> {
        Self::validate(settings)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// When a capture stops; the three policies are OR-combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Fixed deadline measured from the end of the function under test
    pub global_timeout: Option<Duration>,
    /// Inactivity deadline, re-armed on every arrival
    pub idle_timeout: Option<Duration>,
    /// Stop once this many records have been captured
    pub max_requests: Option<usize>,
}

impl TerminationPolicy {
    /// Whether at least one policy can end a capture
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.global_timeout.is_some() || self.idle_timeout.is_some() || self.max_requests.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_rejected() {
        let result = CaptureConfig::validate(CaptureSettings::default());
        assert!(matches!(result, Err(ReqbinError::Config(_))));
    }

    #[test]
    fn test_status_defaults_to_200() {
        let config =
            CaptureConfig::validate(CaptureSettings::default().with_status(0).with_max_requests(1))
                .unwrap();
        assert_eq!(config.response_status_code(), 200);
    }

    #[test]
    fn test_invalid_status_rejected() {
        let settings = CaptureSettings::default()
            .with_status(42)
            .with_max_requests(1);
        assert!(CaptureConfig::validate(settings).is_err());
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let settings = CaptureSettings::default()
            .with_max_body_size(0)
            .with_idle_timeout(1);
        assert!(CaptureConfig::try_from(settings).is_err());
    }

    #[test]
    fn test_policy_mapping() {
        let config = CaptureConfig::validate(
            CaptureSettings::default()
                .with_global_timeout(3)
                .with_max_requests(2),
        )
        .unwrap();

        let policy = config.policy();
        assert_eq!(policy.global_timeout, Some(Duration::from_secs(3)));
        assert_eq!(policy.idle_timeout, None);
        assert_eq!(policy.max_requests, Some(2));
        assert!(policy.is_bounded());
        assert!(!TerminationPolicy::default().is_bounded());
    }

    #[test]
    fn test_config_parse() {
        let config_toml = r"
            response_status_code = 201
            request_idle_timeout_secs = 2
        ";

        let config = CaptureConfig::from_toml_str(config_toml).unwrap();
        assert_eq!(config.response_status_code(), 201);
        assert_eq!(config.policy().idle_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.max_body_size(), DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"max_request_count = 5\n").unwrap();

        let config = CaptureConfig::from_file(file.path()).unwrap();
        assert_eq!(config.policy().max_requests, Some(5));
    }

    #[test]
    fn test_config_file_without_policy() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"response_status_code = 204\n").unwrap();

        assert!(CaptureConfig::from_file(file.path()).is_err());
    }

    proptest! {
        #[test]
        fn prop_any_policy_validates(
            global in 0u64..100,
            idle in 0u64..100,
            count in 0usize..100,
        ) {
            let settings = CaptureSettings::default()
                .with_global_timeout(global)
                .with_idle_timeout(idle)
                .with_max_requests(count);

            let bounded = global > 0 || idle > 0 || count > 0;
            let result = CaptureConfig::validate(settings);
            prop_assert_eq!(result.is_ok(), bounded);
            if let Ok(config) = result {
                prop_assert!(config.policy().is_bounded());
            }
        }
    }
}
