use std::fmt;
use std::time::Duration;

use storm_tape_client_instrumented::prelude::TapeClientConfig;
use url::Url;

/// Number of files in each stage request.
pub const FILES_PER_REQUEST_ENV: &str = "STORM_FILES_PER_REQ";
/// Bearer token for the tape service. No `Authorization` header is sent when it is not set.
pub const TOKEN_ENV: &str = "STORM_TAPE_TOKEN";
/// Set to `true` to skip TLS certificate verification.
pub const INSECURE_ENV: &str = "STORM_TAPE_INSECURE";
/// Request timeout in seconds.
pub const TIMEOUT_ENV: &str = "STORM_TAPE_TIMEOUT_S";

pub const DEFAULT_FILES_PER_REQUEST: usize = 10;

/// Settings for talking to the tape service, read once from the environment when a scenario starts.
#[derive(Clone, PartialEq, Eq)]
pub struct TapeSettings {
    pub files_per_request: usize,
    pub bearer_token: Option<String>,
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
}

impl Default for TapeSettings {
    fn default() -> Self {
        Self {
            files_per_request: DEFAULT_FILES_PER_REQUEST,
            bearer_token: None,
            accept_invalid_certs: false,
            timeout: None,
        }
    }
}

impl fmt::Debug for TapeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapeSettings")
            .field("files_per_request", &self.files_per_request)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TapeSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from a variable lookup. Values that cannot be parsed are logged and the
    /// default is kept, so a typo never stops a run.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(value) = lookup(FILES_PER_REQUEST_ENV) {
            match value.trim().parse::<usize>() {
                Ok(files_per_request) => settings.files_per_request = files_per_request,
                Err(e) => log::warn!(
                    "Ignoring {FILES_PER_REQUEST_ENV}={value}: {e}. Using {DEFAULT_FILES_PER_REQUEST} files per request"
                ),
            }
        }

        settings.bearer_token = lookup(TOKEN_ENV)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        if let Some(value) = lookup(INSECURE_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => settings.accept_invalid_certs = true,
                "" | "0" | "false" | "no" => {}
                _ => log::warn!("Ignoring {INSECURE_ENV}={value}, expected true or false"),
            }
        }

        if let Some(value) = lookup(TIMEOUT_ENV) {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.timeout = Some(Duration::from_secs(secs)),
                _ => log::warn!("Ignoring {TIMEOUT_ENV}={value}, expected a number of seconds"),
            }
        }

        settings
    }

    pub fn client_config(&self, base_url: Url) -> TapeClientConfig {
        TapeClientConfig {
            base_url,
            bearer_token: self.bearer_token.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> TapeSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TapeSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(TapeSettings::default(), settings(&[]));
        assert_eq!(10, settings(&[]).files_per_request);
    }

    #[test]
    fn read_all_variables() {
        let settings = settings(&[
            (FILES_PER_REQUEST_ENV, "50"),
            (TOKEN_ENV, "abc"),
            (INSECURE_ENV, "TRUE"),
            (TIMEOUT_ENV, "30"),
        ]);

        assert_eq!(50, settings.files_per_request);
        assert_eq!(Some("abc".to_string()), settings.bearer_token);
        assert!(settings.accept_invalid_certs);
        assert_eq!(Some(Duration::from_secs(30)), settings.timeout);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let settings = settings(&[
            (FILES_PER_REQUEST_ENV, "lots"),
            (TOKEN_ENV, "  "),
            (INSECURE_ENV, "maybe"),
            (TIMEOUT_ENV, "0"),
        ]);

        assert_eq!(TapeSettings::default(), settings);
    }

    #[test]
    fn debug_hides_the_token() {
        let settings = settings(&[(TOKEN_ENV, "very-secret")]);
        assert!(!format!("{settings:?}").contains("very-secret"));
    }
}
