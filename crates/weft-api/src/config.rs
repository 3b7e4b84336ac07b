//! Server configuration.

use serde::{Deserialize, Serialize};

use weft_core::{Error, Result};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 900;

/// Configuration for the weft API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled the server logs in pretty format and tolerates a
    /// memory-only blob store; production deployments must run with
    /// `debug` off and an external blob store wired in.
    pub debug: bool,

    /// Interval between scheduled consolidation runs, in seconds.
    ///
    /// `None` disables the background scheduler; consolidation then only
    /// happens through the manual trigger endpoint.
    #[serde(default)]
    pub consolidation_interval_secs: Option<u64>,

    /// Lifetime of issued dataset access tokens, in seconds.
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,
}

fn default_access_token_ttl_secs() -> u64 {
    DEFAULT_ACCESS_TOKEN_TTL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            consolidation_interval_secs: None,
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
        }
    }
}

impl Config {
    /// Loads configuration from `WEFT_*` environment variables.
    ///
    /// Unset variables keep their defaults; empty values are treated as
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("WEFT_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("WEFT_DEBUG")? {
            config.debug = debug;
        }
        if let Some(interval) = env_u64("WEFT_CONSOLIDATION_INTERVAL_SECS")? {
            if interval == 0 {
                return Err(Error::InvalidInput(
                    "WEFT_CONSOLIDATION_INTERVAL_SECS must be greater than 0".to_string(),
                ));
            }
            config.consolidation_interval_secs = Some(interval);
        }
        if let Some(ttl) = env_u64("WEFT_ACCESS_TOKEN_TTL_SECS")? {
            if ttl == 0 {
                return Err(Error::InvalidInput(
                    "WEFT_ACCESS_TOKEN_TTL_SECS must be greater than 0".to_string(),
                ));
            }
            config.access_token_ttl_secs = ttl;
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(Some(true)),
        "false" | "0" | "no" | "n" => Ok(Some(false)),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_safe() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert!(!config.debug);
        assert!(config.consolidation_interval_secs.is_none());
        assert_eq!(config.access_token_ttl_secs, 900);
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for v in ["true", "1", "yes", "y"] {
            std::env::set_var("WEFT_TEST_BOOL", v);
            assert_eq!(env_bool("WEFT_TEST_BOOL").unwrap(), Some(true), "{v}");
        }
        std::env::set_var("WEFT_TEST_BOOL", "maybe");
        assert!(env_bool("WEFT_TEST_BOOL").is_err());
        std::env::remove_var("WEFT_TEST_BOOL");
    }

    #[test]
    fn empty_value_is_treated_as_unset() {
        std::env::set_var("WEFT_TEST_EMPTY", "   ");
        assert_eq!(env_string("WEFT_TEST_EMPTY"), None);
        std::env::remove_var("WEFT_TEST_EMPTY");
    }
}
