use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "claimcheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_VENDOR_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PAGE_CONCURRENCY: usize = 4;
const MAX_PAGE_CONCURRENCY: usize = 32;

/// Per-user data directory (`~/.local/share/claimcheck` on Linux).
/// Falls back to the working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("claimcheck.db")
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "claimcheck=debug,info"
    } else {
        "claimcheck=info,warn"
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(String),

    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

// ═══════════════════════════════════════════
// Vendor configuration
// ═══════════════════════════════════════════

/// Wire protocol a vendor speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorApi {
    ChatCompletions,
    Messages,
}

impl VendorApi {
    fn parse(var: &str, raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat" | "chat_completions" => Ok(Self::ChatCompletions),
            "messages" => Ok(Self::Messages),
            _ => Err(ConfigError::Invalid {
                var: var.to_string(),
                value: raw.to_string(),
                reason: "expected `chat` or `messages`".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorConfig {
    pub name: String,
    pub api: VendorApi,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub primary: VendorConfig,
    pub secondary: VendorConfig,
    pub vendor_timeout_secs: u64,
    pub page_concurrency: usize,
}

impl PipelineConfig {
    /// Load from `CLAIMCHECK_*` environment variables.
    ///
    /// Each vendor reads `CLAIMCHECK_{PRIMARY,SECONDARY}_{API,URL,MODEL,API_KEY}`.
    /// Model and key are required; the rest have defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let vendor = |slot: &str,
                      default_api: VendorApi,
                      default_url: &str|
         -> Result<VendorConfig, ConfigError> {
            let api_var = format!("CLAIMCHECK_{slot}_API");
            let api = match get(&api_var) {
                Some(raw) => VendorApi::parse(&api_var, &raw)?,
                None => default_api,
            };
            let model_var = format!("CLAIMCHECK_{slot}_MODEL");
            let key_var = format!("CLAIMCHECK_{slot}_API_KEY");
            Ok(VendorConfig {
                name: slot.to_ascii_lowercase(),
                api,
                base_url: get(&format!("CLAIMCHECK_{slot}_URL"))
                    .unwrap_or_else(|| default_url.to_string()),
                model: get(&model_var).ok_or(ConfigError::Missing(model_var))?,
                api_key: get(&key_var).ok_or(ConfigError::Missing(key_var))?,
            })
        };

        let primary = vendor("PRIMARY", VendorApi::ChatCompletions, "https://api.openai.com")?;
        let secondary = vendor("SECONDARY", VendorApi::Messages, "https://api.anthropic.com")?;

        let vendor_timeout_secs = parse_number(
            "CLAIMCHECK_VENDOR_TIMEOUT_SECS",
            get("CLAIMCHECK_VENDOR_TIMEOUT_SECS"),
            DEFAULT_VENDOR_TIMEOUT_SECS,
        )?;
        if vendor_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "CLAIMCHECK_VENDOR_TIMEOUT_SECS".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let page_concurrency = parse_number(
            "CLAIMCHECK_PAGE_CONCURRENCY",
            get("CLAIMCHECK_PAGE_CONCURRENCY"),
            DEFAULT_PAGE_CONCURRENCY,
        )?
        .clamp(1, MAX_PAGE_CONCURRENCY);

        Ok(Self {
            primary,
            secondary,
            vendor_timeout_secs,
            page_concurrency,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    var: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            value: v.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CLAIMCHECK_PRIMARY_MODEL", "vision-a"),
            ("CLAIMCHECK_PRIMARY_API_KEY", "key-a"),
            ("CLAIMCHECK_SECONDARY_MODEL", "vision-b"),
            ("CLAIMCHECK_SECONDARY_API_KEY", "key-b"),
        ]
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with(APP_NAME));
        assert!(default_database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_fill_optional_values() {
        let cfg = PipelineConfig::from_lookup(lookup(&required())).unwrap();
        assert_eq!(cfg.primary.name, "primary");
        assert_eq!(cfg.primary.api, VendorApi::ChatCompletions);
        assert_eq!(cfg.secondary.api, VendorApi::Messages);
        assert_eq!(cfg.vendor_timeout_secs, DEFAULT_VENDOR_TIMEOUT_SECS);
        assert_eq!(cfg.page_concurrency, DEFAULT_PAGE_CONCURRENCY);
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let err = PipelineConfig::from_lookup(lookup(&[("CLAIMCHECK_PRIMARY_MODEL", "m")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("CLAIMCHECK_PRIMARY_API_KEY".into()));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = required();
        pairs.extend([
            ("CLAIMCHECK_PRIMARY_API", "messages"),
            ("CLAIMCHECK_PRIMARY_URL", "http://localhost:9000"),
            ("CLAIMCHECK_VENDOR_TIMEOUT_SECS", "15"),
            ("CLAIMCHECK_PAGE_CONCURRENCY", "500"),
        ]);
        let cfg = PipelineConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.primary.api, VendorApi::Messages);
        assert_eq!(cfg.primary.base_url, "http://localhost:9000");
        assert_eq!(cfg.vendor_timeout_secs, 15);
        assert_eq!(cfg.page_concurrency, MAX_PAGE_CONCURRENCY);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut pairs = required();
        pairs.push(("CLAIMCHECK_VENDOR_TIMEOUT_SECS", "soon"));
        assert!(matches!(
            PipelineConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { .. })
        ));

        let mut pairs = required();
        pairs.push(("CLAIMCHECK_VENDOR_TIMEOUT_SECS", "0"));
        assert!(PipelineConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn unknown_api_is_rejected() {
        let mut pairs = required();
        pairs.push(("CLAIMCHECK_SECONDARY_API", "grpc"));
        let err = PipelineConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("CLAIMCHECK_SECONDARY_API"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
