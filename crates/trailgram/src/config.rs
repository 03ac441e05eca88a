//! Relay configuration.
//!
//! Everything comes from the process environment, read once at startup:
//!
//! - `TG_TOKEN` (required): Bot API token
//! - `TEMPLATE` (required): message template source
//! - `CHAT_ID` (required): destination chat id
//! - `SOCKS5_PROXY` (optional): `host:port` of a SOCKS5 proxy

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Bot token variable.
pub const TOKEN_VAR: &str = "TG_TOKEN";
/// Template source variable.
pub const TEMPLATE_VAR: &str = "TEMPLATE";
/// Destination chat variable.
pub const CHAT_ID_VAR: &str = "CHAT_ID";
/// Optional proxy variable.
pub const PROXY_VAR: &str = "SOCKS5_PROXY";

/// Process-wide relay settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Telegram Bot API token.
    pub bot_token: String,
    /// Template source, compiled once at startup.
    pub template: String,
    /// Chat every message is sent to.
    pub chat_id: i64,
    /// SOCKS5 proxy for all Bot API traffic.
    pub socks5_proxy: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"[REDACTED]")
            .field("template", &self.template)
            .field("chat_id", &self.chat_id)
            .field("socks5_proxy", &self.socks5_proxy)
            .finish()
    }
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first required variable
    /// that is unset or empty, or [`ConfigError::Invalid`] if `CHAT_ID` is
    /// not an integer.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));

        let bot_token = required(TOKEN_VAR)?;
        let template = required(TEMPLATE_VAR)?;
        let chat_id = required(CHAT_ID_VAR)?
            .trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::Invalid {
                var: CHAT_ID_VAR,
                reason: e.to_string(),
            })?;
        let socks5_proxy = optional(PROXY_VAR);

        debug!(chat_id, proxied = socks5_proxy.is_some(), "loaded configuration");

        Ok(Self {
            bot_token,
            template,
            chat_id,
            socks5_proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("TG_TOKEN", "123:abc"),
        ("TEMPLATE", "{{.SavedSearch.Name}}"),
        ("CHAT_ID", "-1001234"),
        ("SOCKS5_PROXY", "127.0.0.1:1080"),
    ];

    #[test]
    fn loads_all_variables() {
        let config = Config::from_lookup(lookup(FULL)).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.template, "{{.SavedSearch.Name}}");
        assert_eq!(config.chat_id, -1_001_234);
        assert_eq!(config.socks5_proxy.as_deref(), Some("127.0.0.1:1080"));
    }

    #[test]
    fn proxy_is_optional() {
        let config = Config::from_lookup(lookup(&FULL[..3])).unwrap();
        assert_eq!(config.socks5_proxy, None);

        let mut vars = FULL.to_vec();
        vars[3] = ("SOCKS5_PROXY", "");
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.socks5_proxy, None);
    }

    #[test]
    fn missing_required_variable_is_named() {
        for (i, &(name, _)) in FULL[..3].iter().enumerate() {
            let mut vars = FULL.to_vec();
            vars.remove(i);
            let err = Config::from_lookup(lookup(&vars)).unwrap_err();
            assert_eq!(err, ConfigError::Missing(name), "dropping {name}");
        }
    }

    #[test]
    fn empty_required_variable_counts_as_missing() {
        let mut vars = FULL.to_vec();
        vars[0] = ("TG_TOKEN", "");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TG_TOKEN"));
    }

    #[test]
    fn template_is_not_validated() {
        let mut vars = FULL.to_vec();
        vars[1] = ("TEMPLATE", "{{if}}");
        assert!(Config::from_lookup(lookup(&vars)).is_ok());
    }

    #[test]
    fn chat_id_must_be_an_integer() {
        let mut vars = FULL.to_vec();
        vars[2] = ("CHAT_ID", "@alerts");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CHAT_ID", .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let config = Config::from_lookup(lookup(FULL)).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("123:abc"));
    }
}
