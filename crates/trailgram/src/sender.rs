//! Outbound Telegram client.
//!
//! The request path only sees [`MessageSender`]. Whether Bot API traffic
//! goes out directly or through a SOCKS5 proxy is decided once, when the
//! client is built.

use std::fmt;

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{SendError, SendResult};

/// Delivers rendered messages.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `text` as a new message to `chat_id`.
    async fn send_text(&self, chat_id: i64, text: &str) -> SendResult<()>;
}

/// How Bot API connections are made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Straight to the Bot API.
    Direct,
    /// Through a SOCKS5 proxy; holds the proxy URL.
    Socks5(String),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Socks5(url) => write!(f, "via {url}"),
        }
    }
}

/// [`MessageSender`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramSender {
    bot: Bot,
    route: Route,
}

impl fmt::Debug for TelegramSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSender")
            .field("bot_token", &"[REDACTED]")
            .field("route", &self.route)
            .finish()
    }
}

impl TelegramSender {
    /// Client that connects to the Bot API directly.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Client`] if the HTTP client cannot be built.
    pub fn direct(token: &str) -> SendResult<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .build()
            .map_err(|e| SendError::Client(e.to_string()))?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            route: Route::Direct,
        })
    }

    /// Client whose every connection goes through the SOCKS5 proxy at
    /// `address` (`host:port`, or a `socks5://` / `socks5h://` URL).
    ///
    /// No connection is made here; an unreachable proxy surfaces on the
    /// first send.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Proxy`] if `address` is not a usable proxy, or
    /// [`SendError::Client`] if the HTTP client cannot be built.
    pub fn via_socks5(token: &str, address: &str) -> SendResult<Self> {
        let url = proxy_url(address)?;
        let proxy = reqwest::Proxy::all(&url).map_err(|e| SendError::Proxy {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let client = teloxide::net::default_reqwest_settings()
            .proxy(proxy)
            .build()
            .map_err(|e| SendError::Client(e.to_string()))?;

        Ok(Self {
            bot: Bot::with_client(token, client),
            route: Route::Socks5(url),
        })
    }

    /// How this client reaches the Bot API.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Check the token with `getMe` and return the bot's username.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Telegram`] if the token is rejected or the Bot
    /// API is unreachable.
    pub async fn verify(&self) -> SendResult<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| SendError::Telegram(e.to_string()))?;
        Ok(me.user.username.unwrap_or_default())
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> SendResult<()> {
        debug!(chat_id, len = text.len(), route = %self.route, "sending message");
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| SendError::Telegram(e.to_string()))
    }
}

/// Build the Telegram client `config` asks for.
///
/// # Errors
///
/// Returns an error if the proxy address is unusable or the HTTP client
/// cannot be built.
pub fn build_sender(config: &Config) -> SendResult<TelegramSender> {
    let sender = match config.socks5_proxy.as_deref() {
        Some(address) => TelegramSender::via_socks5(&config.bot_token, address)?,
        None => TelegramSender::direct(&config.bot_token)?,
    };
    info!(route = %sender.route(), "Telegram client ready");
    Ok(sender)
}

/// Turn a configured proxy address into a SOCKS5 URL.
///
/// A bare `host:port` resolves hostnames through the proxy (`socks5h`).
fn proxy_url(address: &str) -> SendResult<String> {
    let address = address.trim();
    let invalid = |reason: &str| SendError::Proxy {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    match address.split_once("://") {
        Some(("socks5" | "socks5h", rest)) if !rest.is_empty() => Ok(address.to_string()),
        Some(("socks5" | "socks5h", _)) => Err(invalid("missing host")),
        Some((scheme, _)) => Err(invalid(&format!("unsupported scheme '{scheme}'"))),
        None if address.is_empty() => Err(invalid("missing host")),
        None => Ok(format!("socks5h://{address}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(proxy: Option<&str>) -> Config {
        Config {
            bot_token: "123456:TEST".to_string(),
            template: "{{.SavedSearch.Name}}".to_string(),
            chat_id: 42,
            socks5_proxy: proxy.map(ToString::to_string),
        }
    }

    #[test]
    fn bare_address_gets_remote_dns_scheme() {
        assert_eq!(proxy_url("127.0.0.1:1080").unwrap(), "socks5h://127.0.0.1:1080");
        assert_eq!(proxy_url(" proxy.local:9050 ").unwrap(), "socks5h://proxy.local:9050");
    }

    #[test]
    fn explicit_socks_scheme_is_kept() {
        assert_eq!(proxy_url("socks5://10.0.0.1:1080").unwrap(), "socks5://10.0.0.1:1080");
        assert_eq!(proxy_url("socks5h://10.0.0.1:1080").unwrap(), "socks5h://10.0.0.1:1080");
    }

    #[test]
    fn other_schemes_are_rejected() {
        let err = proxy_url("http://10.0.0.1:3128").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid SOCKS5 proxy 'http://10.0.0.1:3128': unsupported scheme 'http'"
        );
        assert!(matches!(proxy_url("socks5://"), Err(SendError::Proxy { .. })));
        assert!(matches!(proxy_url(""), Err(SendError::Proxy { .. })));
    }

    #[test]
    fn no_proxy_builds_direct_client() {
        let sender = build_sender(&config(None)).unwrap();
        assert_eq!(sender.route(), &Route::Direct);
    }

    #[test]
    fn proxy_builds_socks5_client() {
        let sender = build_sender(&config(Some("127.0.0.1:1080"))).unwrap();
        assert_eq!(
            sender.route(),
            &Route::Socks5("socks5h://127.0.0.1:1080".to_string())
        );
    }

    #[test]
    fn bad_proxy_is_a_build_error() {
        let err = build_sender(&config(Some("ftp://x"))).unwrap_err();
        assert!(matches!(err, SendError::Proxy { .. }));
    }

    #[test]
    fn debug_hides_token() {
        let sender = TelegramSender::direct("123456:SECRET").unwrap();
        let debug = format!("{sender:?}");
        assert!(!debug.contains("SECRET"));
        assert!(debug.contains("Direct"));
    }

    #[test]
    fn route_display() {
        assert_eq!(Route::Direct.to_string(), "direct");
        assert_eq!(
            Route::Socks5("socks5h://p:1".to_string()).to_string(),
            "via socks5h://p:1"
        );
    }
}
