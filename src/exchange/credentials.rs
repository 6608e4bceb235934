//! API credential loading.
//!
//! Environment variables win; otherwise a remote key store is fetched with a
//! single GET and the payload parsed once. Paper mode never needs real keys
//! and falls back to placeholders so the signed-request plumbing stays
//! exercised.

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::BotError;

const KEY_ENV: &str = "PULSE_API_KEY";
const SECRET_ENV: &str = "PULSE_API_SECRET";
const URL_ENV: &str = "CREDENTIALS_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCredentials {
    #[serde(alias = "apiKey")]
    pub api_key: String,
    #[serde(alias = "secretKey", alias = "apiSecret")]
    pub api_secret: String,
}

impl ApiCredentials {
    fn placeholder() -> Self {
        Self {
            api_key: "paper".to_string(),
            api_secret: "paper".to_string(),
        }
    }
}

/// Resolve credentials, in order: environment pair, remote key store,
/// placeholders (paper mode only). Live mode without credentials is fatal.
pub async fn load_credentials(paper: bool) -> Result<ApiCredentials, BotError> {
    let key = non_empty_env(KEY_ENV);
    let secret = non_empty_env(SECRET_ENV);
    if let (Some(api_key), Some(api_secret)) = (key, secret) {
        info!("using API credentials from environment");
        return Ok(ApiCredentials {
            api_key,
            api_secret,
        });
    }

    if let Some(url) = non_empty_env(URL_ENV) {
        match fetch_remote(&url).await {
            Ok(creds) => {
                info!("using API credentials from remote key store");
                return Ok(creds);
            }
            Err(e) => {
                warn!(error = %e, "remote credential fetch failed");
                if !paper {
                    return Err(BotError::CredentialMissing(format!(
                        "remote key store unreachable: {e}"
                    )));
                }
            }
        }
    }

    if paper {
        info!("paper mode, using placeholder credentials");
        return Ok(ApiCredentials::placeholder());
    }

    Err(BotError::CredentialMissing(format!(
        "set {KEY_ENV}/{SECRET_ENV} or {URL_ENV}"
    )))
}

async fn fetch_remote(url: &str) -> Result<ApiCredentials, BotError> {
    let resp = reqwest::get(url).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(BotError::CredentialMissing(format!(
            "key store returned {status}"
        )));
    }
    let creds: ApiCredentials = resp.json().await?;
    if creds.api_key.is_empty() || creds.api_secret.is_empty() {
        return Err(BotError::CredentialMissing(
            "key store payload missing fields".to_string(),
        ));
    }
    Ok(creds)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [KEY_ENV, SECRET_ENV, URL_ENV] {
            std::env::remove_var(name);
        }
    }

    #[tokio::test]
    #[serial]
    async fn environment_pair_wins() {
        clear_env();
        std::env::set_var(KEY_ENV, "k123");
        std::env::set_var(SECRET_ENV, "s456");
        let creds = load_credentials(false).await.unwrap();
        assert_eq!(creds.api_key, "k123");
        assert_eq!(creds.api_secret, "s456");
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn live_without_credentials_is_fatal() {
        clear_env();
        let err = load_credentials(false).await.unwrap_err();
        assert!(matches!(err, BotError::CredentialMissing(_)));
    }

    #[tokio::test]
    #[serial]
    async fn paper_falls_back_to_placeholders() {
        clear_env();
        let creds = load_credentials(true).await.unwrap();
        assert_eq!(creds.api_key, "paper");
    }

    #[tokio::test]
    #[serial]
    async fn half_configured_environment_is_ignored() {
        clear_env();
        std::env::set_var(KEY_ENV, "k123");
        let creds = load_credentials(true).await.unwrap();
        assert_eq!(creds.api_key, "paper");
        clear_env();
    }

    #[test]
    fn payload_accepts_camel_case_aliases() {
        let creds: ApiCredentials =
            serde_json::from_str(r#"{"apiKey":"a","secretKey":"b"}"#).unwrap();
        assert_eq!(creds.api_key, "a");
        assert_eq!(creds.api_secret, "b");
    }
}
