use anyhow::{anyhow, Result};
use deck_core::DeckConfig;
use std::env;

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_PORT: &str = "http.port";
pub const UPLOAD_TOKEN: &str = "auth.upload_token";
pub const STORE_BACKEND: &str = "store.backend";

/// Prefix of the environment overrides for deck limits (`DECKS__DRAW__MAX_N`)
pub const DECK_ENV_PREFIX: &str = "DECKS__";

/// Configure all application settings from the process environment
pub fn config(config: &mut DeckConfig) -> Result<()> {
    config_from(config, |key| env::var(key).ok())?;
    config.load_env_config(DECK_ENV_PREFIX);
    Ok(())
}

pub(crate) fn config_from<F>(config: &mut DeckConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    // HTTP Server Configuration
    configure_http(config, &lookup);

    // Upload guard
    configure_auth(config, &lookup);

    // Blob store backend
    configure_store(config, &lookup)?;

    Ok(())
}

/// Configure HTTP server settings
fn configure_http<F>(config: &mut DeckConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("HTTP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = lookup("HTTP_PORT").unwrap_or_else(|| "3000".to_string());

    config.set(HTTP_HOST, host);
    config.set(HTTP_PORT, port);
}

fn configure_auth<F>(config: &mut DeckConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let token = lookup("UPLOAD_TOKEN")
        .unwrap_or_default()
        .trim()
        .to_string();

    if token.is_empty() {
        tracing::warn!("UPLOAD_TOKEN is not set; cache updates will be refused");
        return;
    }
    config.set(UPLOAD_TOKEN, token);
}

fn configure_store<F>(config: &mut DeckConfig, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = lookup("DECK_STORE")
        .unwrap_or_else(|| "memory".to_string())
        .trim()
        .to_lowercase();

    match backend.as_str() {
        "memory" | "s3" => {
            config.set(STORE_BACKEND, backend);
            Ok(())
        }
        other => Err(anyhow!("Unsupported DECK_STORE: {other} (expected s3 or memory)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured(vars: &[(&str, &str)]) -> Result<DeckConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = DeckConfig::new();
        config_from(&mut config, |key| vars.get(key).cloned())?;
        Ok(config)
    }

    #[test]
    fn defaults_are_local_and_locked() {
        let config = configured(&[]).unwrap();
        assert_eq!(config.get(HTTP_HOST), Some("127.0.0.1"));
        assert_eq!(config.get(HTTP_PORT), Some("3000"));
        assert_eq!(config.get(STORE_BACKEND), Some("memory"));
        assert!(!config.has(UPLOAD_TOKEN));
    }

    #[test]
    fn env_values_are_applied() {
        let config = configured(&[
            ("HTTP_PORT", "8787"),
            ("UPLOAD_TOKEN", " secret "),
            ("DECK_STORE", "S3"),
        ])
        .unwrap();
        assert_eq!(config.get(HTTP_PORT), Some("8787"));
        assert_eq!(config.get(UPLOAD_TOKEN), Some("secret"));
        assert_eq!(config.get(STORE_BACKEND), Some("s3"));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(configured(&[("DECK_STORE", "redis")]).is_err());
    }
}
