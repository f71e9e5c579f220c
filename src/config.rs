use std::time::Duration;

use crate::quiz::generator::DEFAULT_MAX_ATTEMPTS;

pub const API_TOKEN_VAR: &str = "HUGGINGFACEHUB_API_TOKEN";
pub const BOT_TOKEN_VAR: &str = "TELOXIDE_TOKEN";

const DEFAULT_MODEL_ID: &str = "mistralai/Mixtral-8x7B-Instruct-v0.1";
const DEFAULT_API_URL: &str = "https://router.huggingface.co/v1/chat/completions";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} is not set. Check your .env file.")]
    MissingCredential(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to initialize the completion client: {0}")]
    Client(#[from] chatgpt::err::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_token: String,
    pub bot_token: String,
    pub model_id: String,
    pub api_url: url::Url,
    pub max_attempts: usize,
    pub timeout: Duration,
    pub shuffle_options: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };

        let api_token = required(API_TOKEN_VAR)?;
        let bot_token = required(BOT_TOKEN_VAR)?;
        let model_id = lookup("QUIZ_MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        let api_url = parse_or(&lookup, "QUIZ_API_URL", || {
            url::Url::parse(DEFAULT_API_URL).ok()
        })?;
        let max_attempts: usize =
            parse_or(&lookup, "QUIZ_MAX_ATTEMPTS", || Some(DEFAULT_MAX_ATTEMPTS))?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "QUIZ_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        let timeout_secs: u64 =
            parse_or(&lookup, "QUIZ_TIMEOUT_SECS", || Some(DEFAULT_TIMEOUT_SECS))?;
        let shuffle_options: bool = parse_or(&lookup, "QUIZ_SHUFFLE_OPTIONS", || Some(false))?;

        Ok(Self {
            api_token,
            bot_token,
            model_id,
            api_url,
            max_attempts,
            timeout: Duration::from_secs(timeout_secs),
            shuffle_options,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: impl FnOnce() -> Option<T>,
) -> Result<T, ConfigError> {
    let invalid = |value: String| ConfigError::InvalidValue { key, value };
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(raw)),
        None => default().ok_or_else(|| invalid(String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_tokens_are_set() {
        let config =
            Config::from_lookup(lookup(&[(API_TOKEN_VAR, "hf_x"), (BOT_TOKEN_VAR, "1:abc")]))
                .unwrap();

        assert_eq!(config.api_token, "hf_x");
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(!config.shuffle_options);
    }

    #[test]
    fn missing_api_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[(BOT_TOKEN_VAR, "1:abc"), (API_TOKEN_VAR, "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(API_TOKEN_VAR)));
        assert!(err.to_string().contains(".env"));
    }

    #[test]
    fn rejects_bad_overrides() {
        let base = [(API_TOKEN_VAR, "hf_x"), (BOT_TOKEN_VAR, "1:abc")];
        for (key, value) in [
            ("QUIZ_MAX_ATTEMPTS", "0"),
            ("QUIZ_MAX_ATTEMPTS", "many"),
            ("QUIZ_TIMEOUT_SECS", "-1"),
            ("QUIZ_API_URL", "not a url"),
            ("QUIZ_SHUFFLE_OPTIONS", "yes please"),
        ] {
            let mut vars = base.to_vec();
            vars.push((key, value));
            assert!(
                matches!(
                    Config::from_lookup(lookup(&vars)),
                    Err(ConfigError::InvalidValue { .. })
                ),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn overrides_are_honoured() {
        let config = Config::from_lookup(lookup(&[
            (API_TOKEN_VAR, "hf_x"),
            (BOT_TOKEN_VAR, "1:abc"),
            ("QUIZ_MODEL_ID", "meta-llama/Llama-3.1-8B-Instruct"),
            ("QUIZ_MAX_ATTEMPTS", "5"),
            ("QUIZ_SHUFFLE_OPTIONS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.model_id, "meta-llama/Llama-3.1-8B-Instruct");
        assert_eq!(config.max_attempts, 5);
        assert!(config.shuffle_options);
    }
}
