//! Service configuration read from the environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::jobboard::JobBoardConfig;
use crate::llm::{EmbeddingConfig, LlmConfig, PersonalizerConfig};
use crate::scoring::SemanticCalibration;
use crate::workflow::RetryConfig;

/// Everything the binary needs to wire the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub job_board: JobBoardConfig,
    pub llm: LlmConfig,
    pub personalizer: PersonalizerConfig,
    /// `None` disables the semantic scoring channel.
    pub embeddings: Option<EmbeddingConfig>,
    pub retry: RetryConfig,
    pub calibration: SemanticCalibration,
    pub stream_keepalive: Duration,
    /// Log lines included in a status report.
    pub status_log_lines: usize,
    /// Directory for the daily rolling log file.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_key = env
            .string("ANTHROPIC_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;
        let model = env
            .string("AUTOAPPLY_MODEL")
            .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());
        let generation_timeout = Duration::from_secs(env.parse("AUTOAPPLY_GENERATION_TIMEOUT_SECS", 60)?);

        let llm = LlmConfig {
            request_timeout: generation_timeout,
            ..LlmConfig::new(SecretString::from(api_key), model)
        };
        let personalizer = PersonalizerConfig {
            timeout: generation_timeout,
            ..Default::default()
        };

        let embeddings = env.string("OPENAI_API_KEY").map(|key| {
            let model = env
                .string("AUTOAPPLY_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string());
            EmbeddingConfig::new(SecretString::from(key), model)
        });

        let job_board = JobBoardConfig {
            base_url: env
                .string("AUTOAPPLY_JOB_BOARD_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            request_timeout: Duration::from_secs(env.parse("AUTOAPPLY_JOB_BOARD_TIMEOUT_SECS", 30)?),
            ..Default::default()
        };

        let retry = RetryConfig {
            max_attempts: env.parse("AUTOAPPLY_SUBMIT_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(env.parse("AUTOAPPLY_SUBMIT_BASE_DELAY_MS", 2000)?),
            max_wait: Duration::from_secs(env.parse("AUTOAPPLY_SUBMIT_MAX_WAIT_SECS", 10)?),
        };
        if retry.max_attempts == 0 {
            return Err(invalid("AUTOAPPLY_SUBMIT_ATTEMPTS", "must be at least 1"));
        }

        let defaults = SemanticCalibration::default();
        let calibration = SemanticCalibration {
            low: env.parse("AUTOAPPLY_SEMANTIC_LOW", defaults.low)?,
            high: env.parse("AUTOAPPLY_SEMANTIC_HIGH", defaults.high)?,
            floor: env.parse("AUTOAPPLY_SEMANTIC_FLOOR", defaults.floor)?,
            ceiling: env.parse("AUTOAPPLY_SEMANTIC_CEILING", defaults.ceiling)?,
            weight: env.parse("AUTOAPPLY_SEMANTIC_WEIGHT", defaults.weight)?,
        };
        if calibration.low >= calibration.high {
            return Err(invalid(
                "AUTOAPPLY_SEMANTIC_LOW",
                "must be below AUTOAPPLY_SEMANTIC_HIGH",
            ));
        }
        if !(0.0..=1.0).contains(&calibration.weight) {
            return Err(invalid("AUTOAPPLY_SEMANTIC_WEIGHT", "must be within [0, 1]"));
        }

        Ok(Self {
            port: env.parse("AUTOAPPLY_PORT", 8000)?,
            db_path: env
                .string("AUTOAPPLY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/autoapply.db")),
            job_board,
            llm,
            personalizer,
            embeddings,
            retry,
            calibration,
            stream_keepalive: Duration::from_secs(env.parse("AUTOAPPLY_STREAM_KEEPALIVE_SECS", 30)?),
            status_log_lines: env.parse("AUTOAPPLY_STATUS_LOG_LINES", 20)?,
            log_dir: env.string("AUTOAPPLY_LOG_DIR").map(PathBuf::from),
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Non-empty value for `key`.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.string(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, e.to_string())),
            None => Ok(default),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("./data/autoapply.db"));
        assert_eq!(config.job_board.base_url, "http://localhost:8080");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(2000));
        assert_eq!(config.retry.max_wait, Duration::from_secs(10));
        assert_eq!(config.calibration, SemanticCalibration::default());
        assert_eq!(config.status_log_lines, 20);
        assert!(config.embeddings.is_none());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn api_key_is_required() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::MissingEnvVar(key)) if key == "ANTHROPIC_API_KEY"
        ));
    }

    #[test]
    fn invalid_number_names_the_key() {
        let err = config(&[("ANTHROPIC_API_KEY", "k"), ("AUTOAPPLY_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "AUTOAPPLY_PORT"));
    }

    #[test]
    fn calibration_is_configurable_and_checked() {
        let config = config(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("AUTOAPPLY_SEMANTIC_LOW", "0.2"),
            ("AUTOAPPLY_SEMANTIC_WEIGHT", "0.5"),
            ("OPENAI_API_KEY", "sk-embed"),
        ])
        .unwrap();
        assert_eq!(config.calibration.low, 0.2);
        assert_eq!(config.calibration.weight, 0.5);
        assert_eq!(
            config.embeddings.map(|e| e.model),
            Some("text-embedding-3-small".to_string())
        );

        let err = config_err(&[("AUTOAPPLY_SEMANTIC_LOW", "0.95")]);
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "AUTOAPPLY_SEMANTIC_LOW"));
    }

    fn config_err(extra: &[(&str, &str)]) -> ConfigError {
        let mut vars = vec![("ANTHROPIC_API_KEY", "k")];
        vars.extend_from_slice(extra);
        config(&vars).unwrap_err()
    }
}
