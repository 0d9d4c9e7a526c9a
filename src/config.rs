//! Configuração do SDK carregada a partir de `aihero.toml`.
//!
//! A struct [`SdkConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `AI_HERO_SERVER_URL` e `AI_HERO_API_KEY` têm
//! precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AiHeroError, Result};
use crate::poll::{PollConfig, RetryConfig};

/// URL do servidor de produção.
pub const PRODUCTION_URL: &str = "https://app.aihero.studio/";

/// Variável de ambiente que sobrescreve a URL do servidor.
pub const SERVER_URL_ENV: &str = "AI_HERO_SERVER_URL";

/// Variável de ambiente que sobrescreve a chave da API.
pub const API_KEY_ENV: &str = "AI_HERO_API_KEY";

/// Configuração de nível superior carregada de `aihero.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SdkConfig {
    /// Token bearer da API.
    #[serde(default)]
    pub api_key: String,

    /// URL base do servidor, sem o sufixo `/api/v1`.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Intervalo entre consultas de um job, em milissegundos.
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,

    /// Prazo total para um job terminar, em segundos.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Intervalo entre consultas de um workflow, em milissegundos.
    #[serde(default = "default_workflow_poll_interval_ms")]
    pub workflow_poll_interval_ms: u64,

    /// Prazo total para um workflow terminar, em segundos.
    #[serde(default = "default_workflow_timeout_secs")]
    pub workflow_timeout_secs: u64,

    /// Retentativas de falhas de rede durante o polling (0 = falha imediata).
    #[serde(default)]
    pub poll_max_retries: u32,

    /// Atraso base em milissegundos para o backoff dessas retentativas.
    #[serde(default = "default_poll_retry_base_delay_ms")]
    pub poll_retry_base_delay_ms: u64,

    /// Capacidade da fila de envio do PromptStash.
    #[serde(default = "default_stash_queue_capacity")]
    pub stash_queue_capacity: usize,
}

fn default_server_url() -> String {
    PRODUCTION_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_job_poll_interval_ms() -> u64 {
    100
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_workflow_poll_interval_ms() -> u64 {
    1000
}

fn default_workflow_timeout_secs() -> u64 {
    60
}

fn default_poll_retry_base_delay_ms() -> u64 {
    500
}

fn default_stash_queue_capacity() -> usize {
    64
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout_secs(),
            job_poll_interval_ms: default_job_poll_interval_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            workflow_poll_interval_ms: default_workflow_poll_interval_ms(),
            workflow_timeout_secs: default_workflow_timeout_secs(),
            poll_max_retries: 0,
            poll_retry_base_delay_ms: default_poll_retry_base_delay_ms(),
            stash_queue_capacity: default_stash_queue_capacity(),
        }
    }
}

impl SdkConfig {
    /// Carrega a configuração de `aihero.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("aihero.toml"))
    }

    /// Carrega a configuração de um caminho explícito, aplicando o ambiente do processo.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.check()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str::<SdkConfig>(&contents)
            .map_err(|e| AiHeroError::Config(format!("{}: {e}", path.display())))
    }

    /// Aplica as variáveis de ambiente. Valores vazios são ignorados.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SERVER_URL_ENV)
            && !url.is_empty()
        {
            self.server_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV)
            && !key.is_empty()
        {
            self.api_key = key;
        }
    }

    /// Valida os campos. Não emite logs: o aviso de servidor fora de produção
    /// fica a cargo de `Client::connect`.
    pub fn check(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(AiHeroError::Config("server_url must not be empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(AiHeroError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.job_poll_interval_ms == 0 || self.workflow_poll_interval_ms == 0 {
            return Err(AiHeroError::Config(
                "poll intervals must be positive".into(),
            ));
        }
        if self.stash_queue_capacity == 0 {
            return Err(AiHeroError::Config(
                "stash_queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server_url.trim_end_matches('/') == PRODUCTION_URL.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.poll_max_retries,
            base_delay_ms: self.poll_retry_base_delay_ms,
        }
    }

    /// Cadência de polling de jobs (100 ms por padrão).
    pub fn job_poll(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.job_poll_interval_ms),
            deadline: Some(Duration::from_secs(self.job_timeout_secs)),
            retry: self.retry(),
        }
    }

    /// Cadência de polling de workflows (1 s por padrão).
    pub fn workflow_poll(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.workflow_poll_interval_ms),
            deadline: Some(Duration::from_secs(self.workflow_timeout_secs)),
            retry: self.retry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = SdkConfig::default();
        assert_eq!(config.server_url, PRODUCTION_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.job_poll_interval_ms, 100);
        assert_eq!(config.workflow_poll_interval_ms, 1000);
        assert_eq!(config.workflow_timeout_secs, 60);
        assert_eq!(config.poll_max_retries, 0);
        assert!(config.api_key.is_empty());
        assert!(config.is_production());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "ah-test-123"
            workflow_timeout_secs = 120
        "#;
        let config: SdkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "ah-test-123");
        assert_eq!(config.workflow_timeout_secs, 120);
        assert_eq!(config.job_poll_interval_ms, 100);
        assert_eq!(config.server_url, PRODUCTION_URL);
    }

    #[test]
    fn load_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aihero.toml");

        let missing = SdkConfig::from_file(&path).unwrap();
        assert_eq!(missing.request_timeout_secs, 30);

        std::fs::write(&path, "request_timeout_secs = 5\npoll_max_retries = 2\n").unwrap();
        let loaded = SdkConfig::from_file(&path).unwrap();
        assert_eq!(loaded.request_timeout_secs, 5);
        assert_eq!(loaded.job_poll().retry.max_retries, 2);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aihero.toml");
        std::fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();
        let err = SdkConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, AiHeroError::Config(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (SERVER_URL_ENV, "https://staging.aihero.studio/"),
            (API_KEY_ENV, "from-env"),
        ]);
        let mut config = SdkConfig {
            api_key: "from-file".into(),
            ..Default::default()
        };
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.server_url, "https://staging.aihero.studio/");
        assert!(!config.is_production());
        assert!(config.check().is_ok());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = SdkConfig {
            api_key: "from-file".into(),
            ..Default::default()
        };
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.api_key, "from-file");
        assert_eq!(config.server_url, PRODUCTION_URL);
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = SdkConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(AiHeroError::Config(_))));
    }

    #[test]
    fn poll_configs_use_separate_cadences() {
        let config = SdkConfig::default();
        assert_eq!(config.job_poll().interval, Duration::from_millis(100));
        assert_eq!(config.workflow_poll().interval, Duration::from_secs(1));
        assert_eq!(config.workflow_poll().deadline, Some(Duration::from_secs(60)));
    }
}
