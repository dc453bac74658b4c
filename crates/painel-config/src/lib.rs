use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PAINEL_CONFIG: &str = "PAINEL_CONFIG";
pub const ENV_PAINEL_API_BASE: &str = "PAINEL_API_BASE";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PROTECTED_SCOPES: &[&str] = &["rondas"];
const KNOWN_SCOPES: &[&str] = &["main", "rondas"];
const DEFAULT_MRHS_INTERVAL_SECS: u64 = 5;
const DEFAULT_DOCUMENTACAO_INTERVAL_SECS: u64 = 5;
const DEFAULT_AGENDAMENTO_INTERVAL_SECS: u64 = 5;
const DEFAULT_CANDIDATOS_REGISTRADOS_INTERVAL_SECS: u64 = 3;
const DEFAULT_CANDIDATOS_MRH_INTERVAL_SECS: u64 = 10;
const DEFAULT_RONDAS_INTERVAL_SECS: u64 = 300;
const DEFAULT_RONDAS_PAGE_SIZE: u32 = 20;
const DEFAULT_EXAM_ALERT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PainelConfig {
    #[serde(default)]
    pub api: ApiConfigToml,
    #[serde(default)]
    pub session: SessionConfigToml,
    #[serde(default)]
    pub polling: PollingConfigToml,
    #[serde(default)]
    pub logging: LoggingConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfigToml {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_protected_scopes")]
    pub protected_scopes: Vec<String>,
}

impl Default for ApiConfigToml {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            protected_scopes: default_protected_scopes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfigToml {
    #[serde(default = "default_token_store_path")]
    pub token_store_path: String,
}

impl Default for SessionConfigToml {
    fn default() -> Self {
        Self {
            token_store_path: default_token_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfigToml {
    #[serde(default = "default_mrhs_interval_secs")]
    pub mrhs_secs: u64,
    #[serde(default = "default_documentacao_interval_secs")]
    pub documentacao_secs: u64,
    #[serde(default = "default_agendamento_interval_secs")]
    pub agendamento_secs: u64,
    #[serde(default = "default_candidatos_registrados_interval_secs")]
    pub candidatos_registrados_secs: u64,
    #[serde(default = "default_candidatos_mrh_interval_secs")]
    pub candidatos_mrh_secs: u64,
    #[serde(default = "default_rondas_interval_secs")]
    pub rondas_secs: u64,
    #[serde(default = "default_rondas_page_size")]
    pub rondas_page_size: u32,
    #[serde(default = "default_exam_alert_limit")]
    pub exam_alert_limit: usize,
}

impl Default for PollingConfigToml {
    fn default() -> Self {
        Self {
            mrhs_secs: default_mrhs_interval_secs(),
            documentacao_secs: default_documentacao_interval_secs(),
            agendamento_secs: default_agendamento_interval_secs(),
            candidatos_registrados_secs: default_candidatos_registrados_interval_secs(),
            candidatos_mrh_secs: default_candidatos_mrh_interval_secs(),
            rondas_secs: default_rondas_interval_secs(),
            rondas_page_size: default_rondas_page_size(),
            exam_alert_limit: default_exam_alert_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfigToml {
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

impl Default for LoggingConfigToml {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRuntimeConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub protected_scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingRuntimeConfig {
    pub mrhs: Duration,
    pub documentacao: Duration,
    pub agendamento: Duration,
    pub candidatos_registrados: Duration,
    pub candidatos_mrh: Duration,
    pub rondas: Duration,
    pub rondas_page_size: u32,
    pub exam_alert_limit: usize,
}

impl PainelConfig {
    pub fn api_runtime(&self) -> ApiRuntimeConfig {
        ApiRuntimeConfig {
            base_url: self.api.base_url.clone(),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
            protected_scopes: self.api.protected_scopes.clone(),
        }
    }

    pub fn polling_runtime(&self) -> PollingRuntimeConfig {
        PollingRuntimeConfig {
            mrhs: Duration::from_secs(self.polling.mrhs_secs),
            documentacao: Duration::from_secs(self.polling.documentacao_secs),
            agendamento: Duration::from_secs(self.polling.agendamento_secs),
            candidatos_registrados: Duration::from_secs(self.polling.candidatos_registrados_secs),
            candidatos_mrh: Duration::from_secs(self.polling.candidatos_mrh_secs),
            rondas: Duration::from_secs(self.polling.rondas_secs),
            rondas_page_size: self.polling.rondas_page_size,
            exam_alert_limit: self.polling.exam_alert_limit,
        }
    }

    pub fn token_store_path(&self) -> PathBuf {
        PathBuf::from(self.session.token_store_path.as_str())
    }

    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(self.logging.log_path.as_str())
    }
}

pub fn load_from_env() -> Result<PainelConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PainelConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("painel").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_PAINEL_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.trim().into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "PAINEL_CONFIG contained invalid UTF-8",
        )),
    }
}

// Overrides are applied in memory only and never written back to disk.
fn apply_env_overrides(config: &mut PainelConfig) -> Result<(), ConfigError> {
    match std::env::var(ENV_PAINEL_API_BASE) {
        Ok(raw) => {
            let value = raw.trim();
            if !value.is_empty() {
                config.api.base_url = value.trim_end_matches('/').to_owned();
            }
            Ok(())
        }
        Err(std::env::VarError::NotPresent) => Ok(()),
        Err(_) => Err(ConfigError::configuration(
            "PAINEL_API_BASE contained invalid UTF-8",
        )),
    }
}

fn default_painel_data_dir() -> PathBuf {
    resolve_data_local_dir().join("painel")
}

fn resolve_data_local_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("LOCALAPPDATA") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = resolve_home_dir() {
            return home.join("Library").join("Application Support");
        }
    }

    #[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
    {
        if let Ok(path) = std::env::var("XDG_DATA_HOME") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join(".local").join("share");
        }
    }

    std::env::temp_dir()
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn absolutize_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    if let Ok(current) = std::env::current_dir() {
        return current.join(path);
    }

    std::env::temp_dir().join(path)
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_protected_scopes() -> Vec<String> {
    DEFAULT_PROTECTED_SCOPES
        .iter()
        .map(|value| (*value).to_owned())
        .collect()
}

fn default_token_store_path() -> String {
    default_painel_data_dir()
        .join("session.json")
        .to_string_lossy()
        .to_string()
}

fn default_log_path() -> String {
    default_painel_data_dir()
        .join("painel.log")
        .to_string_lossy()
        .to_string()
}

fn default_mrhs_interval_secs() -> u64 {
    DEFAULT_MRHS_INTERVAL_SECS
}

fn default_documentacao_interval_secs() -> u64 {
    DEFAULT_DOCUMENTACAO_INTERVAL_SECS
}

fn default_agendamento_interval_secs() -> u64 {
    DEFAULT_AGENDAMENTO_INTERVAL_SECS
}

fn default_candidatos_registrados_interval_secs() -> u64 {
    DEFAULT_CANDIDATOS_REGISTRADOS_INTERVAL_SECS
}

fn default_candidatos_mrh_interval_secs() -> u64 {
    DEFAULT_CANDIDATOS_MRH_INTERVAL_SECS
}

fn default_rondas_interval_secs() -> u64 {
    DEFAULT_RONDAS_INTERVAL_SECS
}

fn default_rondas_page_size() -> u32 {
    DEFAULT_RONDAS_PAGE_SIZE
}

fn default_exam_alert_limit() -> usize {
    DEFAULT_EXAM_ALERT_LIMIT
}

fn persist_config(path: &Path, config: &PainelConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize PAINEL_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write PAINEL_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<PainelConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for PAINEL_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = PainelConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read PAINEL_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: PainelConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse PAINEL_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    let changed = normalize_config(&mut config)?;
    if changed {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut PainelConfig) -> Result<bool, ConfigError> {
    let mut changed = false;

    changed |= normalize_base_url(&mut config.api.base_url);
    changed |= normalize_clamped_u64(
        &mut config.api.request_timeout_secs,
        default_request_timeout_secs(),
        1,
        120,
    );
    changed |= normalize_protected_scopes(&mut config.api.protected_scopes)?;

    changed |= normalize_non_empty_string(
        &mut config.session.token_store_path,
        default_token_store_path(),
    );
    changed |= normalize_non_empty_string(&mut config.logging.log_path, default_log_path());

    changed |= normalize_polling_config(&mut config.polling);

    Ok(changed)
}

pub fn normalize_polling_config(config: &mut PollingConfigToml) -> bool {
    let mut changed = false;

    changed |= normalize_clamped_u64(&mut config.mrhs_secs, default_mrhs_interval_secs(), 1, 3600);
    changed |= normalize_clamped_u64(
        &mut config.documentacao_secs,
        default_documentacao_interval_secs(),
        1,
        3600,
    );
    changed |= normalize_clamped_u64(
        &mut config.agendamento_secs,
        default_agendamento_interval_secs(),
        1,
        3600,
    );
    changed |= normalize_clamped_u64(
        &mut config.candidatos_registrados_secs,
        default_candidatos_registrados_interval_secs(),
        1,
        3600,
    );
    changed |= normalize_clamped_u64(
        &mut config.candidatos_mrh_secs,
        default_candidatos_mrh_interval_secs(),
        1,
        3600,
    );
    changed |= normalize_clamped_u64(
        &mut config.rondas_secs,
        default_rondas_interval_secs(),
        1,
        3600,
    );

    let normalized_page_size = if config.rondas_page_size == 0 {
        default_rondas_page_size()
    } else {
        config.rondas_page_size.clamp(1, 500)
    };
    if normalized_page_size != config.rondas_page_size {
        config.rondas_page_size = normalized_page_size;
        changed = true;
    }

    if config.exam_alert_limit == 0 {
        config.exam_alert_limit = default_exam_alert_limit();
        changed = true;
    }

    changed
}

fn normalize_clamped_u64(value: &mut u64, default: u64, min: u64, max: u64) -> bool {
    let normalized = if *value == 0 {
        default
    } else {
        (*value).clamp(min, max)
    };
    if normalized != *value {
        *value = normalized;
        return true;
    }
    false
}

fn normalize_base_url(value: &mut String) -> bool {
    let trimmed = value.trim().trim_end_matches('/');
    let normalized = if trimmed.is_empty() {
        default_api_base_url()
    } else {
        trimmed.to_owned()
    };
    if *value != normalized {
        *value = normalized;
        return true;
    }
    false
}

fn normalize_protected_scopes(values: &mut Vec<String>) -> Result<bool, ConfigError> {
    let mut normalized = Vec::new();
    for raw in values.iter() {
        let candidate = raw.trim().to_ascii_lowercase();
        if candidate.is_empty() {
            continue;
        }
        if !KNOWN_SCOPES.contains(&candidate.as_str()) {
            return Err(ConfigError::configuration(format!(
                "Invalid `api.protected_scopes` entry '{candidate}' in PAINEL_CONFIG: expected one of {}.",
                KNOWN_SCOPES.join(", ")
            )));
        }
        if !normalized.contains(&candidate) {
            normalized.push(candidate);
        }
    }

    if *values != normalized {
        *values = normalized;
        return Ok(true);
    }
    Ok(false)
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}
