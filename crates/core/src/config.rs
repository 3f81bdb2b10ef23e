use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub voice: VoiceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LlmConfig {
    /// The decision engine is LLM-only; endpoints that need it return a
    /// channel-level error when this is false.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi => self
                .api_key
                .as_ref()
                .map(|key| !key.expose_secret().trim().is_empty())
                .unwrap_or(false),
            LlmProvider::Ollama => {
                self.base_url.as_ref().map(|url| !url.trim().is_empty()).unwrap_or(false)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Voice-channel settings: the telephony gateway, caller language, and
/// speech capture bounds. The gateway is optional; outbound endpoints
/// answer with a dry-run payload when it is not configured.
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub caller_language: String,
    pub working_language: String,
    pub translation_enabled: bool,
    pub tts_voice: Option<String>,
    pub record_max_length_secs: u32,
    pub record_silence_timeout_secs: u32,
    pub callback_base_url: String,
    pub gateway_base_url: Option<String>,
    pub gateway_account: Option<String>,
    pub gateway_token: Option<SecretString>,
    pub caller_id: Option<String>,
}

impl VoiceConfig {
    pub fn gateway_configured(&self) -> bool {
        self.gateway_account.as_ref().map(|a| !a.trim().is_empty()).unwrap_or(false)
            && self
                .gateway_token
                .as_ref()
                .map(|t| !t.expose_secret().trim().is_empty())
                .unwrap_or(false)
            && self.caller_id.as_ref().map(|c| !c.trim().is_empty()).unwrap_or(false)
    }

    /// Translation is only meaningful when the caller language differs
    /// from the working language.
    pub fn needs_translation(&self) -> bool {
        self.translation_enabled
            && language_tag(&self.caller_language) != language_tag(&self.working_language)
    }
}

fn language_tag(language: &str) -> String {
    language.trim().to_ascii_lowercase().split('-').next().unwrap_or_default().to_string()
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub call_transcript: bool,
    pub call_transcript_max_chars: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub caller_language: Option<String>,
    pub translation_enabled: Option<bool>,
    pub callback_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cadence.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 1,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            voice: VoiceConfig {
                caller_language: "en-US".to_string(),
                working_language: "en".to_string(),
                translation_enabled: true,
                tts_voice: None,
                record_max_length_secs: 15,
                record_silence_timeout_secs: 2,
                callback_base_url: "http://localhost:8000".to_string(),
                gateway_base_url: None,
                gateway_account: None,
                gateway_token: None,
                caller_id: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
                call_transcript: false,
                call_transcript_max_chars: 500,
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cadence.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(voice) = patch.voice {
            if let Some(caller_language) = voice.caller_language {
                self.voice.caller_language = caller_language;
            }
            if let Some(working_language) = voice.working_language {
                self.voice.working_language = working_language;
            }
            if let Some(translation_enabled) = voice.translation_enabled {
                self.voice.translation_enabled = translation_enabled;
            }
            if let Some(tts_voice) = voice.tts_voice {
                self.voice.tts_voice = Some(tts_voice);
            }
            if let Some(record_max_length_secs) = voice.record_max_length_secs {
                self.voice.record_max_length_secs = record_max_length_secs;
            }
            if let Some(record_silence_timeout_secs) = voice.record_silence_timeout_secs {
                self.voice.record_silence_timeout_secs = record_silence_timeout_secs;
            }
            if let Some(callback_base_url) = voice.callback_base_url {
                self.voice.callback_base_url = callback_base_url;
            }
            if let Some(gateway_base_url) = voice.gateway_base_url {
                self.voice.gateway_base_url = Some(gateway_base_url);
            }
            if let Some(gateway_account) = voice.gateway_account {
                self.voice.gateway_account = Some(gateway_account);
            }
            if let Some(gateway_token_value) = voice.gateway_token {
                self.voice.gateway_token = Some(secret_value(gateway_token_value));
            }
            if let Some(caller_id) = voice.caller_id {
                self.voice.caller_id = Some(caller_id);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
            if let Some(call_transcript) = logging.call_transcript {
                self.logging.call_transcript = call_transcript;
            }
            if let Some(max_chars) = logging.call_transcript_max_chars {
                self.logging.call_transcript_max_chars = max_chars;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CADENCE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CADENCE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CADENCE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CADENCE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CADENCE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CADENCE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CADENCE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CADENCE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CADENCE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CADENCE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("CADENCE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("CADENCE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CADENCE_SERVER_PORT") {
            self.server.port = parse_u16("CADENCE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CADENCE_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("CADENCE_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("CADENCE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CADENCE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CADENCE_VOICE_CALLER_LANGUAGE") {
            self.voice.caller_language = value;
        }
        if let Some(value) = read_env("CADENCE_VOICE_WORKING_LANGUAGE") {
            self.voice.working_language = value;
        }
        if let Some(value) = read_env("CADENCE_VOICE_TRANSLATION_ENABLED") {
            self.voice.translation_enabled =
                parse_bool("CADENCE_VOICE_TRANSLATION_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CADENCE_VOICE_TTS_VOICE") {
            self.voice.tts_voice = Some(value);
        }
        if let Some(value) = read_env("CADENCE_VOICE_RECORD_MAX_LENGTH_SECS") {
            self.voice.record_max_length_secs =
                parse_u32("CADENCE_VOICE_RECORD_MAX_LENGTH_SECS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_VOICE_RECORD_SILENCE_TIMEOUT_SECS") {
            self.voice.record_silence_timeout_secs =
                parse_u32("CADENCE_VOICE_RECORD_SILENCE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CADENCE_VOICE_CALLBACK_BASE_URL") {
            self.voice.callback_base_url = value;
        }
        if let Some(value) = read_env("CADENCE_VOICE_GATEWAY_BASE_URL") {
            self.voice.gateway_base_url = Some(value);
        }
        if let Some(value) = read_env("CADENCE_VOICE_GATEWAY_ACCOUNT") {
            self.voice.gateway_account = Some(value);
        }
        if let Some(value) = read_env("CADENCE_VOICE_GATEWAY_TOKEN") {
            self.voice.gateway_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("CADENCE_VOICE_CALLER_ID") {
            self.voice.caller_id = Some(value);
        }

        let log_level = read_env("CADENCE_LOGGING_LEVEL").or_else(|| read_env("CADENCE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CADENCE_LOGGING_FORMAT").or_else(|| read_env("CADENCE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }
        if let Some(value) = read_env("CADENCE_LOG_CALL_TRANSCRIPT") {
            self.logging.call_transcript = parse_bool("CADENCE_LOG_CALL_TRANSCRIPT", &value)?;
        }
        if let Some(value) = read_env("CADENCE_LOG_CALL_TRANSCRIPT_MAX_CHARS") {
            self.logging.call_transcript_max_chars =
                parse_u32("CADENCE_LOG_CALL_TRANSCRIPT_MAX_CHARS", &value)? as usize;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(caller_language) = overrides.caller_language {
            self.voice.caller_language = caller_language;
        }
        if let Some(translation_enabled) = overrides.translation_enabled {
            self.voice.translation_enabled = translation_enabled;
        }
        if let Some(callback_base_url) = overrides.callback_base_url {
            self.voice.callback_base_url = callback_base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_voice(&self.voice)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cadence.toml"), PathBuf::from("config/cadence.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url = url.starts_with("sqlite:") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite:...` or `:memory:`)".to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    // An unconfigured LLM is allowed; llm-dependent endpoints degrade at
    // the channel level. Partial configuration is not.
    match llm.provider {
        LlmProvider::OpenAi => {
            if let Some(api_key) = &llm.api_key {
                if api_key.expose_secret().trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "llm.api_key is set but empty for the openai provider".to_string(),
                    ));
                }
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == server.port {
        return Err(ConfigError::Validation(
            "server.health_check_port must differ from server.port".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_voice(voice: &VoiceConfig) -> Result<(), ConfigError> {
    if voice.caller_language.trim().is_empty() {
        return Err(ConfigError::Validation("voice.caller_language must be set".to_string()));
    }
    if voice.working_language.trim().is_empty() {
        return Err(ConfigError::Validation("voice.working_language must be set".to_string()));
    }

    if voice.record_max_length_secs == 0 || voice.record_max_length_secs > 120 {
        return Err(ConfigError::Validation(
            "voice.record_max_length_secs must be in range 1..=120".to_string(),
        ));
    }
    if voice.record_silence_timeout_secs == 0 || voice.record_silence_timeout_secs > 10 {
        return Err(ConfigError::Validation(
            "voice.record_silence_timeout_secs must be in range 1..=10".to_string(),
        ));
    }

    if !voice.callback_base_url.starts_with("http://")
        && !voice.callback_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "voice.callback_base_url must start with http:// or https://".to_string(),
        ));
    }

    let account_set = voice.gateway_account.as_ref().map(|v| !v.trim().is_empty()).unwrap_or(false);
    let token_set = voice
        .gateway_token
        .as_ref()
        .map(|v| !v.expose_secret().trim().is_empty())
        .unwrap_or(false);
    let caller_id_set = voice.caller_id.as_ref().map(|v| !v.trim().is_empty()).unwrap_or(false);
    let any_set = account_set || token_set || caller_id_set;
    let all_set = account_set && token_set && caller_id_set;
    if any_set && !all_set {
        return Err(ConfigError::Validation(
            "voice gateway configuration is partial: set voice.gateway_account, voice.gateway_token, and voice.caller_id together".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    voice: Option<VoicePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoicePatch {
    caller_language: Option<String>,
    working_language: Option<String>,
    translation_enabled: Option<bool>,
    tts_voice: Option<String>,
    record_max_length_secs: Option<u32>,
    record_silence_timeout_secs: Option<u32>,
    callback_base_url: Option<String>,
    gateway_base_url: Option<String>,
    gateway_account: Option<String>,
    gateway_token: Option<String>,
    caller_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
    call_transcript: Option<bool>,
    call_transcript_max_chars: Option<usize>,
}
