use cadence_core::config::{AppConfig, LoadOptions};
use serde_json::json;

const REDACTED: &str = "<redacted>";

/// Prints the effective configuration with secrets redacted. Values shown
/// are post-merge (defaults, file, environment, overrides).
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return json!({
                "command": "config",
                "status": "error",
                "message": format!("configuration issue: {error}"),
            })
            .to_string();
        }
    };

    let payload = json!({
        "command": "config",
        "status": "ok",
        "config": {
            "database": {
                "url": config.database.url,
                "max_connections": config.database.max_connections,
                "timeout_secs": config.database.timeout_secs,
            },
            "llm": {
                "provider": format!("{:?}", config.llm.provider).to_lowercase(),
                "api_key": config.llm.api_key.as_ref().map(|_| REDACTED),
                "base_url": config.llm.base_url,
                "model": config.llm.model,
                "timeout_secs": config.llm.timeout_secs,
                "max_retries": config.llm.max_retries,
                "configured": config.llm.is_configured(),
            },
            "server": {
                "bind_address": config.server.bind_address,
                "port": config.server.port,
                "health_check_port": config.server.health_check_port,
                "graceful_shutdown_secs": config.server.graceful_shutdown_secs,
            },
            "voice": {
                "caller_language": config.voice.caller_language,
                "working_language": config.voice.working_language,
                "translation_enabled": config.voice.translation_enabled,
                "needs_translation": config.voice.needs_translation(),
                "tts_voice": config.voice.tts_voice,
                "record_max_length_secs": config.voice.record_max_length_secs,
                "record_silence_timeout_secs": config.voice.record_silence_timeout_secs,
                "callback_base_url": config.voice.callback_base_url,
                "gateway_base_url": config.voice.gateway_base_url,
                "gateway_account": config.voice.gateway_account,
                "gateway_token": config.voice.gateway_token.as_ref().map(|_| REDACTED),
                "caller_id": config.voice.caller_id,
                "gateway_configured": config.voice.gateway_configured(),
            },
            "logging": {
                "level": config.logging.level,
                "format": format!("{:?}", config.logging.format).to_lowercase(),
                "call_transcript": config.logging.call_transcript,
                "call_transcript_max_chars": config.logging.call_transcript_max_chars,
            },
        },
    });

    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}
