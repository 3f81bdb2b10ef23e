use cadence_core::config::{AppConfig, LoadOptions};
use cadence_db::connect_with_settings;
use serde_json::json;

struct Check {
    name: &'static str,
    passed: bool,
    detail: String,
}

/// Validates config, LLM readiness, and database connectivity.
pub fn run(json_output: bool) -> String {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(Check {
                name: "config",
                passed: true,
                detail: "configuration loaded and validated".to_string(),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(Check { name: "config", passed: false, detail: error.to_string() });
            None
        }
    };

    if let Some(config) = &config {
        let llm_ready = config.llm.is_configured();
        checks.push(Check {
            name: "llm",
            passed: llm_ready,
            detail: if llm_ready {
                format!("provider {:?} is configured", config.llm.provider)
            } else {
                "language model is not configured; conversational endpoints will return 503"
                    .to_string()
            },
        });

        let db_detail = check_database(config);
        checks.push(Check {
            name: "database",
            passed: db_detail.is_ok(),
            detail: db_detail.unwrap_or_else(|error| error),
        });

        checks.push(Check {
            name: "voice_gateway",
            passed: true,
            detail: if config.voice.gateway_configured() {
                "voice gateway credentials present".to_string()
            } else {
                "voice gateway not configured; outbound calls will dry-run".to_string()
            },
        });
    }

    let all_passed = checks.iter().all(|check| check.passed);

    if json_output {
        let payload = json!({
            "command": "doctor",
            "status": if all_passed { "ok" } else { "error" },
            "checks": checks
                .iter()
                .map(|check| {
                    json!({
                        "name": check.name,
                        "passed": check.passed,
                        "detail": check.detail,
                    })
                })
                .collect::<Vec<_>>(),
        });
        return serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    }

    let mut lines = vec![format!(
        "cadence doctor: {}",
        if all_passed { "all checks passed" } else { "issues found" }
    )];
    for check in &checks {
        lines.push(format!(
            "  [{}] {}: {}",
            if check.passed { "ok" } else { "fail" },
            check.name,
            check.detail
        ));
    }
    lines.join("\n")
}

fn check_database(config: &AppConfig) -> Result<String, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("failed to initialize async runtime: {error}"))?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("database connection failed: {error}"))?;

        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|error| format!("database probe query failed: {error}"))?;

        pool.close().await;
        Ok("database reachable".to_string())
    })
}
