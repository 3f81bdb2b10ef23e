use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use cadence_agent::controller::TurnController;
use cadence_agent::engine::DecisionEngine;
use cadence_agent::openai::HttpLlmClient;
use cadence_agent::session::InMemorySessionStore;
use cadence_core::config::{AppConfig, LoadOptions};
use cadence_core::LeadId;
use cadence_db::repositories::SqlLeadRepository;
use cadence_db::{connect_with_settings, migrations, SqlCalendar};
use uuid::Uuid;

use crate::commands::CommandResult;

/// Interactive text-channel loop against the live turn controller. Reads
/// utterances from stdin; an empty line or EOF ends the chat.
pub fn run(lead_id: Option<i64>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    if !config.llm.is_configured() {
        return CommandResult::failure(
            "chat",
            "llm_unconfigured",
            "the language model is not configured; set llm.api_key or llm.base_url",
            2,
        );
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(chat_loop(config, lead_id));
    match result {
        Ok(turns) => CommandResult::success("chat", format!("chat ended after {turns} turns")),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

async fn chat_loop(
    config: AppConfig,
    lead_id: Option<i64>,
) -> Result<usize, (&'static str, String, u8)> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let lead = match lead_id {
        Some(raw_id) => {
            let repository = SqlLeadRepository::new(pool.clone());
            let found = repository
                .find_by_id(&LeadId(raw_id))
                .await
                .map_err(|error| ("lead_lookup", error.to_string(), 4u8))?;
            Some(found.ok_or(("lead_lookup", format!("lead {raw_id} not found"), 4u8))?)
        }
        None => None,
    };

    let llm_client = Arc::new(
        HttpLlmClient::from_config(&config.llm)
            .map_err(|error| ("llm_init", error.to_string(), 4u8))?,
    );
    let engine = DecisionEngine::new(
        llm_client,
        Duration::from_secs(config.llm.timeout_secs),
        config.llm.max_retries,
    );
    let controller = TurnController::new(
        Arc::new(InMemorySessionStore::new()),
        engine,
        Arc::new(SqlCalendar::new(pool.clone())),
        2,
    );

    let session_id = format!("cli-chat-{}", Uuid::new_v4());
    println!("chat session {session_id} (empty line to quit)");

    let stdin = io::stdin();
    let mut turns = 0usize;
    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line);
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => return Err(("stdin", error.to_string(), 4u8)),
        }

        let utterance = line.trim();
        if utterance.is_empty() {
            break;
        }

        let outcome = controller
            .process_turn(&session_id, utterance, lead.as_ref())
            .await
            .map_err(|error| ("turn", error.to_string(), 5u8))?;

        println!("agent> {}", outcome.reply_text);
        if let Some(action) = &outcome.action {
            println!(
                "action> {} {}",
                action.action_key(),
                outcome
                    .action_payload
                    .as_ref()
                    .map(|payload| payload.to_string())
                    .unwrap_or_default()
            );
        }
        turns += 1;

        if matches!(
            outcome.action.as_ref().map(|action| action.action_key()),
            Some("end_call") | Some("book_meeting")
        ) {
            break;
        }
    }

    pool.close().await;
    Ok(turns)
}
