//! opsgate - operations assistant with human approval for sensitive actions
//!
//! A terminal front-end over a conversation state machine that routes LLM
//! tool calls and pauses for operator approval before running dangerous ones.

mod db;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;
mod tools;
mod turn;

use db::Database;
use llm::LlmConfig;
use runtime::{ConversationRuntime, DatabaseStore, LlmApprovalFlow, ProductionRuntime, ServiceLlmClient};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tools::{MetricCatalog, StaticMetricCatalog, ToolRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn opsgate_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".opsgate")
}

fn open_database() -> Result<Database, Box<dyn std::error::Error>> {
    let db_path = std::env::var("OPSGATE_DB_PATH")
        .map_or_else(|_| opsgate_home().join("sessions.db"), PathBuf::from);

    if db_path.as_os_str() == ":memory:" {
        tracing::info!("Using in-memory session store");
        return Ok(Database::open_in_memory()?);
    }
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %db_path.display(), "Opening database");
    Ok(Database::open(&db_path)?)
}

fn metric_catalog() -> Result<Arc<dyn MetricCatalog>, Box<dyn std::error::Error>> {
    match std::env::var("OPSGATE_METRICS_FILE") {
        Ok(path) => {
            tracing::info!(path = %path, "Loading metric catalog");
            Ok(Arc::new(StaticMetricCatalog::from_file(std::path::Path::new(&path))?))
        }
        Err(_) => Ok(Arc::new(StaticMetricCatalog::standard())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsgate=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let llm_config = LlmConfig::from_env();
    let Some(service) = llm_config.build_service()? else {
        tracing::error!("No LLM configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
        return Err("no LLM configured".into());
    };
    let llm = ServiceLlmClient::new(service, llm_config.max_tokens());
    tracing::info!(model = %llm_config.model(), "LLM initialized");

    let dashboard_dir = std::env::var("OPSGATE_DASHBOARD_DIR")
        .map_or_else(|_| opsgate_home().join("dashboards"), PathBuf::from);
    let registry = ToolRegistry::standard(metric_catalog()?, dashboard_dir)?;

    let store = DatabaseStore::new(open_database()?);
    let runtime: ProductionRuntime = ConversationRuntime::new(
        store,
        llm.clone(),
        LlmApprovalFlow::new(llm),
        Arc::new(registry),
        system_prompt::main_prompt(),
    );

    let thread_id = std::env::var("OPSGATE_THREAD").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
    tracing::info!(thread_id = %thread_id, "Session ready");
    println!("opsgate session {thread_id}. Commands: /history, /sessions, /reset, /quit");

    repl(&runtime, &thread_id).await
}

async fn repl(runtime: &ProductionRuntime, thread_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => print_history(runtime, thread_id)?,
            "/sessions" => {
                for s in runtime.store().inner().list_sessions()? {
                    let marker = if s.approval_in_progress { " (awaiting approval)" } else { "" };
                    println!("{}  {} turns  updated {}{marker}", s.thread_id, s.turn_count, s.updated_at);
                }
            }
            "/reset" => match runtime.store().inner().delete_session(thread_id) {
                Ok(()) => println!("Session cleared."),
                Err(db::DbError::SessionNotFound(_)) => println!("Nothing to clear."),
                Err(e) => return Err(e.into()),
            },
            text => match runtime.step(thread_id, text).await {
                Ok(output) => println!("{}", output.text),
                Err(e) if e.is_retryable() => println!("Something went wrong ({e}). Please try again."),
                Err(e) => println!("Error: {e}"),
            },
        }
    }
    Ok(())
}

fn print_history(runtime: &ProductionRuntime, thread_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    match runtime.store().inner().load_session(thread_id)? {
        Some(state) => {
            let entries = turn::summary::simplify_history(state.turns());
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        None => println!("No history yet."),
    }
    Ok(())
}
