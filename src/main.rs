use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::Settings;
use core_types::Row;
use gateway::QueryGateway;
use serde_json::Value;
use std::path::PathBuf;

mod smoke;

/// The main entry point for the SQLGate query gateway.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = configuration::load_config(cli.config.as_deref())?;
    let _guard = configuration::init_tracing(&settings.logging)?;

    match cli.command {
        Commands::Serve => web_server::run_server(settings).await,
        Commands::Check => handle_check(&settings).await,
        Commands::Tables => handle_tables(&settings).await,
        Commands::Query(args) => handle_query(&settings, &args.sql).await,
        Commands::Smoke(args) => smoke::run(args, &settings.server.route_prefix).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An HTTP gateway in front of a pooled SQL database.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML settings file. `sqlgate.toml` is used when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Run one health check against the configured database.
    Check,
    /// List the tables of the configured database.
    Tables,
    /// Execute SQL verbatim and print the result.
    Query(QueryArgs),
    /// Check the endpoints of a running server.
    Smoke(smoke::SmokeArgs),
}

#[derive(Parser)]
struct QueryArgs {
    /// The statement(s) to run.
    sql: String,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_check(settings: &Settings) -> anyhow::Result<()> {
    let gateway = QueryGateway::from_settings(settings)?;
    let report = gateway.pool().health_check().await;
    gateway.pool().close().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.healthy {
        anyhow::bail!(
            "database at {}:{} is unreachable",
            settings.database.host,
            settings.database.port().unwrap_or_default()
        );
    }
    Ok(())
}

async fn handle_tables(settings: &Settings) -> anyhow::Result<()> {
    let gateway = QueryGateway::from_settings(settings)?;
    let outcome = gateway.list_tables().await;
    gateway.pool().close().await;

    let envelope = outcome.map_err(|rejection| anyhow::Error::new(rejection.error))?;
    let Some(payload) = envelope.payload else {
        return Ok(());
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![format!("Tables in {}", payload.database)]);
    for name in &payload.tables {
        table.add_row(vec![cell_text(name)]);
    }
    println!("{table}");
    println!("{} table(s)", payload.count);
    Ok(())
}

async fn handle_query(settings: &Settings, sql: &str) -> anyhow::Result<()> {
    let gateway = QueryGateway::from_settings(settings)?;
    let outcome = gateway.run_query(Some(sql)).await;
    gateway.pool().close().await;

    let envelope = outcome.map_err(|rejection| anyhow::Error::new(rejection.error))?;
    let Some(payload) = envelope.payload else {
        return Ok(());
    };

    match render_rows(&payload.data) {
        Some(table) => {
            println!("{table}");
            println!("{} row(s)", payload.count);
        }
        None => println!(
            "Query OK, {} row(s) affected",
            payload.affected_rows.unwrap_or_default()
        ),
    }
    Ok(())
}

/// Lays rows out as a table with one column per key of the first row.
/// `None` when there are no rows to show.
fn render_rows(rows: &[Row]) -> Option<Table> {
    let first = rows.first()?;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(first.keys().cloned().collect::<Vec<_>>());
    for row in rows {
        table.add_row(row.values().map(cell_text).collect::<Vec<_>>());
    }
    Some(table)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
