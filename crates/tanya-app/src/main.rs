//! Tanya application binary - composition root.
//!
//! 1. Parse the command line and load configuration from TOML
//! 2. Optionally write the effective configuration back out
//! 3. Open the SQLite database
//! 4. Either manage users, or wire the Gemini gateway, chart renderer and
//!    chat orchestrator into the axum API server

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use tanya_api::auth::{generate_token, hash_token};
use tanya_api::{start_server, AppState};
use tanya_chart::ScriptRenderer;
use tanya_chat::{ChatOrchestrator, GeminiGateway};
use tanya_core::config::{resolve_path, TanyaConfig};
use tanya_storage::{Database, UserRepository};

use cli::{CliArgs, Command, ConfigCommand, UserCommand};

fn run_config_command(
    config: &TanyaConfig,
    path: &Path,
    action: &ConfigCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                )
                .into());
            }
            config.save(path)?;
            println!("Configuration written to {}", path.display());
        }
    }
    Ok(())
}

fn run_user_command(db: Arc<Database>, action: &UserCommand) -> Result<(), Box<dyn std::error::Error>> {
    let users = UserRepository::new(db);
    match action {
        UserCommand::Add { name, email } => {
            let token = generate_token();
            let user = users.create(name, email, &hash_token(&token))?;
            tracing::info!(user_id = %user.id, "User created");
            println!("id:    {}", user.id);
            println!("token: {}", token);
            println!("The token is shown only once; store it now.");
        }
        UserCommand::List => {
            for user in users.list()? {
                println!(
                    "{}  {:<24} {}  {}",
                    user.id,
                    user.name,
                    user.email,
                    user.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        UserCommand::Remove { id } => {
            users.delete(*id)?;
            tracing::info!(user_id = %id, "User removed");
        }
    }
    Ok(())
}

fn open_database(config: &TanyaConfig) -> Result<Arc<Database>, Box<dyn std::error::Error>> {
    let data_dir = resolve_path(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("tanya.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    Ok(Arc::new(db))
}

async fn serve(config: TanyaConfig, db: Arc<Database>) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = GeminiGateway::from_config(&config.llm)?;
    tracing::info!(model = %config.llm.model, "Gemini gateway ready");

    let chart_dir = resolve_path(&config.chart.output_dir);
    std::fs::create_dir_all(&chart_dir)?;
    let script = resolve_path(&config.chart.script);
    if !script.exists() {
        tracing::warn!(path = %script.display(), "Chart script not found; chart requests will fail");
    }
    let renderer = ScriptRenderer::from_config(&config.chart);
    tracing::info!(dir = %chart_dir.display(), "Chart renderer ready");

    let orchestrator = ChatOrchestrator::new(db.clone(), Arc::new(gateway), Arc::new(renderer), &config)?;
    let state = AppState::new(config.clone(), db, Arc::new(orchestrator));

    start_server(&config, state).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = TanyaConfig::load_or_default(&config_file)?;
    args.apply(&mut config);
    config.validate()?;

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Tanya v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        from_file = config_file.exists(),
        "Configuration loaded"
    );

    match args.command() {
        Command::Serve => {
            let db = open_database(&config)?;
            serve(config, db).await
        }
        Command::User { action } => run_user_command(open_database(&config)?, action),
        Command::Config { action } => run_config_command(&config, &config_file, action),
    }
}
