//! Command-line front end. Each subcommand group is one studio page.

pub mod commands;
pub mod context;
pub mod id_resolver;
pub mod output;

use clap::{Parser, Subcommand};

use crate::domain::errors::StudioError;

pub use context::StudioContext;

#[derive(Parser, Debug)]
#[command(name = "crewai-studio")]
#[command(about = "CrewAI Studio - configure crews, agents, tasks, tools and knowledge", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Page to open; the overview when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and apply the schema
    Init(commands::init::InitArgs),
    /// Counts of every configured entity
    Overview,
    /// Tool management
    Tools(commands::tool::ToolArgs),
    /// Knowledge source management
    Knowledge(commands::knowledge::KnowledgeArgs),
    /// Agent management
    Agents(commands::agent::AgentArgs),
    /// Task management
    Tasks(commands::task::TaskArgs),
    /// Crew management
    Crews(commands::crew::CrewArgs),
    /// Results of past crew runs
    Results(commands::result::ResultArgs),
    /// Export or import the whole configuration as JSON
    Transfer(commands::transfer::TransferArgs),
}

/// Run the selected page against an initialized context.
pub async fn dispatch(command: Option<Commands>, ctx: &StudioContext, json_mode: bool) -> anyhow::Result<()> {
    match command.unwrap_or(Commands::Overview) {
        Commands::Init(args) => commands::init::execute(args, &ctx.settings, json_mode).await,
        Commands::Overview => commands::overview::execute(ctx, json_mode).await,
        Commands::Tools(args) => commands::tool::execute(args, ctx, json_mode).await,
        Commands::Knowledge(args) => commands::knowledge::execute(args, ctx, json_mode).await,
        Commands::Agents(args) => commands::agent::execute(args, ctx, json_mode).await,
        Commands::Tasks(args) => commands::task::execute(args, ctx, json_mode).await,
        Commands::Crews(args) => commands::crew::execute(args, ctx, json_mode).await,
        Commands::Results(args) => commands::result::execute(args, ctx, json_mode).await,
        Commands::Transfer(args) => commands::transfer::execute(args, ctx, json_mode).await,
    }
}

/// Print a failed command as an inline message and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = match err.downcast_ref::<StudioError>() {
        Some(StudioError::NotFound { .. }) => "not_found",
        Some(StudioError::ReferentialIntegrity { .. }) => "referential_integrity",
        Some(StudioError::Persistence(_)) => "persistence",
        Some(StudioError::Serialization(_)) => "serialization",
        Some(StudioError::Configuration(_)) => "configuration",
        None => "error",
    };
    let message = format!("{err:#}");

    if json_mode {
        let body = serde_json::json!({ "success": false, "error": kind, "message": message });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {message}");
    }
    std::process::exit(1);
}
