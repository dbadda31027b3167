use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use redline::cli::{
    AdminCommands, ClientArgs, run_admin_token, run_changes, run_history, run_propose, run_review,
};
use redline::config::FileConfig;
use redline::identity::Directory;
use redline::server::{AppState, create_router};

#[derive(Parser)]
#[command(name = "redline")]
#[command(
    about = "A collaborative editing server with reviewed changes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// TOML file with users, projects, and tuning
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Submit new content for a project; staged for review unless you can commit
    Propose {
        #[command(flatten)]
        client: ClientArgs,

        /// Project id
        project: String,

        /// File holding the full new content
        file: PathBuf,
    },

    /// List pending changes for a project
    Changes {
        #[command(flatten)]
        client: ClientArgs,

        /// Project id
        project: String,
    },

    /// Approve or reject a staged change
    Review {
        #[command(flatten)]
        client: ClientArgs,

        /// Change id
        change: String,

        /// Apply the change
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,

        /// Discard the change
        #[arg(long)]
        reject: bool,

        /// Note for the proposer
        #[arg(long)]
        feedback: Option<String>,
    },

    /// Show project history, newest first
    History {
        #[command(flatten)]
        client: ClientArgs,

        /// Project id
        project: String,

        /// Only commits and review events
        #[arg(long)]
        edits: bool,

        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },
}

async fn run_serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let file = match &config_path {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let mut config = file.server_config();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let directory = Arc::new(Directory::from_entries(&file.users));
    if directory.user_count() == 0 {
        tracing::warn!("No users configured; every request will be rejected");
    }

    let state = Arc::new(AppState::new(directory, config.clone()));
    for seed in &file.projects {
        let project = state.workspace.seed_project(seed).await?;
        info!("Seeded project '{}' ({})", project.name, project.id);
    }

    let sweeper = state
        .presence
        .clone()
        .spawn_sweeper(config.presence_sweep_interval);

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("redline=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => run_serve(config, host, port).await?,
        Commands::Admin { command } => match command {
            AdminCommands::Token { user } => run_admin_token(&user)?,
        },
        // Client commands use a blocking HTTP client, so keep them off the runtime.
        Commands::Propose {
            client,
            project,
            file,
        } => blocking(move || run_propose(&client, &project, &file)).await?,
        Commands::Changes { client, project } => {
            blocking(move || run_changes(&client, &project)).await?;
        }
        Commands::Review {
            client,
            change,
            approve,
            reject: _,
            feedback,
        } => blocking(move || run_review(&client, &change, approve, feedback)).await?,
        Commands::History {
            client,
            project,
            edits,
            limit,
        } => blocking(move || run_history(&client, &project, edits, limit)).await?,
    }

    Ok(())
}

async fn blocking<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
