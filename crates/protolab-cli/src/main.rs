mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, prototype::PrototypeSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "protolab",
    about = "Start, stop and watch prototype dev servers by port",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .protolab/ or .git/)
    #[arg(long, global = true, env = "PROTOLAB_ROOT")]
    root: Option<PathBuf>,

    /// Controller URL (default: http://localhost:<server.port>)
    #[arg(long, global = true, env = "PROTOLAB_URL")]
    url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .protolab/config.yaml and an empty prototype registry
    Init,

    /// Run the lifecycle controller until Ctrl-C
    Serve {
        /// Interface to bind (default: server.host from config, 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: server.port from config, 0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,

        /// Open the prototype list in a browser
        #[arg(long)]
        open: bool,
    },

    /// Launch the dev server registered on a port
    Start { port: String },

    /// Kill whatever is listening on a port
    Stop { port: String },

    /// Report whether anything is listening on a port
    Status { port: String },

    /// Poll a port and print each state change until Ctrl-C
    Watch {
        port: String,

        /// Issue a Start first, then follow it with fast polling
        #[arg(long)]
        start: bool,
    },

    /// Open http://localhost:<port> in the browser
    Open { port: String },

    /// Manage the prototype registry
    Prototype {
        #[command(subcommand)]
        subcommand: PrototypeSubcommand,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let url = cli.url.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { host, port, open } => cmd::serve::run(&root, host, port, open),
        Commands::Start { port } => cmd::lifecycle::start(&root, url, &port, cli.json),
        Commands::Stop { port } => cmd::lifecycle::stop(&root, url, &port, cli.json),
        Commands::Status { port } => cmd::lifecycle::status(&root, url, &port, cli.json),
        Commands::Watch { port, start } => cmd::watch::run(&root, url, &port, start, cli.json),
        Commands::Open { port } => cmd::lifecycle::open(&port),
        Commands::Prototype { subcommand } => {
            cmd::prototype::run(&root, url, subcommand, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
