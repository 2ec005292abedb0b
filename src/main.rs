//! Quarry CLI - load a parquet dataset into DuckDB and query it

use clap::{CommandFactory, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quarry::{ConfigFile, EngineSession, GlobalArgs, QuarryConfig, Result};

mod cli_commands;
mod cli_context;
mod cli_format;

use cli_context::CliContext;
use cli_format::OutputFormat;

/// Command-line interface for Quarry
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load a parquet dataset into an embedded DuckDB and query it")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,

    /// Generate example configuration file and exit
    #[arg(long)]
    pub(crate) generate_config: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub(crate) no_color: bool,

    /// Hide the load progress bar
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// List the dataset's tables with their sizes
    Tables,

    /// Download and register tables
    Load {
        /// Table names
        #[arg(required = true)]
        tables: Vec<String>,
    },

    /// Run a SQL statement
    Query {
        /// SQL text
        sql: String,

        /// Tables to load first (default: every available table)
        #[arg(short, long, num_args = 1..)]
        tables: Vec<String>,
    },

    /// Build a shareable link for a query
    Share {
        /// Prebuilt query id
        tab: String,

        /// SQL text
        sql: String,

        /// Page URL to attach the link to
        #[arg(long)]
        page: Option<String>,
    },

    /// Decode a shared link
    Open {
        /// Fragment or full URL
        link: String,
    },
}

fn init_tracing(log_level: &str) {
    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter)
        .init();
}

async fn run(command: Commands, config: &QuarryConfig, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Share { tab, sql, page } => cli_commands::share(ctx, &tab, &sql, page.as_deref()),
        Commands::Open { link } => {
            let fragment = link.split_once('#').map(|(_, f)| f).unwrap_or(&link);
            cli_commands::open(ctx, fragment)
        }
        Commands::Tables => {
            let session = EngineSession::from_config(config)?;
            cli_commands::list_tables(&session, ctx).await
        }
        Commands::Load { tables } => {
            let session = EngineSession::from_config(config)?;
            cli_commands::load_tables(&session, ctx, &tables).await
        }
        Commands::Query { sql, tables } => {
            let session = EngineSession::from_config(config)?;
            cli_commands::run_query(&session, ctx, &sql, &tables).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.generate_config {
        print!("{}", ConfigFile::generate_example());
        return ExitCode::SUCCESS;
    }

    let ctx = CliContext::new(&cli);
    let config = match QuarryConfig::resolve(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            ctx.error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(command, &config, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
