//! tessera CLI - Rate-limited, paginated access to quota-bound financial data APIs.

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod settings;

use display::{Format, parse_param};
use settings::Overrides;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Rate-limited, paginated access to quota-bound financial data APIs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file. Defaults to settings.json in the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key
    #[arg(long, env = "TESSERA_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Plan tier (free, light, standard, premium)
    #[arg(long, global = true)]
    plan: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List plan tiers and their request spacing
    Plans,

    /// Fetch every page of an endpoint
    Fetch {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Fetch an endpoint once per value of a parameter
    Batch {
        #[command(flatten)]
        request: RequestArgs,

        /// Parameter that varies between operations
        #[arg(short, long)]
        key: String,

        /// Comma-separated values for the varying parameter
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<String>,

        /// Maximum operations in flight (1 runs in order and stops at the first failure)
        #[arg(long, default_value = "1")]
        concurrency: usize,

        /// Retries per operation after the first attempt
        #[arg(long)]
        max_retries: Option<u32>,
    },
}

/// Arguments shared by every command that issues requests.
#[derive(Args)]
struct RequestArgs {
    /// Endpoint path relative to the base URL (e.g., /equities/bars/daily)
    path: String,

    /// Request parameter as key=value (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Send parameters as a JSON POST body instead of a query string
    #[arg(long)]
    post: bool,

    /// Response field holding the page's items
    #[arg(long)]
    items_key: Option<String>,

    /// Maximum pages per paginated fetch
    #[arg(long)]
    max_pages: Option<usize>,

    /// Output file path. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays data
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let overrides = Overrides {
        config: cli.config,
        api_key: cli.api_key,
        plan: cli.plan,
        base_url: cli.base_url,
    };

    match command {
        Commands::Plans => {
            let settings = settings::resolve(&overrides)?;
            commands::plans::list_plans(settings.client.plan);
            Ok(())
        }
        Commands::Fetch { request } => {
            let settings = settings::resolve(&overrides)?;
            commands::fetch::fetch(&settings, request.into(), cli.quiet).await
        }
        Commands::Batch {
            request,
            key,
            values,
            concurrency,
            max_retries,
        } => {
            let mut settings = settings::resolve(&overrides)?;
            if let Some(max_retries) = max_retries {
                settings.batch.max_retries = max_retries;
            }
            commands::batch::batch(
                &settings,
                request.into(),
                &key,
                &values,
                concurrency,
                cli.quiet,
            )
            .await
        }
    }
}

impl From<RequestArgs> for commands::Request {
    fn from(args: RequestArgs) -> Self {
        Self {
            path: args.path,
            params: args.params.into_iter().collect(),
            post: args.post,
            items_key: args.items_key,
            max_pages: args.max_pages,
            output: args.output,
            format: args.format,
        }
    }
}
