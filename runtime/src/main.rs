// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

use aisle_runtime::budget::Deadline;
use aisle_runtime::cli::{self, output, RunOptions};
use aisle_runtime::config::EngineConfig;
use aisle_runtime::error::EngineError;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "aisle",
    about = "Resilient menu, filter and category discovery for retail sites",
    version,
    after_help = "Run 'aisle <command> --help' for details on each command."
)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Only print results
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Plain symbols, no ANSI colour
    #[arg(long, global = true)]
    no_color: bool,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Replay saved HTML snapshots from this directory instead of launching Chromium
    #[arg(long, global = true)]
    offline: Option<PathBuf>,

    /// Wall-clock budget for the whole run in milliseconds
    #[arg(long, global = true)]
    budget_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the main navigation and its dropdowns
    Nav {
        /// Landing page URL
        url: String,
        /// Site key used to pick patterns (defaults to the URL host)
        #[arg(long)]
        site: Option<String>,
        /// Pattern catalog file replacing the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Discover filter controls on a listing page
    Filters {
        /// Category listing URL
        url: String,
        /// Filter vocabulary file replacing the built-in one
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
    /// Apply each filter on a category page and collect products
    Explore {
        /// Category listing URL
        url: String,
        /// Category display name
        #[arg(long)]
        name: Option<String>,
        /// Filter vocabulary file replacing the built-in one
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
    /// Crawl subcategories depth-first from seed pages
    Crawl {
        /// Seed URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Override the configured maximum depth
        #[arg(long)]
        max_depth: Option<u32>,
        /// Seed from the navigation menu of the first URL
        #[arg(long)]
        from_nav: bool,
    },
    /// Decide crawl modes for overlapping categories
    Dedup {
        /// JSON file with a list of {name, url?, products[]}
        input: PathBuf,
        /// Taxonomy vocabulary file replacing the built-in one
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },
    /// List navigation patterns, in try order for a site
    Patterns {
        /// Site key or URL
        #[arg(long)]
        site: Option<String>,
        /// Pattern catalog file replacing the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "aisle=debug,aisle_runtime=debug"
    } else {
        "aisle=info,aisle_runtime=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Export the output flags so the command modules can read them.
fn export_output_flags(cli: &Cli) {
    for (on, var) in [
        (cli.json, output::JSON_ENV),
        (cli.quiet, output::QUIET_ENV),
        (cli.no_color, output::NO_COLOR_ENV),
    ] {
        if on {
            std::env::set_var(var, "1");
        }
    }
}

fn report_failure(err: &anyhow::Error) {
    let retryable = err
        .downcast_ref::<EngineError>()
        .is_some_and(EngineError::is_retryable);
    if output::is_json() {
        output::print_json(&serde_json::json!({
            "error": true,
            "retryable": retryable,
            "message": format!("{err:#}"),
        }));
    } else if !output::is_quiet() {
        eprintln!("  Error: {err:#}");
        if retryable {
            eprintln!("  (transient; retrying the run may succeed)");
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    export_output_flags(&cli);
    init_tracing(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        report_failure(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;
    let opts = RunOptions {
        config,
        offline: cli.offline,
        deadline: cli
            .budget_ms
            .map(|ms| Deadline::after(Duration::from_millis(ms)))
            .unwrap_or_default(),
    };

    match cli.command {
        Commands::Nav { url, site, catalog } => {
            cli::nav_cmd::run(&opts, &url, site.as_deref(), catalog.as_deref()).await
        }
        Commands::Filters { url, vocabulary } => {
            cli::filters_cmd::run(&opts, &url, vocabulary.as_deref()).await
        }
        Commands::Explore { url, name, vocabulary } => {
            cli::explore_cmd::run(&opts, &url, name.as_deref(), vocabulary.as_deref()).await
        }
        Commands::Crawl {
            urls,
            max_depth,
            from_nav,
        } => cli::crawl_cmd::run(&opts, &urls, max_depth, from_nav).await,
        Commands::Dedup { input, taxonomy } => {
            cli::dedup_cmd::run(&opts.config.dedup, &input, taxonomy.as_deref()).await
        }
        Commands::Patterns { site, catalog } => {
            cli::patterns_cmd::run(site.as_deref(), catalog.as_deref()).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "aisle", &mut std::io::stdout());
            Ok(())
        }
    }
}
