//! sitescan CLI - crawl a site and search it for a term.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sitescan::{SearchConfig, SearchForm, SearchOutcome, SiteSearch};

/// sitescan - On-demand site crawler and term search
#[derive(Parser)]
#[command(name = "sitescan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a site from a seed URL and search its pages
    Search(SearchArgs),

    /// Print the effective configuration as JSON
    Config {
        /// Configuration file to merge over the defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct SearchArgs {
    /// Seed URL (http or https)
    url: String,

    /// Term to search for
    term: String,

    /// Number of crawl levels, the seed page being level 1
    #[arg(short, long, default_value = "2")]
    depth: String,

    /// Maximum number of pages to visit
    #[arg(short, long, default_value = "20")]
    pages: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Maximum number of concurrent requests
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print progress to stderr while the run is in flight
    #[arg(long)]
    progress: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("sitescan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Search(args) => run_search(args).await,
        Commands::Config { config } => show_config(config),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SearchConfig> {
    Ok(match path {
        Some(path) => SearchConfig::from_json_file(path)?,
        None => SearchConfig::default(),
    })
}

fn show_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if args.insecure {
        config.accept_invalid_certs = true;
    }

    let search = SiteSearch::new(config)?;
    let form = SearchForm {
        url: args.url.clone(),
        search_term: args.term.clone(),
        max_depth: args.depth,
        max_pages: args.pages,
    };

    let run = search.begin_run().await;
    let reporter = args.progress.then(|| {
        let mut feed = Box::pin(search.progress_feed(run.clone()));
        tokio::spawn(async move {
            while let Some(snapshot) = feed.next().await {
                eprintln!(
                    "[{:?}] {}/{} pages ({:.2}%), {} found, {:.2}s",
                    snapshot.current_status,
                    snapshot.processed_urls,
                    snapshot.total_urls,
                    snapshot.progress,
                    snapshot.found_results,
                    snapshot.elapsed_time
                );
            }
        })
    });

    let outcome = search.run(&form, &run).await;
    if let Some(reporter) = reporter {
        reporter.await?;
    }
    let outcome = outcome.map_err(|e| anyhow::anyhow!(e.user_message()))?;

    print_outcome(&args.url, &args.term, &outcome, args.format)
}

fn print_outcome(
    url: &str,
    term: &str,
    outcome: &SearchOutcome,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!(
                "\nPages on {} mentioning \"{}\" ({} results in {}ms{}):\n",
                url,
                term,
                outcome.results.len(),
                outcome.duration_ms,
                if outcome.from_cache { ", cached" } else { "" }
            );

            for (i, page) in outcome.items().iter().enumerate() {
                println!("{}. {}", i + 1, page.title);
                println!("   URL: {}", page.url);
                println!("   ...{}...", page.first_context);
                println!("   Matches: {}", page.match_count);
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
        OutputFormat::Compact => {
            for page in outcome.items() {
                println!("{}\t{}\t{}", page.match_count, page.title, page.url);
            }
        }
    }

    Ok(())
}
