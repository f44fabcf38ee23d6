use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use pages2pdf::{
    count_pages, download, load_file, CollectionId, ConfigLayer, DownloadJob, HttpTransport,
    PdfAssembler, Settings, Tier,
};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pages2pdf")]
#[command(about = "CLI utility to download a book served as numbered page images into a single PDF")]
#[command(version = "0.1.0")]
struct Args {
    #[command(flatten)]
    connection: Connection,

    /// Log every request and discovery round
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct Connection {
    /// Account name at the identity provider
    #[arg(short = 'u', long = "username", global = true)]
    username: Option<String>,

    /// Account password (prefer PAGES2PDF_PASSWORD or the config file)
    #[arg(short = 'p', long = "password", global = true)]
    password: Option<String>,

    /// JSON file with defaults for any of these options
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the content endpoint
    #[arg(long = "host", global = true)]
    host: Option<String>,

    /// Request timeout in seconds
    #[arg(short = 't', long = "timeout", global = true, value_parser = parse_timeout)]
    timeout: Option<f64>,

    /// First step size of the page count search
    #[arg(long = "probe-step", global = true)]
    probe_step: Option<u32>,

    /// Factor the search step shrinks by after each round
    #[arg(long = "probe-divisor", global = true)]
    probe_divisor: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a page range and merge it into one PDF
    Download {
        /// Book id as it appears in the content URLs
        book_id: String,

        /// Where to save the PDF
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// First page index (default 0)
        #[arg(short = 'f', long = "first")]
        first: Option<u32>,

        /// Last page index, inclusive (default: last page of the book)
        #[arg(short = 'l', long = "last")]
        last: Option<u32>,

        /// Image resolution: 1, 2 or 4 (default 4)
        #[arg(short = 'r', long = "tier")]
        tier: Option<Tier>,

        /// Also keep the page images next to the PDF
        #[arg(long = "preserve-pages")]
        preserve_pages: bool,

        /// Directory for temporary files
        #[arg(long = "scratch-dir")]
        scratch_dir: Option<PathBuf>,
    },
    /// Print the number of pages of a book
    Count {
        /// Book id as it appears in the content URLs
        book_id: String,
    },
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if value <= 0.0 {
        return Err("Must be a positive number.".to_string());
    }
    Ok(value)
}

async fn resolve_settings(
    connection: Connection,
    tier: Option<Tier>,
    scratch_dir: Option<PathBuf>,
) -> Result<Settings> {
    let cli = ConfigLayer {
        host: connection.host,
        username: connection.username,
        password: connection.password,
        tier,
        timeout_secs: connection.timeout,
        probe_step: connection.probe_step,
        probe_divisor: connection.probe_divisor,
        scratch_dir,
    };

    let file = match &connection.config {
        Some(path) => {
            info!("Loading config from {}", path.display().to_string().blue());
            load_file(path).await?
        }
        None => ConfigLayer::default(),
    };

    Ok(Settings::resolve(cli.or(ConfigLayer::from_env()).or(file))?)
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("Downloading... {bar:40} {percent:>3}% / page {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Download {
            book_id,
            output,
            first,
            last,
            tier,
            preserve_pages,
            scratch_dir,
        } => {
            let settings = resolve_settings(args.connection, tier, scratch_dir).await?;
            let transport = HttpTransport::new(settings.timeout)?;
            let job = DownloadJob {
                collection: book_id.parse::<CollectionId>()?,
                first,
                last,
                tier: settings.tier,
                output,
                preserve_pages,
            };

            let mut bar: Option<ProgressBar> = None;
            let report = download(transport, &settings, &job, &PdfAssembler::new(), |progress| {
                let bar = bar.get_or_insert_with(|| progress_bar(u64::from(progress.total)));
                bar.set_position(u64::from(progress.done));
                bar.set_message(progress.page.to_string());
            })
            .await;
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            let report = report?;

            info!(
                "Saved pages {}..={} of {} to {}",
                report.range.first(),
                report.range.last(),
                report.page_count,
                report.output.display().to_string().green()
            );
            if let Some(dir) = report.pages_dir {
                info!("Page images kept in {}", dir.display().to_string().blue());
            }
        }
        Commands::Count { book_id } => {
            let settings = resolve_settings(args.connection, None, None).await?;
            let transport = HttpTransport::new(settings.timeout)?;
            let collection = book_id.parse::<CollectionId>()?;

            let count = count_pages(transport, &settings, &collection).await?;
            println!("{count}");
        }
    }

    Ok(())
}

/// `RUST_LOG` decides the levels when set; `--verbose` always raises this
/// crate to debug.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let mut filter = match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new("pages2pdf=info"),
    };
    if verbose {
        if let Ok(directive) = "pages2pdf=debug".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_filter(args.verbose, rust_log.as_deref()))
        .init();

    if let Err(e) = run(args).await {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
