mod browser;
mod fetch;
mod genre;
mod parser;
mod report;
mod section;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use browser::webdriver::{BrowserOptions, WebDriverSession};
use browser::LiveOptions;
use parser::links::LinkFilter;
use report::{GenreMappings, GenreReport, Variant};
use section::SectionOutcome;

const POST_URL: &str =
    "https://forums.spacebattles.com/threads/general-jumpchain-thread-the-13th.1124501/post-96370811";
const SNAPSHOT_PATH: &str = "forum-raw.html";
const OUTPUT_PATH: &str = "genre-mappings-scraped.json";
const WEBDRIVER_URL: &str = "http://localhost:9515";

#[derive(Parser)]
#[command(
    name = "genre_scraper",
    about = "Genre → document lists from the SpaceBattles jump list post",
    after_help = "Fatal errors exit non-zero. Set RUST_BACKTRACE=1 to print their stack trace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a saved copy of the post
    Parse {
        #[arg(short, long, default_value = SNAPSHOT_PATH)]
        input: PathBuf,
        #[arg(short, long, default_value = OUTPUT_PATH)]
        output: PathBuf,
        /// Legacy: accept links to any host, not just cloud documents
        #[arg(long)]
        any_host: bool,
    },
    /// Render the live post in a browser and expand its spoilers
    Scrape {
        #[arg(short, long, default_value = POST_URL)]
        url: String,
        #[arg(short, long, default_value = OUTPUT_PATH)]
        output: PathBuf,
        /// Spoilers to process from the top of the post (0 = all)
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// WebDriver endpoint (chromedriver)
        #[arg(long, env = "GENRE_WEBDRIVER_URL", default_value = WEBDRIVER_URL)]
        webdriver: String,
        /// Legacy: accept links to any host, not just cloud documents
        #[arg(long)]
        any_host: bool,
    },
    /// Download the post HTML for `parse`
    Fetch {
        #[arg(short, long, default_value = POST_URL)]
        url: String,
        #[arg(short, long, default_value = SNAPSHOT_PATH)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, output, any_host } => {
            let filter = link_filter(any_host);
            let html = parser::read_snapshot(&input)?;
            let outcomes = parser::process_snapshot(&html, filter);
            finish(Variant::Snapshot, POST_URL, &outcomes, &output)
        }
        Commands::Scrape { url, output, limit, headed, webdriver, any_host } => {
            let filter = link_filter(any_host);
            let session = WebDriverSession::launch(&BrowserOptions::new(&webdriver, !headed)).await?;
            let opts = LiveOptions::new(&url, limit, filter);
            let outcomes = browser::scrape_post(session, &opts).await?;
            finish(Variant::Live, &url, &outcomes, &output)
        }
        Commands::Fetch { url, output } => {
            let bytes = fetch::save_snapshot(&url, &output).await?;
            println!("Saved {} bytes to {}. Run 'parse' next.", bytes, output.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn link_filter(any_host: bool) -> LinkFilter {
    let filter = LinkFilter::from_any_host(any_host);
    if filter == LinkFilter::AnyHost {
        warn!("Legacy link mode: every link label counts as a document, wherever it points");
    }
    filter
}

/// Merge, write and summarise one run.
fn finish(variant: Variant, source: &str, outcomes: &[SectionOutcome], output: &Path) -> Result<()> {
    let merged = GenreMappings::merge(outcomes, variant.policy());
    if merged.skipped > 0 {
        warn!("{} of {} spoilers failed and were skipped", merged.skipped, outcomes.len());
    }

    let report = GenreReport::new(variant, source, report::timestamp_now(), merged);
    report.write(output)?;
    print!("{}", report.summary(output));
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
