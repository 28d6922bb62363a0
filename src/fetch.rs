use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

const USER_AGENT: &str = concat!("genre_scraper/", env!("CARGO_PKG_VERSION"));

/// Download the raw post HTML (no scripts run) and save it as a snapshot.
/// Returns the number of bytes written.
pub async fn save_snapshot(url: &str, path: &Path) -> Result<usize> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

    info!("Fetching post: {}", url);
    let html = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Forum returned an error for {}", url))?
        .text()
        .await
        .context("Failed to read post body")?;

    if !html.contains("bbCodeSpoiler") {
        warn!("Downloaded page has no spoiler markup; the post may need a logged-in session");
    }

    std::fs::write(path, &html)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    info!("Saved {} bytes to {}", html.len(), path.display());
    Ok(html.len())
}
