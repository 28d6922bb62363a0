pub mod links;
pub mod sections;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::section::SectionOutcome;
use links::LinkFilter;

/// Read a saved post. The file must exist and be UTF-8.
pub fn read_snapshot(path: &Path) -> Result<String> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    info!("Loaded {} ({} characters)", path.display(), html.chars().count());
    Ok(html)
}

/// Two-pass pipeline over saved markup: spoilers → classified document lists.
pub fn process_snapshot(html: &str, filter: LinkFilter) -> Vec<SectionOutcome> {
    let sections = sections::discover(html);
    info!("Found {} spoiler sections", sections.len());

    sections
        .into_iter()
        .enumerate()
        .map(|(index, section)| {
            let documents = links::extract_documents(&section.content, filter);
            info!(index, title = %section.title, links = documents.len(), "Processing section");
            if !documents.is_empty() {
                info!("  Sample: {}", sample(&documents));
            }
            SectionOutcome::classified(index, section.title, documents)
        })
        .collect()
}

/// First three names, for progress lines.
pub fn sample(documents: &[String]) -> String {
    let head: Vec<&str> = documents.iter().take(3).map(String::as_str).collect();
    if documents.len() > 3 {
        format!("{}...", head.join(", "))
    } else {
        head.join(", ")
    }
}
