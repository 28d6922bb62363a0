use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{info, warn};

use crate::genre::Genre;
use crate::section::SectionOutcome;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NOTE: &str = "Urban Fantasy in their list = Modern Occult in our system";

/// Genre → document names. Always carries all ten canonical keys, in canonical
/// order, followed by any pass-through titles in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenreMappings {
    canonical: [Vec<String>; 10],
    extra: Vec<(String, Vec<String>)>,
}

impl GenreMappings {
    pub fn get(&self, genre: Genre) -> &[String] {
        &self.canonical[genre.index()]
    }

    /// Append documents to a genre; repeated genres accumulate.
    pub fn add(&mut self, genre: Genre, documents: Vec<String>) {
        self.canonical[genre.index()].extend(documents);
    }

    /// Store documents under a raw, unmapped title.
    pub fn add_extra(&mut self, title: String, documents: Vec<String>) {
        match self.extra.iter_mut().find(|(t, _)| *t == title) {
            Some((_, docs)) => docs.extend(documents),
            None => self.extra.push((title, documents)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        Genre::ALL
            .into_iter()
            .map(move |g| (g.label(), self.get(g)))
            .chain(self.extra.iter().map(|(t, d)| (t.as_str(), d.as_slice())))
    }

    pub fn len(&self) -> usize {
        Genre::ALL.len() + self.extra.len()
    }

    pub fn total_documents(&self) -> usize {
        self.iter().map(|(_, docs)| docs.len()).sum()
    }

    /// Fold per-section outcomes into one mapping under the given policy.
    pub fn merge(outcomes: &[SectionOutcome], policy: MergePolicy) -> Merged {
        let mut merged = Merged::default();

        for outcome in outcomes {
            match outcome {
                SectionOutcome::Mapped { title, genre, documents, .. } => {
                    if policy.require_documents && documents.is_empty() {
                        info!("  Skipped '{}' (no document links)", title);
                        continue;
                    }
                    info!("  ✓ '{}' mapped to: {}", title, genre);
                    merged.mappings.add(*genre, documents.clone());
                    if policy.record_found {
                        merged.genres_found.push(title.clone());
                    }
                }
                SectionOutcome::Unmapped { title, documents, .. } => {
                    if policy.keep_unmapped {
                        warn!("Could not map '{}', keeping under its own title", title);
                        merged.mappings.add_extra(title.clone(), documents.clone());
                    } else {
                        info!("  Skipped '{}' (not a genre)", title);
                    }
                }
                SectionOutcome::Skipped { index, title, reason } => {
                    warn!(
                        "Error processing spoiler {} ({}): {}",
                        index,
                        title.as_deref().unwrap_or("untitled"),
                        reason
                    );
                    merged.skipped += 1;
                }
            }
        }

        merged
    }
}

impl Serialize for GenreMappings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (label, docs) in self.iter() {
            map.serialize_entry(label, docs)?;
        }
        map.end()
    }
}

/// How outcomes become mapping entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    /// Keep unmatched titles as extra keys instead of dropping them.
    pub keep_unmapped: bool,
    /// Drop matched sections that produced no documents.
    pub require_documents: bool,
    /// Record titles of mapped sections for `_genresFound`.
    pub record_found: bool,
}

impl MergePolicy {
    pub const SNAPSHOT: MergePolicy = MergePolicy {
        keep_unmapped: false,
        require_documents: true,
        record_found: true,
    };

    pub const LIVE: MergePolicy = MergePolicy {
        keep_unmapped: true,
        require_documents: false,
        record_found: false,
    };
}

#[derive(Debug, Default)]
pub struct Merged {
    pub mappings: GenreMappings,
    pub genres_found: Vec<String>,
    pub skipped: usize,
}

/// Which acquisition strategy produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Snapshot,
    Live,
}

impl Variant {
    pub fn policy(self) -> MergePolicy {
        match self {
            Variant::Snapshot => MergePolicy::SNAPSHOT,
            Variant::Live => MergePolicy::LIVE,
        }
    }

    fn comment(self) -> &'static str {
        match self {
            Variant::Snapshot => "Genre mappings parsed from SpaceBattles community list",
            Variant::Live => "Genre mappings scraped from SpaceBattles community list",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenreReport {
    #[serde(rename = "_comment")]
    pub comment: String,
    #[serde(rename = "_source")]
    pub source: String,
    #[serde(rename = "_scrapedAt")]
    pub scraped_at: String,
    #[serde(rename = "_note")]
    pub note: String,
    #[serde(rename = "_genresFound", skip_serializing_if = "Option::is_none")]
    pub genres_found: Option<Vec<String>>,
    #[serde(rename = "genreMappings")]
    pub genre_mappings: GenreMappings,
    #[serde(skip)]
    variant: Variant,
}

impl GenreReport {
    pub fn new(variant: Variant, source: &str, scraped_at: String, merged: Merged) -> Self {
        let genres_found = variant.policy().record_found.then_some(merged.genres_found);
        Self {
            comment: variant.comment().to_string(),
            source: source.to_string(),
            scraped_at,
            note: NOTE.to_string(),
            genres_found,
            genre_mappings: merged.mappings,
            variant,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Overwrite `path` with the report.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Wrote {} keys to {}", self.genre_mappings.len(), path.display());
        Ok(())
    }

    /// Console summary: sorted per-genre counts, totals and a status line.
    pub fn summary(&self, path: &Path) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "SUCCESS! Genre mappings saved to: {}", path.display());
        let _ = writeln!(out, "{}", rule);

        let _ = writeln!(out, "\nGenre Summary:");
        let mut rows: Vec<(&str, usize)> = self
            .genre_mappings
            .iter()
            .map(|(label, docs)| (label, docs.len()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        for (label, count) in &rows {
            let status = if *count > 0 { "✓" } else { "✗" };
            let _ = writeln!(out, "  [{}] {}: {} documents", status, label, count);
        }

        let total = self.genre_mappings.total_documents();
        let _ = writeln!(out, "\nTotal documents: {}", total);
        if self.genres_found.is_some() {
            // Distinct genres, not titles: several sections can feed one genre.
            let mapped = Genre::ALL
                .iter()
                .filter(|g| !self.genre_mappings.get(**g).is_empty())
                .count();
            let _ = writeln!(out, "Genres mapped: {}/{}", mapped, Genre::ALL.len());
        }

        if total > 0 {
            if self.variant == Variant::Snapshot {
                let _ = writeln!(out, "\n✓ Success! Ready to apply genre tags.");
            }
        } else {
            let _ = writeln!(out, "\n⚠️ WARNING: No documents found - check the post structure");
        }
        out
    }
}

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
