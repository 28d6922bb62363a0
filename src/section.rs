use crate::genre::{self, Genre};

/// One spoiler block as discovered in the post. Only lives for a single run.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub expanded: bool,
}

/// What happened to one spoiler section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome {
    Mapped {
        index: usize,
        title: String,
        genre: Genre,
        documents: Vec<String>,
    },
    Unmapped {
        index: usize,
        title: String,
        documents: Vec<String>,
    },
    Skipped {
        index: usize,
        title: Option<String>,
        reason: String,
    },
}

impl SectionOutcome {
    /// Classify a title and wrap the extracted documents.
    pub fn classified(index: usize, title: String, documents: Vec<String>) -> Self {
        match genre::classify(&title) {
            Some(genre) => SectionOutcome::Mapped { index, title, genre, documents },
            None => SectionOutcome::Unmapped { index, title, documents },
        }
    }

    pub fn skipped(index: usize, title: Option<String>, reason: impl Into<String>) -> Self {
        SectionOutcome::Skipped { index, title, reason: reason.into() }
    }
}

/// Strip the "Spoiler:" button prefix and surrounding whitespace.
pub fn clean_title(raw: &str) -> String {
    let t = raw.trim();
    t.strip_prefix("Spoiler:").unwrap_or(t).trim().to_string()
}
