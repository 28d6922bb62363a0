use std::sync::LazyLock;

use regex::Regex;

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\b[^>]*?\bhref="([^"]*)"[^>]*>([^<]+)</a>"#).unwrap()
});

static DOC_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:drive|docs)\.google\.com(?:[/?#:]|$)").unwrap()
});

/// Names shorter than this (after trimming) are icons, arrows, "#1" etc.
const MIN_NAME_CHARS: usize = 3;

/// Which links count as documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkFilter {
    /// Only links into the cloud-document host.
    #[default]
    DocumentHosts,
    /// Legacy behaviour: any link with a long enough label, wherever it points.
    AnyHost,
}

impl LinkFilter {
    pub fn from_any_host(any_host: bool) -> Self {
        if any_host {
            LinkFilter::AnyHost
        } else {
            LinkFilter::DocumentHosts
        }
    }

    pub fn accepts(self, href: Option<&str>) -> bool {
        match self {
            LinkFilter::AnyHost => true,
            LinkFilter::DocumentHosts => href.is_some_and(is_document_host),
        }
    }
}

pub fn is_document_host(href: &str) -> bool {
    DOC_HOST_RE.is_match(href.trim())
}

/// Decode the entities the forum emits inside link labels.
pub fn decode_entities(s: &str) -> String {
    s.replace("&#039;", "'")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
}

/// Turn a raw link label into a document name, or `None` if it is too short.
pub fn document_name(raw_text: &str) -> Option<String> {
    let text = decode_entities(raw_text.trim());
    if text.chars().count() >= MIN_NAME_CHARS {
        Some(text)
    } else {
        None
    }
}

/// Shared acceptance rule for one link, whichever way it was found.
pub fn accept_link(href: Option<&str>, text: &str, filter: LinkFilter) -> Option<String> {
    if !filter.accepts(href) {
        return None;
    }
    document_name(text)
}

/// Document names from a block of raw markup, in source order, duplicates kept.
pub fn extract_documents(markup: &str, filter: LinkFilter) -> Vec<String> {
    ANCHOR_RE
        .captures_iter(markup)
        .filter_map(|caps| accept_link(Some(&caps[1]), &caps[2], filter))
        .collect()
}
