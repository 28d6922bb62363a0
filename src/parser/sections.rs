use std::sync::LazyLock;

use regex::Regex;

use crate::section::{clean_title, Section};

// Title span, then the content div up to the three closing divs that end a
// spoiler block. Assumes the forum's usual nesting; anything else yields no match.
static SPOILER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<span class="bbCodeSpoiler-button-title">([^<]+)</span>.*?<div class="bbCodeSpoiler-content">(.*?)</div>\s*</div>\s*</div>"#,
    )
    .unwrap()
});

/// Find every spoiler block in a saved post, in document order.
pub fn discover(html: &str) -> Vec<Section> {
    SPOILER_RE
        .captures_iter(html)
        .map(|caps| Section {
            title: clean_title(&caps[1]),
            content: caps[2].to_string(),
            expanded: true,
        })
        .collect()
}
