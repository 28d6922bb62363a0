use std::fmt;

/// The ten genre buckets every report carries, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Genre {
    SliceOfLife,
    Historical,
    Survival,
    ModernAdventure,
    Military,
    Horror,
    SuperHero,
    ScienceFiction,
    ModernOccult,
    Fantasy,
}

impl Genre {
    pub const ALL: [Genre; 10] = [
        Genre::SliceOfLife,
        Genre::Historical,
        Genre::Survival,
        Genre::ModernAdventure,
        Genre::Military,
        Genre::Horror,
        Genre::SuperHero,
        Genre::ScienceFiction,
        Genre::ModernOccult,
        Genre::Fantasy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Genre::SliceOfLife => "Slice of Life",
            Genre::Historical => "Historical",
            Genre::Survival => "Survival",
            Genre::ModernAdventure => "Modern Adventure",
            Genre::Military => "Military",
            Genre::Horror => "Horror",
            Genre::SuperHero => "Super Hero",
            Genre::ScienceFiction => "Science Fiction",
            Genre::ModernOccult => "Modern Occult",
            Genre::Fantasy => "Fantasy",
        }
    }

    /// Position in `Genre::ALL`.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A title matches when it contains any `any_of` keyword and none of `none_of`.
struct Rule {
    genre: Genre,
    any_of: &'static [&'static str],
    none_of: &'static [&'static str],
}

impl Rule {
    fn matches(&self, title_lower: &str) -> bool {
        self.any_of.iter().any(|kw| title_lower.contains(kw))
            && !self.none_of.iter().any(|kw| title_lower.contains(kw))
    }
}

// Order is priority: "Historical Fantasy" must hit Historical before Fantasy,
// and "Urban Fantasy" must hit Modern Occult before Fantasy.
const RULES: &[Rule] = &[
    Rule { genre: Genre::SliceOfLife, any_of: &["slice of life"], none_of: &[] },
    Rule { genre: Genre::Historical, any_of: &["histor", "lost world"], none_of: &[] },
    Rule { genre: Genre::Survival, any_of: &["survival"], none_of: &[] },
    Rule { genre: Genre::ModernAdventure, any_of: &["modern adventure"], none_of: &[] },
    Rule { genre: Genre::Military, any_of: &["military"], none_of: &[] },
    Rule { genre: Genre::Horror, any_of: &["horror"], none_of: &[] },
    Rule { genre: Genre::SuperHero, any_of: &["super"], none_of: &[] },
    Rule { genre: Genre::ScienceFiction, any_of: &["science fiction", "sci-fi"], none_of: &[] },
    Rule { genre: Genre::ModernOccult, any_of: &["urban fantasy"], none_of: &[] },
    Rule { genre: Genre::Fantasy, any_of: &["fantasy"], none_of: &["urban"] },
];

/// Map a spoiler title to its genre bucket. `None` means the title is not a genre list.
pub fn classify(title: &str) -> Option<Genre> {
    let lower = title.to_lowercase();
    RULES.iter().find(|r| r.matches(&lower)).map(|r| r.genre)
}
