// Certvault — View filter

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
enum Matcher {
    All,
    Literal(String),
    Pattern(Regex),
}

/// Case-insensitive text filter used for visibility. The pattern string is
/// the memo key: two filters with the same pattern give the same answers.
#[derive(Debug, Clone)]
pub struct Filter {
    pattern: String,
    matcher: Matcher,
}

impl Filter {
    /// Regular expression filter. An empty pattern matches everything.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let matcher = if pattern.is_empty() {
            Matcher::All
        } else {
            Matcher::Pattern(RegexBuilder::new(pattern).case_insensitive(true).build()?)
        };
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Plain substring filter.
    pub fn literal(text: &str) -> Self {
        let matcher = if text.is_empty() {
            Matcher::All
        } else {
            Matcher::Literal(text.to_lowercase())
        };
        Self {
            pattern: format!("literal:{}", text),
            matcher,
        }
    }

    pub fn all() -> Self {
        Self {
            pattern: String::new(),
            matcher: Matcher::All,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, text: &str) -> bool {
        match self.matcher {
            Matcher::All => true,
            Matcher::Literal(ref needle) => text.to_lowercase().contains(needle.as_str()),
            Matcher::Pattern(ref re) => re.is_match(text),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
