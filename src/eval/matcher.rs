//! Name matchers used by the catalog to recognize sources, sinks,
//! sanitizers and triggers by their dotted expression text.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Suffix,
    Prefix,
    Contains,
    Regex,
}

/// Regular expressions are compiled once, when the pattern is built or
/// deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PatternFields")]
pub struct NamePattern {
    pub pattern: String,
    pub mode: MatchMode,
    pub case_sensitive: bool,
    #[serde(skip)]
    compiled: Option<Regex>,
}

#[derive(Deserialize)]
struct PatternFields {
    pattern: String,
    #[serde(default)]
    mode: MatchMode,
    #[serde(default = "default_case_sensitive")]
    case_sensitive: bool,
}

impl From<PatternFields> for NamePattern {
    fn from(fields: PatternFields) -> Self {
        let pattern = Self::new(&fields.pattern, fields.mode);
        if fields.case_sensitive {
            pattern
        } else {
            pattern.ignore_case()
        }
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.mode == other.mode
            && self.case_sensitive == other.case_sensitive
    }
}

impl Eq for NamePattern {}

fn default_case_sensitive() -> bool {
    true
}

impl NamePattern {
    pub fn exact(pattern: &str) -> Self {
        Self::new(pattern, MatchMode::Exact)
    }

    pub fn new(pattern: &str, mode: MatchMode) -> Self {
        let compiled = match mode {
            MatchMode::Regex => Regex::new(pattern).ok(),
            _ => None,
        };
        Self {
            pattern: pattern.to_string(),
            mode,
            case_sensitive: true,
            compiled,
        }
    }

    /// Regular expressions keep their text and match case-insensitively
    /// through `(?i)` instead.
    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        if self.mode == MatchMode::Regex {
            self.compiled = Regex::new(&format!("(?i){}", self.pattern)).ok();
        } else {
            self.pattern = self.pattern.to_lowercase();
        }
        self
    }

    /// Check a configuration pattern; only regular expressions can be
    /// malformed.
    pub fn validate(text: &str) -> Result<(), String> {
        let text = text.strip_prefix("i:").unwrap_or(text);
        match text.strip_prefix("re:") {
            Some(re) => Regex::new(re).map(|_| ()).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }

    /// Shorthand used in configuration files:
    ///
    /// * `db.query` matches exactly,
    /// * `*.query` matches any name ending in `.query`,
    /// * `req.*` matches any name starting with `req.`,
    /// * `*escape*` matches any name containing `escape`,
    /// * `re:^db\.(query|raw)$` is a regular expression,
    /// * a leading `i:` makes the match case-insensitive.
    pub fn parse(text: &str) -> Self {
        let (text, case_sensitive) = match text.strip_prefix("i:") {
            Some(rest) => (rest, false),
            None => (text, true),
        };
        if let Some(re) = text.strip_prefix("re:") {
            let pattern = Self::new(re, MatchMode::Regex);
            return if case_sensitive {
                pattern
            } else {
                pattern.ignore_case()
            };
        }
        let starts = text.starts_with('*') && text.len() > 1;
        let ends = text.ends_with('*') && text.len() > 1;
        let (mode, core) = match (starts, ends) {
            (true, true) => (MatchMode::Contains, &text[1..text.len() - 1]),
            (true, false) => (MatchMode::Suffix, &text[1..]),
            (false, true) => (MatchMode::Prefix, &text[..text.len() - 1]),
            (false, false) => (MatchMode::Exact, text),
        };
        let pattern = Self::new(core, mode);
        if case_sensitive {
            pattern
        } else {
            pattern.ignore_case()
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        if self.mode == MatchMode::Regex {
            // A malformed expression matches nothing.
            return self.compiled.as_ref().is_some_and(|re| re.is_match(name));
        }
        if self.case_sensitive {
            self.compare(name)
        } else {
            self.compare(&name.to_lowercase())
        }
    }

    fn compare(&self, name: &str) -> bool {
        let pattern = self.pattern.as_str();
        match self.mode {
            MatchMode::Exact => name == pattern,
            MatchMode::Suffix => name.ends_with(pattern),
            MatchMode::Prefix => name.starts_with(pattern),
            MatchMode::Contains => name.contains(pattern),
            MatchMode::Regex => false,
        }
    }
}

/// An ordered set of patterns; a name matches if any pattern does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameMatcher {
    patterns: Vec<NamePattern>,
}

impl NameMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact patterns, case-sensitive.
    pub fn exact(names: &[&str]) -> Self {
        Self {
            patterns: names.iter().map(|n| NamePattern::exact(n)).collect(),
        }
    }

    pub fn with(mut self, pattern: NamePattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn push(&mut self, pattern: NamePattern) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn extend_parsed<'a>(&mut self, texts: impl IntoIterator<Item = &'a String>) {
        for text in texts {
            self.push(NamePattern::parse(text));
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes() {
        assert!(NamePattern::exact("db.query").matches("db.query"));
        assert!(!NamePattern::exact("db.query").matches("mydb.query"));
        assert!(NamePattern::new(".query", MatchMode::Suffix).matches("pool.query"));
        assert!(NamePattern::new("req.", MatchMode::Prefix).matches("req.body"));
        assert!(NamePattern::new("escape", MatchMode::Contains).matches("html.escape_all"));
    }

    #[test]
    fn parse_shorthand() {
        assert_eq!(NamePattern::parse("*.execute").mode, MatchMode::Suffix);
        assert_eq!(NamePattern::parse("*.execute").pattern, ".execute");
        assert_eq!(NamePattern::parse("req.*").mode, MatchMode::Prefix);
        assert_eq!(NamePattern::parse("*sanitize*").mode, MatchMode::Contains);
        assert_eq!(NamePattern::parse("*").mode, MatchMode::Exact);

        let insensitive = NamePattern::parse("i:MD5");
        assert!(!insensitive.case_sensitive);
        assert!(insensitive.matches("md5"));
        assert!(insensitive.matches("Md5"));
    }

    #[test]
    fn regex_patterns() {
        let re = NamePattern::parse(r"re:^(db|pool)\.(query|raw)$");
        assert_eq!(re.mode, MatchMode::Regex);
        assert!(re.matches("pool.raw"));
        assert!(!re.matches("pool.rawQuery"));

        let insensitive = NamePattern::parse("i:re:^md[45]$");
        assert!(insensitive.matches("MD5"));
        assert!(NamePattern::validate("re:(unclosed").is_err());
        assert!(NamePattern::validate("*.query").is_ok());
    }

    #[test]
    fn deserialized_regex_keeps_case_folding() {
        let json = r#"[
            {"pattern": "^md[45]$", "mode": "regex", "case_sensitive": false},
            {"pattern": "SHA1", "case_sensitive": false}
        ]"#;
        let matcher: NameMatcher = serde_json::from_str(json).unwrap();
        assert!(matcher.matches("MD5"));
        assert!(matcher.matches("md4"));
        assert!(matcher.matches("sha1"));
        assert!(!matcher.matches("md55"));

        let round_trip: NameMatcher =
            serde_json::from_str(&serde_json::to_string(&matcher).unwrap()).unwrap();
        assert_eq!(round_trip, matcher);
        assert!(round_trip.matches("Md4"));
    }

    #[test]
    fn matcher_is_any_of() {
        let mut m = NameMatcher::exact(&["Math.random"]);
        m.push(NamePattern::parse("*.randomInt"));
        m.push(NamePattern::parse("*.randomInt"));
        assert_eq!(m.len(), 2);
        assert!(m.matches("Math.random"));
        assert!(m.matches("crypto.randomInt"));
        assert!(!m.matches("random"));
    }
}
