//! Pattern matching for prompt and response detection.

use std::fmt;

use regex::bytes::Regex;

/// Default shell prompt: one of `$ % # >` followed by a single space at the
/// very end of the output.
pub const DEFAULT_PROMPT: &str = r"[$%#>] \z";

/// Compile the default prompt pattern.
pub fn default_prompt() -> Regex {
    Regex::new(DEFAULT_PROMPT).expect("default prompt pattern is valid")
}

/// What a `waitfor` call is looking for.
///
/// Both variants are evaluated against the whole text accumulated so far,
/// so matches spanning several reads are found.
#[derive(Clone)]
pub enum Pattern {
    /// A regular expression.
    Regex(Regex),

    /// A literal string, matched as an exact substring.
    Literal(String),
}

impl Pattern {
    /// Compile a regular expression pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Create a literal pattern. Regex metacharacters in `text` have no
    /// special meaning.
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Compile this pattern into a regex.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        match self {
            Pattern::Regex(re) => Ok(re.clone()),
            Pattern::Literal(text) => Regex::new(&regex::escape(text)),
        }
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Pattern::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt() {
        let prompt = default_prompt();
        assert!(prompt.is_match(b"user@host:~$ "));
        assert!(prompt.is_match(b"root@host:~# "));
        assert!(prompt.is_match(b"csh% "));
        assert!(prompt.is_match(b"switch> "));
        assert!(!prompt.is_match(b"user@host:~$"));
        assert!(!prompt.is_match(b"$ \nstill running"));
    }

    #[test]
    fn test_literal_is_escaped() {
        let re = Pattern::literal("cost: $5.00 (approx)").compile().unwrap();
        assert!(re.is_match(b"total cost: $5.00 (approx) today"));
        assert!(!re.is_match(b"total cost: $5X00 (approx)"));
    }

    #[test]
    fn test_regex_pattern() {
        let re = Pattern::regex(r"(?m)^\S+>\s.*$").unwrap().compile().unwrap();
        assert!(re.is_match(b"alerts: none\nsan01> "));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Pattern::regex(r"([unclosed").is_err());
    }
}
