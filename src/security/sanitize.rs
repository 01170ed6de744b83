//! Prompt sanitization and content policy.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{SecurityConfig, TermMatch};
use crate::security::error::{SecurityError, SecurityErrorCode};

static PROTOCOL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(javascript|data|vbscript):").expect("protocol regex is valid")
});

static EVENT_HANDLER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on\w+\s*=").expect("event handler regex is valid"));

/// Decides whether text contains a forbidden term.
pub trait ContentPolicy: Send + Sync {
    /// The first forbidden term found in `text`, if any.
    fn find_violation(&self, text: &str) -> Option<String>;
}

/// Case-insensitive substring match against a denylist.
#[derive(Debug, Clone, Default)]
pub struct SubstringDenylist {
    terms: Vec<(String, String)>,
}

impl SubstringDenylist {
    pub fn new(terms: &[String]) -> Self {
        Self {
            terms: lowercase_terms(terms),
        }
    }
}

impl ContentPolicy for SubstringDenylist {
    fn find_violation(&self, text: &str) -> Option<String> {
        let haystack = text.to_lowercase();
        self.terms
            .iter()
            .find(|(needle, _)| haystack.contains(needle.as_str()))
            .map(|(_, term)| term.clone())
    }
}

/// Case-insensitive match on whole words, so "class" does not trip "ass".
#[derive(Debug, Clone, Default)]
pub struct WordBoundaryDenylist {
    terms: Vec<(Regex, String)>,
}

impl WordBoundaryDenylist {
    pub fn new(terms: &[String]) -> Self {
        let terms = terms
            .iter()
            .filter(|term| !term.trim().is_empty())
            .filter_map(|term| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(term.trim()));
                Regex::new(&pattern).ok().map(|re| (re, term.clone()))
            })
            .collect();
        Self { terms }
    }
}

impl ContentPolicy for WordBoundaryDenylist {
    fn find_violation(&self, text: &str) -> Option<String> {
        self.terms
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, term)| term.clone())
    }
}

fn lowercase_terms(terms: &[String]) -> Vec<(String, String)> {
    terms
        .iter()
        .filter(|term| !term.trim().is_empty())
        .map(|term| (term.trim().to_lowercase(), term.clone()))
        .collect()
}

/// Cleans user prompts before they reach the generation backend.
pub struct PromptSanitizer {
    max_chars: usize,
    policy: Box<dyn ContentPolicy>,
}

impl PromptSanitizer {
    pub fn new(max_chars: usize, policy: Box<dyn ContentPolicy>) -> Self {
        Self { max_chars, policy }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        let policy: Box<dyn ContentPolicy> = match config.term_match {
            TermMatch::Substring => Box::new(SubstringDenylist::new(&config.sensitive_terms)),
            TermMatch::WordBoundary => Box::new(WordBoundaryDenylist::new(&config.sensitive_terms)),
        };
        Self::new(config.max_prompt_chars, policy)
    }

    /// Trim, strip markup and script vectors, truncate, then apply the
    /// content policy.
    pub fn sanitize(&self, text: &str) -> Result<String, SecurityError> {
        let stripped: String = text.trim().chars().filter(|c| !matches!(c, '<' | '>')).collect();
        let stripped = strip_script_vectors(stripped);
        let cleaned: String = stripped.trim().chars().take(self.max_chars).collect();

        if cleaned.is_empty() {
            return Err(SecurityError::new(
                SecurityErrorCode::InvalidPrompt,
                "Prompt is empty after sanitization",
            ));
        }

        if let Some(term) = self.policy.find_violation(&cleaned) {
            tracing::info!(term = %term, "Prompt rejected by content policy");
            return Err(SecurityError::new(
                SecurityErrorCode::SensitiveContent,
                format!("Prompt contains a forbidden term: {}", term),
            ));
        }

        Ok(cleaned)
    }
}

/// Remove protocol and event-handler patterns until none remain, so a
/// removal cannot splice a new match together.
fn strip_script_vectors(mut text: String) -> String {
    loop {
        let pass = PROTOCOL_REGEX.replace_all(&text, "");
        let pass = EVENT_HANDLER_REGEX.replace_all(&pass, "").into_owned();
        if pass == text {
            return text;
        }
        text = pass;
    }
}

impl std::fmt::Debug for PromptSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptSanitizer")
            .field("max_chars", &self.max_chars)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer(terms: &[&str]) -> PromptSanitizer {
        let terms: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
        PromptSanitizer::new(2000, Box::new(SubstringDenylist::new(&terms)))
    }

    #[test]
    fn test_strips_markup_and_vectors() {
        let out = sanitizer(&[])
            .sanitize("  <script>alert(1)</script> JavaScript:run() img onerror = x data:text  ")
            .unwrap();
        assert_eq!(out, "scriptalert(1)/script run() img  x text");
    }

    #[test]
    fn test_nested_vectors_fully_removed() {
        let sanitizer = sanitizer(&[]);
        assert_eq!(
            sanitizer.sanitize("click jajavascript:vascript:alert(1)").unwrap(),
            "click alert(1)"
        );
        assert_eq!(
            sanitizer.sanitize("img oonerror=nerror=alert(1)").unwrap(),
            "img alert(1)"
        );
        assert_eq!(
            sanitizer.sanitize("a javonload=ascript:b").unwrap(),
            "a b"
        );
    }

    #[test]
    fn test_truncates_by_chars() {
        let long = "猫".repeat(2500);
        let out = sanitizer(&[]).sanitize(&long).unwrap();
        assert_eq!(out.chars().count(), 2000);
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let err = sanitizer(&[]).sanitize("   <>  ").unwrap_err();
        assert_eq!(err.code, SecurityErrorCode::InvalidPrompt);
    }

    #[test]
    fn test_denylist_case_insensitive() {
        let err = sanitizer(&["Forbidden"]).sanitize("a FORBIDDEN thing").unwrap_err();
        assert_eq!(err.code, SecurityErrorCode::SensitiveContent);
        assert!(err.details.contains("Forbidden"));
    }

    #[test]
    fn test_word_boundary_policy() {
        let policy = WordBoundaryDenylist::new(&["ass".to_string()]);
        assert!(policy.find_violation("a first class pass").is_none());
        assert_eq!(policy.find_violation("you ASS").as_deref(), Some("ass"));

        let substring = SubstringDenylist::new(&["ass".to_string()]);
        assert!(substring.find_violation("a first class pass").is_some());
    }

    #[test]
    fn test_from_config() {
        let config = SecurityConfig {
            max_prompt_chars: 5,
            sensitive_terms: vec!["bad".into()],
            term_match: TermMatch::WordBoundary,
            ..SecurityConfig::default()
        };
        let sanitizer = PromptSanitizer::from_config(&config);
        assert_eq!(sanitizer.sanitize("abcdefgh").unwrap(), "abcde");
        assert!(sanitizer.sanitize("bad apple").is_err());
    }
}
