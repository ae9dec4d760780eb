//! Content filter applied to every file crossing from the private to the public
//! repository.
//!
//! This is a best-effort static redaction pass, not a security boundary. It
//! only recognises a handful of fixed shapes on a single line: a secret split
//! across lines, encoded, concatenated at runtime, or assigned with a keyword
//! it does not know passes through untouched.

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

const CREDENTIAL_KEYWORDS: [&str; 4] = ["password", "api_key", "secret", "token"];

/// Passes allowed for the text to settle; replacements can expose new matches.
const MAX_PASSES: usize = 8;

/// Tunables for [`ContentFilter`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterSettings {
    /// Replacement for every match.
    pub redaction: String,
    /// Internal project codename.
    pub codename: String,
    /// Internal path fragment.
    pub path_fragment: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            redaction: "[FILTERED]".to_string(),
            codename: ".covid".to_string(),
            path_fragment: "/covid-gleaned/".to_string(),
        }
    }
}

/// Ordered pattern -> redaction rules.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    rules: Vec<Regex>,
    redaction: String,
}

impl ContentFilter {
    pub fn new(settings: &FilterSettings) -> Result<Self, regex::Error> {
        let mut rules = Vec::new();
        for keyword in CREDENTIAL_KEYWORDS {
            // Quoted value up to the closing quote, or to end of line if unterminated.
            rules.push(Regex::new(&format!(
                r#"(?i){keyword}\s*=\s*(?:"[^"\n]*"?|'[^'\n]*'?)"#
            ))?);
        }
        for literal in [&settings.codename, &settings.path_fragment] {
            if !literal.is_empty() {
                rules.push(Regex::new(&regex::escape(literal))?);
            }
        }
        rules.push(Regex::new(r"(?i)private.*repo")?);

        Ok(Self {
            rules,
            redaction: settings.redaction.clone(),
        })
    }

    /// Redact every rule match in `text`.
    ///
    /// Rules are re-applied until a pass changes nothing, and only such a fixed
    /// point is returned. Text that has not settled after `MAX_PASSES` is
    /// replaced by the redaction token as a whole. Total, and idempotent as long
    /// as the redaction token is stable under the rules (config validation
    /// rejects unstable tokens).
    pub fn filter(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.apply_rules(&current);
            if next == current {
                return current;
            }
            current = next;
        }
        self.redaction.clone()
    }

    /// True if the redaction token itself would be rewritten by the rules.
    pub fn redaction_is_unstable(&self) -> bool {
        self.apply_rules(&self.redaction) != self.redaction
    }

    fn apply_rules(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            if rule.is_match(&out) {
                out = rule
                    .replace_all(&out, NoExpand(&self.redaction))
                    .into_owned();
            }
        }
        out
    }
}

/// Replace every occurrence of `secret` in `text` with `***`.
///
/// Used on error text from commands whose arguments embed a credential.
pub fn scrub_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "***")
}
