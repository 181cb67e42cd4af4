use std::sync::Arc;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_THREAT_DOMAINS: &[&str] = &[
    "phishing-example.com",
    "suspicious-bank.net",
    "fake-paypal.org",
    "malware-site.biz",
    "scam-lottery.info",
];

const BUILTIN_SUSPICIOUS_URL: &[&str] = &[
    // shorteners
    r"(?i)bit\.ly|tinyurl|t\.co",
    // urgency language
    r"(?i)urgent|act now|limited time|verify account",
    // brand impersonation
    r"(?i)paypal|amazon|microsoft|google",
    // calls to action
    r"(?i)click here|download now|free money",
];

const BUILTIN_SHORTENER: &str = r"(?i)bit\.ly|tinyurl|t\.co|short\.link";

const BUILTIN_SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf", ".info", ".biz"];

const BUILTIN_PHISHING_LANGUAGE: &str =
    r"(?i)verify.*account|suspended.*account|urgent.*action|click.*here.*immediately";

const BUILTIN_BRAND_IMPERSONATION: &str =
    r"(?i)paypal|amazon|microsoft|google|apple|netflix|spotify";

static BUILTIN_TABLES: Lazy<Arc<PatternTables>> = Lazy::new(|| {
    Arc::new(
        PatternTables::compile(&PatternSet::default())
            .expect("built-in pattern tables must compile"),
    )
});

/// Uncompiled pattern sources, as stored in `patterns.json` and `threat_domains.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSet {
    pub threat_domains: Vec<String>,
    pub suspicious_url: Vec<String>,
    pub shortener: String,
    pub suspicious_tlds: Vec<String>,
    pub phishing_language: String,
    pub brand_impersonation: String,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            threat_domains: to_owned(BUILTIN_THREAT_DOMAINS),
            suspicious_url: to_owned(BUILTIN_SUSPICIOUS_URL),
            shortener: BUILTIN_SHORTENER.to_string(),
            suspicious_tlds: to_owned(BUILTIN_SUSPICIOUS_TLDS),
            phishing_language: BUILTIN_PHISHING_LANGUAGE.to_string(),
            brand_impersonation: BUILTIN_BRAND_IMPERSONATION.to_string(),
        }
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Errors emitted while compiling pattern tables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternValidationError {
    #[error("table `{table}` must not be empty")]
    EmptyTable { table: &'static str },
    #[error("table `{table}` contains a blank entry at index {index}")]
    BlankEntry { table: &'static str, index: usize },
    #[error("table `{table}` has an invalid regex `{pattern}`: {reason}")]
    InvalidRegex {
        table: &'static str,
        pattern: String,
        reason: String,
    },
    #[error("suspicious TLD `{tld}` must start with '.'")]
    InvalidTld { tld: String },
    #[error("failed to build threat-domain matcher: {reason}")]
    Matcher { reason: String },
}

/// Immutable, compiled heuristic tables shared by both scorers.
#[derive(Debug)]
pub struct PatternTables {
    source: PatternSet,
    threat_matcher: AhoCorasick,
    suspicious_url: Vec<Regex>,
    shortener: Regex,
    suspicious_tlds: Vec<String>,
    phishing_language: Regex,
    brand_impersonation: Regex,
}

impl PatternTables {
    /// Reference tables compiled once per process.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN_TABLES)
    }

    /// Validate and compile a pattern set.
    pub fn compile(set: &PatternSet) -> Result<Self, PatternValidationError> {
        check_entries("threat_domains", &set.threat_domains)?;
        check_entries("suspicious_url", &set.suspicious_url)?;
        check_entries("suspicious_tlds", &set.suspicious_tlds)?;
        if let Some(tld) = set.suspicious_tlds.iter().find(|tld| !tld.starts_with('.')) {
            return Err(PatternValidationError::InvalidTld { tld: tld.clone() });
        }

        let threat_matcher = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(&set.threat_domains)
            .map_err(|err| PatternValidationError::Matcher {
                reason: err.to_string(),
            })?;
        let suspicious_url = set
            .suspicious_url
            .iter()
            .map(|pattern| compile_regex("suspicious_url", pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            threat_matcher,
            suspicious_url,
            shortener: compile_regex("shortener", &set.shortener)?,
            suspicious_tlds: set
                .suspicious_tlds
                .iter()
                .map(|tld| tld.to_ascii_lowercase())
                .collect(),
            phishing_language: compile_regex("phishing_language", &set.phishing_language)?,
            brand_impersonation: compile_regex("brand_impersonation", &set.brand_impersonation)?,
            source: set.clone(),
        })
    }

    /// Pattern sources these tables were compiled from.
    pub fn source(&self) -> &PatternSet {
        &self.source
    }

    /// Whether the domain contains any known-threat entry.
    pub fn is_known_threat(&self, domain: &str) -> bool {
        self.threat_matcher.is_match(domain)
    }

    /// Whether any suspicious URL pattern matches; evaluated as a single OR.
    pub fn has_suspicious_pattern(&self, url: &str) -> bool {
        self.suspicious_url.iter().any(|regex| regex.is_match(url))
    }

    pub fn is_shortened(&self, url: &str) -> bool {
        self.shortener.is_match(url)
    }

    /// Whether the domain ends with one of the abused top-level domains.
    pub fn has_suspicious_tld(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        self.suspicious_tlds.iter().any(|tld| domain.ends_with(tld))
    }

    pub fn has_phishing_language(&self, content: &str) -> bool {
        self.phishing_language.is_match(content)
    }

    pub fn mentions_brand(&self, content: &str) -> bool {
        self.brand_impersonation.is_match(content)
    }
}

fn check_entries(table: &'static str, entries: &[String]) -> Result<(), PatternValidationError> {
    if entries.is_empty() {
        return Err(PatternValidationError::EmptyTable { table });
    }
    if let Some(index) = entries.iter().position(|entry| entry.trim().is_empty()) {
        return Err(PatternValidationError::BlankEntry { table, index });
    }
    Ok(())
}

fn compile_regex(table: &'static str, pattern: &str) -> Result<Regex, PatternValidationError> {
    if pattern.trim().is_empty() {
        return Err(PatternValidationError::EmptyTable { table });
    }
    Regex::new(pattern).map_err(|err| PatternValidationError::InvalidRegex {
        table,
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_match_reference_entries() {
        let tables = PatternTables::builtin();
        assert!(tables.is_known_threat("login.phishing-example.com"));
        assert!(tables.is_known_threat("FAKE-PAYPAL.ORG"));
        assert!(!tables.is_known_threat("example.com"));

        assert!(tables.has_suspicious_pattern("https://bit.ly/abc"));
        assert!(tables.has_suspicious_pattern("https://site.test/urgent-offer"));
        assert!(tables.has_suspicious_pattern("https://paypal-login.test"));
        assert!(!tables.has_suspicious_pattern("https://example.com"));

        assert!(tables.is_shortened("https://short.link/x"));
        assert!(!tables.is_shortened("https://example.com"));
    }

    #[test]
    fn tld_check_is_suffix_based() {
        let tables = PatternTables::builtin();
        assert!(tables.has_suspicious_tld("free-prizes.TK"));
        assert!(tables.has_suspicious_tld("scam-lottery.info"));
        assert!(!tables.has_suspicious_tld("www.garage.com"));
        assert!(!tables.has_suspicious_tld("info.example.org"));
    }

    #[test]
    fn document_patterns_are_case_insensitive() {
        let tables = PatternTables::builtin();
        assert!(tables.has_phishing_language("Please VERIFY your ACCOUNT"));
        assert!(tables.has_phishing_language("click here to respond immediately"));
        assert!(!tables.has_phishing_language("quarterly account summary"));
        assert!(tables.mentions_brand("Your Netflix subscription"));
    }

    #[test]
    fn rejects_invalid_regex() {
        let set = PatternSet {
            shortener: "(unclosed".into(),
            ..PatternSet::default()
        };
        let err = PatternTables::compile(&set).expect_err("invalid regex should fail");
        assert!(matches!(
            err,
            PatternValidationError::InvalidRegex { table: "shortener", .. }
        ));
    }

    #[test]
    fn rejects_blank_entries_and_bad_tlds() {
        let set = PatternSet {
            threat_domains: vec!["evil.test".into(), "  ".into()],
            ..PatternSet::default()
        };
        assert_eq!(
            PatternTables::compile(&set).unwrap_err(),
            PatternValidationError::BlankEntry {
                table: "threat_domains",
                index: 1
            }
        );

        let set = PatternSet {
            suspicious_tlds: vec!["zip".into()],
            ..PatternSet::default()
        };
        assert!(matches!(
            PatternTables::compile(&set).unwrap_err(),
            PatternValidationError::InvalidTld { tld } if tld == "zip"
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let set: PatternSet =
            serde_json::from_str(r#"{ "suspicious_tlds": [".zip"] }"#).unwrap();
        assert_eq!(set.suspicious_tlds, vec![".zip".to_string()]);
        assert_eq!(set.shortener, BUILTIN_SHORTENER);
        let tables = PatternTables::compile(&set).unwrap();
        assert!(tables.has_suspicious_tld("download.zip"));
        assert!(!tables.has_suspicious_tld("scam.tk"));
    }
}
