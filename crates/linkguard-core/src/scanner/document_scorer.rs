use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::{DetectionOutcome, Evidence, PatternTables, TechnicalDetails, NOT_APPLICABLE};

const EXCESSIVE_SCRIPT_WEIGHT: u32 = 20;
const IFRAME_WEIGHT: u32 = 30;
const INSECURE_FORM_WEIGHT: u32 = 25;
const PHISHING_LANGUAGE_WEIGHT: u32 = 35;
const BRAND_WEIGHT: u32 = 15;

/// Script blocks beyond this count are considered excessive.
const MAX_SCRIPT_BLOCKS: usize = 5;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script.*?>.*?</script>").expect("script regex"));
static SCRIPT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<script").expect("script regex"));
static IFRAME_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<iframe").expect("iframe regex"));
static FORM_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)action\s*=\s*["']([^"']+)["']"#).expect("form action regex")
});
static SECURE_ACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)action.*https").expect("secure action regex"));

/// Runs the ordered content heuristics against an HTML or email document.
pub struct DocumentScorer<'a> {
    tables: &'a PatternTables,
}

impl<'a> DocumentScorer<'a> {
    pub fn new(tables: &'a PatternTables) -> Self {
        Self { tables }
    }

    /// Collect evidence for the document text. Total over any input.
    pub fn evaluate(&self, content: &str) -> Evidence {
        let mut evidence = Evidence::new(content_details(content));

        let scripts = SCRIPT_BLOCK.find_iter(content).count();
        if scripts > MAX_SCRIPT_BLOCKS {
            evidence.raise(
                EXCESSIVE_SCRIPT_WEIGHT,
                format!("Contains {scripts} script tags (potentially excessive)"),
            );
        }

        if IFRAME_OPEN.is_match(content) {
            evidence.raise(
                IFRAME_WEIGHT,
                "Contains embedded iframes (potential malware injection)",
            );
        }

        for action in insecure_form_actions(content) {
            trace!(action, "form submits to insecure endpoint");
            evidence.raise(INSECURE_FORM_WEIGHT, "Form submits to insecure endpoint");
        }

        if self.tables.has_phishing_language(content) {
            evidence.raise(
                PHISHING_LANGUAGE_WEIGHT,
                "Contains typical phishing language patterns",
            );
        }

        if self.tables.mentions_brand(content) {
            evidence.raise(BRAND_WEIGHT, "Potentially impersonating well-known brands");
        }

        if evidence.raw_score == 0 {
            evidence.note("No obvious malicious patterns detected");
            evidence.note("Content appears to follow standard practices");
        }

        let score = evidence.raw_score;
        evidence.record("Content Analysis", DetectionOutcome::fail_if(score > 30));
        evidence.record("Script Inspection", DetectionOutcome::warn_if(score > 20));
        evidence.record("Phishing Detection", DetectionOutcome::fail_if(score > 40));

        debug!(
            content_len = content.len(),
            scripts,
            raw_score = score,
            "document heuristics evaluated"
        );
        evidence
    }
}

/// Form action values that do not start with `https:`, one entry per occurrence.
fn insecure_form_actions(content: &str) -> impl Iterator<Item = &str> {
    FORM_ACTION
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|value| value.as_str())
        .filter(|value| {
            !value
                .get(..6)
                .map(|scheme| scheme.eq_ignore_ascii_case("https:"))
                .unwrap_or(false)
        })
}

/// Content-derived details, recomputed from the raw text rather than the scoring pass.
fn content_details(content: &str) -> TechnicalDetails {
    let found = |hit: bool| (if hit { "Found" } else { "None" }).to_string();
    TechnicalDetails {
        domain_age: "N/A (File Analysis)".into(),
        ssl_status: NOT_APPLICABLE.into(),
        reputation: "File-based scan".into(),
        suspicious_scripts: found(SCRIPT_OPEN.is_match(content)),
        hidden_iframes: found(IFRAME_OPEN.is_match(content)),
        form_security: if SECURE_ACTION.is_match(content) {
            "Secure"
        } else {
            "Unsecured"
        }
        .into(),
        ip_location: NOT_APPLICABLE.into(),
        redirects: NOT_APPLICABLE.into(),
        response_time: NOT_APPLICABLE.into(),
    }
}
