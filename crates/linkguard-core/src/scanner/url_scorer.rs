use tracing::{debug, trace};
use url::Url;

use super::{DetectionOutcome, Evidence, PatternTables, TechnicalDetails, NOT_APPLICABLE};
use crate::signals::{DomainAge, ProviderError, SignalProvider};

const BLACKLIST_WEIGHT: u32 = 80;
const SUSPICIOUS_PATTERN_WEIGHT: u32 = 30;
const INSECURE_TRANSPORT_WEIGHT: u32 = 25;
const NEW_DOMAIN_WEIGHT: u32 = 20;
const SHORTENER_WEIGHT: u32 = 15;
const SUSPICIOUS_TLD_WEIGHT: u32 = 10;

/// Running score above which "Heuristic Analysis" fails.
const HEURISTIC_FAIL_ABOVE: u32 = 30;
/// Score above which a URL's reputation is reported as poor.
const POOR_REPUTATION_ABOVE: u32 = 50;

/// Runs the ordered URL heuristics against a single URL.
pub struct UrlScorer<'a> {
    tables: &'a PatternTables,
    signals: &'a dyn SignalProvider,
}

impl<'a> UrlScorer<'a> {
    pub fn new(tables: &'a PatternTables, signals: &'a dyn SignalProvider) -> Self {
        Self { tables, signals }
    }

    /// Collect evidence for `url`. Only provider failures are surfaced as errors.
    pub fn evaluate(&self, url: &str) -> Result<Evidence, ProviderError> {
        let domain = extract_domain(url);
        let mut evidence = Evidence::new(TechnicalDetails {
            domain_age: NOT_APPLICABLE.into(),
            ssl_status: NOT_APPLICABLE.into(),
            reputation: NOT_APPLICABLE.into(),
            suspicious_scripts: NOT_APPLICABLE.into(),
            hidden_iframes: NOT_APPLICABLE.into(),
            form_security: NOT_APPLICABLE.into(),
            ip_location: NOT_APPLICABLE.into(),
            redirects: NOT_APPLICABLE.into(),
            response_time: NOT_APPLICABLE.into(),
        });

        let known_threat = self.tables.is_known_threat(&domain);
        if known_threat {
            trace!(%domain, "domain matched threat list");
            evidence.raise(BLACKLIST_WEIGHT, "Domain found in threat database");
        }
        evidence.record("Blacklist Check", DetectionOutcome::fail_if(known_threat));

        if self.tables.has_suspicious_pattern(url) {
            evidence.raise(
                SUSPICIOUS_PATTERN_WEIGHT,
                "Contains suspicious keywords or patterns",
            );
        }

        let https = has_https_scheme(url);
        if https {
            evidence.note("Uses secure HTTPS protocol");
        } else {
            evidence.raise(INSECURE_TRANSPORT_WEIGHT, "Uses insecure HTTP protocol");
        }
        evidence.record("SSL/TLS Check", DetectionOutcome::fail_if(!https));

        let age = self.signals.domain_age(&domain)?;
        match age {
            DomainAge::New => evidence.raise(NEW_DOMAIN_WEIGHT, "Domain registered recently"),
            DomainAge::Established => evidence.note("Domain has established history"),
        }

        // Shorteners may already have raised the combined pattern check above.
        if self.tables.is_shortened(url) {
            evidence.raise(SHORTENER_WEIGHT, "Uses URL shortening service");
        }

        if self.tables.has_suspicious_tld(&domain) {
            evidence.raise(
                SUSPICIOUS_TLD_WEIGHT,
                "Uses potentially suspicious top-level domain",
            );
        }

        evidence.record(
            "Heuristic Analysis",
            DetectionOutcome::fail_if(evidence.raw_score > HEURISTIC_FAIL_ABOVE),
        );
        evidence.record(
            "ML Anomaly Detection",
            DetectionOutcome::warn_if(self.signals.ml_anomaly(url)?),
        );

        let enrichment = self.signals.enrichment(&domain)?;
        if enrichment.whois_valid {
            evidence.note("Domain has valid WHOIS information");
        }
        if enrichment.no_redirects {
            evidence.note("No suspicious redirects detected");
        }

        let telemetry = self.signals.telemetry(url)?;
        evidence.technical_details = TechnicalDetails {
            domain_age: age.label().into(),
            ssl_status: if https { "Valid" } else { "Missing/Invalid" }.into(),
            reputation: if evidence.raw_score > POOR_REPUTATION_ABOVE {
                "Poor"
            } else {
                "Good"
            }
            .into(),
            suspicious_scripts: if telemetry.suspicious_scripts {
                "Detected"
            } else {
                "None"
            }
            .into(),
            hidden_iframes: if telemetry.hidden_iframes { "Found" } else { "None" }.into(),
            form_security: if telemetry.form_secure {
                "Secure"
            } else {
                "Unsecured"
            }
            .into(),
            ip_location: telemetry.ip_location,
            redirects: telemetry.redirects.to_string(),
            response_time: format!("{}ms", telemetry.response_time_ms),
        };

        debug!(
            %domain,
            raw_score = evidence.raw_score,
            factors = evidence.risk_factors.len(),
            "url heuristics evaluated"
        );
        Ok(evidence)
    }
}

/// Hostname of `url`, or the raw input when it does not parse as an absolute URL with a host.
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_string(),
            None => {
                debug!(url, "url has no host; scoring raw input as domain");
                url.to_string()
            }
        },
        Err(err) => {
            debug!(url, error = %err, "malformed url; scoring raw input as domain");
            url.to_string()
        }
    }
}

fn has_https_scheme(url: &str) -> bool {
    url.get(..8)
        .map(|prefix| prefix.eq_ignore_ascii_case("https://"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::DetectionMethod;
    use crate::signals::{Enrichment, FixedSignals};

    fn evaluate(url: &str, signals: &FixedSignals) -> Evidence {
        let tables = PatternTables::builtin();
        UrlScorer::new(&tables, signals).evaluate(url).unwrap()
    }

    fn outcome(evidence: &Evidence, name: &str) -> DetectionOutcome {
        evidence
            .detection_methods
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.outcome)
            .unwrap_or_else(|| panic!("missing detection method {name}"))
    }

    #[test]
    fn extracts_hostname_or_falls_back() {
        assert_eq!(extract_domain("https://Login.Example.com/path?q=1"), "login.example.com");
        assert_eq!(extract_domain("example.com/login"), "example.com/login");
        assert_eq!(extract_domain("not a url"), "not a url");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn https_prefix_is_case_insensitive() {
        assert!(has_https_scheme("HTTPS://example.com"));
        assert!(!has_https_scheme("http://example.com"));
        assert!(!has_https_scheme("https:/"));
        assert!(!has_https_scheme("ftp://ü.example"));
    }

    #[test]
    fn blacklisted_http_url_accumulates_past_one_hundred() {
        let evidence = evaluate("http://phishing-example.com/login", &FixedSignals::default());
        assert_eq!(evidence.raw_score, 105);
        assert_eq!(
            evidence.risk_factors,
            vec!["Domain found in threat database", "Uses insecure HTTP protocol"]
        );
        assert_eq!(outcome(&evidence, "Blacklist Check"), DetectionOutcome::Fail);
        assert_eq!(outcome(&evidence, "SSL/TLS Check"), DetectionOutcome::Fail);
        assert_eq!(outcome(&evidence, "Heuristic Analysis"), DetectionOutcome::Fail);
        assert_eq!(evidence.technical_details.reputation, "Poor");
        assert_eq!(evidence.technical_details.ssl_status, "Missing/Invalid");
    }

    #[test]
    fn clean_https_url_with_quiet_signals_scores_zero() {
        let evidence = evaluate("https://example.com", &FixedSignals::default());
        assert_eq!(evidence.raw_score, 0);
        assert!(evidence.risk_factors.is_empty());
        assert_eq!(
            evidence.security_features,
            vec!["Uses secure HTTPS protocol", "Domain has established history"]
        );
        assert_eq!(
            evidence.detection_methods,
            vec![
                DetectionMethod::new("Blacklist Check", DetectionOutcome::Pass),
                DetectionMethod::new("SSL/TLS Check", DetectionOutcome::Pass),
                DetectionMethod::new("Heuristic Analysis", DetectionOutcome::Pass),
                DetectionMethod::new("ML Anomaly Detection", DetectionOutcome::Pass),
            ]
        );
        assert_eq!(evidence.technical_details.domain_age, "Established (> 1 year)");
        assert_eq!(evidence.technical_details.response_time, "100ms");
    }

    #[test]
    fn shortener_is_counted_twice() {
        let evidence = evaluate("https://bit.ly/3xYz", &FixedSignals::default());
        assert_eq!(evidence.raw_score, 45);
        assert_eq!(
            evidence.risk_factors,
            vec![
                "Contains suspicious keywords or patterns",
                "Uses URL shortening service"
            ]
        );
        assert_eq!(outcome(&evidence, "Heuristic Analysis"), DetectionOutcome::Fail);
    }

    #[test]
    fn provider_signals_shape_features_and_methods() {
        let signals = FixedSignals {
            domain_age: DomainAge::New,
            ml_anomaly: true,
            enrichment: Enrichment {
                whois_valid: true,
                no_redirects: true,
            },
            ..FixedSignals::default()
        };
        let evidence = evaluate("https://prizes.tk/claim", &signals);
        assert_eq!(evidence.raw_score, 30);
        assert_eq!(
            evidence.risk_factors,
            vec![
                "Domain registered recently",
                "Uses potentially suspicious top-level domain"
            ]
        );
        assert_eq!(
            evidence.security_features,
            vec![
                "Uses secure HTTPS protocol",
                "Domain has valid WHOIS information",
                "No suspicious redirects detected"
            ]
        );
        assert_eq!(outcome(&evidence, "Heuristic Analysis"), DetectionOutcome::Pass);
        assert_eq!(outcome(&evidence, "ML Anomaly Detection"), DetectionOutcome::Warning);
        assert_eq!(evidence.technical_details.domain_age, "New (< 30 days)");
    }

    #[test]
    fn malformed_input_degrades_instead_of_failing() {
        let evidence = evaluate("%%% not a url %%%", &FixedSignals::default());
        assert_eq!(evidence.raw_score, 25);
        assert_eq!(evidence.risk_factors, vec!["Uses insecure HTTP protocol"]);
    }

    #[test]
    fn hostless_url_is_matched_on_its_raw_text() {
        let url = "mailto:x@phishing-example.com";
        assert_eq!(extract_domain(url), url);
        assert_eq!(extract_domain("data:text/html,hi"), "data:text/html,hi");

        let evidence = evaluate(url, &FixedSignals::default());
        assert_eq!(outcome(&evidence, "Blacklist Check"), DetectionOutcome::Fail);
        assert_eq!(
            evidence.risk_factors,
            vec!["Domain found in threat database", "Uses insecure HTTP protocol"]
        );
        assert_eq!(evidence.raw_score, 105);
    }
}
