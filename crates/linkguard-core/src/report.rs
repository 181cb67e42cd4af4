use std::{fmt::Write, time::Duration};

use anyhow::Context;

use crate::scanner::{ThreatVerdict, NOT_APPLICABLE};

const REPORT_TITLE: &str = "LinkGuardian - Threat Analysis Report";
const WRAP_WIDTH: usize = 88;

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a `ThreatVerdict` using the desired format.
pub fn render_report(verdict: &ThreatVerdict, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => Ok(render_human(verdict)?.join("\n") + "\n"),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(verdict)?),
    }
}

/// Parse a JSON export back into a verdict, rejecting inconsistent scores or categories.
pub fn parse_json_report(raw: &str) -> anyhow::Result<ThreatVerdict> {
    let verdict: ThreatVerdict =
        serde_json::from_str(raw).context("report is not a valid verdict document")?;
    verdict
        .validate()
        .context("report violates verdict invariants")?;
    Ok(verdict)
}

/// Split the human report into pages of at most `lines_per_page` body lines.
///
/// Sections are kept whole when they fit on a fresh page; a section longer than
/// a page flows across page breaks. Every page ends with a `Page i of n` footer.
pub fn render_pages(verdict: &ThreatVerdict, lines_per_page: usize) -> anyhow::Result<Vec<String>> {
    anyhow::ensure!(lines_per_page > 0, "lines_per_page must be greater than zero");
    let mut pages: Vec<Vec<String>> = vec![Vec::new()];
    for section in sections(verdict)? {
        let current = pages.last().map(Vec::len).unwrap_or(0);
        if current > 0 && current + section.len() > lines_per_page {
            pages.push(Vec::new());
        }
        for line in section {
            if pages.last().map(Vec::len).unwrap_or(0) >= lines_per_page {
                pages.push(Vec::new());
            }
            if let Some(page) = pages.last_mut() {
                page.push(line);
            }
        }
    }

    let total = pages.len();
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(idx, mut lines)| {
            lines.push(String::new());
            lines.push(format!(
                "Generated by LinkGuardian - Page {} of {}",
                idx + 1,
                total
            ));
            lines.join("\n") + "\n"
        })
        .collect())
}

fn render_human(verdict: &ThreatVerdict) -> anyhow::Result<Vec<String>> {
    Ok(sections(verdict)?.into_iter().flatten().collect())
}

/// Report sections in their fixed order: header, score, detection summary,
/// narrative, risk factors, security features, technical analysis.
fn sections(verdict: &ThreatVerdict) -> anyhow::Result<Vec<Vec<String>>> {
    let mut out = Vec::new();

    out.push(vec![
        REPORT_TITLE.to_string(),
        "=".repeat(REPORT_TITLE.len()),
        String::new(),
    ]);

    let mut score = String::new();
    write!(
        score,
        "Threat Score: {}/100 • Risk Category: {} RISK",
        verdict.threat_score, verdict.risk_category
    )?;
    out.push(vec![score, String::new()]);

    let processing = humantime::format_duration(Duration::from_millis(verdict.processing_time_ms));
    let mut summary = vec![
        "Detection Summary".to_string(),
        format!("  Target: {}", verdict.subject),
        format!(
            "  Scan Date: {}",
            verdict.scan_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        format!("  Processing Time: {processing}"),
        format!("  Recommendation: {}", verdict.recommendation),
    ];
    for method in &verdict.detection_methods {
        summary.push(format!(
            "  - {name:<24} {outcome}",
            name = method.name,
            outcome = method.outcome.as_str()
        ));
    }
    summary.push(String::new());
    out.push(summary);

    let mut narrative = vec!["Security Analysis".to_string()];
    narrative.extend(wrap(&verdict.narrative, WRAP_WIDTH).into_iter().map(|l| format!("  {l}")));
    narrative.push(String::new());
    out.push(narrative);

    out.push(bullet_section(
        "Risk Factors Found",
        &verdict.risk_factors,
        "No risk factors detected.",
    ));
    out.push(bullet_section(
        "Security Features",
        &verdict.security_features,
        "No security features recorded.",
    ));

    let details = &verdict.technical_details;
    let mut technical = vec!["Technical Analysis".to_string()];
    for (group, rows) in [
        (
            "Domain Analysis",
            [
                ("Domain Age", &details.domain_age),
                ("SSL Status", &details.ssl_status),
                ("Reputation", &details.reputation),
            ],
        ),
        (
            "Content Analysis",
            [
                ("Suspicious Scripts", &details.suspicious_scripts),
                ("Hidden iFrames", &details.hidden_iframes),
                ("Form Security", &details.form_security),
            ],
        ),
        (
            "Network Information",
            [
                ("IP Location", &details.ip_location),
                ("Redirects", &details.redirects),
                ("Response Time", &details.response_time),
            ],
        ),
    ] {
        technical.push(format!("  {group}"));
        for (label, value) in rows {
            let value = if value.is_empty() {
                NOT_APPLICABLE
            } else {
                value.as_str()
            };
            technical.push(format!("    {label}: {value}"));
        }
    }
    out.push(technical);

    Ok(out)
}

fn bullet_section(title: &str, items: &[String], empty: &str) -> Vec<String> {
    let mut lines = vec![title.to_string()];
    if items.is_empty() {
        lines.push(format!("  {empty}"));
    }
    for item in items {
        let mut wrapped = wrap(&sanitize(item), WRAP_WIDTH - 4).into_iter();
        if let Some(first) = wrapped.next() {
            lines.push(format!("  • {first}"));
        }
        lines.extend(wrapped.map(|l| format!("    {l}")));
    }
    lines.push(String::new());
    lines
}

fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

/// Greedy word wrap on whitespace; words longer than `width` are kept intact.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{DetectionMethod, DetectionOutcome, TechnicalDetails};
    use crate::verdict::{RiskCategory, SubjectKind};
    use chrono::{TimeZone, Utc};

    fn sample_verdict() -> ThreatVerdict {
        ThreatVerdict {
            subject: "http://phishing-example.com/login".into(),
            subject_kind: SubjectKind::Url,
            threat_score: 100,
            risk_category: RiskCategory::Critical,
            recommendation: RiskCategory::Critical
                .recommendation(SubjectKind::Url)
                .to_string(),
            scan_timestamp: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
            processing_time_ms: 1500,
            narrative: "WARNING: this site shows clear signs of being designed for malicious purposes such as credential theft, malware distribution, or financial fraud.".into(),
            risk_factors: vec![
                "Domain found in threat database".into(),
                "Uses insecure HTTP protocol".into(),
            ],
            security_features: vec!["Domain has established history".into()],
            detection_methods: vec![
                DetectionMethod::new("Blacklist Check", DetectionOutcome::Fail),
                DetectionMethod::new("SSL/TLS Check", DetectionOutcome::Fail),
            ],
            technical_details: TechnicalDetails {
                domain_age: "Established (> 1 year)".into(),
                ssl_status: "Missing/Invalid".into(),
                reputation: "Poor".into(),
                suspicious_scripts: "None".into(),
                hidden_iframes: "Found".into(),
                form_security: "Unsecured".into(),
                ip_location: "Russia".into(),
                redirects: "1".into(),
                response_time: "".into(),
            },
        }
    }

    #[test]
    fn human_report_follows_section_order() {
        let output = render_report(&sample_verdict(), OutputFormat::Human).unwrap();
        let order = [
            REPORT_TITLE,
            "Threat Score: 100/100",
            "Detection Summary",
            "Security Analysis",
            "Risk Factors Found",
            "Security Features",
            "Technical Analysis",
        ];
        let positions: Vec<_> = order
            .iter()
            .map(|needle| output.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(output.contains("CRITICAL RISK"));
        assert!(output.contains("Processing Time: 1s 500ms"));
        assert!(output.contains("Scan Date: 2024-03-09 14:05:00 UTC"));
        assert!(output.contains("Response Time: N/A"));
        assert!(output.contains("  • Uses insecure HTTP protocol"));
    }

    #[test]
    fn json_report_round_trips() {
        let verdict = sample_verdict();
        let output = render_report(&verdict, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["threat_score"], serde_json::json!(100));
        assert_eq!(value["risk_category"], "CRITICAL");
        assert_eq!(parse_json_report(&output).unwrap(), verdict);
    }

    #[test]
    fn parse_rejects_inconsistent_category() {
        let mut verdict = sample_verdict();
        verdict.risk_category = RiskCategory::Low;
        let raw = serde_json::to_string(&verdict).unwrap();
        let err = parse_json_report(&raw).unwrap_err();
        assert!(format!("{err:#}").contains("maps to CRITICAL"));
    }

    #[test]
    fn pages_break_between_sections_and_carry_footers() {
        let verdict = sample_verdict();
        let pages = render_pages(&verdict, 12).unwrap();
        assert!(pages.len() > 1);
        let total = pages.len();
        for (idx, page) in pages.iter().enumerate() {
            assert!(page.ends_with(&format!("Page {} of {}\n", idx + 1, total)));
            // body lines plus blank separator and footer
            assert!(page.lines().count() <= 12 + 2);
        }
        assert!(pages[0].starts_with(REPORT_TITLE));
        assert!(pages.last().unwrap().contains("Response Time: N/A"));

        let single = render_pages(&verdict, 500).unwrap();
        assert_eq!(single.len(), 1);
        assert!(single[0].ends_with("Page 1 of 1\n"));
    }

    #[test]
    fn zero_page_height_is_rejected() {
        assert!(render_pages(&sample_verdict(), 0).is_err());
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        assert!(wrap("", 10).is_empty());
    }
}
