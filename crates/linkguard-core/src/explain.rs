use crate::verdict::{RiskCategory, SubjectKind};

/// Inputs available to a narrative generator.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationContext<'a> {
    pub subject: &'a str,
    pub kind: SubjectKind,
    /// Clamped score. The built-in templates key off `category` only; kept for
    /// generators that phrase by score.
    pub score: u8,
    pub category: RiskCategory,
    pub risk_factors: &'a [String],
    /// Template selector supplied by the signal provider.
    pub variant: usize,
}

/// Renders a natural-language summary of a verdict.
pub trait ExplanationGenerator: Send + Sync {
    fn explain(&self, ctx: &ExplanationContext<'_>) -> String;
}

/// Template-based narrative generator.
///
/// URL verdicts have two templates per category and document verdicts one; the
/// context's `variant` is taken modulo the number of templates available.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateExplainer;

impl ExplanationGenerator for TemplateExplainer {
    fn explain(&self, ctx: &ExplanationContext<'_>) -> String {
        match ctx.kind {
            SubjectKind::Url => url_template(ctx, ctx.variant % URL_TEMPLATES_PER_CATEGORY),
            SubjectKind::Document => document_template(ctx),
        }
    }
}

const URL_TEMPLATES_PER_CATEGORY: usize = 2;

fn url_template(ctx: &ExplanationContext<'_>, variant: usize) -> String {
    let url = ctx.subject;
    match (ctx.category, variant) {
        (RiskCategory::Low, 0) => format!(
            "Based on my analysis, \"{url}\" appears to be a legitimate website with minimal security concerns. The site uses standard security practices and shows no obvious signs of malicious intent."
        ),
        (RiskCategory::Low, _) => "This URL shows positive security indicators and follows web security best practices. While no site is 100% risk-free, this appears to be safe for normal browsing.".to_string(),
        (RiskCategory::Medium, 0) => format!(
            "The URL \"{url}\" shows some concerning patterns that warrant caution. While not definitively malicious, {lead} suggest you should verify the site's legitimacy before providing any sensitive information.",
            lead = ctx
                .risk_factors
                .first()
                .map(|factor| factor.to_lowercase())
                .unwrap_or_else(|| "certain risk factors".to_string())
        ),
        (RiskCategory::Medium, _) => "This website displays mixed security signals. I recommend exercising caution and avoiding entering personal information unless you can independently verify the site's authenticity.".to_string(),
        (RiskCategory::High, 0) => format!(
            "I've detected multiple red flags for \"{url}\" that strongly suggest this is a potentially dangerous site. The combination of {pair} are common indicators of phishing or malware distribution.",
            pair = leading_pair(ctx.risk_factors).to_lowercase()
        ),
        (RiskCategory::High, _) => "This URL exhibits several characteristics typical of malicious websites. I strongly advise against visiting this site, as it poses significant security risks.".to_string(),
        (RiskCategory::Critical, 0) => format!(
            "WARNING: \"{url}\" appears to be a highly dangerous website with multiple critical threat indicators. This site shows clear signs of being designed for malicious purposes such as credential theft, malware distribution, or financial fraud."
        ),
        (RiskCategory::Critical, _) => "This is almost certainly a malicious website designed to harm visitors. The URL contains known threat patterns and should be avoided completely.".to_string(),
    }
}

fn document_template(ctx: &ExplanationContext<'_>) -> String {
    let name = ctx.subject;
    match ctx.category {
        RiskCategory::Low => format!(
            "The file \"{name}\" appears to be clean with no obvious malicious indicators. The content follows standard formatting practices and contains no suspicious elements that would indicate malicious intent."
        ),
        RiskCategory::Medium => format!(
            "Analysis of \"{name}\" reveals some concerning patterns that suggest caution. {lead} could potentially be used for malicious purposes, though this may also be legitimate functionality.",
            lead = ctx
                .risk_factors
                .first()
                .map(String::as_str)
                .unwrap_or("Certain elements")
        ),
        RiskCategory::High => format!(
            "The file \"{name}\" contains multiple suspicious elements commonly found in malicious emails or documents. The presence of {pair} suggests this could be a phishing attempt or contain malware.",
            pair = leading_pair(ctx.risk_factors).to_lowercase()
        ),
        RiskCategory::Critical => format!(
            "CRITICAL ALERT: \"{name}\" contains highly suspicious content that strongly indicates malicious intent. This file exhibits multiple characteristics of advanced phishing or malware campaigns and should be immediately quarantined."
        ),
    }
}

/// Up to the first two factors joined with " and ".
fn leading_pair(factors: &[String]) -> String {
    factors
        .iter()
        .take(2)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        kind: SubjectKind,
        category: RiskCategory,
        factors: &'a [String],
        variant: usize,
    ) -> ExplanationContext<'a> {
        ExplanationContext {
            subject: "http://promo.test",
            kind,
            score: 0,
            category,
            risk_factors: factors,
            variant,
        }
    }

    #[test]
    fn first_url_template_interpolates_subject() {
        let text = TemplateExplainer.explain(&ctx(SubjectKind::Url, RiskCategory::Critical, &[], 0));
        assert!(text.starts_with("WARNING: \"http://promo.test\""));
    }

    #[test]
    fn variant_wraps_around_template_count() {
        let second = TemplateExplainer.explain(&ctx(SubjectKind::Url, RiskCategory::Low, &[], 1));
        let third = TemplateExplainer.explain(&ctx(SubjectKind::Url, RiskCategory::Low, &[], 3));
        assert_eq!(second, third);
        assert!(second.starts_with("This URL shows positive security indicators"));
    }

    #[test]
    fn each_category_selects_between_two_url_templates() {
        let factors = vec!["Uses insecure HTTP protocol".to_string()];
        for category in [
            RiskCategory::Low,
            RiskCategory::Medium,
            RiskCategory::High,
            RiskCategory::Critical,
        ] {
            let even = TemplateExplainer.explain(&ctx(SubjectKind::Url, category, &factors, 4));
            let odd = TemplateExplainer.explain(&ctx(SubjectKind::Url, category, &factors, 7));
            assert!(even.contains("http://promo.test"), "{category}: {even}");
            assert!(!odd.contains("http://promo.test"), "{category}: {odd}");
            assert_ne!(even, odd);
        }
    }

    #[test]
    fn high_templates_join_two_leading_factors() {
        let factors = vec![
            "Uses insecure HTTP protocol".to_string(),
            "Domain registered recently".to_string(),
            "Uses URL shortening service".to_string(),
        ];
        let text = TemplateExplainer.explain(&ctx(SubjectKind::Url, RiskCategory::High, &factors, 0));
        assert!(text.contains(
            "combination of uses insecure http protocol and domain registered recently are"
        ));
        assert!(!text.contains("shortening"));
    }

    #[test]
    fn medium_url_template_falls_back_without_factors() {
        let text = TemplateExplainer.explain(&ctx(SubjectKind::Url, RiskCategory::Medium, &[], 0));
        assert!(text.contains("certain risk factors suggest"));
    }

    #[test]
    fn document_medium_keeps_factor_case() {
        let factors = vec!["Contains embedded iframes (potential malware injection)".to_string()];
        let text =
            TemplateExplainer.explain(&ctx(SubjectKind::Document, RiskCategory::Medium, &factors, 5));
        assert!(text.contains(". Contains embedded iframes (potential malware injection) could"));
    }

    #[test]
    fn document_templates_ignore_variant() {
        let a = TemplateExplainer.explain(&ctx(SubjectKind::Document, RiskCategory::Low, &[], 0));
        let b = TemplateExplainer.explain(&ctx(SubjectKind::Document, RiskCategory::Low, &[], 9));
        assert_eq!(a, b);
    }
}
