use std::fmt;

use serde::{Deserialize, Serialize};

/// Which scoring pipeline produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Url,
    Document,
}

/// Classification buckets for the overall threat score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

/// Lower score bound (inclusive) for each category above `Low`, highest first.
const CATEGORY_THRESHOLDS: [(u8, RiskCategory); 3] = [
    (80, RiskCategory::Critical),
    (50, RiskCategory::High),
    (25, RiskCategory::Medium),
];

/// Recommendation text indexed by [`RiskCategory::index`].
const URL_RECOMMENDATIONS: [&str; 4] = [
    "Generally safe to visit with normal precautions",
    "Exercise caution - Some risk factors present",
    "Avoid this link - Multiple risk factors identified",
    "DO NOT VISIT - High phishing/malware risk detected",
];

const DOCUMENT_RECOMMENDATIONS: [&str; 4] = [
    "File appears safe for normal handling",
    "Review carefully before opening",
    "Quarantine recommended - Multiple threats found",
    "DO NOT OPEN - High risk email/file detected",
];

impl RiskCategory {
    /// Map a clamped threat score (0–100) into a category.
    pub fn from_score(score: u8) -> Self {
        CATEGORY_THRESHOLDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, category)| *category)
            .unwrap_or(Self::Low)
    }

    fn index(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// Fixed recommendation for this category, phrased for the given subject.
    pub fn recommendation(self, kind: SubjectKind) -> &'static str {
        let table = match kind {
            SubjectKind::Url => &URL_RECOMMENDATIONS,
            SubjectKind::Document => &DOCUMENT_RECOMMENDATIONS,
        };
        table[self.index()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category and recommendation derived from a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub score: u8,
    pub category: RiskCategory,
    pub recommendation: &'static str,
}

/// Clamp an accumulated raw score and derive its category and recommendation.
pub fn assess(raw_score: u32, kind: SubjectKind) -> Assessment {
    let score = clamp_score(raw_score);
    let category = RiskCategory::from_score(score);
    Assessment {
        score,
        category,
        recommendation: category.recommendation(kind),
    }
}

pub fn clamp_score(raw_score: u32) -> u8 {
    raw_score.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn category_boundaries_are_exact() {
        assert_eq!(RiskCategory::from_score(24), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(25), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(49), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_score(50), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(79), RiskCategory::High);
        assert_eq!(RiskCategory::from_score(80), RiskCategory::Critical);
        assert_eq!(RiskCategory::from_score(0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_score(100), RiskCategory::Critical);
    }

    #[test]
    fn recommendations_follow_subject_kind() {
        let critical = assess(180, SubjectKind::Url);
        assert_eq!(critical.score, 100);
        assert_eq!(critical.category, RiskCategory::Critical);
        assert!(critical.recommendation.starts_with("DO NOT VISIT"));

        let quarantined = assess(55, SubjectKind::Document);
        assert_eq!(quarantined.category, RiskCategory::High);
        assert!(quarantined.recommendation.starts_with("Quarantine recommended"));
    }

    #[test]
    fn categories_serialize_uppercase() {
        let json = serde_json::to_string(&RiskCategory::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(RiskCategory::Medium.to_string(), "MEDIUM");
    }

    proptest! {
        #[test]
        fn assessment_is_clamped_and_monotonic(a in 0u32..400, b in 0u32..400) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo = assess(lo, SubjectKind::Url);
            let hi = assess(hi, SubjectKind::Url);
            prop_assert!(hi.score <= 100);
            prop_assert!(lo.category <= hi.category);
            prop_assert_eq!(hi.category, RiskCategory::from_score(hi.score));
        }
    }
}
