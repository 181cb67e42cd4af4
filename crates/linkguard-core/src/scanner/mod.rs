use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::InputError;
use crate::signals::ProviderError;
use crate::verdict::{RiskCategory, SubjectKind};

pub mod document_scorer;
pub mod engine;
pub mod file_repository;
pub mod patterns;
pub mod url_scorer;

pub use patterns::{PatternSet, PatternTables, PatternValidationError};

/// Marker used for technical-detail fields that do not apply to a subject.
pub const NOT_APPLICABLE: &str = "N/A";

/// Outcome of a single named detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectionOutcome {
    Pass,
    Fail,
    Warning,
}

impl DetectionOutcome {
    /// `Fail` when the condition holds, `Pass` otherwise.
    pub fn fail_if(condition: bool) -> Self {
        if condition {
            Self::Fail
        } else {
            Self::Pass
        }
    }

    pub fn warn_if(condition: bool) -> Self {
        if condition {
            Self::Warning
        } else {
            Self::Pass
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warning => "WARNING",
        }
    }
}

/// A heuristic check surfaced to the user, independent of its score contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionMethod {
    pub name: String,
    pub outcome: DetectionOutcome,
}

impl DetectionMethod {
    pub fn new(name: impl Into<String>, outcome: DetectionOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
        }
    }
}

/// Secondary attributes shown alongside the score.
///
/// Network and domain fields carry [`NOT_APPLICABLE`] markers for document scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalDetails {
    pub domain_age: String,
    pub ssl_status: String,
    pub reputation: String,
    pub suspicious_scripts: String,
    pub hidden_iframes: String,
    pub form_security: String,
    pub ip_location: String,
    pub redirects: String,
    pub response_time: String,
}

/// Heuristic evidence gathered by a scorer before the verdict is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    /// Unclamped sum of heuristic weights.
    pub raw_score: u32,
    pub risk_factors: Vec<String>,
    pub security_features: Vec<String>,
    pub detection_methods: Vec<DetectionMethod>,
    pub technical_details: TechnicalDetails,
}

impl Evidence {
    pub(crate) fn new(technical_details: TechnicalDetails) -> Self {
        Self {
            raw_score: 0,
            risk_factors: Vec::new(),
            security_features: Vec::new(),
            detection_methods: Vec::new(),
            technical_details,
        }
    }

    /// Add `weight` to the score and record why.
    pub(crate) fn raise(&mut self, weight: u32, factor: impl Into<String>) {
        self.raw_score = self.raw_score.saturating_add(weight);
        self.risk_factors.push(factor.into());
    }

    pub(crate) fn note(&mut self, feature: impl Into<String>) {
        self.security_features.push(feature.into());
    }

    pub(crate) fn record(&mut self, name: &str, outcome: DetectionOutcome) {
        self.detection_methods.push(DetectionMethod::new(name, outcome));
    }
}

/// End-to-end verdict produced by one scan. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatVerdict {
    /// URL or filename that was analyzed.
    pub subject: String,
    pub subject_kind: SubjectKind,
    /// Clamped to 0–100.
    pub threat_score: u8,
    pub risk_category: RiskCategory,
    pub recommendation: String,
    pub scan_timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub narrative: String,
    /// Reasons the score was raised, in evaluation order.
    pub risk_factors: Vec<String>,
    pub security_features: Vec<String>,
    pub detection_methods: Vec<DetectionMethod>,
    pub technical_details: TechnicalDetails,
}

impl ThreatVerdict {
    /// Check the score, category, and evidence invariants of a verdict.
    pub fn validate(&self) -> Result<(), VerdictValidationError> {
        if self.threat_score > 100 {
            return Err(VerdictValidationError::ScoreOutOfRange {
                score: self.threat_score,
            });
        }
        let expected = RiskCategory::from_score(self.threat_score);
        if self.risk_category != expected {
            return Err(VerdictValidationError::CategoryMismatch {
                score: self.threat_score,
                expected,
                found: self.risk_category,
            });
        }
        if self.recommendation != expected.recommendation(self.subject_kind) {
            return Err(VerdictValidationError::RecommendationMismatch {
                category: expected,
            });
        }
        if self.threat_score > 0 && self.risk_factors.is_empty() {
            return Err(VerdictValidationError::MissingRiskFactors {
                score: self.threat_score,
            });
        }
        if self.threat_score == 0 {
            if !self.risk_factors.is_empty() {
                return Err(VerdictValidationError::UnexpectedRiskFactors);
            }
            if self.security_features.is_empty() {
                return Err(VerdictValidationError::MissingReassurance);
            }
        }
        Ok(())
    }
}

/// Invariant violations detected on a verdict.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictValidationError {
    #[error("threat score must be within 0..=100 (got {score})")]
    ScoreOutOfRange { score: u8 },
    #[error("score {score} maps to {expected} but verdict says {found}")]
    CategoryMismatch {
        score: u8,
        expected: RiskCategory,
        found: RiskCategory,
    },
    #[error("recommendation does not match the {category} category")]
    RecommendationMismatch { category: RiskCategory },
    #[error("score {score} is non-zero but no risk factors were recorded")]
    MissingRiskFactors { score: u8 },
    #[error("zero score must not carry risk factors")]
    UnexpectedRiskFactors,
    #[error("zero score must carry at least one security feature")]
    MissingReassurance,
}

/// Terminal failure of a scan. No verdict is produced.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("signal provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("input rejected: {0}")]
    Input(#[from] InputError),
}

/// Abstraction over pattern-table loading so built-in, file, or remote sources can be swapped.
#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Retrieve the pattern tables currently active.
    async fn load_tables(&self) -> AnyResult<std::sync::Arc<PatternTables>>;
}

/// Repository that always serves the compiled-in reference tables.
#[derive(Debug, Default, Clone)]
pub struct BuiltinPatternRepository;

#[async_trait]
impl PatternRepository for BuiltinPatternRepository {
    async fn load_tables(&self) -> AnyResult<std::sync::Arc<PatternTables>> {
        Ok(PatternTables::builtin())
    }
}
