use std::{path::Path, sync::Arc};

use tracing::{debug, info, instrument};

use super::{
    document_scorer::DocumentScorer, url_scorer::UrlScorer, Evidence, PatternTables, ScanError,
    ThreatVerdict,
};
use crate::explain::{ExplanationContext, ExplanationGenerator, TemplateExplainer};
use crate::input::InputProvider;
use crate::signals::{Clock, RandomSignals, SignalProvider, SystemClock};
use crate::verdict::{assess, SubjectKind};

/// Stateless scoring engine wiring the heuristic scorers to their providers.
///
/// Cheap to clone; clones share the same tables and providers.
#[derive(Clone)]
pub struct ThreatEngine {
    tables: Arc<PatternTables>,
    signals: Arc<dyn SignalProvider>,
    clock: Arc<dyn Clock>,
    explainer: Arc<dyn ExplanationGenerator>,
}

impl ThreatEngine {
    /// Engine over the given tables, with simulated signals and the system clock.
    pub fn new(tables: Arc<PatternTables>) -> Self {
        Self {
            tables,
            signals: Arc::new(RandomSignals::new()),
            clock: Arc::new(SystemClock),
            explainer: Arc::new(TemplateExplainer),
        }
    }

    pub fn with_signals(mut self, signals: Arc<dyn SignalProvider>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn ExplanationGenerator>) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn tables(&self) -> &PatternTables {
        &self.tables
    }

    /// Score a URL. Malformed URLs degrade; only provider failures are errors.
    #[instrument(name = "score_url", skip(self), fields(url_len = url.len()))]
    pub fn score_url(&self, url: &str) -> Result<ThreatVerdict, ScanError> {
        let started = self.clock.now()?;
        let evidence = UrlScorer::new(&self.tables, self.signals.as_ref()).evaluate(url)?;
        self.finish(url, SubjectKind::Url, evidence, started)
    }

    /// Score the text of an HTML or email document.
    #[instrument(name = "score_document", skip(self, content), fields(content_len = content.len()))]
    pub fn score_document(
        &self,
        filename: &str,
        content: &str,
    ) -> Result<ThreatVerdict, ScanError> {
        let started = self.clock.now()?;
        let evidence = DocumentScorer::new(&self.tables).evaluate(content);
        self.finish(filename, SubjectKind::Document, evidence, started)
    }

    /// Acquire a document through `input` and score it.
    pub async fn scan_file(
        &self,
        input: &dyn InputProvider,
        path: &Path,
    ) -> Result<ThreatVerdict, ScanError> {
        let document = input.read_document(path).await?;
        self.score_document(&document.filename, &document.content)
    }

    fn finish(
        &self,
        subject: &str,
        kind: SubjectKind,
        evidence: Evidence,
        started: chrono::DateTime<chrono::Utc>,
    ) -> Result<ThreatVerdict, ScanError> {
        let assessment = assess(evidence.raw_score, kind);
        let narrative = self.explainer.explain(&ExplanationContext {
            subject,
            kind,
            score: assessment.score,
            category: assessment.category,
            risk_factors: &evidence.risk_factors,
            variant: self.signals.narrative_variant(subject)?,
        });
        let finished = self.clock.now()?;
        let processing_time_ms = (finished - started).num_milliseconds().max(0) as u64;

        debug!(
            raw_score = evidence.raw_score,
            score = assessment.score,
            "verdict assembled"
        );
        info!(
            subject,
            ?kind,
            score = assessment.score,
            category = %assessment.category,
            "scan completed"
        );

        Ok(ThreatVerdict {
            subject: subject.to_string(),
            subject_kind: kind,
            threat_score: assessment.score,
            risk_category: assessment.category,
            recommendation: assessment.recommendation.to_string(),
            scan_timestamp: finished,
            processing_time_ms,
            narrative,
            risk_factors: evidence.risk_factors,
            security_features: evidence.security_features,
            detection_methods: evidence.detection_methods,
            technical_details: evidence.technical_details,
        })
    }
}

impl std::fmt::Debug for ThreatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreatEngine").finish_non_exhaustive()
    }
}
