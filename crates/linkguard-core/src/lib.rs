pub mod explain;
pub mod input;
pub mod report;
pub mod scanner;
pub mod settings;
pub mod signals;
pub mod verdict;

pub use explain::{ExplanationContext, ExplanationGenerator, TemplateExplainer};
pub use input::{Document, FileInputProvider, InputError, InputProvider};
pub use scanner::{
    engine::ThreatEngine, file_repository::FilePatternRepository, BuiltinPatternRepository,
    DetectionMethod, DetectionOutcome, PatternRepository, PatternSet, PatternTables, ScanError,
    TechnicalDetails, ThreatVerdict, VerdictValidationError,
};
pub use settings::{EngineSettings, SignalMode};
pub use signals::{
    Clock, DomainAge, FixedClock, FixedSignals, ProviderError, RandomSignals, SignalProvider,
    SystemClock,
};
pub use verdict::{RiskCategory, SubjectKind};
