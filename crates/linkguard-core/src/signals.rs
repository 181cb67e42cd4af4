//! Injectable signal sources standing in for integrations the engine does not
//! implement itself: registration-age lookups, ML anomaly inference, WHOIS and
//! redirect enrichment, network telemetry, and the wall clock.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Countries the reference telemetry draws IP locations from.
pub const IP_LOCATIONS: [&str; 5] = ["US", "Russia", "China", "Netherlands", "Germany"];

/// Failure of an injected provider. Terminal for the scan that hit it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider} is unavailable: {reason}")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },
    #[error("{provider} state was poisoned by a panicking caller")]
    Poisoned { provider: &'static str },
}

/// Registration age bucket reported for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainAge {
    New,
    Established,
}

impl DomainAge {
    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New (< 30 days)",
            Self::Established => "Established (> 1 year)",
        }
    }
}

/// Optional positive signals appended to a URL verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub whois_valid: bool,
    pub no_redirects: bool,
}

/// Network-level observations about a URL target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTelemetry {
    pub suspicious_scripts: bool,
    pub hidden_iframes: bool,
    pub form_secure: bool,
    pub ip_location: String,
    pub redirects: u8,
    pub response_time_ms: u32,
}

/// Supplies every non-heuristic signal the scorers consume.
///
/// Implementations must be safe to call from concurrent scans.
pub trait SignalProvider: Send + Sync {
    fn domain_age(&self, domain: &str) -> Result<DomainAge, ProviderError>;

    /// Whether anomaly inference flags the URL for review.
    fn ml_anomaly(&self, url: &str) -> Result<bool, ProviderError>;

    fn enrichment(&self, domain: &str) -> Result<Enrichment, ProviderError>;

    fn telemetry(&self, url: &str) -> Result<NetworkTelemetry, ProviderError>;

    /// Index used to pick among same-category narrative templates.
    fn narrative_variant(&self, subject: &str) -> Result<usize, ProviderError>;
}

/// Source of scan timestamps and elapsed-time measurement.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>, ProviderError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>, ProviderError> {
        Ok(Utc::now())
    }
}

/// Clock frozen at a single instant, so elapsed time is always zero.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> Result<DateTime<Utc>, ProviderError> {
        Ok(self.0)
    }
}

/// Deterministic provider returning the same signals for every subject.
///
/// The default is the quietest configuration: established domains, no anomaly,
/// no enrichment, and benign telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSignals {
    pub domain_age: DomainAge,
    pub ml_anomaly: bool,
    pub enrichment: Enrichment,
    pub telemetry: NetworkTelemetry,
    pub narrative_variant: usize,
}

impl Default for FixedSignals {
    fn default() -> Self {
        Self {
            domain_age: DomainAge::Established,
            ml_anomaly: false,
            enrichment: Enrichment::default(),
            telemetry: NetworkTelemetry {
                suspicious_scripts: false,
                hidden_iframes: false,
                form_secure: true,
                ip_location: IP_LOCATIONS[0].to_string(),
                redirects: 0,
                response_time_ms: 100,
            },
            narrative_variant: 0,
        }
    }
}

impl SignalProvider for FixedSignals {
    fn domain_age(&self, _domain: &str) -> Result<DomainAge, ProviderError> {
        Ok(self.domain_age)
    }

    fn ml_anomaly(&self, _url: &str) -> Result<bool, ProviderError> {
        Ok(self.ml_anomaly)
    }

    fn enrichment(&self, _domain: &str) -> Result<Enrichment, ProviderError> {
        Ok(self.enrichment)
    }

    fn telemetry(&self, _url: &str) -> Result<NetworkTelemetry, ProviderError> {
        Ok(self.telemetry.clone())
    }

    fn narrative_variant(&self, _subject: &str) -> Result<usize, ProviderError> {
        Ok(self.narrative_variant)
    }
}

/// Probabilities used by [`RandomSignals`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalOdds {
    pub new_domain: f64,
    pub ml_anomaly: f64,
    pub whois_valid: f64,
    pub no_redirects: f64,
    pub suspicious_scripts: f64,
    pub hidden_iframes: f64,
    pub form_secure: f64,
}

impl Default for SignalOdds {
    fn default() -> Self {
        Self {
            new_domain: 0.3,
            ml_anomaly: 0.2,
            whois_valid: 0.5,
            no_redirects: 0.4,
            suspicious_scripts: 0.3,
            hidden_iframes: 0.2,
            form_secure: 0.4,
        }
    }
}

/// Simulated provider drawing every signal from a shared RNG.
pub struct RandomSignals {
    rng: Mutex<StdRng>,
    odds: SignalOdds,
}

impl RandomSignals {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy(), SignalOdds::default())
    }

    /// Reproducible draws for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), SignalOdds::default())
    }

    pub fn with_rng(rng: StdRng, odds: SignalOdds) -> Self {
        Self {
            rng: Mutex::new(rng),
            odds,
        }
    }

    fn draw<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Result<T, ProviderError> {
        let mut rng = self.rng.lock().map_err(|_| ProviderError::Poisoned {
            provider: "random signal source",
        })?;
        Ok(f(&mut *rng))
    }

    fn chance(&self, p: f64) -> Result<bool, ProviderError> {
        let p = probability(p);
        self.draw(|rng| rng.gen_bool(p))
    }
}

/// Clamp to `0.0..=1.0`; non-finite odds never fire.
fn probability(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl Default for RandomSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RandomSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSignals")
            .field("odds", &self.odds)
            .finish_non_exhaustive()
    }
}

impl SignalProvider for RandomSignals {
    fn domain_age(&self, _domain: &str) -> Result<DomainAge, ProviderError> {
        Ok(if self.chance(self.odds.new_domain)? {
            DomainAge::New
        } else {
            DomainAge::Established
        })
    }

    fn ml_anomaly(&self, _url: &str) -> Result<bool, ProviderError> {
        self.chance(self.odds.ml_anomaly)
    }

    fn enrichment(&self, _domain: &str) -> Result<Enrichment, ProviderError> {
        Ok(Enrichment {
            whois_valid: self.chance(self.odds.whois_valid)?,
            no_redirects: self.chance(self.odds.no_redirects)?,
        })
    }

    fn telemetry(&self, _url: &str) -> Result<NetworkTelemetry, ProviderError> {
        let odds = self.odds;
        self.draw(|rng| NetworkTelemetry {
            suspicious_scripts: rng.gen_bool(probability(odds.suspicious_scripts)),
            hidden_iframes: rng.gen_bool(probability(odds.hidden_iframes)),
            form_secure: rng.gen_bool(probability(odds.form_secure)),
            ip_location: IP_LOCATIONS[rng.gen_range(0..IP_LOCATIONS.len())].to_string(),
            redirects: rng.gen_range(0..=2),
            response_time_ms: rng.gen_range(100..600),
        })
    }

    fn narrative_variant(&self, _subject: &str) -> Result<usize, ProviderError> {
        self.draw(|rng| rng.gen_range(0..usize::MAX))
    }
}
