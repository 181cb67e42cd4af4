use std::{collections::HashSet, fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::debug;

use super::{PatternRepository, PatternSet, PatternTables};

/// Loads pattern tables from `threat_domains.txt` and `patterns.json` under a base directory.
///
/// Either file may be absent, in which case the built-in entries for that part are kept.
pub struct FilePatternRepository {
    base_path: PathBuf,
    cache: OnceCell<Arc<PatternTables>>,
}

impl FilePatternRepository {
    /// Create a repository rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: OnceCell::new(),
        }
    }

    fn domains_path(&self) -> PathBuf {
        self.base_path.join("threat_domains.txt")
    }

    fn patterns_path(&self) -> PathBuf {
        self.base_path.join("patterns.json")
    }

    fn load_domains(&self) -> Result<Option<Vec<String>>> {
        let path = self.domains_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read threat domain file at {}", path.display()))?;
        let mut seen = HashSet::new();
        let mut domains = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.contains(char::is_whitespace) {
                return Err(anyhow::anyhow!(
                    "invalid threat domain `{}` at {}:{} (expected one domain per line)",
                    trimmed,
                    path.display(),
                    idx + 1
                ));
            }
            let domain = trimmed.to_ascii_lowercase();
            if !seen.insert(domain.clone()) {
                return Err(anyhow::anyhow!(
                    "duplicate threat domain `{domain}` at {}:{}",
                    path.display(),
                    idx + 1
                ));
            }
            domains.push(domain);
        }
        Ok(Some(domains))
    }

    fn load_patterns(&self) -> Result<PatternSet> {
        let path = self.patterns_path();
        if !path.exists() {
            return Ok(PatternSet::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read pattern file at {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| {
            format!(
                "invalid JSON structure in pattern file at {}",
                path.display()
            )
        })
    }
}

#[async_trait::async_trait]
impl PatternRepository for FilePatternRepository {
    async fn load_tables(&self) -> Result<Arc<PatternTables>> {
        let tables = self.cache.get_or_try_init(|| {
            let mut set = self.load_patterns()?;
            if let Some(domains) = self.load_domains()? {
                set.threat_domains = domains;
            }
            let tables = PatternTables::compile(&set).with_context(|| {
                format!("invalid pattern tables in {}", self.base_path.display())
            })?;
            debug!(
                dir = %self.base_path.display(),
                threat_domains = set.threat_domains.len(),
                suspicious_url = set.suspicious_url.len(),
                "pattern tables loaded"
            );
            Ok::<_, anyhow::Error>(Arc::new(tables))
        })?;
        Ok(Arc::clone(tables))
    }
}
