//! Case extraction from the public case-search interface.
//!
//! This crate provides:
//! - [`session`]: browser sessions against the search form (trait + WebDriver)
//! - [`results`]: parsing of the rendered results grid
//! - [`CaseExtractor`]: one bounded, always-cleaned-up search per region

pub mod results;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use docketrace_shared::{DocketError, Result, SearchConfig};
use tracing::{info, instrument, warn};
use url::Url;

pub use results::{ExtractedCase, defendant_from_case_name, parse_results};
pub use session::{SearchSession, SessionError, SessionFactory, WebDriverSessions};

// ---------------------------------------------------------------------------
// CaseExtractor
// ---------------------------------------------------------------------------

/// Runs region searches and turns the results into cases.
#[derive(Clone)]
pub struct CaseExtractor {
    sessions: Arc<dyn SessionFactory>,
    origin: Url,
    search_timeout: Duration,
}

impl CaseExtractor {
    /// Create an extractor over an arbitrary session factory.
    pub fn new(sessions: Arc<dyn SessionFactory>, config: &SearchConfig) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| DocketError::config(format!("invalid search origin '{}': {e}", config.origin)))?;
        Ok(Self {
            sessions,
            origin,
            search_timeout: Duration::from_secs(config.search_timeout_secs),
        })
    }

    /// Create an extractor backed by the configured WebDriver endpoint.
    pub fn with_webdriver(config: &SearchConfig) -> Result<Self> {
        Self::new(Arc::new(WebDriverSessions::new(config)), config)
    }

    /// Search one region and return every parsable result row.
    ///
    /// Fails with [`DocketError::Extraction`] only when the source cannot be
    /// reached or the search exceeds its time budget. A changed form or a page
    /// without a results grid yields an empty list.
    #[instrument(skip_all, fields(region = %region))]
    pub async fn extract_cases(&self, region: &str) -> Result<Vec<ExtractedCase>> {
        let mut session = self
            .sessions
            .open()
            .await
            .map_err(|e| DocketError::Extraction(e.to_string()))?;

        let outcome = tokio::time::timeout(self.search_timeout, session.search(region)).await;
        session.close().await;

        let html = match outcome {
            Err(_) => {
                return Err(DocketError::Extraction(format!(
                    "search for '{region}' exceeded {}s",
                    self.search_timeout.as_secs()
                )));
            }
            Ok(Err(SessionError::Unreachable(msg))) => {
                return Err(DocketError::Extraction(msg));
            }
            Ok(Err(e @ SessionError::MarkupDrift(_))) => {
                warn!(error = %e, "treating unrecognised search form as zero results");
                return Ok(Vec::new());
            }
            Ok(Ok(html)) => html,
        };

        let cases = parse_results(&html, &self.origin, region);
        info!(cases = cases.len(), "extraction finished");
        Ok(cases)
    }
}
