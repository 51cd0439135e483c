//! End-to-end region run: search → store new cases → optional enrichment.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use docketrace_crawler::CaseExtractor;
use docketrace_shared::{Environment, Result};
use docketrace_storage::RecordStore;
use tracing::{info, instrument, warn};

use crate::skiptrace::{RegionEnrichmentResult, SkipTracer};

/// A unit of work the scheduler runs for one region.
#[async_trait]
pub trait RegionJob: Send + Sync {
    /// Run the job and report how many cases were found.
    async fn run(&self, region: &str) -> Result<usize>;
}

/// Summary of one `scrape_and_store` run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    pub region: String,
    pub cases_found: usize,
    pub cases_inserted: usize,
    /// Dockets already in the store; their rows were left untouched.
    pub cases_existing: usize,
    pub defendants_inserted: usize,
    pub errors: Vec<String>,
    pub enrichment: Option<RegionEnrichmentResult>,
    pub elapsed: std::time::Duration,
}

/// Extraction, persistence and (optionally) enrichment for a region.
pub struct RegionPipeline {
    extractor: CaseExtractor,
    store: Arc<dyn RecordStore>,
    enrichment: Option<(Arc<SkipTracer>, Environment)>,
}

impl RegionPipeline {
    pub fn new(extractor: CaseExtractor, store: Arc<dyn RecordStore>) -> Self {
        Self {
            extractor,
            store,
            enrichment: None,
        }
    }

    /// Enrich each region's cases in `environment` right after storing them.
    pub fn with_enrichment(mut self, tracer: Arc<SkipTracer>, environment: Environment) -> Self {
        self.enrichment = Some((tracer, environment));
        self
    }

    /// Extract a region's cases and store the ones not seen before.
    ///
    /// Only an unreachable search source fails the run. Per-case store errors
    /// are collected in [`ScrapeStats::errors`].
    #[instrument(skip_all, fields(region = %region))]
    pub async fn scrape_and_store(&self, region: &str) -> Result<ScrapeStats> {
        let start = Instant::now();
        let extracted = self.extractor.extract_cases(region).await?;

        let mut stats = ScrapeStats {
            region: region.to_string(),
            cases_found: extracted.len(),
            ..ScrapeStats::default()
        };

        for item in &extracted {
            let docket = &item.case.docket_number;
            match self.store.insert_case(&item.case).await {
                Ok(true) => stats.cases_inserted += 1,
                Ok(false) => {
                    stats.cases_existing += 1;
                    continue;
                }
                Err(e) => {
                    warn!(docket = %docket, error = %e, "failed to store case");
                    stats.errors.push(format!("{docket}: {e}"));
                    continue;
                }
            }

            match self.store.insert_defendant(&item.defendant).await {
                Ok(()) => stats.defendants_inserted += 1,
                Err(e) => {
                    warn!(docket = %docket, error = %e, "failed to store defendant");
                    stats.errors.push(format!("{docket}: defendant: {e}"));
                }
            }
        }

        if let Some((tracer, environment)) = &self.enrichment {
            match tracer.enrich_region(region, *environment, None, false).await {
                Ok(summary) => stats.enrichment = Some(summary),
                Err(e) => {
                    warn!(error = %e, "post-scrape enrichment failed");
                    stats.errors.push(format!("enrichment: {e}"));
                }
            }
        }

        stats.elapsed = start.elapsed();
        info!(
            found = stats.cases_found,
            inserted = stats.cases_inserted,
            existing = stats.cases_existing,
            errors = stats.errors.len(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "region scrape finished"
        );
        Ok(stats)
    }
}

#[async_trait]
impl RegionJob for RegionPipeline {
    async fn run(&self, region: &str) -> Result<usize> {
        Ok(self.scrape_and_store(region).await?.cases_found)
    }
}
