//! Skip-trace orchestration: defendant addresses → phone records.
//!
//! A case counts as traced in an environment once any phone record exists for
//! it in that environment's collection. Traced cases are skipped unless forced,
//! so re-running enrichment never issues or bills duplicate lookups.

use std::collections::HashMap;
use std::sync::Arc;

use docketrace_regions::RegionRegistry;
use docketrace_shared::{DocketError, Environment, PhoneType, Result, SkipTraceRecord};
use docketrace_storage::RecordStore;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::lookup::{LookupOutcome, PhoneLookup};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of enriching one case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentResult {
    pub docket_number: String,
    /// Already traced in this environment; nothing was looked up.
    pub skipped: bool,
    pub defendants_processed: usize,
    pub addresses_processed: usize,
    pub phones_found: usize,
    pub records_stored: usize,
    /// Lookups recorded in the cost ledger.
    pub lookups_billed: u32,
    pub errors: Vec<String>,
}

/// Aggregate outcome of enriching a region's cases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionEnrichmentResult {
    pub region: String,
    pub cases_processed: usize,
    pub cases_skipped: usize,
    pub total_defendants: usize,
    pub total_addresses: usize,
    pub total_phones: usize,
    pub total_records: usize,
    pub total_lookups: u32,
    pub errors: Vec<String>,
}

impl RegionEnrichmentResult {
    fn absorb(&mut self, case: EnrichmentResult) {
        if case.skipped {
            self.cases_skipped += 1;
        } else {
            self.cases_processed += 1;
            self.total_defendants += case.defendants_processed;
            self.total_addresses += case.addresses_processed;
            self.total_phones += case.phones_found;
            self.total_records += case.records_stored;
            self.total_lookups += case.lookups_billed;
        }
        let docket = case.docket_number;
        self.errors
            .extend(case.errors.into_iter().map(|e| format!("{docket}: {e}")));
    }
}

// ---------------------------------------------------------------------------
// SkipTracer
// ---------------------------------------------------------------------------

/// Enriches stored cases with phone numbers from a [`PhoneLookup`].
pub struct SkipTracer {
    store: Arc<dyn RecordStore>,
    lookup: Arc<dyn PhoneLookup>,
    regions: Arc<RegionRegistry>,
    /// One lock per docket so overlapping runs cannot both pass the traced check.
    docket_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SkipTracer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        lookup: Arc<dyn PhoneLookup>,
        regions: Arc<RegionRegistry>,
    ) -> Self {
        Self {
            store,
            lookup,
            regions,
            docket_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn docket_lock(&self, docket_number: &str) -> Arc<Mutex<()>> {
        let mut locks = self.docket_locks.lock().await;
        locks
            .entry(docket_number.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other run holds or waits on it.
    async fn release_docket_lock(&self, docket_number: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.docket_locks.lock().await;
        // The map and `lock` are the only remaining holders.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(docket_number);
        }
    }

    /// Enrich one case in `environment`.
    ///
    /// Returns [`DocketError::NotFound`] for an unknown docket and propagates
    /// store failures from the initial reads. Per-defendant lookup failures
    /// are collected in [`EnrichmentResult::errors`].
    #[instrument(skip_all, fields(docket = %docket_number, environment = %environment, force = force))]
    pub async fn enrich_case(
        &self,
        docket_number: &str,
        environment: Environment,
        force: bool,
    ) -> Result<EnrichmentResult> {
        let lock = self.docket_lock(docket_number).await;
        let guard = lock.lock().await;
        let outcome = self.enrich_case_locked(docket_number, environment, force).await;
        drop(guard);
        self.release_docket_lock(docket_number, lock).await;
        outcome
    }

    async fn enrich_case_locked(
        &self,
        docket_number: &str,
        environment: Environment,
        force: bool,
    ) -> Result<EnrichmentResult> {
        let mut result = EnrichmentResult {
            docket_number: docket_number.to_string(),
            ..EnrichmentResult::default()
        };

        if !force {
            let existing = self
                .store
                .get_skip_trace_records(docket_number, environment)
                .await?;
            if !existing.is_empty() {
                info!(records = existing.len(), "already traced, skipping");
                result.skipped = true;
                return Ok(result);
            }
        }

        let case = self
            .store
            .get_case_by_docket(docket_number)
            .await?
            .ok_or_else(|| DocketError::not_found(format!("case {docket_number}")))?;

        let defendants = self.store.get_defendants_by_docket(docket_number).await?;
        if defendants.is_empty() {
            info!("case has no defendants");
            return Ok(result);
        }
        result.defendants_processed = defendants.len();

        let mut records: Vec<SkipTraceRecord> = Vec::new();

        for defendant in &defendants {
            let Some(address) = defendant
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
            else {
                debug!(defendant = %defendant.name, "no address");
                continue;
            };
            result.addresses_processed += 1;

            let hint = if defendant.region.is_empty() {
                &case.region
            } else {
                &defendant.region
            };
            let normalized = docketrace_address::normalize(address, hint);
            if normalized.is_degraded() {
                warn!(defendant = %defendant.name, address, "address could not be structured");
            }

            let (phones, raw_response) = match self.lookup.lookup_phones(environment, &normalized).await {
                Ok(LookupOutcome::Completed {
                    phones,
                    raw_response,
                }) => (phones, raw_response),
                Ok(LookupOutcome::Unavailable { reason }) => {
                    result
                        .errors
                        .push(format!("{}: lookup unavailable ({reason})", defendant.name));
                    continue;
                }
                Err(e) => {
                    warn!(defendant = %defendant.name, error = %e, "lookup failed");
                    result.errors.push(format!("{}: {e}", defendant.name));
                    continue;
                }
            };

            let ledger = self
                .store
                .upsert_cost_ledger_entry(docket_number, environment, 1)
                .await;

            result.phones_found += phones.len();
            records.extend(phones.into_iter().map(|phone| SkipTraceRecord {
                docket_number: docket_number.to_string(),
                phone_type: PhoneType::classify(&phone),
                phone_number: phone,
                environment,
                raw_response: Some(raw_response.clone()),
            }));

            match ledger {
                Ok(entry) => {
                    result.lookups_billed += 1;
                    debug!(lookup_count = entry.lookup_count, "ledger updated");
                }
                Err(e) => {
                    error!(error = %e, "cost ledger write failed, stopping lookups");
                    result.errors.push(format!("cost ledger: {e}"));
                    break;
                }
            }
        }

        if !records.is_empty() {
            match self
                .store
                .insert_skip_trace_records(&records, environment)
                .await
            {
                Ok(stored) => result.records_stored = stored,
                Err(e) => {
                    error!(error = %e, records = records.len(), "failed to store phone records");
                    result.errors.push(format!("storing phone records: {e}"));
                }
            }
        }

        info!(
            defendants = result.defendants_processed,
            addresses = result.addresses_processed,
            phones = result.phones_found,
            stored = result.records_stored,
            lookups = result.lookups_billed,
            errors = result.errors.len(),
            "case enrichment finished"
        );
        Ok(result)
    }

    /// Enrich every stored case of a region, optionally capped at `limit`.
    ///
    /// An unknown region is a validation error. A failing case is recorded in
    /// the result and does not stop the batch.
    #[instrument(skip_all, fields(region = %region, environment = %environment, limit = ?limit, force = force))]
    pub async fn enrich_region(
        &self,
        region: &str,
        environment: Environment,
        limit: Option<usize>,
        force: bool,
    ) -> Result<RegionEnrichmentResult> {
        let canonical = self.regions.require(region)?.name.clone();

        let mut cases = self.store.get_cases_by_region(&canonical).await?;
        if let Some(limit) = limit {
            cases.truncate(limit);
        }

        let mut summary = RegionEnrichmentResult {
            region: canonical,
            ..RegionEnrichmentResult::default()
        };
        if cases.is_empty() {
            info!("no stored cases for region");
            return Ok(summary);
        }

        info!(cases = cases.len(), "enriching region");
        for case in cases {
            match self
                .enrich_case(&case.docket_number, environment, force)
                .await
            {
                Ok(result) => summary.absorb(result),
                Err(e) => {
                    warn!(docket = %case.docket_number, error = %e, "case enrichment failed");
                    summary.errors.push(format!("{}: {e}", case.docket_number));
                }
            }
        }

        info!(
            processed = summary.cases_processed,
            skipped = summary.cases_skipped,
            phones = summary.total_phones,
            lookups = summary.total_lookups,
            errors = summary.errors.len(),
            "region enrichment finished"
        );
        Ok(summary)
    }
}
