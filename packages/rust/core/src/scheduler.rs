//! Batch job scheduler: one background job per region, bounded concurrency.
//!
//! Jobs move `pending → running → completed | failed` and never leave a
//! terminal state. The [`JobRegistry`] is the only place job state lives; it is
//! shared between the worker tasks and status queries.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use docketrace_regions::RegionRegistry;
use docketrace_shared::{DocketError, JobId, JobStatus, Result, SchedulerConfig, ScrapeJob};
use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::pipeline::RegionJob;

// ---------------------------------------------------------------------------
// JobRegistry
// ---------------------------------------------------------------------------

/// Lock-protected map of every job submitted in this process.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, ScrapeJob>>,
    /// Signalled whenever a job reaches a terminal state.
    finished: Notify,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: ScrapeJob) {
        self.jobs.lock().await.insert(job.job_id, job);
    }

    pub async fn get(&self, job_id: JobId) -> Option<ScrapeJob> {
        self.jobs.lock().await.get(&job_id).cloned()
    }

    /// `pending → running`. Returns false if the job is unknown or not pending.
    pub async fn mark_running(&self, job_id: JobId) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Move a non-terminal job to `completed`.
    pub async fn mark_completed(&self, job_id: JobId, cases_found: usize) -> bool {
        self.finish(job_id, |job| {
            job.status = JobStatus::Completed;
            job.cases_found = Some(cases_found);
        })
        .await
    }

    /// Move a non-terminal job to `failed`.
    pub async fn mark_failed(&self, job_id: JobId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.finish(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        })
        .await
    }

    async fn finish(&self, job_id: JobId, apply: impl FnOnce(&mut ScrapeJob)) -> bool {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(&job_id) else {
            return false;
        };
        if job.status.is_terminal() {
            warn!(%job_id, status = %job.status, "ignoring transition out of terminal state");
            return false;
        }
        apply(job);
        job.completed_at = Some(Utc::now());
        drop(jobs);
        self.finished.notify_waiters();
        true
    }

    /// Most recently submitted jobs first.
    pub async fn recent(&self, limit: usize) -> Vec<ScrapeJob> {
        let jobs = self.jobs.lock().await;
        let mut all: Vec<ScrapeJob> = jobs.values().cloned().collect();
        all.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.job_id.0.cmp(&a.job_id.0))
        });
        all.truncate(limit);
        all
    }

    /// Block until the job reaches a terminal state.
    pub async fn wait(&self, job_id: JobId) -> Option<ScrapeJob> {
        loop {
            let notified = self.finished.notified();
            let job = self.get(job_id).await?;
            if job.status.is_terminal() {
                return Some(job);
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// JobScheduler
// ---------------------------------------------------------------------------

/// Submits region jobs and reports their state.
pub struct JobScheduler {
    registry: Arc<JobRegistry>,
    regions: Arc<RegionRegistry>,
    job: Arc<dyn RegionJob>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
}

impl JobScheduler {
    pub fn new(
        registry: Arc<JobRegistry>,
        regions: Arc<RegionRegistry>,
        job: Arc<dyn RegionJob>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            regions,
            job,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        }
    }

    /// Queue a job for `region`. The job is `pending` when this returns.
    #[instrument(skip_all, fields(region = %region))]
    pub async fn submit(&self, region: &str) -> Result<JobId> {
        let region = self.regions.require(region)?.name.clone();
        let job = ScrapeJob::pending(region.clone());
        let job_id = job.job_id;
        self.registry.insert(job).await;
        debug!(%job_id, "job submitted");

        let registry = self.registry.clone();
        let permits = self.permits.clone();
        let work = self.job.clone();
        let timeout = self.job_timeout;

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                registry.mark_failed(job_id, "scheduler shut down").await;
                return;
            };
            if !registry.mark_running(job_id).await {
                return;
            }
            info!(%job_id, region = %region, "job started");

            let mut handle = tokio::spawn({
                let region = region.clone();
                async move { work.run(&region).await }
            });

            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(Ok(cases_found))) => {
                    info!(%job_id, region = %region, cases_found, "job completed");
                    registry.mark_completed(job_id, cases_found).await;
                }
                Ok(Ok(Err(e))) => {
                    warn!(%job_id, region = %region, error = %e, "job failed");
                    registry.mark_failed(job_id, e.to_string()).await;
                }
                Ok(Err(join_error)) => {
                    let reason = if join_error.is_panic() {
                        "job panicked"
                    } else {
                        "job cancelled"
                    };
                    warn!(%job_id, region = %region, reason, "job aborted");
                    registry.mark_failed(job_id, reason).await;
                }
                Err(_) => {
                    handle.abort();
                    warn!(%job_id, region = %region, timeout_secs = timeout.as_secs(), "job timed out");
                    registry
                        .mark_failed(job_id, format!("timed out after {}s", timeout.as_secs()))
                        .await;
                }
            }
        });

        Ok(job_id)
    }

    /// Current state of a job. Unknown ids are [`DocketError::NotFound`].
    pub async fn status(&self, job_id: JobId) -> Result<ScrapeJob> {
        self.registry
            .get(job_id)
            .await
            .ok_or_else(|| DocketError::not_found(format!("job {job_id}")))
    }

    /// Submit one job per known region, optionally only those in `areas`.
    ///
    /// Jobs beyond the concurrency bound wait in `pending` for a free slot.
    #[instrument(skip_all, fields(areas = ?areas))]
    pub async fn submit_all(&self, areas: &[String]) -> Result<Vec<JobId>> {
        let selected: Vec<String> = if areas.is_empty() {
            self.regions
                .all_regions()
                .iter()
                .map(|r| r.name.clone())
                .collect()
        } else {
            let mut seen = BTreeSet::new();
            areas
                .iter()
                .flat_map(|area| self.regions.regions_in_area(area))
                .map(|r| r.name)
                .filter(|name| seen.insert(name.clone()))
                .collect()
        };

        if selected.is_empty() {
            return Err(DocketError::validation(format!(
                "no regions match areas {areas:?}"
            )));
        }

        info!(jobs = selected.len(), "submitting batch");
        let mut ids = Vec::with_capacity(selected.len());
        for region in &selected {
            ids.push(self.submit(region).await?);
        }
        Ok(ids)
    }

    /// Jobs by submission time, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ScrapeJob> {
        self.registry.recent(limit).await
    }

    /// Wait for a job to finish and return its final state.
    pub async fn wait(&self, job_id: JobId) -> Result<ScrapeJob> {
        self.registry
            .wait(job_id)
            .await
            .ok_or_else(|| DocketError::not_found(format!("job {job_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    /// Behavior keyed by region name.
    #[derive(Default)]
    struct FakeJob {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl RegionJob for FakeJob {
        async fn run(&self, region: &str) -> Result<usize> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            let outcome = match region {
                "Bolton" => Err(DocketError::Extraction("connection refused".into())),
                "Union" => panic!("parser exploded"),
                "Hebron" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(0)
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(region.len())
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }

    fn scheduler(job: Arc<FakeJob>, max_jobs: usize, timeout_secs: u64) -> JobScheduler {
        let config = SchedulerConfig {
            max_concurrent_jobs: max_jobs,
            job_timeout_secs: timeout_secs,
            ..SchedulerConfig::default()
        };
        JobScheduler::new(
            Arc::new(JobRegistry::new()),
            Arc::new(RegionRegistry::embedded()),
            job,
            &config,
        )
    }

    #[tokio::test]
    async fn job_runs_to_completion() {
        let sched = scheduler(Arc::new(FakeJob::default()), 2, 60);

        let id = sched.submit(" middletown ").await.unwrap();
        let early = sched.status(id).await.unwrap();
        assert!(matches!(early.status, JobStatus::Pending | JobStatus::Running));
        assert_eq!(early.region, "Middletown");
        assert!(early.completed_at.is_none());

        let done = sched.wait(id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.cases_found, Some("Middletown".len()));
        assert!(done.completed_at.is_some());
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn unknown_region_and_job_are_client_errors() {
        let sched = scheduler(Arc::new(FakeJob::default()), 2, 60);

        let err = sched.submit("Atlantis").await.unwrap_err();
        assert!(matches!(err, DocketError::Validation { .. }));

        let err = sched.status(JobId::new()).await.unwrap_err();
        assert!(matches!(err, DocketError::NotFound { .. }));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn job_error_marks_failed() {
        let sched = scheduler(Arc::new(FakeJob::default()), 2, 60);
        let id = sched.submit("Bolton").await.unwrap();
        let done = sched.wait(id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("connection refused"));
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn panicking_job_marks_failed() {
        let sched = scheduler(Arc::new(FakeJob::default()), 2, 60);
        let id = sched.submit("Union").await.unwrap();
        let done = sched.wait(id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("job panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_job_times_out() {
        let sched = scheduler(Arc::new(FakeJob::default()), 2, 5);
        let id = sched.submit("Hebron").await.unwrap();
        let done = sched.wait(id).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("timed out after 5s"));
    }

    #[tokio::test]
    async fn submit_all_is_bounded() {
        let job = Arc::new(FakeJob::default());
        let sched = scheduler(job.clone(), 2, 60);

        let ids = sched.submit_all(&["Middlesex County".to_string()]).await.unwrap();
        assert_eq!(ids.len(), 15);

        for id in &ids {
            let done = sched.wait(*id).await.unwrap();
            assert_eq!(done.status, JobStatus::Completed);
        }
        assert_eq!(job.runs.load(Ordering::SeqCst), 15);
        assert!(job.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(sched.recent(100).await.len(), 15);
    }

    #[tokio::test]
    async fn submit_all_overlapping_areas_deduplicates() {
        let job = Arc::new(FakeJob::default());
        let sched = scheduler(job, 4, 60);
        let ids = sched
            .submit_all(&["Windham".to_string(), "windham".to_string()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 15);
    }

    #[tokio::test]
    async fn empty_selection_is_validation_error() {
        let sched = scheduler(Arc::new(FakeJob::default()), 2, 60);
        let err = sched
            .submit_all(&["Nowhere".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DocketError::Validation { .. }));
        assert!(sched.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn terminal_states_are_final() {
        let registry = JobRegistry::new();
        let job = ScrapeJob::pending("Durham");
        let id = job.job_id;
        registry.insert(job).await;

        assert!(registry.mark_running(id).await);
        assert!(!registry.mark_running(id).await);
        assert!(registry.mark_completed(id, 3).await);
        assert!(!registry.mark_failed(id, "late").await);
        assert!(!registry.mark_running(id).await);

        let job = registry.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.cases_found, Some(3));
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn recent_orders_newest_first() {
        let registry = JobRegistry::new();
        let first = ScrapeJob::pending("Durham");
        let mut second = ScrapeJob::pending("Essex");
        second.started_at = first.started_at + chrono::Duration::seconds(1);
        registry.insert(first).await;
        registry.insert(second).await;

        let recent = registry.recent(1).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].region, "Essex");
    }
}
