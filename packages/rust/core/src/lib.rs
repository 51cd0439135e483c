//! Domain logic for docketrace.
//!
//! This crate ties the region registry, case extraction, the record store and
//! the phone-lookup service together:
//!
//! - [`lookup`]: skip-trace API client
//! - [`skiptrace`]: per-case and per-region enrichment
//! - [`pipeline`]: scrape a region and store what is new
//! - [`scheduler`]: background batch jobs over many regions

pub mod lookup;
pub mod pipeline;
pub mod scheduler;
pub mod skiptrace;

pub use lookup::{BatchDataClient, LookupOutcome, PhoneLookup};
pub use pipeline::{RegionJob, RegionPipeline, ScrapeStats};
pub use scheduler::{JobRegistry, JobScheduler};
pub use skiptrace::{EnrichmentResult, RegionEnrichmentResult, SkipTracer};
