//! Region registry: canonical (region, parent area) pairs.
//!
//! The registry is loaded once per process. [`RegionRegistry::load`] tries the
//! live reference page first and falls back to the bundled table when the page
//! cannot be fetched, cannot be parsed, or lists no regions. There is no retry
//! beyond that single fallback.

mod embedded;
mod parser;

use std::collections::HashMap;
use std::time::Duration;

use docketrace_shared::{DocketError, Region, RegionsConfig, Result};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

pub use embedded::{EMBEDDED_AREA_COUNT, EMBEDDED_REGION_COUNT};
pub use parser::clean_region_name;

/// User-Agent string for reference page requests.
const USER_AGENT: &str = concat!("docketrace/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// RegionSource
// ---------------------------------------------------------------------------

/// Where the loaded region table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSource {
    Live,
    Embedded,
}

impl std::fmt::Display for RegionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Embedded => f.write_str("embedded"),
        }
    }
}

// ---------------------------------------------------------------------------
// RegionRegistry
// ---------------------------------------------------------------------------

/// Immutable lookup table of known regions.
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    regions: Vec<Region>,
    /// Normalized name → position in `regions`.
    index: HashMap<String, usize>,
    source: RegionSource,
}

impl RegionRegistry {
    /// Build a registry from an explicit list. Later duplicates (by normalized
    /// name) are dropped.
    pub fn from_regions(regions: impl IntoIterator<Item = Region>, source: RegionSource) -> Self {
        let mut kept = Vec::new();
        let mut index = HashMap::new();

        for region in regions {
            let key = normalize_key(&region.name);
            if key.is_empty() || index.contains_key(&key) {
                continue;
            }
            index.insert(key, kept.len());
            kept.push(region);
        }

        Self {
            regions: kept,
            index,
            source,
        }
    }

    /// The bundled table.
    pub fn embedded() -> Self {
        let regions = embedded::EMBEDDED_REGIONS.iter().flat_map(|(area, names)| {
            names.iter().map(move |name| Region::new(*name, *area))
        });
        Self::from_regions(regions, RegionSource::Embedded)
    }

    /// Load from the live reference page, falling back to the bundled table.
    #[instrument(skip_all, fields(url = %config.source_url))]
    pub async fn load(config: &RegionsConfig) -> Self {
        match fetch_live(config).await {
            Ok(regions) if !regions.is_empty() => {
                let registry = Self::from_regions(regions, RegionSource::Live);
                info!(
                    regions = registry.regions.len(),
                    areas = registry.parent_areas().len(),
                    "loaded regions from reference page"
                );
                registry
            }
            Ok(_) => {
                warn!("reference page listed no regions, using embedded table");
                Self::embedded()
            }
            Err(e) => {
                warn!(error = %e, "could not load reference page, using embedded table");
                Self::embedded()
            }
        }
    }

    /// Whether the table came from the live page or the bundled fallback.
    pub fn source(&self) -> RegionSource {
        self.source
    }

    /// Case- and whitespace-insensitive membership check.
    pub fn validate(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Parent area of a region, if known.
    pub fn resolve_parent_area(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|r| r.parent_area.as_str())
    }

    /// The registry's own spelling of a region name.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|r| r.name.as_str())
    }

    /// Every region, in load order.
    pub fn all_regions(&self) -> &[Region] {
        &self.regions
    }

    /// Regions whose parent area matches `area`. A trailing " County" on the
    /// query is ignored.
    pub fn regions_in_area(&self, area: &str) -> Vec<Region> {
        let wanted = normalize_area(area);
        self.regions
            .iter()
            .filter(|r| normalize_area(&r.parent_area) == wanted)
            .cloned()
            .collect()
    }

    /// Distinct parent areas, sorted.
    pub fn parent_areas(&self) -> Vec<String> {
        let mut areas: Vec<String> = self.regions.iter().map(|r| r.parent_area.clone()).collect();
        areas.sort();
        areas.dedup();
        areas
    }

    /// Regions whose name starts with or contains `query`. Prefix matches come
    /// first.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&Region> {
        let needle = normalize_key(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut prefix = Vec::new();
        let mut contains = Vec::new();
        for region in &self.regions {
            let key = normalize_key(&region.name);
            if key.starts_with(&needle) {
                prefix.push(region);
            } else if key.contains(&needle) {
                contains.push(region);
            }
        }

        prefix.into_iter().chain(contains).take(limit).collect()
    }

    /// Canonical region name, or a validation error naming close matches.
    pub fn require(&self, name: &str) -> Result<&Region> {
        self.lookup(name).ok_or_else(|| {
            let hints: Vec<&str> = self.suggest(name, 3).iter().map(|r| r.name.as_str()).collect();
            if hints.is_empty() {
                DocketError::validation(format!("unknown region '{}'", name.trim()))
            } else {
                DocketError::validation(format!(
                    "unknown region '{}' (did you mean {}?)",
                    name.trim(),
                    hints.join(", ")
                ))
            }
        })
    }

    fn lookup(&self, name: &str) -> Option<&Region> {
        self.index
            .get(&normalize_key(name))
            .map(|&i| &self.regions[i])
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_key(name: &str) -> String {
    clean_region_name(name)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_area(area: &str) -> String {
    let lowered = area.trim().to_lowercase();
    lowered
        .strip_suffix(" county")
        .unwrap_or(&lowered)
        .trim()
        .to_string()
}

async fn fetch_live(config: &RegionsConfig) -> Result<Vec<Region>> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| DocketError::Network(format!("failed to build HTTP client: {e}")))?;

    let response = client
        .get(&config.source_url)
        .send()
        .await
        .map_err(|e| DocketError::Network(format!("{}: {e}", config.source_url)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DocketError::Network(format!(
            "{}: HTTP {status}",
            config.source_url
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| DocketError::Network(format!("{}: failed to read body: {e}", config.source_url)))?;

    let regions = parser::parse_regions(&body);
    debug!(count = regions.len(), "parsed reference page");
    Ok(regions)
}
