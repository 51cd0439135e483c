//! libSQL record store for cases, defendants, and skip-trace results.
//!
//! [`RecordStore`] is the narrow read/write contract the pipeline depends on.
//! [`Storage`] implements it on an embedded libSQL database and adds a few
//! reporting queries used by the CLI.
//!
//! Every write is a single SQL statement, so concurrent callers sharing one
//! connection never observe a half-applied write.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use docketrace_shared::{
    Case, CostLedgerEntry, Defendant, DocketError, Environment, PhoneType, Result, SkipTraceRecord,
};
use libsql::{Connection, Database, Value, params, params::Params};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Read/write operations on persisted records.
///
/// Absence is an empty result, never an error. Any failure to reach or query
/// the store is [`DocketError::Storage`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_case_by_docket(&self, docket_number: &str) -> Result<Option<Case>>;

    /// Insert a case unless its docket number already exists. Returns whether
    /// a row was created.
    async fn insert_case(&self, case: &Case) -> Result<bool>;

    async fn get_defendants_by_docket(&self, docket_number: &str) -> Result<Vec<Defendant>>;

    async fn insert_defendant(&self, defendant: &Defendant) -> Result<()>;

    /// Phone records for a docket in one environment's collection only.
    async fn get_skip_trace_records(
        &self,
        docket_number: &str,
        environment: Environment,
    ) -> Result<Vec<SkipTraceRecord>>;

    /// Append a batch to the environment's collection. Returns rows written.
    async fn insert_skip_trace_records(
        &self,
        batch: &[SkipTraceRecord],
        environment: Environment,
    ) -> Result<usize>;

    /// Add `delta` lookups to the ledger entry, creating it if absent.
    async fn upsert_cost_ledger_entry(
        &self,
        docket_number: &str,
        environment: Environment,
        delta: u32,
    ) -> Result<CostLedgerEntry>;

    async fn get_cases_by_region(&self, region: &str) -> Result<Vec<Case>>;
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Ledger totals, optionally restricted to one environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSummary {
    pub total_cases: u64,
    pub total_lookups: u64,
    pub total_cost: f64,
}

impl CostSummary {
    pub fn average_lookups_per_case(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            self.total_lookups as f64 / self.total_cases as f64
        }
    }
}

/// How many of a region's cases have been traced in an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionTraceStats {
    pub total_cases: u64,
    pub traced_cases: u64,
}

impl RegionTraceStats {
    pub fn untraced_cases(&self) -> u64 {
        self.total_cases.saturating_sub(self.traced_cases)
    }
}

/// Everything stored for one docket. Phones stay split by environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseReport {
    pub case: Case,
    pub defendants: Vec<Defendant>,
    pub production_phones: Vec<SkipTraceRecord>,
    pub sandbox_phones: Vec<SkipTraceRecord>,
}

impl CaseReport {
    pub fn phones(&self, environment: Environment) -> &[SkipTraceRecord] {
        match environment {
            Environment::Production => &self.production_phones,
            Environment::Sandbox => &self.sandbox_phones,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Record store backed by an embedded libSQL database file.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DocketError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocketError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocketError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DocketError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Ledger entry for one docket and environment.
    pub async fn get_cost_ledger_entry(
        &self,
        docket_number: &str,
        environment: Environment,
    ) -> Result<Option<CostLedgerEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT docket_number, environment, lookup_count, cost_per_lookup
                 FROM skiptrace_costs WHERE docket_number = ?1 AND environment = ?2",
                params![docket_number, environment.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_ledger_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// Aggregate ledger totals, optionally restricted to one environment
    /// and to the cases of one region.
    pub async fn cost_summary(
        &self,
        environment: Option<Environment>,
        region: Option<&str>,
    ) -> Result<CostSummary> {
        let mut sql = String::from(
            "SELECT COUNT(*),
                    COALESCE(SUM(k.lookup_count), 0),
                    COALESCE(SUM(k.lookup_count * k.cost_per_lookup), 0.0)
             FROM skiptrace_costs k",
        );
        let mut filters = Vec::new();
        let mut values = Vec::new();
        if let Some(region) = region {
            sql.push_str(" JOIN cases c ON c.docket_number = k.docket_number");
            filters.push("c.region = ? COLLATE NOCASE");
            values.push(Value::Text(region.to_string()));
        }
        if let Some(env) = environment {
            filters.push("k.environment = ?");
            values.push(Value::Text(env.as_str().to_string()));
        }
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(CostSummary::default());
        };
        Ok(CostSummary {
            total_cases: row.get::<i64>(0).map_err(storage_err)?.max(0) as u64,
            total_lookups: row.get::<i64>(1).map_err(storage_err)?.max(0) as u64,
            total_cost: row.get::<f64>(2).map_err(storage_err)?,
        })
    }

    /// A case with its defendants and the phones found for it, one list per
    /// environment. `None` when the docket is unknown.
    pub async fn case_report(&self, docket_number: &str) -> Result<Option<CaseReport>> {
        let Some(case) = self.get_case_by_docket(docket_number).await? else {
            return Ok(None);
        };
        let defendants = self.get_defendants_by_docket(docket_number).await?;
        let production_phones = self
            .get_skip_trace_records(docket_number, Environment::Production)
            .await?;
        let sandbox_phones = self
            .get_skip_trace_records(docket_number, Environment::Sandbox)
            .await?;
        Ok(Some(CaseReport {
            case,
            defendants,
            production_phones,
            sandbox_phones,
        }))
    }

    /// Traced versus total cases for a region in one environment.
    pub async fn region_trace_stats(
        &self,
        region: &str,
        environment: Environment,
    ) -> Result<RegionTraceStats> {
        let sql = format!(
            "SELECT COUNT(DISTINCT c.docket_number), COUNT(DISTINCT s.docket_number)
             FROM cases c LEFT JOIN {table} s ON s.docket_number = c.docket_number
             WHERE c.region = ?1 COLLATE NOCASE",
            table = environment.table()
        );
        let mut rows = self
            .conn
            .query(&sql, params![region])
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(RegionTraceStats::default());
        };
        Ok(RegionTraceStats {
            total_cases: row.get::<i64>(0).map_err(storage_err)?.max(0) as u64,
            traced_cases: row.get::<i64>(1).map_err(storage_err)?.max(0) as u64,
        })
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn get_case_by_docket(&self, docket_number: &str) -> Result<Option<Case>> {
        let mut rows = self
            .conn
            .query(
                "SELECT case_name, docket_number, docket_url, region
                 FROM cases WHERE docket_number = ?1",
                params![docket_number],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_case(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_case(&self, case: &Case) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "INSERT INTO cases (docket_number, case_name, docket_url, region, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(docket_number) DO NOTHING",
                params![
                    case.docket_number.as_str(),
                    case.case_name.as_str(),
                    case.docket_url.as_str(),
                    case.region.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    async fn get_defendants_by_docket(&self, docket_number: &str) -> Result<Vec<Defendant>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, docket_number, address, region, state, postal_code
                 FROM defendants WHERE docket_number = ?1 ORDER BY id",
                params![docket_number],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(Defendant {
                name: row.get::<String>(0).map_err(storage_err)?,
                docket_number: row.get::<String>(1).map_err(storage_err)?,
                address: row.get::<Option<String>>(2).map_err(storage_err)?,
                region: row.get::<String>(3).map_err(storage_err)?,
                state: row.get::<Option<String>>(4).map_err(storage_err)?,
                postal_code: row.get::<Option<String>>(5).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    async fn insert_defendant(&self, defendant: &Defendant) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO defendants (docket_number, name, address, region, state, postal_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    defendant.docket_number.as_str(),
                    defendant.name.as_str(),
                    defendant.address.as_deref(),
                    defendant.region.as_str(),
                    defendant.state.as_deref(),
                    defendant.postal_code.as_deref(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_skip_trace_records(
        &self,
        docket_number: &str,
        environment: Environment,
    ) -> Result<Vec<SkipTraceRecord>> {
        let sql = format!(
            "SELECT docket_number, phone_number, phone_type, raw_response
             FROM {} WHERE docket_number = ?1 ORDER BY id",
            environment.table()
        );
        let mut rows = self
            .conn
            .query(&sql, params![docket_number])
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let phone_type: String = row.get(2).map_err(storage_err)?;
            results.push(SkipTraceRecord {
                docket_number: row.get::<String>(0).map_err(storage_err)?,
                phone_number: row.get::<String>(1).map_err(storage_err)?,
                phone_type: phone_type.parse::<PhoneType>()?,
                environment,
                raw_response: row.get::<Option<String>>(3).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    async fn insert_skip_trace_records(
        &self,
        batch: &[SkipTraceRecord],
        environment: Environment,
    ) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let placeholders = vec!["(?, ?, ?, ?, ?)"; batch.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} (docket_number, phone_number, phone_type, raw_response, created_at)
             VALUES {placeholders}",
            environment.table()
        );

        let mut values = Vec::with_capacity(batch.len() * 5);
        for record in batch {
            values.push(Value::Text(record.docket_number.clone()));
            values.push(Value::Text(record.phone_number.clone()));
            values.push(Value::Text(record.phone_type.as_str().to_string()));
            values.push(match &record.raw_response {
                Some(raw) => Value::Text(raw.clone()),
                None => Value::Null,
            });
            values.push(Value::Text(now.clone()));
        }

        let affected = self
            .conn
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(storage_err)?;
        tracing::debug!(environment = %environment, rows = affected, "stored skip-trace batch");
        Ok(affected as usize)
    }

    async fn upsert_cost_ledger_entry(
        &self,
        docket_number: &str,
        environment: Environment,
        delta: u32,
    ) -> Result<CostLedgerEntry> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO skiptrace_costs
                     (docket_number, environment, lookup_count, cost_per_lookup, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(docket_number, environment) DO UPDATE SET
                     lookup_count = lookup_count + excluded.lookup_count,
                     cost_per_lookup = excluded.cost_per_lookup,
                     updated_at = excluded.updated_at
                 RETURNING docket_number, environment, lookup_count, cost_per_lookup",
                params![
                    docket_number,
                    environment.as_str(),
                    i64::from(delta),
                    environment.cost_per_lookup(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => row_to_ledger_entry(&row),
            None => Err(DocketError::Storage(format!(
                "ledger upsert for {docket_number} returned no row"
            ))),
        }
    }

    async fn get_cases_by_region(&self, region: &str) -> Result<Vec<Case>> {
        let mut rows = self
            .conn
            .query(
                "SELECT case_name, docket_number, docket_url, region
                 FROM cases WHERE region = ?1 COLLATE NOCASE
                 ORDER BY created_at, docket_number",
                params![region],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_case(&row)?);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn storage_err(e: libsql::Error) -> DocketError {
    DocketError::Storage(e.to_string())
}

fn row_to_case(row: &libsql::Row) -> Result<Case> {
    Ok(Case {
        case_name: row.get::<String>(0).map_err(storage_err)?,
        docket_number: row.get::<String>(1).map_err(storage_err)?,
        docket_url: row.get::<String>(2).map_err(storage_err)?,
        region: row.get::<String>(3).map_err(storage_err)?,
    })
}

fn row_to_ledger_entry(row: &libsql::Row) -> Result<CostLedgerEntry> {
    let environment: String = row.get(1).map_err(storage_err)?;
    Ok(CostLedgerEntry {
        docket_number: row.get::<String>(0).map_err(storage_err)?,
        environment: environment
            .parse()
            .map_err(|e| DocketError::Storage(format!("corrupt ledger environment: {e}")))?,
        lookup_count: row.get::<u32>(2).map_err(storage_err)?,
        cost_per_lookup: row.get::<f64>(3).map_err(storage_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docketrace_shared::PRODUCTION_COST_PER_LOOKUP;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("dt_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn case(docket: &str, region: &str) -> Case {
        Case {
            case_name: format!("Bank v. Owner {docket}"),
            docket_number: docket.into(),
            docket_url: format!("https://civilinquiry.jud.ct.gov/{docket}"),
            region: region.into(),
        }
    }

    fn record(docket: &str, phone: &str, env: Environment) -> SkipTraceRecord {
        SkipTraceRecord {
            docket_number: docket.into(),
            phone_number: phone.into(),
            phone_type: PhoneType::classify(phone),
            environment: env,
            raw_response: Some(r#"{"ok":true}"#.into()),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("dt_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn insert_case_is_insert_if_absent() {
        let storage = test_storage().await;
        let c = case("MMX-CV24-1", "Middletown");

        assert!(storage.insert_case(&c).await.unwrap());
        let renamed = Case {
            case_name: "changed".into(),
            ..c.clone()
        };
        assert!(!storage.insert_case(&renamed).await.unwrap());

        let found = storage.get_case_by_docket("MMX-CV24-1").await.unwrap().unwrap();
        assert_eq!(found, c);
        assert!(storage.get_case_by_docket("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn defendants_round_trip_with_optional_fields() {
        let storage = test_storage().await;
        storage.insert_case(&case("D-1", "Durham")).await.unwrap();

        let full = Defendant {
            name: "Pat Roe".into(),
            docket_number: "D-1".into(),
            address: Some("12 Oak St, Durham CT 06422".into()),
            region: "Durham".into(),
            state: Some("CT".into()),
            postal_code: Some("06422".into()),
        };
        let bare = Defendant {
            name: "Sam Roe".into(),
            address: None,
            state: None,
            postal_code: None,
            ..full.clone()
        };
        storage.insert_defendant(&full).await.unwrap();
        storage.insert_defendant(&bare).await.unwrap();

        let found = storage.get_defendants_by_docket("D-1").await.unwrap();
        assert_eq!(found, vec![full, bare]);
        assert!(storage.get_defendants_by_docket("D-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cases_by_region_ignores_case() {
        let storage = test_storage().await;
        storage.insert_case(&case("A-1", "Middletown")).await.unwrap();
        storage.insert_case(&case("A-2", "Middletown")).await.unwrap();
        storage.insert_case(&case("B-1", "Durham")).await.unwrap();

        let cases = storage.get_cases_by_region("middletown").await.unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.region == "Middletown"));
    }

    #[tokio::test]
    async fn environments_are_disjoint() {
        let storage = test_storage().await;
        let sandbox = vec![
            record("X-1", "555-0100", Environment::Sandbox),
            record("X-1", "203-555-1111", Environment::Sandbox),
        ];
        let written = storage
            .insert_skip_trace_records(&sandbox, Environment::Sandbox)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let found = storage
            .get_skip_trace_records("X-1", Environment::Sandbox)
            .await
            .unwrap();
        assert_eq!(found, sandbox);
        assert!(storage
            .get_skip_trace_records("X-1", Environment::Production)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let storage = test_storage().await;
        let written = storage
            .insert_skip_trace_records(&[], Environment::Production)
            .await
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn ledger_accumulates() {
        let storage = test_storage().await;

        let first = storage
            .upsert_cost_ledger_entry("L-1", Environment::Production, 1)
            .await
            .unwrap();
        assert_eq!(first.lookup_count, 1);
        assert_eq!(first.cost_per_lookup, PRODUCTION_COST_PER_LOOKUP);

        let second = storage
            .upsert_cost_ledger_entry("L-1", Environment::Production, 1)
            .await
            .unwrap();
        assert_eq!(second.lookup_count, 2);

        let sandbox = storage
            .upsert_cost_ledger_entry("L-1", Environment::Sandbox, 3)
            .await
            .unwrap();
        assert_eq!(sandbox.lookup_count, 3);
        assert_eq!(sandbox.cost_per_lookup, 0.0);

        let stored = storage
            .get_cost_ledger_entry("L-1", Environment::Production)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn concurrent_ledger_increments_are_not_lost() {
        let storage = Arc::new(test_storage().await);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .upsert_cost_ledger_entry("C-1", Environment::Production, 1)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entry = storage
            .get_cost_ledger_entry("C-1", Environment::Production)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.lookup_count, 20);
    }

    #[tokio::test]
    async fn cost_summary_by_environment() {
        let storage = test_storage().await;
        storage
            .upsert_cost_ledger_entry("S-1", Environment::Production, 2)
            .await
            .unwrap();
        storage
            .upsert_cost_ledger_entry("S-2", Environment::Production, 1)
            .await
            .unwrap();
        storage
            .upsert_cost_ledger_entry("S-1", Environment::Sandbox, 5)
            .await
            .unwrap();

        let prod = storage
            .cost_summary(Some(Environment::Production), None)
            .await
            .unwrap();
        assert_eq!(prod.total_cases, 2);
        assert_eq!(prod.total_lookups, 3);
        assert!((prod.total_cost - 0.21).abs() < 1e-9);
        assert!((prod.average_lookups_per_case() - 1.5).abs() < 1e-9);

        let all = storage.cost_summary(None, None).await.unwrap();
        assert_eq!(all.total_lookups, 8);

        let empty = test_storage().await.cost_summary(None, None).await.unwrap();
        assert_eq!(empty, CostSummary::default());
        assert_eq!(empty.average_lookups_per_case(), 0.0);
    }

    #[tokio::test]
    async fn cost_summary_by_region() {
        let storage = test_storage().await;
        storage.insert_case(&case("M-1", "Middletown")).await.unwrap();
        storage.insert_case(&case("M-2", "Middletown")).await.unwrap();
        storage.insert_case(&case("D-1", "Durham")).await.unwrap();
        for (docket, env, n) in [
            ("M-1", Environment::Production, 2),
            ("M-2", Environment::Production, 1),
            ("M-1", Environment::Sandbox, 4),
            ("D-1", Environment::Production, 7),
            ("ORPHAN", Environment::Production, 9),
        ] {
            storage.upsert_cost_ledger_entry(docket, env, n).await.unwrap();
        }

        let prod = storage
            .cost_summary(Some(Environment::Production), Some("middletown"))
            .await
            .unwrap();
        assert_eq!(prod.total_cases, 2);
        assert_eq!(prod.total_lookups, 3);
        assert!((prod.total_cost - 0.21).abs() < 1e-9);

        let both = storage.cost_summary(None, Some("Middletown")).await.unwrap();
        assert_eq!(both.total_lookups, 7);

        let durham = storage
            .cost_summary(Some(Environment::Sandbox), Some("Durham"))
            .await
            .unwrap();
        assert_eq!(durham, CostSummary::default());

        let everything = storage.cost_summary(None, None).await.unwrap();
        assert_eq!(everything.total_lookups, 23);
    }

    #[tokio::test]
    async fn case_report_keeps_environments_apart() {
        let storage = test_storage().await;
        storage.insert_case(&case("P-1", "Putnam")).await.unwrap();
        let defendant = Defendant {
            name: "Pat Roe".into(),
            docket_number: "P-1".into(),
            address: Some("12 Oak St, Putnam CT 06260".into()),
            region: "Putnam".into(),
            state: None,
            postal_code: None,
        };
        storage.insert_defendant(&defendant).await.unwrap();
        let prod = vec![record("P-1", "860-555-0001", Environment::Production)];
        let sandbox = vec![
            record("P-1", "555-0100", Environment::Sandbox),
            record("P-1", "555-0101", Environment::Sandbox),
        ];
        storage
            .insert_skip_trace_records(&prod, Environment::Production)
            .await
            .unwrap();
        storage
            .insert_skip_trace_records(&sandbox, Environment::Sandbox)
            .await
            .unwrap();

        let report = storage.case_report("P-1").await.unwrap().unwrap();
        assert_eq!(report.case.region, "Putnam");
        assert_eq!(report.defendants, vec![defendant]);
        assert_eq!(report.phones(Environment::Production), prod.as_slice());
        assert_eq!(report.phones(Environment::Sandbox), sandbox.as_slice());

        assert!(storage.case_report("P-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn region_trace_stats_counts_distinct_cases() {
        let storage = test_storage().await;
        for docket in ["R-1", "R-2", "R-3"] {
            storage.insert_case(&case(docket, "Putnam")).await.unwrap();
        }
        storage
            .insert_skip_trace_records(
                &[
                    record("R-1", "860-555-0001", Environment::Sandbox),
                    record("R-1", "860-555-0002", Environment::Sandbox),
                ],
                Environment::Sandbox,
            )
            .await
            .unwrap();

        let stats = storage
            .region_trace_stats("putnam", Environment::Sandbox)
            .await
            .unwrap();
        assert_eq!(stats.total_cases, 3);
        assert_eq!(stats.traced_cases, 1);
        assert_eq!(stats.untraced_cases(), 2);

        let prod = storage
            .region_trace_stats("Putnam", Environment::Production)
            .await
            .unwrap();
        assert_eq!(prod.traced_cases, 0);
    }
}
