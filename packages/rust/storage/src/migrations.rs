//! SQL migration definitions for the docketrace record store.
//!
//! Migrations are applied in order on database open. Each migration carries a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: cases, defendants, skip-trace collections",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cases (
    docket_number TEXT PRIMARY KEY,
    case_name     TEXT NOT NULL,
    docket_url    TEXT NOT NULL,
    region        TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cases_region ON cases(region COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS defendants (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    docket_number TEXT NOT NULL REFERENCES cases(docket_number) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    address       TEXT,
    region        TEXT NOT NULL,
    state         TEXT,
    postal_code   TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_defendants_docket ON defendants(docket_number);

-- Production and sandbox phone records live in separate tables.
CREATE TABLE IF NOT EXISTS skiptrace (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    docket_number TEXT NOT NULL,
    phone_number  TEXT NOT NULL,
    phone_type    TEXT NOT NULL,
    raw_response  TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_skiptrace_docket ON skiptrace(docket_number);

CREATE TABLE IF NOT EXISTS skiptrace_sandbox (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    docket_number TEXT NOT NULL,
    phone_number  TEXT NOT NULL,
    phone_type    TEXT NOT NULL,
    raw_response  TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_skiptrace_sandbox_docket ON skiptrace_sandbox(docket_number);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Cost ledger keyed by docket and environment",
            sql: r#"
CREATE TABLE IF NOT EXISTS skiptrace_costs (
    docket_number   TEXT NOT NULL,
    environment     TEXT NOT NULL CHECK (environment IN ('sandbox', 'production')),
    lookup_count    INTEGER NOT NULL DEFAULT 0,
    cost_per_lookup REAL NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (docket_number, environment)
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
