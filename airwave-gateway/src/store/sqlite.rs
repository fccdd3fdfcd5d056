//! SQLite-based storage implementation

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};

use airwave_core::{Provider, ReturnSource};

use super::{
    Account, AccountId, AuthorizationRequest, IdentityStore, LinkId, ProviderLink, Session,
    SessionId, SessionStore, StoreError, StoreResult, MAX_PENDING_AUTHORIZATIONS,
};
use crate::crypto::generate_secret;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing both IdentityStore and SessionStore
///
/// Clones share one connection, so the same database can back both stores.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    pending_limit: usize,
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map constraint violations on writes to the store's error vocabulary
fn write_error(e: rusqlite::Error, what: String) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        match err.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StoreError::Conflict(what);
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::NotFound(what),
            _ => {}
        }
    }
    backend(e)
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn provider_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Provider> {
    let raw: String = row.get(idx)?;
    Provider::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let id: i64 = row.get(0)?;
    let email: String = row.get(1)?;
    Ok(Account {
        id: AccountId(id as u64),
        email,
        created_at: timestamp_column(row, 2)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<ProviderLink> {
    let id: i64 = row.get(0)?;
    let account_id: i64 = row.get(1)?;
    let external_id: String = row.get(3)?;
    Ok(ProviderLink {
        id: LinkId(id as u64),
        account_id: AccountId(account_id as u64),
        provider: provider_column(row, 2)?,
        external_id,
        created_at: timestamp_column(row, 4)?,
    })
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(backend)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            pending_limit: MAX_PENDING_AUTHORIZATIONS,
        })
    }

    /// Cap the number of pending authorization requests
    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit;
        self
    }

    fn pending_count(conn: &Connection) -> StoreResult<usize> {
        conn.query_row("SELECT COUNT(*) FROM authorization_requests", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(backend)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> StoreResult<()> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(backend)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    pub fn get_schema_version(conn: &Connection) -> StoreResult<i32> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(backend)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(backend)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- One account per email
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            -- Many links per account, one per provider identity
            CREATE TABLE IF NOT EXISTS provider_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                provider TEXT NOT NULL,
                external_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (provider, external_id)
            );
            CREATE INDEX IF NOT EXISTS idx_provider_links_account ON provider_links(account_id);

            -- Sign-in attempts awaiting their callback
            CREATE TABLE IF NOT EXISTS authorization_requests (
                state TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                return_source TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                ttl_secs INTEGER NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_authorization_expires ON authorization_requests(expires_at);

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(backend)?;

        Ok(())
    }
}

impl IdentityStore for SqliteStore {
    fn create_account(&self, email: &str) -> StoreResult<AccountId> {
        let normalized = email.trim().to_lowercase();
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO accounts (email, created_at) VALUES (?1, ?2)",
            params![normalized, timestamp(Utc::now())],
        )
        .map_err(|e| write_error(e, format!("account email {}", normalized)))?;

        Ok(AccountId(conn.last_insert_rowid() as u64))
    }

    fn get_account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, email, created_at FROM accounts WHERE id = ?1",
            params![account_id.0 as i64],
            account_from_row,
        )
        .optional()
        .map_err(backend)
    }

    fn get_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let normalized = email.trim().to_lowercase();
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, email, created_at FROM accounts WHERE email = ?1",
            params![normalized],
            account_from_row,
        )
        .optional()
        .map_err(backend)
    }

    fn create_link(
        &self,
        account_id: AccountId,
        provider: Provider,
        external_id: &str,
    ) -> StoreResult<LinkId> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO provider_links (account_id, provider, external_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account_id.0 as i64,
                provider.as_str(),
                external_id,
                timestamp(Utc::now())
            ],
        )
        .map_err(|e| write_error(e, format!("provider link {}/{}", provider, external_id)))?;

        Ok(LinkId(conn.last_insert_rowid() as u64))
    }

    fn get_link(&self, provider: Provider, external_id: &str) -> StoreResult<Option<ProviderLink>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, account_id, provider, external_id, created_at
             FROM provider_links WHERE provider = ?1 AND external_id = ?2",
            params![provider.as_str(), external_id],
            link_from_row,
        )
        .optional()
        .map_err(backend)
    }

    fn list_links(&self, account_id: AccountId) -> StoreResult<Vec<ProviderLink>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, account_id, provider, external_id, created_at
                 FROM provider_links WHERE account_id = ?1 ORDER BY id",
            )
            .map_err(backend)?;

        let links = stmt
            .query_map(params![account_id.0 as i64], link_from_row)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;

        Ok(links)
    }

    fn save_authorization(&self, request: AuthorizationRequest) -> StoreResult<()> {
        let conn = self.conn()?;

        if Self::pending_count(&conn)? >= self.pending_limit {
            conn.execute(
                "DELETE FROM authorization_requests WHERE expires_at <= ?1",
                params![timestamp(Utc::now())],
            )
            .map_err(backend)?;
            let count = Self::pending_count(&conn)?;
            if count >= self.pending_limit {
                return Err(StoreError::CapacityExceeded(format!(
                    "{} pending authorization requests",
                    count
                )));
            }
        }

        conn.execute(
            "INSERT INTO authorization_requests (state, provider, return_source, issued_at, ttl_secs, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.state,
                request.provider.as_str(),
                request.return_source.as_str(),
                timestamp(request.issued_at),
                request.ttl.num_seconds(),
                timestamp(request.expires_at()),
            ],
        )
        .map_err(|e| write_error(e, "authorization state".to_string()))?;

        Ok(())
    }

    fn take_authorization(&self, state: &str) -> StoreResult<Option<AuthorizationRequest>> {
        let conn = self.conn()?;

        // Delete and read in one statement so a state can only be redeemed once
        conn.query_row(
            "DELETE FROM authorization_requests WHERE state = ?1
             RETURNING state, provider, return_source, issued_at, ttl_secs",
            params![state],
            |row| {
                let state: String = row.get(0)?;
                let return_source: String = row.get(2)?;
                let ttl_secs: i64 = row.get(4)?;
                Ok(AuthorizationRequest {
                    state,
                    provider: provider_column(row, 1)?,
                    return_source: ReturnSource::parse(Some(&return_source)),
                    issued_at: timestamp_column(row, 3)?,
                    ttl: Duration::seconds(ttl_secs),
                })
            },
        )
        .optional()
        .map_err(backend)
    }

    fn cleanup_expired_authorizations(&self) -> StoreResult<u64> {
        let conn = self.conn()?;

        let rows_deleted = conn
            .execute(
                "DELETE FROM authorization_requests WHERE expires_at <= ?1",
                params![timestamp(Utc::now())],
            )
            .map_err(backend)?;

        Ok(rows_deleted as u64)
    }
}

impl SessionStore for SqliteStore {
    fn create(&self, account_id: AccountId) -> StoreResult<Session> {
        let session = Session {
            id: SessionId(generate_secret()),
            account_id,
            created_at: Utc::now(),
        };
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO sessions (id, account_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.id.0,
                account_id.0 as i64,
                timestamp(session.created_at)
            ],
        )
        .map_err(|e| write_error(e, format!("session for account {}", account_id.0)))?;

        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, account_id, created_at FROM sessions WHERE id = ?1",
            params![session_id.0],
            |row| {
                let id: String = row.get(0)?;
                let account_id: i64 = row.get(1)?;
                Ok(Session {
                    id: SessionId(id),
                    account_id: AccountId(account_id as u64),
                    created_at: timestamp_column(row, 2)?,
                })
            },
        )
        .optional()
        .map_err(backend)
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id.0])
            .map_err(backend)?;

        Ok(())
    }
}
