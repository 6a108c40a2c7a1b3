use crate::contract::{Contract, IndexType, UpdateRecord};
use crate::event::Event;
use crate::store::{check_writable, ContractStore, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Contracts (money columns hold canonical decimal strings)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contracts (
            id TEXT PRIMARY KEY NOT NULL,
            property TEXT NOT NULL,
            tenant TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            update_frequency INTEGER NOT NULL,
            index_type TEXT NOT NULL,
            deposit_multiplier TEXT NOT NULL,
            initial_rent TEXT NOT NULL,
            current_rent TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            owner TEXT NOT NULL,
            created_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // ==========================================================================
    // Update history (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS update_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT UNIQUE NOT NULL,
            contract_id TEXT NOT NULL REFERENCES contracts(id),
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            old_rent TEXT NOT NULL,
            new_rent TEXT NOT NULL,
            old_deposit TEXT NOT NULL,
            new_deposit TEXT NOT NULL,
            applied_indices TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            updated_by TEXT NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contracts_owner ON contracts(owner, active)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_contract ON update_history(contract_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp_column(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| conversion_error(5, e))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// Row decoding
// ============================================================================

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

const CONTRACT_COLUMNS: &str = "id, property, tenant, start_date, end_date, update_frequency,
    index_type, deposit_multiplier, initial_rent, current_rent, active, owner,
    created_at, version";

fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<Contract> {
    let index_type: String = row.get(6)?;

    Ok(Contract {
        id: row.get(0)?,
        property: row.get(1)?,
        tenant: row.get(2)?,
        start_date: date_column(row, 3)?,
        end_date: date_column(row, 4)?,
        update_frequency: row.get(5)?,
        index_type: IndexType::parse(&index_type),
        deposit_multiplier: decimal_column(row, 7)?,
        initial_rent: decimal_column(row, 8)?,
        current_rent: decimal_column(row, 9)?,
        active: row.get(10)?,
        owner: row.get(11)?,
        created_at: timestamp_column(row, 12)?,
        version: row.get(13)?,
    })
}

const HISTORY_COLUMNS: &str = "record_id, contract_id, period_start, period_end, old_rent,
    new_rent, old_deposit, new_deposit, applied_indices, applied_at, updated_by,
    idempotency_hash";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<UpdateRecord> {
    let indices_json: String = row.get(8)?;

    Ok(UpdateRecord {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        period_start: row.get(2)?,
        period_end: row.get(3)?,
        old_rent: decimal_column(row, 4)?,
        new_rent: decimal_column(row, 5)?,
        old_deposit: decimal_column(row, 6)?,
        new_deposit: decimal_column(row, 7)?,
        applied_indices: serde_json::from_str(&indices_json)
            .map_err(|e| conversion_error(8, e))?,
        applied_at: timestamp_column(row, 9)?,
        updated_by: row.get(10)?,
        idempotency_hash: row.get(11)?,
    })
}

fn load_contract(conn: &Connection, id: &str) -> Result<Option<Contract>, StoreError> {
    let sql = format!("SELECT {} FROM contracts WHERE id = ?1", CONTRACT_COLUMNS);
    Ok(conn.query_row(&sql, [id], contract_from_row).optional()?)
}

fn require_contract(conn: &Connection, id: &str) -> Result<Contract, StoreError> {
    load_contract(conn, id)?.ok_or_else(|| StoreError::ContractNotFound(id.to_string()))
}

/// Conditional write: only succeeds while the stored version is `expected`
fn bump_version_if(
    conn: &Connection,
    contract_id: &str,
    expected: i64,
    set_clause: &str,
    extra: &[&dyn rusqlite::ToSql],
) -> Result<(), StoreError> {
    let sql = format!(
        "UPDATE contracts SET {}, version = version + 1 WHERE id = ?1 AND version = ?2",
        set_clause
    );
    let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(2 + extra.len());
    values.push(&contract_id);
    values.push(&expected);
    values.extend_from_slice(extra);

    let changed = conn.execute(&sql, values.as_slice())?;
    if changed != 1 {
        let found = require_contract(conn, contract_id)?.version;
        return Err(StoreError::StaleContract {
            contract_id: contract_id.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SQLite store
// ============================================================================

/// `ContractStore` on a single SQLite connection.
///
/// Each mutation runs in its own transaction: read + version check +
/// conditional UPDATE + history/event inserts commit together or not at all.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        info!(path = %path.display(), "database ready");
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn count_contracts(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM contracts", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl ContractStore for SqliteStore {
    fn insert_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let result = tx.execute(
            "INSERT INTO contracts (
                id, property, tenant, start_date, end_date, update_frequency,
                index_type, deposit_multiplier, initial_rent, current_rent, active, owner,
                created_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                contract.id,
                contract.property,
                contract.tenant,
                contract.start_date.to_string(),
                contract.end_date.to_string(),
                contract.update_frequency,
                contract.index_type.as_str(),
                contract.deposit_multiplier.to_string(),
                contract.initial_rent.to_string(),
                contract.current_rent.to_string(),
                contract.active,
                contract.owner,
                contract.created_at.to_rfc3339(),
                contract.version,
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::DuplicateContract(contract.id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        insert_event(&tx, &Event::contract_created(contract))?;
        tx.commit()?;

        debug!(contract_id = %contract.id, "contract inserted");
        Ok(())
    }

    fn get_contract(&self, id: &str) -> Result<Option<Contract>, StoreError> {
        let conn = self.lock()?;
        load_contract(&conn, id)
    }

    fn list_active(&self, owner: &str) -> Result<Vec<Contract>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM contracts WHERE owner = ?1 AND active = 1 ORDER BY created_at, id",
            CONTRACT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let contracts = stmt
            .query_map([owner], contract_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(contracts)
    }

    fn history(&self, contract_id: &str) -> Result<Vec<UpdateRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM update_history WHERE contract_id = ?1 ORDER BY id",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let records = stmt
            .query_map([contract_id], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn update_contract(&self, contract: &Contract, expected_version: i64) -> Result<Contract, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let stored = require_contract(&tx, &contract.id)?;
        check_writable(&stored, expected_version)?;

        bump_version_if(
            &tx,
            &contract.id,
            expected_version,
            "property = ?3, tenant = ?4, start_date = ?5, end_date = ?6,
             update_frequency = ?7, index_type = ?8, deposit_multiplier = ?9,
             initial_rent = ?10, current_rent = ?11",
            params![
                contract.property,
                contract.tenant,
                contract.start_date.to_string(),
                contract.end_date.to_string(),
                contract.update_frequency,
                contract.index_type.as_str(),
                contract.deposit_multiplier.to_string(),
                contract.initial_rent.to_string(),
                contract.current_rent.to_string(),
            ],
        )?;

        let updated = require_contract(&tx, &contract.id)?;
        insert_event(&tx, &Event::contract_edited(&updated))?;
        tx.commit()?;

        Ok(updated)
    }

    fn retire(&self, contract_id: &str, expected_version: i64) -> Result<Contract, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let stored = require_contract(&tx, contract_id)?;
        check_writable(&stored, expected_version)?;

        bump_version_if(&tx, contract_id, expected_version, "active = 0", params![])?;

        let retired = require_contract(&tx, contract_id)?;
        insert_event(&tx, &Event::contract_retired(&retired))?;
        tx.commit()?;

        Ok(retired)
    }

    fn commit_escalation(
        &self,
        contract_id: &str,
        expected_version: i64,
        record: &UpdateRecord,
    ) -> Result<Contract, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let stored = require_contract(&tx, contract_id)?;
        check_writable(&stored, expected_version)?;

        bump_version_if(
            &tx,
            contract_id,
            expected_version,
            "current_rent = ?3",
            params![record.new_rent.to_string()],
        )?;

        let indices_json = serde_json::to_string(&record.applied_indices)?;
        let result = tx.execute(
            "INSERT INTO update_history (
                record_id, contract_id, period_start, period_end, old_rent,
                new_rent, old_deposit, new_deposit, applied_indices, applied_at, updated_by,
                idempotency_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id,
                contract_id,
                record.period_start,
                record.period_end,
                record.old_rent.to_string(),
                record.new_rent.to_string(),
                record.old_deposit.to_string(),
                record.new_deposit.to_string(),
                indices_json,
                record.applied_at.to_rfc3339(),
                record.updated_by,
                record.idempotency_hash,
            ],
        );

        // Dropping `tx` without commit rolls back the rent update too
        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::DuplicateUpdate {
                    contract_id: contract_id.to_string(),
                    idempotency_hash: record.idempotency_hash.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        insert_event(&tx, &Event::rent_escalated(record))?;
        let updated = require_contract(&tx, contract_id)?;
        tx.commit()?;

        debug!(contract_id, version = updated.version, "escalation committed");
        Ok(updated)
    }

    fn events(&self, contract_id: &str) -> Result<Vec<Event>, StoreError> {
        let conn = self.lock()?;
        get_events_for_entity(&conn, "contract", contract_id)
    }
}
