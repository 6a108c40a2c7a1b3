// Rent Ledger - Core Library
// Rent escalation by monthly indices, period validation and contract storage.
// Used by the CLI and by tests.

pub mod period;      // Month granularity periods
pub mod contract;    // Contract, forms, update history records
pub mod escalation;  // Compounding calculator
pub mod validator;   // Escalation period rules
pub mod event;       // Audit log entries
pub mod store;       // ContractStore trait + in-memory store
pub mod db;          // SQLite store
pub mod ledger;      // Quote / apply workflow
pub mod index_table; // Published index series from CSV
pub mod config;
pub mod error;

// Re-export commonly used types
pub use period::{Period, YearMonth};
pub use contract::{
    Contract, ContractDraft, ContractEdit, ContractError, IndexType, UpdateRecord,
    MAX_UPDATE_FREQUENCY,
};
pub use escalation::{
    check_index_count, parse_indices, round_currency,
    EscalationError, EscalationResult, RentEscalationCalculator,
};
pub use validator::{PeriodValidator, ProposedPeriod, ValidationFailure};
pub use store::{ContractStore, MemoryStore, StoreError};
pub use event::Event;
pub use db::{SqliteStore, setup_database, insert_event, get_events_for_entity};
pub use ledger::{EscalationQuote, RentLedger};
pub use index_table::{IndexTable, IndexTableError};
pub use config::Config;
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
