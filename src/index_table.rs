// 📊 Index Table - published monthly index series loaded from CSV
//
// Format: header row with `month` and `value` columns (any extra columns
// are ignored), `month` as YYYY-MM, `value` as a percentage.
//
//   month,value
//   2024-04,1.2
//   2024-05,2.1

use crate::escalation::parse_index;
use crate::period::{Period, YearMonth};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexTableError {
    #[error("failed to read index table: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: not a YYYY-MM month: {value:?}")]
    InvalidMonth { line: u64, value: String },

    #[error("line {line}: index for {month} is not a number: {value:?}")]
    InvalidValue {
        line: u64,
        month: YearMonth,
        value: String,
    },

    #[error("month {0} appears more than once")]
    DuplicateMonth(YearMonth),

    #[error("no index published for {0}")]
    MissingIndexMonth(YearMonth),
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    month: String,
    value: String,
}

/// Monthly index values keyed by month
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    values: BTreeMap<YearMonth, Decimal>,
}

impl IndexTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IndexTableError> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        Self::from_csv(rdr)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, IndexTableError> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(rdr)
    }

    fn from_csv<R: Read>(mut rdr: csv::Reader<R>) -> Result<Self, IndexTableError> {
        let mut table = IndexTable::default();

        for (i, result) in rdr.deserialize::<IndexRow>().enumerate() {
            let row = result?;
            // header is line 1
            let line = i as u64 + 2;

            let month = YearMonth::parse(&row.month).ok_or_else(|| IndexTableError::InvalidMonth {
                line,
                value: row.month.clone(),
            })?;
            let value = parse_index(&row.value).ok_or_else(|| IndexTableError::InvalidValue {
                line,
                month,
                value: row.value.clone(),
            })?;

            table.insert(month, value)?;
        }

        Ok(table)
    }

    pub fn insert(&mut self, month: YearMonth, value: Decimal) -> Result<(), IndexTableError> {
        if self.values.insert(month, value).is_some() {
            return Err(IndexTableError::DuplicateMonth(month));
        }
        Ok(())
    }

    pub fn get(&self, month: YearMonth) -> Option<Decimal> {
        self.values.get(&month).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values for every month of `period`, chronological
    pub fn select(&self, period: &Period) -> Result<Vec<Decimal>, IndexTableError> {
        period
            .months()
            .map(|month| self.get(month).ok_or(IndexTableError::MissingIndexMonth(month)))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
