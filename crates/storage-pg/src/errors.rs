// Copyright 2026 Element Creations Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use idlink_storage::UniqueViolation;
use sqlx::postgres::PgQueryResult;
use thiserror::Error;
use ulid::Ulid;

use crate::telemetry::DB_UNIQUE_VIOLATIONS_COUNTER;

/// Generic error when interacting with the database
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An error which came from the database itself
    #[error(transparent)]
    Driver {
        /// The underlying error from the database driver
        source: sqlx::Error,
    },

    /// A write violated a unique constraint
    #[error("Unique constraint violated")]
    UniqueViolation {
        /// The violated constraint
        #[source]
        violation: UniqueViolation,

        /// The error as reported by the database driver
        driver: sqlx::Error,
    },

    /// An error which occurred while converting the data from the database
    #[error(transparent)]
    Inconsistency(#[from] DatabaseInconsistencyError),

    /// An error which happens when an operation affects not enough or too many
    /// rows
    #[error("Expected {expected} rows to be affected, but {actual} rows were affected")]
    RowsAffected {
        /// How many rows were expected to be affected
        expected: u64,

        /// How many rows were actually affected
        actual: u64,
    },
}

impl From<sqlx::Error> for DatabaseError {
    fn from(source: sqlx::Error) -> Self {
        let violation = source
            .as_database_error()
            .filter(|e| e.is_unique_violation())
            .map(|e| UniqueViolation::new(e.constraint().unwrap_or_default()));

        match violation {
            Some(violation) => {
                DB_UNIQUE_VIOLATIONS_COUNTER.add(1, &[]);
                Self::UniqueViolation {
                    violation,
                    driver: source,
                }
            }
            None => Self::Driver { source },
        }
    }
}

impl DatabaseError {
    pub(crate) fn ensure_affected_rows(
        result: &PgQueryResult,
        expected: u64,
    ) -> Result<(), DatabaseError> {
        let actual = result.rows_affected();
        if actual == expected {
            Ok(())
        } else {
            Err(DatabaseError::RowsAffected { expected, actual })
        }
    }
}

/// An error which occurred while converting the data from the database
#[derive(Debug, Error)]
pub struct DatabaseInconsistencyError {
    /// The table which was being queried
    table: &'static str,

    /// The column which was being queried
    column: Option<&'static str>,

    /// The row which was being queried
    row: Option<Ulid>,

    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl std::fmt::Display for DatabaseInconsistencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database inconsistency on table {}", self.table)?;
        if let Some(column) = self.column {
            write!(f, " column {column}")?;
        }
        if let Some(row) = self.row {
            write!(f, " row {row}")?;
        }

        Ok(())
    }
}

impl DatabaseInconsistencyError {
    /// Create a new [`DatabaseInconsistencyError`] for the given table
    #[must_use]
    pub(crate) const fn on(table: &'static str) -> Self {
        Self {
            table,
            column: None,
            row: None,
            source: None,
        }
    }

    /// Set the column which was being queried
    #[must_use]
    pub(crate) const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Set the row which was being queried
    #[must_use]
    pub(crate) const fn row(mut self, row: Ulid) -> Self {
        self.row = Some(row);
        self
    }

    /// Give the source of the error
    #[must_use]
    pub(crate) fn source<E: std::error::Error + Send + Sync + 'static>(
        mut self,
        source: E,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}
