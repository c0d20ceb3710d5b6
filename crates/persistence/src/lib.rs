//! PostgreSQL implementation of the domain unit-of-work ports.
//!
//! [`PgUnitOfWork`] opens one database transaction per unit of work. Rows are
//! read and written with plain `sqlx` queries; unique and foreign-key
//! violations are reported as `PersistenceError::Conflict`.

mod error;
mod postgres;
mod rows;

pub use postgres::{PgTransaction, PgUnitOfWork};
