use domain::PersistenceError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

fn entity_for(constraint: &str) -> &'static str {
    match constraint {
        c if c.ends_with("integration_id_fkey") => "integration",
        "one_active_integration_per_platform" => "active integration",
        "unique_listing_per_integration" => "listing",
        "unique_platform_order" => "order",
        c if c.starts_with("product_platforms") => "listing",
        c if c.starts_with("orders") => "order",
        c if c.starts_with("stock_history") || c.starts_with("price_history") => "history",
        _ => "row",
    }
}

/// Maps a driver error onto the persistence taxonomy.
pub(crate) fn db(err: sqlx::Error) -> PersistenceError {
    if let sqlx::Error::Database(ref db_err) = err {
        let code = db_err.code();
        let constraint = db_err.constraint().unwrap_or_default();
        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return PersistenceError::Conflict {
                    entity: entity_for(constraint),
                    key: constraint.to_string(),
                };
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return PersistenceError::Conflict {
                    entity: entity_for(constraint),
                    key: format!("still referenced ({constraint})"),
                };
            }
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                tracing::debug!(code = ?code, "transaction aborted by the database");
                return PersistenceError::TransactionAborted(db_err.message().to_string());
            }
            _ => {}
        }
    }
    tracing::warn!(error = %err, "unmapped database error");
    PersistenceError::Backend(Box::new(err))
}

pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> PersistenceError {
    PersistenceError::NotFound {
        entity,
        id: id.to_string(),
    }
}
