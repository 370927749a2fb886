use emporia_core::types::DbId;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A delivery job was asked to move to a state its current state forbids.
    #[error("Delivery job {id} cannot be {action} while {status}")]
    InvalidTransition {
        id: DbId,
        status: &'static str,
        action: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = StoreError::NotFound {
            entity: "Delivery job",
            id: 12,
        };
        assert_eq!(err.to_string(), "Delivery job not found: 12");
    }

    #[test]
    fn invalid_transition_display() {
        let err = StoreError::InvalidTransition {
            id: 3,
            status: "sent",
            action: "marked failed",
        };
        assert_eq!(
            err.to_string(),
            "Delivery job 3 cannot be marked failed while sent"
        );
    }
}
