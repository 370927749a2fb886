use emporia_db::StoreError;

/// Failure of a dispatch operation.
///
/// Only storage failures surface here. A missing recipient or a failed inline
/// delivery is a partial success reported through
/// [`SendOutcome`](crate::dispatcher::SendOutcome).
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
