#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.to_string(),
        }
    }
}
