use thiserror::Error;

/// The error taxonomy shared by every catalog component.
///
/// `NotFound` and `PermissionDenied` are normal control flow and are not
/// logged as errors. `Internal` wraps adaptor or scheduler I/O failures and
/// is surfaced opaquely after logging with full context.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{what} '{name}' does not exist")]
    NotFound { what: String, name: String },

    #[error("'{name}' matches more than one {what}")]
    Ambiguous { what: String, name: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("timed out acquiring the lock on study {study_id}")]
    Timeout { study_id: i64 },

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn not_found<W: Into<String>, N: std::fmt::Display>(what: W, name: N) -> Self {
        Self::NotFound {
            what: what.into(),
            name: name.to_string(),
        }
    }

    pub fn ambiguous<W: Into<String>, N: std::fmt::Display>(what: W, name: N) -> Self {
        Self::Ambiguous {
            what: what.into(),
            name: name.to_string(),
        }
    }

    /// Exit code for the CLI wrapper: 0 is success, and errors map onto the
    /// documented 1..=5 range.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::Precondition(_) => 1,
            Self::PermissionDenied(_) => 2,
            Self::NotFound { .. } | Self::Ambiguous { .. } => 3,
            Self::Conflict(_) | Self::Timeout { .. } => 4,
            Self::Internal(_) => 5,
        }
    }

    /// Single-sentence message for the REST collaborator's error envelope.
    pub fn envelope_message(&self) -> String {
        self.to_string()
    }
}
