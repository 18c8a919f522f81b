use serde::{Deserialize, Serialize};

/// Entity lifecycle status.
///
/// Entities are created `READY`. Soft delete walks `READY -> TRASHED ->
/// DELETED`; hard delete walks `READY -> PENDING_DELETE -> DELETED`.
/// `INVALID` is set automatically when a referenced member changes, e.g. a
/// sample is removed from a cohort. The `STAGE`/`MISSING`/`REMOVED` states
/// apply to files only.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ready,
    Trashed,
    PendingDelete,
    Deleted,
    Invalid,
    Stage,
    Missing,
    Removed,
}

impl Status {
    pub fn is_file_only(&self) -> bool {
        matches!(self, Self::Stage | Self::Missing | Self::Removed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition(&self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (Ready, Trashed) | (Ready, PendingDelete) => true,
            (Trashed, Deleted) | (PendingDelete, Deleted) => true,
            // restore from the trash
            (Trashed, Ready) => true,
            // any live entity can be invalidated when a reference changes
            (Ready, Invalid) | (Invalid, Ready) => true,
            // file staging and external-link states
            (Stage, Ready) | (Ready, Missing) | (Missing, Ready) | (Ready, Removed) => true,
            _ => false,
        }
    }

    pub fn transition(&self, next: Status) -> Result<Status, crate::CatalogError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(crate::CatalogError::Precondition(format!(
                "illegal status transition {self} -> {next}"
            )))
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_delete_path() {
        assert!(Status::Ready.can_transition(Status::Trashed));
        assert!(Status::Trashed.can_transition(Status::Deleted));
        assert!(!Status::Deleted.can_transition(Status::Ready));
    }

    #[test]
    fn hard_delete_path() {
        assert!(Status::Ready.can_transition(Status::PendingDelete));
        assert!(Status::PendingDelete.can_transition(Status::Deleted));
        assert!(!Status::PendingDelete.can_transition(Status::Trashed));
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = Status::Deleted.transition(Status::Ready).unwrap_err();
        k9::assert_equal!(
            err.to_string(),
            "illegal status transition DELETED -> READY"
        );
    }

    #[test]
    fn status_serializes_screaming() {
        k9::assert_equal!(Status::PendingDelete.to_string(), "PENDING_DELETE");
        k9::assert_equal!(
            "PENDING_DELETE".parse::<Status>().unwrap(),
            Status::PendingDelete
        );
    }
}
