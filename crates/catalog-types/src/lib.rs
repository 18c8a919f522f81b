//! Core types shared by the catalog: entity identifiers, lifecycle status,
//! principals and ACL machinery, permission enums with their study-level
//! derivations, and the per-study configuration document.

pub mod acl;
pub mod entity;
pub mod error;
pub mod member;
pub mod perms;
pub mod status;
pub mod study_config;

pub use acl::{Acl, AclTemplate, RawAcl};
pub use error::CatalogError;
pub use member::Member;
pub use perms::{
    CohortPermission, DatasetPermission, EntityPermission, FilePermission, IndividualPermission,
    JobPermission, PanelPermission, SamplePermission, StudyPermission,
};
pub use status::Status;

/// Numeric entity ids are `i64` throughout. The adaptor boundary uses the
/// legacy `-1` sentinel for "missing"; everything above it uses `Option`.
pub type CatalogId = i64;
pub type ProjectId = i64;
pub type StudyId = i64;
pub type FileId = i64;
pub type SampleId = i64;
pub type IndividualId = i64;
pub type CohortId = i64;
pub type DatasetId = i64;
pub type PanelId = i64;
pub type JobId = i64;

/// Sentinel used only where the adaptor's numeric convention leaks through
/// (silent bulk lookups).
pub const MISSING_ID: CatalogId = -1;

/// The kinds of entity the catalog manages. Folders are directory-typed
/// rows of the file table and share [`perms::FilePermission`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Project,
    Study,
    File,
    Sample,
    Individual,
    Cohort,
    Dataset,
    Panel,
    Job,
}

impl EntityKind {
    /// Human label used in error messages: `Job id '0' does not exist`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Study => "Study",
            Self::File => "File",
            Self::Sample => "Sample",
            Self::Individual => "Individual",
            Self::Cohort => "Cohort",
            Self::Dataset => "Dataset",
            Self::Panel => "Panel",
            Self::Job => "Job",
        }
    }
}
