//! The metadata adaptor boundary: a narrow async trait over whatever backend
//! persists catalog entities, plus an in-memory implementation used by tests
//! and embedded deployments.
//!
//! Consistency contract: `lock_study` provides mutual exclusion at least
//! across all processes sharing a backend, and `get_study_configuration`
//! observes any write that completed before the call returned.

use async_trait::async_trait;
use catalog_types::entity::{
    Cohort, Dataset, File, Group, Individual, Job, Panel, Project, Sample, Study,
};
use catalog_types::study_config::StudyConfiguration;
use catalog_types::{
    CatalogError, CatalogId, CohortId, DatasetId, EntityKind, FileId, IndividualId, JobId,
    PanelId, ProjectId, RawAcl, SampleId, Status, StudyId,
};
use std::collections::HashMap;
use std::time::Duration;

pub mod lock;
pub mod memory;

pub use lock::{LockToken, StudyLocks, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT};
pub use memory::MemoryStore;

/// Returned by configuration writes; carries the new document timestamp so
/// callers can refresh their caches without a follow-up read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub timestamp: i64,
}

/// Study configurations can be addressed by id or by study name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey<'a> {
    Id(StudyId),
    Name(&'a str),
}

impl std::fmt::Display for ConfigKey<'_> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(fmt, "{id}"),
            Self::Name(name) => write!(fmt, "{name}"),
        }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ---- study configuration ----

    /// Fetch a study configuration. When `cached_timestamp` matches the
    /// stored document, returns `Ok(None)` so the caller can keep its cached
    /// copy without paying for deserialization.
    async fn get_study_configuration(
        &self,
        key: ConfigKey<'_>,
        cached_timestamp: Option<i64>,
    ) -> Result<Option<StudyConfiguration>, CatalogError>;

    /// Upsert a study configuration, bumping its monotonic timestamp.
    /// Callers must hold the study lock.
    async fn update_study_configuration(
        &self,
        config: &StudyConfiguration,
    ) -> Result<WriteResult, CatalogError>;

    async fn lock_study(
        &self,
        study_id: StudyId,
        duration: Duration,
        timeout: Duration,
    ) -> Result<LockToken, CatalogError>;

    /// Idempotent; silent on expired or foreign tokens.
    async fn unlock_study(&self, token: LockToken) -> Result<(), CatalogError>;

    /// Renew a held lock for operations that outlive the declared duration.
    async fn extend_study_lock(
        &self,
        token: LockToken,
        duration: Duration,
    ) -> Result<(), CatalogError>;

    // ---- projects and studies ----

    async fn create_project(&self, project: Project) -> Result<(), CatalogError>;
    async fn get_project(&self, id: ProjectId) -> Result<Project, CatalogError>;
    async fn find_project_by_alias(
        &self,
        owner: &str,
        alias: &str,
    ) -> Result<Option<ProjectId>, CatalogError>;

    async fn create_study(&self, study: Study) -> Result<(), CatalogError>;
    async fn get_study(&self, id: StudyId) -> Result<Study, CatalogError>;
    async fn list_studies(&self) -> Result<Vec<Study>, CatalogError>;
    /// All studies carrying this alias, across every project. More than one
    /// hit means a bare reference is ambiguous.
    async fn find_studies_by_alias(&self, alias: &str) -> Result<Vec<StudyId>, CatalogError>;
    async fn find_study_in_project(
        &self,
        project_id: ProjectId,
        alias: &str,
    ) -> Result<Option<StudyId>, CatalogError>;
    /// The owner of the project enclosing this study.
    async fn get_study_owner(&self, id: StudyId) -> Result<String, CatalogError>;
    async fn update_study_groups(
        &self,
        study_id: StudyId,
        groups: Vec<Group>,
    ) -> Result<(), CatalogError>;

    // ---- generic entity surface ----

    /// Next id from the global sequence. All ids are strictly greater than
    /// the configured offset.
    async fn next_id(&self) -> Result<CatalogId, CatalogError>;
    async fn check_id(&self, kind: EntityKind, id: CatalogId) -> Result<bool, CatalogError>;
    async fn study_of(&self, kind: EntityKind, id: CatalogId) -> Result<StudyId, CatalogError>;
    async fn entity_name(&self, kind: EntityKind, id: CatalogId) -> Result<String, CatalogError>;
    async fn find_by_name(
        &self,
        kind: EntityKind,
        study_id: StudyId,
        name: &str,
    ) -> Result<Option<CatalogId>, CatalogError>;
    async fn update_status(
        &self,
        kind: EntityKind,
        id: CatalogId,
        status: Status,
    ) -> Result<(), CatalogError>;

    // ---- ACL entries ----

    /// ACL entries on one entity, optionally narrowed to a member list.
    async fn get_acls(
        &self,
        kind: EntityKind,
        id: CatalogId,
        members: Option<&[String]>,
    ) -> Result<Vec<RawAcl>, CatalogError>;

    /// Insert a new entry. Fails `Precondition` when the member already has
    /// one (per-member uniqueness is enforced here as the last line of
    /// defense).
    async fn create_acl(
        &self,
        kind: EntityKind,
        id: CatalogId,
        acl: RawAcl,
    ) -> Result<(), CatalogError>;

    async fn set_acls_to_member(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
        permissions: Vec<String>,
    ) -> Result<RawAcl, CatalogError>;

    async fn add_acls_to_member(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
        permissions: Vec<String>,
    ) -> Result<RawAcl, CatalogError>;

    async fn remove_acls_from_member(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
        permissions: Vec<String>,
    ) -> Result<RawAcl, CatalogError>;

    /// Remove the whole entry; `NotFound` when the member has none.
    async fn remove_acl(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
    ) -> Result<(), CatalogError>;

    /// Bulk fetch for the path-walking resolver: every ACL entry for the
    /// given members on file rows whose path is in `paths`. One round-trip
    /// regardless of how many paths are asked for.
    async fn get_acls_by_paths(
        &self,
        study_id: StudyId,
        paths: &[String],
        members: &[String],
    ) -> Result<HashMap<String, Vec<RawAcl>>, CatalogError>;

    // ---- daemon ACL table ----

    async fn get_daemon_acl(&self, study_id: StudyId)
        -> Result<Option<Vec<String>>, CatalogError>;
    async fn set_daemon_acl(
        &self,
        study_id: StudyId,
        permissions: Vec<String>,
    ) -> Result<(), CatalogError>;

    // ---- typed CRUD ----

    async fn create_file(&self, file: File) -> Result<(), CatalogError>;
    async fn get_file(&self, id: FileId) -> Result<File, CatalogError>;
    async fn file_by_path(
        &self,
        study_id: StudyId,
        path: &str,
    ) -> Result<Option<File>, CatalogError>;

    async fn create_sample(&self, sample: Sample) -> Result<(), CatalogError>;
    async fn get_sample(&self, id: SampleId) -> Result<Sample, CatalogError>;

    async fn create_individual(&self, individual: Individual) -> Result<(), CatalogError>;
    async fn get_individual(&self, id: IndividualId) -> Result<Individual, CatalogError>;

    async fn create_cohort(&self, cohort: Cohort) -> Result<(), CatalogError>;
    async fn get_cohort(&self, id: CohortId) -> Result<Cohort, CatalogError>;
    async fn update_cohort(&self, cohort: &Cohort) -> Result<(), CatalogError>;

    async fn create_dataset(&self, dataset: Dataset) -> Result<(), CatalogError>;
    async fn get_dataset(&self, id: DatasetId) -> Result<Dataset, CatalogError>;

    async fn create_panel(&self, panel: Panel) -> Result<(), CatalogError>;
    async fn get_panel(&self, id: PanelId) -> Result<Panel, CatalogError>;

    async fn create_job(&self, job: Job) -> Result<(), CatalogError>;
    async fn get_job(&self, id: JobId) -> Result<Job, CatalogError>;
    async fn update_job(&self, job: &Job) -> Result<(), CatalogError>;
    async fn search_jobs(
        &self,
        study_id: StudyId,
        name: Option<&str>,
    ) -> Result<Vec<Job>, CatalogError>;
}
