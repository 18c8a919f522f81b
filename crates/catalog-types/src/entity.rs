//! Entity documents as the adaptor persists them. ACL entries are embedded
//! inline on each document (one of the two layouts the adaptor contract
//! allows). Back-references such as `study_id` are lookup relations only.

use crate::acl::RawAcl;
use crate::status::Status;
use crate::{
    CohortId, DatasetId, FileId, IndividualId, JobId, PanelId, ProjectId, SampleId, StudyId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub alias: String,
    /// The owning user. Studies inherit their owner from here.
    pub owner: String,
    #[serde(default)]
    pub status: Status,
}

/// A named group of users within a study, referenced in ACLs as `@name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub id: StudyId,
    pub project_id: ProjectId,
    pub name: String,
    pub alias: String,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

impl Study {
    /// The single group a member resolves to in this study: the first group,
    /// in declared order, that lists the user.
    pub fn group_of(&self, user: &str) -> Option<&Group> {
        self.groups
            .iter()
            .find(|g| g.members.iter().any(|m| m == user))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub study_id: StudyId,
    pub name: String,
    /// Path relative to the study root, `/`-separated. Directories end in
    /// `/`; the study root is the empty path.
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Sample names declared by the file, in file order.
    #[serde(default)]
    pub sample_names: Vec<String>,
    /// True for linked external files, which unlink to `REMOVED`.
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub name: String,
    pub variable_set_id: i64,
    #[serde(default)]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub study_id: StudyId,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    /// `None` when the caller may not view annotations; the resolver nulls
    /// this out rather than filtering the whole entity.
    #[serde(default)]
    pub annotation_sets: Option<Vec<AnnotationSet>>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,
    pub study_id: StudyId,
    pub name: String,
    #[serde(default)]
    pub sample_ids: Vec<SampleId>,
    #[serde(default)]
    pub annotation_sets: Option<Vec<AnnotationSet>>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: CohortId,
    pub study_id: StudyId,
    pub name: String,
    #[serde(default)]
    pub sample_ids: Vec<SampleId>,
    #[serde(default)]
    pub annotation_sets: Option<Vec<AnnotationSet>>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub study_id: StudyId,
    pub name: String,
    #[serde(default)]
    pub file_ids: Vec<FileId>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub id: PanelId,
    pub study_id: StudyId,
    pub name: String,
    #[serde(default)]
    pub genes: Vec<String>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub study_id: StudyId,
    pub name: String,
    pub tool_name: String,
    /// The user who submitted the job.
    pub user_id: String,
    pub out_dir: String,
    pub command_line: String,
    #[serde(default)]
    pub queue: Option<String>,
    /// Set on first `visit`; see the job manager.
    #[serde(default)]
    pub visited: bool,
    /// Last state reconciled from the batch scheduler, e.g. `RUNNING` or
    /// `EXECUTION_ERROR`. `None` until the first probe.
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub acl: Vec<RawAcl>,
    #[serde(default)]
    pub status: Status,
}
