//! In-memory backend. Used by the test suites and by embedded deployments;
//! it honors exactly the same contract a database-backed adaptor must.

use crate::lock::{LockToken, StudyLocks};
use crate::{CatalogStore, ConfigKey, WriteResult};
use async_trait::async_trait;
use catalog_types::entity::{
    Cohort, Dataset, File, Group, Individual, Job, Panel, Project, Sample, Study,
};
use catalog_types::study_config::StudyConfiguration;
use catalog_types::{
    CatalogError, CatalogId, CohortId, DatasetId, EntityKind, FileId, IndividualId, JobId,
    PanelId, ProjectId, RawAcl, SampleId, Status, StudyId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Default)]
struct Inner {
    next_id: CatalogId,
    projects: HashMap<ProjectId, Project>,
    studies: HashMap<StudyId, Study>,
    files: HashMap<FileId, File>,
    samples: HashMap<SampleId, Sample>,
    individuals: HashMap<IndividualId, Individual>,
    cohorts: HashMap<CohortId, Cohort>,
    datasets: HashMap<DatasetId, Dataset>,
    panels: HashMap<PanelId, Panel>,
    jobs: HashMap<JobId, Job>,
    study_configs: HashMap<StudyId, StudyConfiguration>,
    config_names: HashMap<String, StudyId>,
    daemon_acls: HashMap<StudyId, Vec<String>>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    locks: StudyLocks,
}

impl MemoryStore {
    /// `id_offset` is the configured floor: every id handed out is strictly
    /// greater than it.
    pub fn new(id_offset: CatalogId) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: id_offset,
                ..Inner::default()
            }),
            locks: StudyLocks::new(),
        }
    }
}

fn not_found(kind: EntityKind, id: CatalogId) -> CatalogError {
    CatalogError::not_found(format!("{} id", kind.label()), id)
}

fn no_acl_surface(kind: EntityKind) -> CatalogError {
    CatalogError::InvalidArgument(format!(
        "{} entities do not carry ACL entries",
        kind.label()
    ))
}

impl Inner {
    fn acls_mut(&mut self, kind: EntityKind, id: CatalogId) -> Result<&mut Vec<RawAcl>, CatalogError> {
        match kind {
            EntityKind::Study => self
                .studies
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::File => self
                .files
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Sample => self
                .samples
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Individual => self
                .individuals
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Cohort => self
                .cohorts
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Dataset => self
                .datasets
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Panel => self
                .panels
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Job => self
                .jobs
                .get_mut(&id)
                .map(|e| &mut e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Project => Err(no_acl_surface(kind)),
        }
    }

    fn acls(&self, kind: EntityKind, id: CatalogId) -> Result<&Vec<RawAcl>, CatalogError> {
        match kind {
            EntityKind::Study => self
                .studies
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::File => self
                .files
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Sample => self
                .samples
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Individual => self
                .individuals
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Cohort => self
                .cohorts
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Dataset => self
                .datasets
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Panel => self
                .panels
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Job => self
                .jobs
                .get(&id)
                .map(|e| &e.acl)
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Project => Err(no_acl_surface(kind)),
        }
    }

    fn describe(&self, kind: EntityKind, id: CatalogId) -> Result<(StudyId, String, Status), CatalogError> {
        match kind {
            EntityKind::Project | EntityKind::Study => Err(CatalogError::InvalidArgument(format!(
                "{} entities are not enclosed in a study",
                kind.label()
            ))),
            EntityKind::File => self
                .files
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Sample => self
                .samples
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Individual => self
                .individuals
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Cohort => self
                .cohorts
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Dataset => self
                .datasets
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Panel => self
                .panels
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
            EntityKind::Job => self
                .jobs
                .get(&id)
                .map(|e| (e.study_id, e.name.clone(), e.status))
                .ok_or_else(|| not_found(kind, id)),
        }
    }

    fn set_status(&mut self, kind: EntityKind, id: CatalogId, status: Status) -> Result<(), CatalogError> {
        let slot = match kind {
            EntityKind::Project => self.projects.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Study => self.studies.get_mut(&id).map(|e| &mut e.status),
            EntityKind::File => self.files.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Sample => self.samples.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Individual => self.individuals.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Cohort => self.cohorts.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Dataset => self.datasets.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Panel => self.panels.get_mut(&id).map(|e| &mut e.status),
            EntityKind::Job => self.jobs.get_mut(&id).map(|e| &mut e.status),
        };
        match slot {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(not_found(kind, id)),
        }
    }

    fn find_by_name(&self, kind: EntityKind, study_id: StudyId, name: &str) -> Option<CatalogId> {
        macro_rules! scan {
            ($table:expr) => {
                $table
                    .values()
                    .find(|e| e.study_id == study_id && e.name == name)
                    .map(|e| e.id)
            };
        }
        match kind {
            EntityKind::Project | EntityKind::Study => None,
            EntityKind::File => scan!(self.files),
            EntityKind::Sample => scan!(self.samples),
            EntityKind::Individual => scan!(self.individuals),
            EntityKind::Cohort => scan!(self.cohorts),
            EntityKind::Dataset => scan!(self.datasets),
            EntityKind::Panel => scan!(self.panels),
            EntityKind::Job => scan!(self.jobs),
        }
    }

    fn exists(&self, kind: EntityKind, id: CatalogId) -> bool {
        match kind {
            EntityKind::Project => self.projects.contains_key(&id),
            EntityKind::Study => self.studies.contains_key(&id),
            EntityKind::File => self.files.contains_key(&id),
            EntityKind::Sample => self.samples.contains_key(&id),
            EntityKind::Individual => self.individuals.contains_key(&id),
            EntityKind::Cohort => self.cohorts.contains_key(&id),
            EntityKind::Dataset => self.datasets.contains_key(&id),
            EntityKind::Panel => self.panels.contains_key(&id),
            EntityKind::Job => self.jobs.contains_key(&id),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_study_configuration(
        &self,
        key: ConfigKey<'_>,
        cached_timestamp: Option<i64>,
    ) -> Result<Option<StudyConfiguration>, CatalogError> {
        let inner = self.inner.lock();
        let study_id = match key {
            ConfigKey::Id(id) => id,
            ConfigKey::Name(name) => match inner.config_names.get(name) {
                Some(id) => *id,
                None => {
                    return Err(CatalogError::not_found("Study configuration", name));
                }
            },
        };
        let config = inner
            .study_configs
            .get(&study_id)
            .ok_or_else(|| CatalogError::not_found("Study configuration", key))?;
        if cached_timestamp == Some(config.timestamp) {
            return Ok(None);
        }
        Ok(Some(config.clone()))
    }

    async fn update_study_configuration(
        &self,
        config: &StudyConfiguration,
    ) -> Result<WriteResult, CatalogError> {
        let mut inner = self.inner.lock();
        let previous = inner
            .study_configs
            .get(&config.study_id)
            .map(|c| c.timestamp)
            .unwrap_or(0);
        let timestamp = now_millis().max(previous + 1);
        let mut stored = config.clone();
        stored.timestamp = timestamp;
        inner
            .config_names
            .insert(stored.study_name.clone(), stored.study_id);
        inner.study_configs.insert(stored.study_id, stored);
        Ok(WriteResult { timestamp })
    }

    async fn lock_study(
        &self,
        study_id: StudyId,
        duration: Duration,
        timeout: Duration,
    ) -> Result<LockToken, CatalogError> {
        self.locks.acquire(study_id, duration, timeout).await
    }

    async fn unlock_study(&self, token: LockToken) -> Result<(), CatalogError> {
        self.locks.release(token);
        Ok(())
    }

    async fn extend_study_lock(
        &self,
        token: LockToken,
        duration: Duration,
    ) -> Result<(), CatalogError> {
        self.locks.extend(token, duration)
    }

    async fn create_project(&self, project: Project) -> Result<(), CatalogError> {
        self.inner.lock().projects.insert(project.id, project);
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, CatalogError> {
        self.inner
            .lock()
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Project, id))
    }

    async fn find_project_by_alias(
        &self,
        owner: &str,
        alias: &str,
    ) -> Result<Option<ProjectId>, CatalogError> {
        Ok(self
            .inner
            .lock()
            .projects
            .values()
            .find(|p| p.owner == owner && p.alias == alias)
            .map(|p| p.id))
    }

    async fn create_study(&self, study: Study) -> Result<(), CatalogError> {
        self.inner.lock().studies.insert(study.id, study);
        Ok(())
    }

    async fn get_study(&self, id: StudyId) -> Result<Study, CatalogError> {
        self.inner
            .lock()
            .studies
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Study, id))
    }

    async fn list_studies(&self) -> Result<Vec<Study>, CatalogError> {
        let mut studies: Vec<Study> = self.inner.lock().studies.values().cloned().collect();
        studies.sort_by_key(|s| s.id);
        Ok(studies)
    }

    async fn find_studies_by_alias(&self, alias: &str) -> Result<Vec<StudyId>, CatalogError> {
        let mut ids: Vec<StudyId> = self
            .inner
            .lock()
            .studies
            .values()
            .filter(|s| s.alias == alias || s.name == alias)
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_study_in_project(
        &self,
        project_id: ProjectId,
        alias: &str,
    ) -> Result<Option<StudyId>, CatalogError> {
        Ok(self
            .inner
            .lock()
            .studies
            .values()
            .find(|s| s.project_id == project_id && (s.alias == alias || s.name == alias))
            .map(|s| s.id))
    }

    async fn get_study_owner(&self, id: StudyId) -> Result<String, CatalogError> {
        let inner = self.inner.lock();
        let study = inner
            .studies
            .get(&id)
            .ok_or_else(|| not_found(EntityKind::Study, id))?;
        let project = inner
            .projects
            .get(&study.project_id)
            .ok_or_else(|| not_found(EntityKind::Project, study.project_id))?;
        Ok(project.owner.clone())
    }

    async fn update_study_groups(
        &self,
        study_id: StudyId,
        groups: Vec<Group>,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        let study = inner
            .studies
            .get_mut(&study_id)
            .ok_or_else(|| not_found(EntityKind::Study, study_id))?;
        study.groups = groups;
        Ok(())
    }

    async fn next_id(&self) -> Result<CatalogId, CatalogError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        Ok(inner.next_id)
    }

    async fn check_id(&self, kind: EntityKind, id: CatalogId) -> Result<bool, CatalogError> {
        Ok(self.inner.lock().exists(kind, id))
    }

    async fn study_of(&self, kind: EntityKind, id: CatalogId) -> Result<StudyId, CatalogError> {
        if kind == EntityKind::Study {
            let inner = self.inner.lock();
            return if inner.studies.contains_key(&id) {
                Ok(id)
            } else {
                Err(not_found(kind, id))
            };
        }
        Ok(self.inner.lock().describe(kind, id)?.0)
    }

    async fn entity_name(&self, kind: EntityKind, id: CatalogId) -> Result<String, CatalogError> {
        if kind == EntityKind::Study {
            return Ok(self
                .inner
                .lock()
                .studies
                .get(&id)
                .ok_or_else(|| not_found(kind, id))?
                .name
                .clone());
        }
        Ok(self.inner.lock().describe(kind, id)?.1)
    }

    async fn find_by_name(
        &self,
        kind: EntityKind,
        study_id: StudyId,
        name: &str,
    ) -> Result<Option<CatalogId>, CatalogError> {
        Ok(self.inner.lock().find_by_name(kind, study_id, name))
    }

    async fn update_status(
        &self,
        kind: EntityKind,
        id: CatalogId,
        status: Status,
    ) -> Result<(), CatalogError> {
        self.inner.lock().set_status(kind, id, status)
    }

    async fn get_acls(
        &self,
        kind: EntityKind,
        id: CatalogId,
        members: Option<&[String]>,
    ) -> Result<Vec<RawAcl>, CatalogError> {
        let inner = self.inner.lock();
        let acls = inner.acls(kind, id)?;
        Ok(match members {
            None => acls.clone(),
            Some(members) => acls
                .iter()
                .filter(|a| members.contains(&a.member))
                .cloned()
                .collect(),
        })
    }

    async fn create_acl(
        &self,
        kind: EntityKind,
        id: CatalogId,
        acl: RawAcl,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        let acls = inner.acls_mut(kind, id)?;
        if acls.iter().any(|a| a.member == acl.member) {
            return Err(CatalogError::Precondition(format!(
                "member '{}' already has a defined ACL on {} {id}",
                acl.member,
                kind.label()
            )));
        }
        acls.push(acl);
        Ok(())
    }

    async fn set_acls_to_member(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
        permissions: Vec<String>,
    ) -> Result<RawAcl, CatalogError> {
        let mut inner = self.inner.lock();
        let acls = inner.acls_mut(kind, id)?;
        match acls.iter_mut().find(|a| a.member == member) {
            Some(entry) => {
                entry.permissions = permissions;
                Ok(entry.clone())
            }
            None => {
                let entry = RawAcl::new(member, permissions);
                acls.push(entry.clone());
                Ok(entry)
            }
        }
    }

    async fn add_acls_to_member(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
        permissions: Vec<String>,
    ) -> Result<RawAcl, CatalogError> {
        let mut inner = self.inner.lock();
        let acls = inner.acls_mut(kind, id)?;
        let entry = acls
            .iter_mut()
            .find(|a| a.member == member)
            .ok_or_else(|| CatalogError::not_found("ACL for member", member))?;
        for perm in permissions {
            if !entry.permissions.contains(&perm) {
                entry.permissions.push(perm);
            }
        }
        Ok(entry.clone())
    }

    async fn remove_acls_from_member(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
        permissions: Vec<String>,
    ) -> Result<RawAcl, CatalogError> {
        let mut inner = self.inner.lock();
        let acls = inner.acls_mut(kind, id)?;
        let entry = acls
            .iter_mut()
            .find(|a| a.member == member)
            .ok_or_else(|| CatalogError::not_found("ACL for member", member))?;
        entry.permissions.retain(|p| !permissions.contains(p));
        Ok(entry.clone())
    }

    async fn remove_acl(
        &self,
        kind: EntityKind,
        id: CatalogId,
        member: &str,
    ) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        let acls = inner.acls_mut(kind, id)?;
        let before = acls.len();
        acls.retain(|a| a.member != member);
        if acls.len() == before {
            return Err(CatalogError::not_found("ACL for member", member));
        }
        Ok(())
    }

    async fn get_acls_by_paths(
        &self,
        study_id: StudyId,
        paths: &[String],
        members: &[String],
    ) -> Result<HashMap<String, Vec<RawAcl>>, CatalogError> {
        let inner = self.inner.lock();
        let mut result: HashMap<String, Vec<RawAcl>> = HashMap::new();
        for file in inner.files.values() {
            if file.study_id != study_id || !paths.contains(&file.path) {
                continue;
            }
            let acls: Vec<RawAcl> = file
                .acl
                .iter()
                .filter(|a| members.contains(&a.member))
                .cloned()
                .collect();
            result.entry(file.path.clone()).or_default().extend(acls);
        }
        Ok(result)
    }

    async fn get_daemon_acl(
        &self,
        study_id: StudyId,
    ) -> Result<Option<Vec<String>>, CatalogError> {
        Ok(self.inner.lock().daemon_acls.get(&study_id).cloned())
    }

    async fn set_daemon_acl(
        &self,
        study_id: StudyId,
        permissions: Vec<String>,
    ) -> Result<(), CatalogError> {
        self.inner.lock().daemon_acls.insert(study_id, permissions);
        Ok(())
    }

    async fn create_file(&self, file: File) -> Result<(), CatalogError> {
        self.inner.lock().files.insert(file.id, file);
        Ok(())
    }

    async fn get_file(&self, id: FileId) -> Result<File, CatalogError> {
        self.inner
            .lock()
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::File, id))
    }

    async fn file_by_path(
        &self,
        study_id: StudyId,
        path: &str,
    ) -> Result<Option<File>, CatalogError> {
        Ok(self
            .inner
            .lock()
            .files
            .values()
            .find(|f| f.study_id == study_id && f.path == path)
            .cloned())
    }

    async fn create_sample(&self, sample: Sample) -> Result<(), CatalogError> {
        self.inner.lock().samples.insert(sample.id, sample);
        Ok(())
    }

    async fn get_sample(&self, id: SampleId) -> Result<Sample, CatalogError> {
        self.inner
            .lock()
            .samples
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Sample, id))
    }

    async fn create_individual(&self, individual: Individual) -> Result<(), CatalogError> {
        self.inner
            .lock()
            .individuals
            .insert(individual.id, individual);
        Ok(())
    }

    async fn get_individual(&self, id: IndividualId) -> Result<Individual, CatalogError> {
        self.inner
            .lock()
            .individuals
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Individual, id))
    }

    async fn create_cohort(&self, cohort: Cohort) -> Result<(), CatalogError> {
        self.inner.lock().cohorts.insert(cohort.id, cohort);
        Ok(())
    }

    async fn get_cohort(&self, id: CohortId) -> Result<Cohort, CatalogError> {
        self.inner
            .lock()
            .cohorts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Cohort, id))
    }

    async fn update_cohort(&self, cohort: &Cohort) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        if !inner.cohorts.contains_key(&cohort.id) {
            return Err(not_found(EntityKind::Cohort, cohort.id));
        }
        inner.cohorts.insert(cohort.id, cohort.clone());
        Ok(())
    }

    async fn create_dataset(&self, dataset: Dataset) -> Result<(), CatalogError> {
        self.inner.lock().datasets.insert(dataset.id, dataset);
        Ok(())
    }

    async fn get_dataset(&self, id: DatasetId) -> Result<Dataset, CatalogError> {
        self.inner
            .lock()
            .datasets
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Dataset, id))
    }

    async fn create_panel(&self, panel: Panel) -> Result<(), CatalogError> {
        self.inner.lock().panels.insert(panel.id, panel);
        Ok(())
    }

    async fn get_panel(&self, id: PanelId) -> Result<Panel, CatalogError> {
        self.inner
            .lock()
            .panels
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Panel, id))
    }

    async fn create_job(&self, job: Job) -> Result<(), CatalogError> {
        self.inner.lock().jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Job, CatalogError> {
        self.inner
            .lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Job, id))
    }

    async fn update_job(&self, job: &Job) -> Result<(), CatalogError> {
        let mut inner = self.inner.lock();
        if !inner.jobs.contains_key(&job.id) {
            return Err(not_found(EntityKind::Job, job.id));
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn search_jobs(
        &self,
        study_id: StudyId,
        name: Option<&str>,
    ) -> Result<Vec<Job>, CatalogError> {
        let mut jobs: Vec<Job> = self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|j| j.study_id == study_id && name.map_or(true, |n| j.name == n))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.id);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_types::entity::FileType;

    async fn study_fixture() -> (MemoryStore, StudyId) {
        let store = MemoryStore::new(1000);
        let study_id = 2;
        store
            .create_project(Project {
                id: 1,
                name: "1000 genomes".into(),
                alias: "1kg".into(),
                owner: "ada".into(),
                status: Status::Ready,
            })
            .await
            .unwrap();
        store
            .create_study(Study {
                id: study_id,
                project_id: 1,
                name: "phase1".into(),
                alias: "phase1".into(),
                groups: vec![],
                acl: vec![],
                status: Status::Ready,
            })
            .await
            .unwrap();
        (store, study_id)
    }

    #[tokio::test]
    async fn config_optimistic_read() {
        let store = MemoryStore::new(1000);
        let config = StudyConfiguration::new(2, "phase1");
        let write = store.update_study_configuration(&config).await.unwrap();

        // a stale timestamp gets the document back
        let fresh = store
            .get_study_configuration(ConfigKey::Id(2), Some(0))
            .await
            .unwrap();
        assert!(fresh.is_some());
        k9::assert_equal!(fresh.unwrap().timestamp, write.timestamp);

        // a current timestamp gets nothing
        let cached = store
            .get_study_configuration(ConfigKey::Id(2), Some(write.timestamp))
            .await
            .unwrap();
        assert!(cached.is_none());

        // lookup by name works too
        let by_name = store
            .get_study_configuration(ConfigKey::Name("phase1"), None)
            .await
            .unwrap();
        k9::assert_equal!(by_name.unwrap().study_id, 2);
    }

    #[tokio::test]
    async fn config_timestamps_are_monotonic() {
        let store = MemoryStore::new(1000);
        let config = StudyConfiguration::new(2, "phase1");
        let first = store.update_study_configuration(&config).await.unwrap();
        let second = store.update_study_configuration(&config).await.unwrap();
        assert!(second.timestamp > first.timestamp);
    }

    #[tokio::test]
    async fn acl_per_member_uniqueness() {
        let (store, study_id) = study_fixture().await;
        let acl = RawAcl::new("ada", vec!["VIEW_JOBS".to_string()]);
        store
            .create_acl(EntityKind::Study, study_id, acl.clone())
            .await
            .unwrap();
        let err = store
            .create_acl(EntityKind::Study, study_id, acl)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Precondition(_)), "{err:?}");
    }

    #[tokio::test]
    async fn remove_acl_twice_fails_not_found() {
        let (store, study_id) = study_fixture().await;
        store
            .create_acl(
                EntityKind::Study,
                study_id,
                RawAcl::new("ada", vec!["VIEW_JOBS".to_string()]),
            )
            .await
            .unwrap();
        store
            .remove_acl(EntityKind::Study, study_id, "ada")
            .await
            .unwrap();
        let err = store
            .remove_acl(EntityKind::Study, study_id, "ada")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }), "{err:?}");
        // state unchanged: no entries at all
        let acls = store
            .get_acls(EntityKind::Study, study_id, None)
            .await
            .unwrap();
        assert!(acls.is_empty());
    }

    #[tokio::test]
    async fn acls_by_paths_is_scoped_to_requested_members() {
        let (store, study_id) = study_fixture().await;
        store
            .create_file(File {
                id: 10,
                study_id,
                name: "bam".into(),
                path: "data/".into(),
                file_type: FileType::Directory,
                sample_names: vec![],
                external: false,
                acl: vec![
                    RawAcl::new("ada", vec!["VIEW".to_string()]),
                    RawAcl::new("@ops", vec!["WRITE".to_string()]),
                ],
                status: Status::Ready,
            })
            .await
            .unwrap();

        let acls = store
            .get_acls_by_paths(
                study_id,
                &["data/".to_string(), "".to_string()],
                &["ada".to_string()],
            )
            .await
            .unwrap();
        let entries = &acls["data/"];
        k9::assert_equal!(entries.len(), 1);
        k9::assert_equal!(entries[0].member, "ada");
    }

    #[tokio::test]
    async fn next_id_stays_above_offset() {
        let store = MemoryStore::new(5000);
        let first = store.next_id().await.unwrap();
        let second = store.next_id().await.unwrap();
        assert!(first > 5000);
        k9::assert_equal!(second, first + 1);
    }
}
