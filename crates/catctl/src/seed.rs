//! Loads a JSON catalog snapshot into the embedded store, so the CLI can
//! operate on a meaningful data set.

use catalog_store::CatalogStore;
use catalog_types::entity::{Cohort, File, Individual, Job, Project, Sample, Study};
use catalog_types::study_config::StudyConfiguration;
use catalog_types::{CatalogError, StudyId};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub studies: Vec<Study>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub individuals: Vec<Individual>,
    #[serde(default)]
    pub cohorts: Vec<Cohort>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub study_configurations: Vec<StudyConfiguration>,
    #[serde(default)]
    pub daemon_acls: Vec<DaemonAclEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DaemonAclEntry {
    pub study_id: StudyId,
    pub permissions: Vec<String>,
}

pub async fn load_catalog(
    store: &dyn CatalogStore,
    path: &Path,
) -> Result<(), CatalogError> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        CatalogError::InvalidArgument(format!("cannot read catalog {}: {err}", path.display()))
    })?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&text).map_err(|err| {
        CatalogError::InvalidArgument(format!("cannot parse catalog {}: {err}", path.display()))
    })?;

    for project in snapshot.projects {
        store.create_project(project).await?;
    }
    for study in snapshot.studies {
        store.create_study(study).await?;
    }
    for file in snapshot.files {
        store.create_file(file).await?;
    }
    for sample in snapshot.samples {
        store.create_sample(sample).await?;
    }
    for individual in snapshot.individuals {
        store.create_individual(individual).await?;
    }
    for cohort in snapshot.cohorts {
        store.create_cohort(cohort).await?;
    }
    for job in snapshot.jobs {
        store.create_job(job).await?;
    }
    for mut config in snapshot.study_configurations {
        config.reindex();
        store.update_study_configuration(&config).await?;
    }
    for entry in snapshot.daemon_acls {
        store.set_daemon_acl(entry.study_id, entry.permissions).await?;
    }
    Ok(())
}
