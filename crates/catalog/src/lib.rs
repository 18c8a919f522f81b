//! The manager layer: wires the identifier resolver, the permission engine,
//! the study-configuration manager and the scheduler bridge into the
//! operations the outer surfaces (REST, CLI) call.

use catalog_auth::{AclMutator, PermissionResolver};
use catalog_ref::Resolver;
use catalog_store::CatalogStore;
use gridengine::{BatchScheduler, GridEngineBridge, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_config::StudyConfigurationManager;

pub mod jobs;
pub mod result;
pub mod studies;

pub use jobs::{JobManager, SubmitJobRequest};
pub use result::EntryResult;
pub use studies::StudyManager;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CatalogConfig {
    /// Every entity id handed out is strictly greater than this; numeric
    /// references at or below it are treated as names.
    #[serde(default = "CatalogConfig::default_id_offset")]
    pub id_offset: i64,

    pub scheduler: SchedulerConfig,
}

impl CatalogConfig {
    fn default_id_offset() -> i64 {
        1000
    }
}

pub struct CatalogManager {
    store: Arc<dyn CatalogStore>,
    resolver: Arc<Resolver>,
    auth: Arc<PermissionResolver>,
    acls: Arc<AclMutator>,
    study_configurations: Arc<StudyConfigurationManager>,
    jobs: JobManager,
    studies: StudyManager,
}

impl CatalogManager {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        scheduler: Arc<dyn BatchScheduler>,
        config: CatalogConfig,
    ) -> Self {
        let resolver = Arc::new(Resolver::new(store.clone(), config.id_offset));
        let auth = Arc::new(PermissionResolver::new(store.clone()));
        let acls = Arc::new(AclMutator::new(store.clone()));
        let study_configurations = Arc::new(StudyConfigurationManager::new(store.clone()));
        let bridge = Arc::new(GridEngineBridge::new(scheduler, config.scheduler.clone()));

        let jobs = JobManager::new(
            store.clone(),
            resolver.clone(),
            auth.clone(),
            bridge,
        );
        let studies = StudyManager::new(
            store.clone(),
            resolver.clone(),
            auth.clone(),
            study_configurations.clone(),
        );

        Self {
            store,
            resolver,
            auth,
            acls,
            study_configurations,
            jobs,
            studies,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn auth(&self) -> &PermissionResolver {
        &self.auth
    }

    pub fn acls(&self) -> &AclMutator {
        &self.acls
    }

    pub fn study_configurations(&self) -> &StudyConfigurationManager {
        &self.study_configurations
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn studies(&self) -> &StudyManager {
        &self.studies
    }
}
