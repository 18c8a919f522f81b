use catalog_auth::PermissionResolver;
use catalog_ref::Resolver;
use catalog_store::{CatalogStore, ConfigKey, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT};
use catalog_types::entity::Group;
use catalog_types::study_config::VariableSet;
use catalog_types::{CatalogError, EntityKind, Member, StudyId, StudyPermission};
use std::sync::Arc;
use study_config::StudyConfigurationManager;
use tracing::warn;

/// Study-scoped administration: groups and variable sets. ACL work lives in
/// `catalog_auth::AclMutator`.
pub struct StudyManager {
    store: Arc<dyn CatalogStore>,
    resolver: Arc<Resolver>,
    auth: Arc<PermissionResolver>,
    configurations: Arc<StudyConfigurationManager>,
}

impl StudyManager {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        resolver: Arc<Resolver>,
        auth: Arc<PermissionResolver>,
        configurations: Arc<StudyConfigurationManager>,
    ) -> Self {
        Self {
            store,
            resolver,
            auth,
            configurations,
        }
    }

    pub async fn resolve(
        &self,
        caller: &Member,
        reference: &str,
    ) -> Result<StudyId, CatalogError> {
        self.resolver.resolve_study_ref(caller, reference).await
    }

    // ---- groups ----

    pub async fn create_group(
        &self,
        caller: &Member,
        study_reference: &str,
        name: &str,
        members: Vec<String>,
    ) -> Result<Group, CatalogError> {
        let study_id = self.gate_update(caller, study_reference).await?;
        if name.is_empty() || name.starts_with('@') {
            return Err(CatalogError::InvalidArgument(format!(
                "'{name}' is not a valid group name; the '@' prefix belongs to references only"
            )));
        }

        self.with_lock(study_id, async {
            let study = self.store.get_study(study_id).await?;
            if study.groups.iter().any(|g| g.name == name) {
                return Err(CatalogError::Conflict(format!(
                    "group '@{name}' already exists in study {study_id}"
                )));
            }
            let mut groups = study.groups;
            let group = Group {
                name: name.to_string(),
                members,
            };
            groups.push(group.clone());
            self.store.update_study_groups(study_id, groups).await?;
            Ok(group)
        })
        .await
    }

    pub async fn add_group_members(
        &self,
        caller: &Member,
        study_reference: &str,
        name: &str,
        members: Vec<String>,
    ) -> Result<Group, CatalogError> {
        let study_id = self.gate_update(caller, study_reference).await?;
        self.with_lock(study_id, async {
            let study = self.store.get_study(study_id).await?;
            let mut groups = study.groups;
            let group = groups
                .iter_mut()
                .find(|g| g.name == name)
                .ok_or_else(|| CatalogError::not_found("Group", format!("@{name}")))?;
            for member in members {
                if !group.members.contains(&member) {
                    group.members.push(member);
                }
            }
            let updated = group.clone();
            self.store.update_study_groups(study_id, groups).await?;
            Ok(updated)
        })
        .await
    }

    pub async fn remove_group_members(
        &self,
        caller: &Member,
        study_reference: &str,
        name: &str,
        members: Vec<String>,
    ) -> Result<Group, CatalogError> {
        let study_id = self.gate_update(caller, study_reference).await?;
        self.with_lock(study_id, async {
            let study = self.store.get_study(study_id).await?;
            let mut groups = study.groups;
            let group = groups
                .iter_mut()
                .find(|g| g.name == name)
                .ok_or_else(|| CatalogError::not_found("Group", format!("@{name}")))?;
            group.members.retain(|m| !members.contains(m));
            let updated = group.clone();
            self.store.update_study_groups(study_id, groups).await?;
            Ok(updated)
        })
        .await
    }

    /// Deleting a group also drops its study ACL entry, so a stale `@name`
    /// cannot keep granting access.
    pub async fn delete_group(
        &self,
        caller: &Member,
        study_reference: &str,
        name: &str,
    ) -> Result<(), CatalogError> {
        let study_id = self.gate_update(caller, study_reference).await?;
        self.with_lock(study_id, async {
            let study = self.store.get_study(study_id).await?;
            let mut groups = study.groups;
            let before = groups.len();
            groups.retain(|g| g.name != name);
            if groups.len() == before {
                return Err(CatalogError::not_found("Group", format!("@{name}")));
            }
            self.store.update_study_groups(study_id, groups).await?;

            match self
                .store
                .remove_acl(EntityKind::Study, study_id, &format!("@{name}"))
                .await
            {
                Ok(()) | Err(CatalogError::NotFound { .. }) => Ok(()),
                Err(err) => Err(err),
            }
        })
        .await
    }

    // ---- variable sets ----

    /// Variable sets visible to the caller. Confidential sets require the
    /// dedicated study permission.
    pub async fn variable_sets(
        &self,
        caller: &Member,
        study_reference: &str,
    ) -> Result<Vec<VariableSet>, CatalogError> {
        let study_id = self.resolver.resolve_study_ref(caller, study_reference).await?;
        self.auth
            .check_study(caller, study_id, StudyPermission::ViewStudy)
            .await?
            .require()?;

        let config = self.configurations.get_view(ConfigKey::Id(study_id)).await?;
        let mut sets = config.variable_sets.clone();
        if sets.iter().any(|vs| vs.confidential) {
            let confidential_ok = self
                .auth
                .check_study(
                    caller,
                    study_id,
                    StudyPermission::ConfidentialVariableSetAccess,
                )
                .await?
                .is_allow();
            if !confidential_ok {
                sets.retain(|vs| !vs.confidential);
            }
        }
        Ok(sets)
    }

    pub async fn add_variable_set(
        &self,
        caller: &Member,
        study_reference: &str,
        variable_set: VariableSet,
    ) -> Result<(), CatalogError> {
        let study_id = self.gate_update(caller, study_reference).await?;
        self.configurations
            .modify(study_id, move |config| {
                if config
                    .variable_sets
                    .iter()
                    .any(|vs| vs.id == variable_set.id || vs.name == variable_set.name)
                {
                    return Err(CatalogError::Conflict(format!(
                        "variable set '{}' already exists",
                        variable_set.name
                    )));
                }
                config.variable_sets.push(variable_set);
                Ok(())
            })
            .await
    }

    async fn gate_update(
        &self,
        caller: &Member,
        study_reference: &str,
    ) -> Result<StudyId, CatalogError> {
        let study_id = self.resolver.resolve_study_ref(caller, study_reference).await?;
        self.auth
            .check_study(caller, study_id, StudyPermission::UpdateStudy)
            .await?
            .require()?;
        Ok(study_id)
    }

    async fn with_lock<T, Fut>(&self, study_id: StudyId, fut: Fut) -> Result<T, CatalogError>
    where
        Fut: std::future::Future<Output = Result<T, CatalogError>>,
    {
        let token = self
            .store
            .lock_study(study_id, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT)
            .await?;
        let result = fut.await;
        if let Err(err) = self.store.unlock_study(token).await {
            warn!("failed to release the lock on study {study_id}: {err:#}");
        }
        result
    }
}
