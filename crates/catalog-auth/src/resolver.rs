use crate::context::AuthContext;
use catalog_store::CatalogStore;
use catalog_types::entity::Study;
use catalog_types::perms::project_study_permissions;
use catalog_types::{
    CatalogError, CatalogId, EntityKind, EntityPermission, Member, RawAcl, StudyId,
    StudyPermission,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// The outcome of a permission check. Denial is normal control flow; only
/// adaptor failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Turn a denial into `PermissionDenied` for operations that require
    /// access.
    pub fn require(self) -> Result<(), CatalogError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(CatalogError::PermissionDenied(reason)),
        }
    }
}

pub struct PermissionResolver {
    store: Arc<dyn CatalogStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// The member strings to look up for this principal, in precedence
    /// order: user, then the single group the user resolves to in this
    /// study, then `*`.
    fn member_precedence(principal: &Member, study: &Study) -> Result<Vec<String>, CatalogError> {
        match principal {
            Member::User(user) => {
                let mut members = vec![user.clone()];
                if let Some(group) = study.group_of(user) {
                    members.push(format!("@{}", group.name));
                }
                members.push("*".to_string());
                Ok(members)
            }
            Member::Anonymous => Ok(vec!["anonymous".to_string(), "*".to_string()]),
            Member::Group(name) => Ok(vec![format!("@{name}"), "*".to_string()]),
            Member::Admin => Err(CatalogError::InvalidArgument(
                "the admin daemon resolves through the daemon-ACL table".to_string(),
            )),
            Member::Anyone => Err(CatalogError::InvalidArgument(
                "'*' is not a valid request principal".to_string(),
            )),
        }
    }

    fn first_defined<'a>(members: &[String], acls: &'a [RawAcl]) -> Option<&'a RawAcl> {
        members
            .iter()
            .find_map(|member| acls.iter().find(|a| &a.member == member))
    }

    fn parse_study_permissions(raw: &[String]) -> BTreeSet<StudyPermission> {
        raw.iter()
            .filter_map(|name| match name.parse() {
                Ok(perm) => Some(perm),
                Err(_) => {
                    warn!("ignoring unknown study permission '{name}'");
                    None
                }
            })
            .collect()
    }

    /// Check a study-level permission.
    pub async fn check_study(
        &self,
        principal: &Member,
        study_id: StudyId,
        permission: StudyPermission,
    ) -> Result<Decision, CatalogError> {
        let study = self.store.get_study(study_id).await?;
        let owner = self.store.get_study_owner(study_id).await?;

        if let Member::User(user) = principal {
            if *user == owner {
                return Ok(Decision::Allow);
            }
        }

        if *principal == Member::Admin {
            return self.check_daemon(study_id, |perms| perms.contains(&permission)).await;
        }

        let members = Self::member_precedence(principal, &study)?;
        let acls = self
            .store
            .get_acls(EntityKind::Study, study_id, Some(&members))
            .await?;
        match Self::first_defined(&members, &acls) {
            Some(entry) => {
                if entry.permissions.iter().any(|p| p == &permission.to_string()) {
                    Ok(Decision::Allow)
                } else {
                    Ok(Decision::Deny(format!(
                        "member '{}' lacks {permission} on study {study_id}",
                        entry.member
                    )))
                }
            }
            None => Ok(Decision::Deny(format!(
                "no study ACL defined for {principal} on study {study_id}"
            ))),
        }
    }

    async fn check_daemon<F>(
        &self,
        study_id: StudyId,
        evaluate: F,
    ) -> Result<Decision, CatalogError>
    where
        F: FnOnce(&BTreeSet<StudyPermission>) -> bool,
    {
        match self.store.get_daemon_acl(study_id).await? {
            Some(raw) => {
                let perms = Self::parse_study_permissions(&raw);
                if evaluate(&perms) {
                    Ok(Decision::Allow)
                } else {
                    Ok(Decision::Deny(format!(
                        "daemon ACL on study {study_id} does not grant the permission"
                    )))
                }
            }
            None => Ok(Decision::Deny(
                "admin lacks explicit daemon ACL".to_string(),
            )),
        }
    }

    /// Check an entity-level permission, walking ancestor paths for files
    /// and falling back to the projected study ACL everywhere.
    pub async fn check<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        principal: &Member,
        entity_id: CatalogId,
        permission: P,
    ) -> Result<Decision, CatalogError> {
        let study_id = self.store.study_of(P::KIND, entity_id).await?;
        let study = self.store.get_study(study_id).await?;
        let owner = self.store.get_study_owner(study_id).await?;

        if let Member::User(user) = principal {
            if *user == owner {
                return Ok(Decision::Allow);
            }
        }

        if *principal == Member::Admin {
            return self
                .check_daemon(study_id, |perms| {
                    project_study_permissions::<P>(perms).contains(&permission)
                })
                .await;
        }

        let members = Self::member_precedence(principal, &study)?;

        if P::KIND == EntityKind::File {
            if let Some(decision) = self
                .check_file_paths(ctx, study_id, entity_id, &members, permission)
                .await?
            {
                return Ok(decision);
            }
        } else {
            let acls = self
                .store
                .get_acls(P::KIND, entity_id, Some(&members))
                .await?;
            if let Some(entry) = Self::first_defined(&members, &acls) {
                return Ok(Self::evaluate_entity_entry(entry, permission, entity_id));
            }
        }

        // Nothing defined on the entity (or any ancestor): project the
        // study-level ACL through the derivation table.
        let study_acls = self
            .store
            .get_acls(EntityKind::Study, study_id, Some(&members))
            .await?;
        match Self::first_defined(&members, &study_acls) {
            Some(entry) => {
                let study_perms = Self::parse_study_permissions(&entry.permissions);
                let derived = project_study_permissions::<P>(&study_perms);
                if derived.contains(&permission) {
                    Ok(Decision::Allow)
                } else {
                    Ok(Decision::Deny(format!(
                        "member '{}' lacks {permission} on {} {entity_id} (derived from study {study_id})",
                        entry.member,
                        P::KIND.label(),
                    )))
                }
            }
            None => {
                debug!(
                    "deny {principal} {permission} on {} {entity_id}: no ACL at any level",
                    P::KIND.label()
                );
                Ok(Decision::Deny(format!(
                    "no ACL defined for {principal} on {} {entity_id}",
                    P::KIND.label()
                )))
            }
        }
    }

    fn evaluate_entity_entry<P: EntityPermission>(
        entry: &RawAcl,
        permission: P,
        entity_id: CatalogId,
    ) -> Decision {
        if entry.permissions.iter().any(|p| p == &permission.to_string()) {
            Decision::Allow
        } else {
            Decision::Deny(format!(
                "member '{}' lacks {permission} on {} {entity_id}",
                entry.member,
                P::KIND.label(),
            ))
        }
    }

    /// Walk from the file up to the study root; the first ancestor with any
    /// defined entry for the member triple decides. `None` means no ancestor
    /// had anything and the caller should fall back to the study ACL.
    async fn check_file_paths<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        study_id: StudyId,
        file_id: CatalogId,
        members: &[String],
        permission: P,
    ) -> Result<Option<Decision>, CatalogError> {
        let file = self.store.get_file(file_id).await?;
        let paths = ancestor_paths(&file.path);
        ctx.ensure_paths(self.store.as_ref(), study_id, &paths, members)
            .await?;

        for path in &paths {
            for member in members {
                match ctx.cached(path, member) {
                    Some(Some(entry)) => {
                        return Ok(Some(Self::evaluate_entity_entry(
                            entry, permission, file_id,
                        )));
                    }
                    _ => continue,
                }
            }
        }
        Ok(None)
    }
}

/// The sequence of paths from a file up to the study root: the file itself,
/// each enclosing directory (stored with a trailing `/`), and finally the
/// empty study-root path.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let mut paths = vec![path.to_string()];
    let mut current = path.trim_end_matches('/');
    while let Some(idx) = current.rfind('/') {
        current = &current[..idx];
        paths.push(format!("{current}/"));
    }
    if !path.is_empty() {
        paths.push(String::new());
    }
    paths
}
