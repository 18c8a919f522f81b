//! ACL administration. Every mutation is serialized under the study lock so
//! ACL writes cannot interleave with configuration updates touching the
//! same study.

use crate::context::AuthContext;
use crate::resolver::PermissionResolver;
use catalog_store::{CatalogStore, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT};
use catalog_types::{
    Acl, AclTemplate, CatalogError, CatalogId, EntityKind, EntityPermission, Member,
    StudyId, StudyPermission,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// How `update_acl` amends an existing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclUpdate<P: Ord> {
    /// Replace the permission set.
    Set(BTreeSet<P>),
    /// Union the given permissions in.
    Add(BTreeSet<P>),
    /// Subtract the given permissions.
    Remove(BTreeSet<P>),
}

pub struct AclMutator {
    store: Arc<dyn CatalogStore>,
    resolver: PermissionResolver,
}

impl AclMutator {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone()),
            store,
        }
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    async fn with_lock<T, Fut>(&self, study_id: StudyId, fut: Fut) -> Result<T, CatalogError>
    where
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let token = self
            .store
            .lock_study(study_id, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT)
            .await?;
        let result = fut.await;
        if let Err(err) = self.store.unlock_study(token).await {
            warn!("failed to release study lock {token}: {err:#}");
        }
        result
    }

    /// Invariant: a child-entity ACL may only be created for members that
    /// already have study-level permissions; `*` and `anonymous` are exempt.
    async fn check_study_membership(
        &self,
        study_id: StudyId,
        member: &Member,
    ) -> Result<(), CatalogError> {
        if member.is_exempt_from_study_precondition() {
            return Ok(());
        }
        let member_str = [member.to_string()];
        let acls = self
            .store
            .get_acls(EntityKind::Study, study_id, Some(&member_str))
            .await?;
        if acls.is_empty() {
            return Err(CatalogError::Precondition(format!(
                "member '{member}' has no permissions defined on study {study_id} yet"
            )));
        }
        Ok(())
    }

    // ---- child entities ----

    pub async fn create_acl<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        caller: &Member,
        entity_id: CatalogId,
        members: &[Member],
        permissions: BTreeSet<P>,
    ) -> Result<Vec<Acl<P>>, CatalogError> {
        let study_id = self.store.study_of(P::KIND, entity_id).await?;
        self.resolver
            .check(ctx, caller, entity_id, P::share())
            .await?
            .require()?;

        self.with_lock(study_id, async {
            for member in members {
                self.check_study_membership(study_id, member).await?;
            }

            let member_strings: Vec<String> = members.iter().map(|m| m.to_string()).collect();
            let existing = self
                .store
                .get_acls(P::KIND, entity_id, Some(&member_strings))
                .await?;
            if let Some(entry) = existing.first() {
                return Err(CatalogError::Precondition(format!(
                    "member '{}' already has a defined ACL on {} {entity_id}",
                    entry.member,
                    P::KIND.label()
                )));
            }

            let mut created = Vec::with_capacity(members.len());
            for member in members {
                let acl = Acl::new(member.clone(), permissions.clone());
                self.store
                    .create_acl(P::KIND, entity_id, acl.to_raw())
                    .await?;
                created.push(acl);
            }
            Ok(created)
        })
        .await
    }

    pub async fn get_all_acls<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        caller: &Member,
        entity_id: CatalogId,
    ) -> Result<Vec<Acl<P>>, CatalogError> {
        self.resolver
            .check(ctx, caller, entity_id, P::share())
            .await?
            .require()?;
        let raw = self.store.get_acls(P::KIND, entity_id, None).await?;
        raw.iter().map(Acl::from_raw).collect()
    }

    pub async fn get_acl<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        caller: &Member,
        entity_id: CatalogId,
        member: &Member,
    ) -> Result<Acl<P>, CatalogError> {
        let study_id = self.store.study_of(P::KIND, entity_id).await?;
        if !self.is_self_or_own_group(caller, study_id, member).await? {
            self.resolver
                .check(ctx, caller, entity_id, P::share())
                .await?
                .require()?;
        }

        let member_str = [member.to_string()];
        let raw = self
            .store
            .get_acls(P::KIND, entity_id, Some(&member_str))
            .await?;
        match raw.first() {
            Some(entry) => Acl::from_raw(entry),
            None => Err(CatalogError::not_found("ACL for member", member)),
        }
    }

    pub async fn update_acl<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        caller: &Member,
        entity_id: CatalogId,
        member: &Member,
        update: AclUpdate<P>,
    ) -> Result<Acl<P>, CatalogError> {
        let study_id = self.store.study_of(P::KIND, entity_id).await?;
        self.resolver
            .check(ctx, caller, entity_id, P::share())
            .await?
            .require()?;

        let member_str = member.to_string();
        self.with_lock(study_id, async {
            let existing = self
                .store
                .get_acls(P::KIND, entity_id, Some(std::slice::from_ref(&member_str)))
                .await?;
            if existing.is_empty() {
                return Err(CatalogError::not_found("ACL for member", member));
            }

            let raw = match update {
                AclUpdate::Set(perms) => {
                    self.store
                        .set_acls_to_member(
                            P::KIND,
                            entity_id,
                            &member_str,
                            perms.iter().map(|p| p.to_string()).collect(),
                        )
                        .await?
                }
                AclUpdate::Add(perms) => {
                    self.store
                        .add_acls_to_member(
                            P::KIND,
                            entity_id,
                            &member_str,
                            perms.iter().map(|p| p.to_string()).collect(),
                        )
                        .await?
                }
                AclUpdate::Remove(perms) => {
                    self.store
                        .remove_acls_from_member(
                            P::KIND,
                            entity_id,
                            &member_str,
                            perms.iter().map(|p| p.to_string()).collect(),
                        )
                        .await?
                }
            };
            Acl::from_raw(&raw)
        })
        .await
    }

    pub async fn remove_acl<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        caller: &Member,
        entity_id: CatalogId,
        member: &Member,
    ) -> Result<(), CatalogError> {
        let study_id = self.store.study_of(P::KIND, entity_id).await?;
        self.resolver
            .check(ctx, caller, entity_id, P::share())
            .await?
            .require()?;
        self.forbid_owner_removal(study_id, member).await?;

        self.with_lock(study_id, async {
            self.store
                .remove_acl(P::KIND, entity_id, &member.to_string())
                .await
        })
        .await
    }

    /// Remove without requiring the entry to exist; used to put an entity
    /// back into its inherit-everything state.
    pub async fn reset_acl<P: EntityPermission>(
        &self,
        ctx: &mut AuthContext,
        caller: &Member,
        entity_id: CatalogId,
        member: &Member,
    ) -> Result<(), CatalogError> {
        match self.remove_acl::<P>(ctx, caller, entity_id, member).await {
            Err(CatalogError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    // ---- studies ----

    pub async fn create_study_acl(
        &self,
        caller: &Member,
        study_id: StudyId,
        members: &[Member],
        permissions: BTreeSet<StudyPermission>,
        template: Option<AclTemplate>,
    ) -> Result<Vec<Acl<StudyPermission>>, CatalogError> {
        self.resolver
            .check_study(caller, study_id, StudyPermission::ShareStudy)
            .await?
            .require()?;

        let mut combined = permissions;
        if let Some(template) = template {
            combined.extend(template.permissions());
        }

        self.with_lock(study_id, async {
            let member_strings: Vec<String> = members.iter().map(|m| m.to_string()).collect();
            let existing = self
                .store
                .get_acls(EntityKind::Study, study_id, Some(&member_strings))
                .await?;
            if let Some(entry) = existing.first() {
                return Err(CatalogError::Precondition(format!(
                    "member '{}' already has a defined ACL on study {study_id}",
                    entry.member
                )));
            }

            let mut created = Vec::with_capacity(members.len());
            for member in members {
                let acl = Acl {
                    member: member.clone(),
                    permissions: combined.clone(),
                };
                self.store
                    .create_acl(
                        EntityKind::Study,
                        study_id,
                        catalog_types::RawAcl::new(
                            member.to_string(),
                            combined.iter().map(|p| p.to_string()).collect(),
                        ),
                    )
                    .await?;
                created.push(acl);
            }
            Ok(created)
        })
        .await
    }

    pub async fn get_all_study_acls(
        &self,
        caller: &Member,
        study_id: StudyId,
    ) -> Result<Vec<Acl<StudyPermission>>, CatalogError> {
        self.resolver
            .check_study(caller, study_id, StudyPermission::ShareStudy)
            .await?
            .require()?;
        let raw = self.store.get_acls(EntityKind::Study, study_id, None).await?;
        raw.iter().map(study_acl_from_raw).collect()
    }

    pub async fn get_study_acl(
        &self,
        caller: &Member,
        study_id: StudyId,
        member: &Member,
    ) -> Result<Acl<StudyPermission>, CatalogError> {
        if !self.is_self_or_own_group(caller, study_id, member).await? {
            self.resolver
                .check_study(caller, study_id, StudyPermission::ShareStudy)
                .await?
                .require()?;
        }
        let member_str = [member.to_string()];
        let raw = self
            .store
            .get_acls(EntityKind::Study, study_id, Some(&member_str))
            .await?;
        match raw.first() {
            Some(entry) => study_acl_from_raw(entry),
            None => Err(CatalogError::not_found("ACL for member", member)),
        }
    }

    pub async fn update_study_acl(
        &self,
        caller: &Member,
        study_id: StudyId,
        member: &Member,
        update: AclUpdate<StudyPermission>,
    ) -> Result<Acl<StudyPermission>, CatalogError> {
        self.resolver
            .check_study(caller, study_id, StudyPermission::ShareStudy)
            .await?
            .require()?;

        let member_str = member.to_string();
        self.with_lock(study_id, async {
            let existing = self
                .store
                .get_acls(
                    EntityKind::Study,
                    study_id,
                    Some(std::slice::from_ref(&member_str)),
                )
                .await?;
            if existing.is_empty() {
                return Err(CatalogError::not_found("ACL for member", member));
            }

            let raw = match update {
                AclUpdate::Set(perms) => {
                    self.store
                        .set_acls_to_member(
                            EntityKind::Study,
                            study_id,
                            &member_str,
                            perms.iter().map(|p| p.to_string()).collect(),
                        )
                        .await?
                }
                AclUpdate::Add(perms) => {
                    self.store
                        .add_acls_to_member(
                            EntityKind::Study,
                            study_id,
                            &member_str,
                            perms.iter().map(|p| p.to_string()).collect(),
                        )
                        .await?
                }
                AclUpdate::Remove(perms) => {
                    self.store
                        .remove_acls_from_member(
                            EntityKind::Study,
                            study_id,
                            &member_str,
                            perms.iter().map(|p| p.to_string()).collect(),
                        )
                        .await?
                }
            };
            study_acl_from_raw(&raw)
        })
        .await
    }

    pub async fn remove_study_acl(
        &self,
        caller: &Member,
        study_id: StudyId,
        member: &Member,
    ) -> Result<(), CatalogError> {
        self.resolver
            .check_study(caller, study_id, StudyPermission::ShareStudy)
            .await?
            .require()?;
        self.forbid_owner_removal(study_id, member).await?;

        self.with_lock(study_id, async {
            self.store
                .remove_acl(EntityKind::Study, study_id, &member.to_string())
                .await
        })
        .await
    }

    pub async fn reset_study_acl(
        &self,
        caller: &Member,
        study_id: StudyId,
        member: &Member,
    ) -> Result<(), CatalogError> {
        match self.remove_study_acl(caller, study_id, member).await {
            Err(CatalogError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    // ---- daemon ACL table ----

    /// Grant the admin daemon explicit study permissions. This writes the
    /// separate daemon-ACL table, not the study's member ACLs.
    pub async fn set_daemon_acl(
        &self,
        study_id: StudyId,
        permissions: BTreeSet<StudyPermission>,
    ) -> Result<(), CatalogError> {
        self.with_lock(study_id, async {
            self.store
                .set_daemon_acl(
                    study_id,
                    permissions.iter().map(|p| p.to_string()).collect(),
                )
                .await
        })
        .await
    }

    // ---- shared gates ----

    /// `get_acl` skips the SHARE gate for members asking about themselves
    /// and for users asking about a group they belong to.
    async fn is_self_or_own_group(
        &self,
        caller: &Member,
        study_id: StudyId,
        member: &Member,
    ) -> Result<bool, CatalogError> {
        if caller == member {
            return Ok(true);
        }
        if let (Member::User(user), Member::Group(group)) = (caller, member) {
            let study = self.store.get_study(study_id).await?;
            return Ok(study.group_of(user).is_some_and(|g| &g.name == group));
        }
        Ok(false)
    }

    async fn forbid_owner_removal(
        &self,
        study_id: StudyId,
        member: &Member,
    ) -> Result<(), CatalogError> {
        let owner = self.store.get_study_owner(study_id).await?;
        if let Member::User(user) = member {
            if *user == owner {
                return Err(CatalogError::Precondition(format!(
                    "the ACL of the study owner '{owner}' cannot be removed"
                )));
            }
        }
        Ok(())
    }
}

fn study_acl_from_raw(
    raw: &catalog_types::RawAcl,
) -> Result<Acl<StudyPermission>, CatalogError> {
    let member: Member = raw
        .member
        .parse()
        .map_err(CatalogError::InvalidArgument)?;
    let mut permissions = BTreeSet::new();
    for name in &raw.permissions {
        let perm: StudyPermission = name.parse().map_err(|_| {
            CatalogError::InvalidArgument(format!("'{name}' is not a valid study permission"))
        })?;
        permissions.insert(perm);
    }
    Ok(Acl {
        member,
        permissions,
    })
}
