//! Identifier resolution: turns the mixed textual/numeric references
//! accepted at the API surface into typed `(caller, study, entity)` triples,
//! validating existence along the way.

use catalog_store::CatalogStore;
use catalog_types::entity::Study;
use catalog_types::{CatalogError, CatalogId, EntityKind, Member, StudyId, MISSING_ID};
use std::sync::Arc;

pub mod parse;

pub use parse::{EntityRef, RefParser};

/// A fully resolved entity reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub caller: Member,
    pub study_id: StudyId,
    pub entity_id: CatalogId,
    /// Set for `!`-prefixed references; meaningful to query filters only.
    pub excluded: bool,
}

/// One element of a bulk resolution, in input order.
#[derive(Debug)]
pub enum BulkEntry {
    Found(Resolved),
    Missing {
        reference: String,
        error: CatalogError,
    },
}

impl BulkEntry {
    /// The adaptor-boundary id convention: `-1` for missing entries.
    pub fn adaptor_id(&self) -> CatalogId {
        match self {
            Self::Found(resolved) => resolved.entity_id,
            Self::Missing { .. } => MISSING_ID,
        }
    }
}

pub struct Resolver {
    store: Arc<dyn CatalogStore>,
    parser: RefParser,
}

impl Resolver {
    pub fn new(store: Arc<dyn CatalogStore>, id_offset: CatalogId) -> Self {
        Self {
            store,
            parser: RefParser::new(id_offset),
        }
    }

    pub fn parser(&self) -> &RefParser {
        &self.parser
    }

    /// The studies this caller can see at all: owned, joined through a
    /// group, granted any study ACL, or carrying a `*`/`anonymous` entry.
    /// The admin daemon sees every study; its access is gated later by the
    /// daemon-ACL table.
    pub async fn accessible_studies(&self, caller: &Member) -> Result<Vec<Study>, CatalogError> {
        let studies = self.store.list_studies().await?;
        if matches!(caller, Member::Admin) {
            return Ok(studies);
        }
        let mut accessible = Vec::new();
        for study in studies {
            if self.is_accessible(caller, &study).await? {
                accessible.push(study);
            }
        }
        Ok(accessible)
    }

    async fn is_accessible(&self, caller: &Member, study: &Study) -> Result<bool, CatalogError> {
        let open = study
            .acl
            .iter()
            .any(|a| a.member == "*" || a.member == "anonymous");
        match caller {
            Member::Admin => Ok(true),
            Member::Anonymous | Member::Anyone => Ok(open),
            Member::Group(name) => {
                Ok(open || study.acl.iter().any(|a| a.member == format!("@{name}")))
            }
            Member::User(user) => {
                if open
                    || study.group_of(user).is_some()
                    || study.acl.iter().any(|a| &a.member == user)
                {
                    return Ok(true);
                }
                let owner = self.store.get_study_owner(study.id).await?;
                Ok(&owner == user)
            }
        }
    }

    pub async fn resolve_study_ref(
        &self,
        caller: &Member,
        reference: &str,
    ) -> Result<StudyId, CatalogError> {
        let parsed = self.parser.parse(reference)?;
        self.resolve_study(caller, &parsed).await
    }

    pub async fn resolve_study(
        &self,
        caller: &Member,
        reference: &EntityRef,
    ) -> Result<StudyId, CatalogError> {
        match reference {
            EntityRef::Id(id) => {
                self.store.get_study(*id).await?;
                Ok(*id)
            }
            EntityRef::Scoped {
                owner,
                project,
                study,
                path: _,
            } => {
                self.resolve_scoped_study(caller, owner.as_deref(), project.as_deref(), study)
                    .await
            }
            EntityRef::Name(name) => {
                let candidates = self.store.find_studies_by_alias(name).await?;
                let mut matches = Vec::new();
                for id in candidates {
                    let study = self.store.get_study(id).await?;
                    if self.is_accessible(caller, &study).await? {
                        matches.push(id);
                    }
                }
                match matches.as_slice() {
                    [] => Err(CatalogError::not_found("Study", name)),
                    [id] => Ok(*id),
                    _ => Err(CatalogError::ambiguous("study", name)),
                }
            }
            EntityRef::Negated(_) => Err(CatalogError::InvalidArgument(
                "a negated reference cannot name a study".to_string(),
            )),
            EntityRef::Wildcard => Err(CatalogError::InvalidArgument(
                "'*' cannot name a study".to_string(),
            )),
        }
    }

    /// `user@project:study` and its abbreviations. A missing `user@` part
    /// defaults to the caller; anonymous callers must spell the owner out.
    async fn resolve_scoped_study(
        &self,
        caller: &Member,
        owner: Option<&str>,
        project: Option<&str>,
        study: &str,
    ) -> Result<StudyId, CatalogError> {
        let owner = match (owner, caller) {
            (Some(owner), _) => owner.to_string(),
            (None, Member::User(user)) => user.clone(),
            (None, _) => {
                return Err(CatalogError::InvalidArgument(format!(
                    "a scoped study reference needs an explicit 'user@' part for {caller} callers"
                )));
            }
        };

        if let Some(project) = project {
            let project_id = self
                .store
                .find_project_by_alias(&owner, project)
                .await?
                .ok_or_else(|| CatalogError::not_found("Project", project))?;
            return self
                .store
                .find_study_in_project(project_id, study)
                .await?
                .ok_or_else(|| CatalogError::not_found("Study", study));
        }

        let mut matches = Vec::new();
        for id in self.store.find_studies_by_alias(study).await? {
            if self.store.get_study_owner(id).await? == owner {
                matches.push(id);
            }
        }
        match matches.as_slice() {
            [] => Err(CatalogError::not_found("Study", study)),
            [id] => Ok(*id),
            _ => Err(CatalogError::ambiguous("study", study)),
        }
    }

    pub async fn resolve_entity(
        &self,
        caller: &Member,
        kind: EntityKind,
        reference: &EntityRef,
    ) -> Result<Resolved, CatalogError> {
        match reference {
            EntityRef::Id(id) => {
                if !self.store.check_id(kind, *id).await? {
                    return Err(CatalogError::not_found(
                        format!("{} id", kind.label()),
                        id,
                    ));
                }
                let study_id = self.store.study_of(kind, *id).await?;
                Ok(Resolved {
                    caller: caller.clone(),
                    study_id,
                    entity_id: *id,
                    excluded: false,
                })
            }
            EntityRef::Scoped { path, .. } => {
                let study_id = self.resolve_study(caller, reference).await?;
                let Some(path) = path else {
                    if kind == EntityKind::Study {
                        return Ok(Resolved {
                            caller: caller.clone(),
                            study_id,
                            entity_id: study_id,
                            excluded: false,
                        });
                    }
                    return Err(CatalogError::InvalidArgument(format!(
                        "reference does not name a {}",
                        kind.label()
                    )));
                };
                let entity_id = match kind {
                    EntityKind::File => match self.file_id_by_path(study_id, path).await? {
                        Some(id) => id,
                        None => {
                            return Err(CatalogError::not_found("File", path));
                        }
                    },
                    _ => self
                        .store
                        .find_by_name(kind, study_id, path)
                        .await?
                        .ok_or_else(|| {
                            CatalogError::not_found(format!("{} id", kind.label()), path)
                        })?,
                };
                Ok(Resolved {
                    caller: caller.clone(),
                    study_id,
                    entity_id,
                    excluded: false,
                })
            }
            EntityRef::Name(name) => self.resolve_entity_by_name(caller, kind, name).await,
            EntityRef::Negated(inner) => {
                let mut resolved = Box::pin(self.resolve_entity(caller, kind, inner)).await?;
                resolved.excluded = true;
                Ok(resolved)
            }
            EntityRef::Wildcard => Err(CatalogError::InvalidArgument(format!(
                "'*' cannot name a {}",
                kind.label()
            ))),
        }
    }

    /// Files may be addressed either by their path or by their plain name;
    /// directories are stored with a trailing `/` which callers routinely
    /// leave off.
    async fn file_id_by_path(
        &self,
        study_id: StudyId,
        path: &str,
    ) -> Result<Option<CatalogId>, CatalogError> {
        if let Some(file) = self.store.file_by_path(study_id, path).await? {
            return Ok(Some(file.id));
        }
        if !path.ends_with('/') {
            if let Some(file) = self
                .store
                .file_by_path(study_id, &format!("{path}/"))
                .await?
            {
                return Ok(Some(file.id));
            }
        }
        self.store.find_by_name(EntityKind::File, study_id, path).await
    }

    async fn resolve_entity_by_name(
        &self,
        caller: &Member,
        kind: EntityKind,
        name: &str,
    ) -> Result<Resolved, CatalogError> {
        if kind == EntityKind::Study {
            let study_id = self
                .resolve_study(caller, &EntityRef::Name(name.to_string()))
                .await?;
            return Ok(Resolved {
                caller: caller.clone(),
                study_id,
                entity_id: study_id,
                excluded: false,
            });
        }

        let mut matches = Vec::new();
        for study in self.accessible_studies(caller).await? {
            if let Some(id) = self.store.find_by_name(kind, study.id, name).await? {
                matches.push((study.id, id));
            }
        }
        match matches.as_slice() {
            [] => Err(CatalogError::not_found(
                format!("{} id", kind.label()),
                name,
            )),
            [(study_id, entity_id)] => Ok(Resolved {
                caller: caller.clone(),
                study_id: *study_id,
                entity_id: *entity_id,
                excluded: false,
            }),
            _ => Err(CatalogError::ambiguous(kind.label(), name)),
        }
    }

    /// Resolve a comma-separated reference list, preserving input order.
    ///
    /// In silent mode, per-item `NotFound`/`Ambiguous` failures become
    /// `Missing` entries instead of aborting the batch; adaptor or argument
    /// errors still abort.
    pub async fn resolve_list(
        &self,
        caller: &Member,
        kind: EntityKind,
        references: &str,
        silent: bool,
    ) -> Result<Vec<BulkEntry>, CatalogError> {
        let mut entries = Vec::new();
        for piece in references.split(',') {
            let item = async {
                let parsed = self.parser.parse(piece)?;
                self.resolve_entity(caller, kind, &parsed).await
            }
            .await;
            match item {
                Ok(resolved) => entries.push(BulkEntry::Found(resolved)),
                Err(error @ (CatalogError::NotFound { .. } | CatalogError::Ambiguous { .. })) => {
                    if silent {
                        entries.push(BulkEntry::Missing {
                            reference: piece.trim().to_string(),
                            error,
                        });
                    } else {
                        return Err(error);
                    }
                }
                Err(error) => return Err(error),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests;
