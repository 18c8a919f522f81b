//! Reference grammar. A reference is one of:
//!
//! * a plain number: an id, when it is above the configured offset;
//! * `user@project:study` with an optional `/path` suffix;
//! * `project:study`;
//! * a bare name;
//! * any of the above prefixed with `!` to mark exclusion;
//! * `*`.
//!
//! Comma-separated lists are split before parsing and keep their order.

use catalog_types::{CatalogError, CatalogId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    /// A numeric id above the configured offset.
    Id(CatalogId),
    /// `[user@][project:]study[/path]`.
    Scoped {
        owner: Option<String>,
        project: Option<String>,
        study: String,
        path: Option<String>,
    },
    /// A bare name, searched across the caller's accessible studies.
    Name(String),
    /// `!ref`; legal in query filters only, never in mutations.
    Negated(Box<EntityRef>),
    /// `*`.
    Wildcard,
}

impl EntityRef {
    pub fn is_negated(&self) -> bool {
        matches!(self, Self::Negated(_))
    }
}

/// Parses reference strings against a configured id offset.
#[derive(Debug, Clone, Copy)]
pub struct RefParser {
    pub id_offset: CatalogId,
}

impl RefParser {
    pub fn new(id_offset: CatalogId) -> Self {
        Self { id_offset }
    }

    pub fn parse(&self, reference: &str) -> Result<EntityRef, CatalogError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "empty entity reference".to_string(),
            ));
        }

        if let Some(rest) = reference.strip_prefix('!') {
            if rest.starts_with('!') {
                return Err(CatalogError::InvalidArgument(format!(
                    "'{reference}' has more than one negation prefix"
                )));
            }
            return Ok(EntityRef::Negated(Box::new(self.parse(rest)?)));
        }

        if reference == "*" {
            return Ok(EntityRef::Wildcard);
        }

        if let Ok(id) = reference.parse::<CatalogId>() {
            if id > self.id_offset {
                return Ok(EntityRef::Id(id));
            }
            // Below the offset a number is just a name.
            return Ok(EntityRef::Name(reference.to_string()));
        }

        let (owner, rest) = match reference.split_once('@') {
            Some((owner, rest)) => {
                if owner.is_empty() || rest.is_empty() {
                    return Err(CatalogError::InvalidArgument(format!(
                        "malformed reference '{reference}': empty user or study part"
                    )));
                }
                if rest.contains('@') {
                    return Err(CatalogError::InvalidArgument(format!(
                        "malformed reference '{reference}': more than one '@'"
                    )));
                }
                (Some(owner.to_string()), rest)
            }
            None => (None, reference),
        };

        let (scope, path) = match rest.split_once('/') {
            Some((scope, path)) => (scope, Some(path.to_string())),
            None => (rest, None),
        };

        let (project, study) = match scope.split_once(':') {
            Some((project, study)) => {
                if project.is_empty() || study.is_empty() || study.contains(':') {
                    return Err(CatalogError::InvalidArgument(format!(
                        "malformed reference '{reference}': bad 'project:study' form"
                    )));
                }
                (Some(project.to_string()), study.to_string())
            }
            None => {
                if scope.is_empty() {
                    return Err(CatalogError::InvalidArgument(format!(
                        "malformed reference '{reference}': empty study part"
                    )));
                }
                (None, scope.to_string())
            }
        };

        // Only a scoped form carries owner/project/path context; a naked
        // name stays a Name so resolution can search accessible studies.
        if owner.is_none() && project.is_none() && path.is_none() {
            return Ok(EntityRef::Name(study));
        }

        Ok(EntityRef::Scoped {
            owner,
            project,
            study,
            path,
        })
    }

    /// Split a comma-separated list and parse every element, preserving
    /// input order.
    pub fn parse_list(&self, references: &str) -> Result<Vec<EntityRef>, CatalogError> {
        references.split(',').map(|r| self.parse(r)).collect()
    }
}
