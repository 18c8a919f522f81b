use crate::error::CatalogError;
use crate::member::Member;
use crate::perms::{EntityPermission, StudyPermission};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::IntoEnumIterator;

/// A typed ACL entry: one member, one permission set.
///
/// Invariant: within one entity there is at most one entry per member; the
/// store rejects duplicates and the mutator checks before inserting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl<P: Ord> {
    pub member: Member,
    pub permissions: BTreeSet<P>,
}

impl<P: EntityPermission> Acl<P> {
    pub fn new(member: Member, permissions: BTreeSet<P>) -> Self {
        Self { member, permissions }
    }

    pub fn from_raw(raw: &RawAcl) -> Result<Self, CatalogError> {
        let member: Member = raw
            .member
            .parse()
            .map_err(CatalogError::InvalidArgument)?;
        let mut permissions = BTreeSet::new();
        for name in &raw.permissions {
            let perm: P = name.parse().map_err(|_| {
                CatalogError::InvalidArgument(format!(
                    "'{name}' is not a valid {} permission",
                    P::KIND.label()
                ))
            })?;
            permissions.insert(perm);
        }
        Ok(Self { member, permissions })
    }

    pub fn to_raw(&self) -> RawAcl {
        RawAcl {
            member: self.member.to_string(),
            permissions: self.permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// The representation that crosses the adaptor boundary: members and
/// permissions as plain strings, the way the backing document stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAcl {
    pub member: String,
    pub permissions: Vec<String>,
}

impl RawAcl {
    pub fn new<M: Into<String>>(member: M, permissions: Vec<String>) -> Self {
        Self {
            member: member.into(),
            permissions,
        }
    }
}

/// Baseline permission sets selectable when creating a study ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AclTemplate {
    /// Everything, including ACL administration.
    Admin,
    /// All read-side permissions: VIEW_* plus file downloads.
    ViewOnly,
}

impl AclTemplate {
    pub fn permissions(&self) -> BTreeSet<StudyPermission> {
        match self {
            Self::Admin => StudyPermission::iter().collect(),
            Self::ViewOnly => StudyPermission::iter()
                .filter(|p| {
                    p.to_string().starts_with("VIEW_") || *p == StudyPermission::DownloadFiles
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perms::JobPermission;
    use maplit::btreeset;

    #[test]
    fn raw_acl_round_trip() {
        let acl = Acl::new(
            Member::group("analysts"),
            btreeset! { JobPermission::View, JobPermission::Update },
        );
        let raw = acl.to_raw();
        k9::assert_equal!(raw.member, "@analysts");
        k9::assert_equal!(raw.permissions, vec!["VIEW".to_string(), "UPDATE".to_string()]);
        k9::assert_equal!(Acl::<JobPermission>::from_raw(&raw).unwrap(), acl);
    }

    #[test]
    fn raw_acl_rejects_foreign_permission() {
        let raw = RawAcl::new("ada", vec!["VIEW".to_string(), "DOWNLOAD".to_string()]);
        let err = Acl::<JobPermission>::from_raw(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)), "{err:?}");
    }

    #[test]
    fn view_only_template_is_read_side() {
        let perms = AclTemplate::ViewOnly.permissions();
        assert!(perms.contains(&StudyPermission::ViewJobs));
        assert!(perms.contains(&StudyPermission::DownloadFiles));
        assert!(!perms.contains(&StudyPermission::WriteFiles));
        assert!(!perms.contains(&StudyPermission::ShareStudy));
    }
}
