//! The request-scoped authorization context.
//!
//! Listing a directory touches many files that share ancestor paths; a naive
//! resolver would re-fetch the same path ACLs once per file. The context
//! memoizes `path -> member -> acl` for the lifetime of one external request
//! so the resolver pays at most one bulk lookup per distinct ancestor-path
//! set. It is a plain value carried through the call chain, never global
//! state.

use catalog_store::CatalogStore;
use catalog_types::{CatalogError, RawAcl, StudyId};
use std::collections::HashMap;

#[derive(Default)]
pub struct AuthContext {
    /// `path -> member -> entry`. An inner `None` records that the member
    /// was looked up and has no ACL on that path; absence of the inner key
    /// means it was never fetched.
    paths: HashMap<String, HashMap<String, Option<RawAcl>>>,
    bulk_lookups: usize,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bulk ACL round-trips performed so far on behalf of this
    /// request.
    pub fn bulk_lookups(&self) -> usize {
        self.bulk_lookups
    }

    pub fn cached(&self, path: &str, member: &str) -> Option<&Option<RawAcl>> {
        self.paths.get(path).and_then(|m| m.get(member))
    }

    /// Make sure every `(path, member)` pair is populated, fetching the
    /// missing ones in a single bulk lookup.
    pub async fn ensure_paths(
        &mut self,
        store: &dyn CatalogStore,
        study_id: StudyId,
        paths: &[String],
        members: &[String],
    ) -> Result<(), CatalogError> {
        let missing: Vec<String> = paths
            .iter()
            .filter(|path| {
                let cached = self.paths.get(*path);
                !members
                    .iter()
                    .all(|m| cached.map_or(false, |c| c.contains_key(m)))
            })
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        let fetched = store
            .get_acls_by_paths(study_id, &missing, members)
            .await?;
        self.bulk_lookups += 1;

        for path in missing {
            let acls = fetched.get(&path);
            let slot = self.paths.entry(path).or_default();
            for member in members {
                let entry = acls
                    .and_then(|list| list.iter().find(|a| &a.member == member))
                    .cloned();
                slot.insert(member.clone(), entry);
            }
        }
        Ok(())
    }
}
