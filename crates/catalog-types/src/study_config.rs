//! The per-study configuration document: name/id bimaps for samples, files
//! and cohorts, the indexed-file set, the samples-in-file map, variable
//! sets, and the batch-operation history. Read-mostly; mutated only while
//! holding the study lock.

use crate::error::CatalogError;
use crate::{CohortId, FileId, SampleId, StudyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A name<->id bimap. Both directions are kept consistent: an insert that
/// would map an existing name to a different id (or vice versa) is refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringIdBimap {
    forward: HashMap<String, i64>,
    #[serde(skip)]
    inverse: HashMap<i64, String>,
}

impl StringIdBimap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, id: i64) -> Result<(), CatalogError> {
        match self.forward.get(name) {
            Some(existing) if *existing != id => {
                return Err(CatalogError::Conflict(format!(
                    "'{name}' is already registered with id {existing}"
                )));
            }
            _ => {}
        }
        match self.inverse.get(&id) {
            Some(existing) if existing != name => {
                return Err(CatalogError::Conflict(format!(
                    "id {id} is already registered with name '{existing}'"
                )));
            }
            _ => {}
        }
        self.forward.insert(name.to_string(), id);
        self.inverse.insert(id, name.to_string());
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<i64> {
        self.forward.get(name).copied()
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.inverse.get(&id).map(|s| s.as_str())
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.inverse.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.forward.values().copied()
    }

    pub fn max_id(&self) -> Option<i64> {
        self.forward.values().max().copied()
    }

    /// Rebuild the inverse map after deserialization; the inverse side is
    /// not persisted.
    pub fn reindex(&mut self) {
        self.inverse = self
            .forward
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSet {
    pub id: i64,
    pub name: String,
    /// Confidential variable sets additionally require
    /// `CONFIDENTIAL_VARIABLE_SET_ACCESS` at study level.
    #[serde(default)]
    pub confidential: bool,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

/// One step of a batch operation's chronologically ordered history.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Ready,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OperationStatus,
    pub at: DateTime<Utc>,
}

/// A named, typed unit of work over a file set, with an append-only status
/// history. Admission of new operations is arbitrated in `study-config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperation {
    pub name: String,
    pub file_ids: Vec<FileId>,
    /// Free-form discriminator, e.g. "index" or "annotate". Matched exactly
    /// when deciding whether a new request is the *same* operation.
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub history: Vec<StatusEntry>,
}

impl BatchOperation {
    pub fn new(name: &str, file_ids: Vec<FileId>, kind: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            file_ids,
            kind: kind.to_string(),
            created_at: now,
            history: vec![StatusEntry {
                status: OperationStatus::Ready,
                at: now,
            }],
        }
    }

    pub fn current_status(&self) -> OperationStatus {
        self.history
            .last()
            .map(|e| e.status)
            .unwrap_or(OperationStatus::Ready)
    }

    pub fn push_status(&mut self, status: OperationStatus, now: DateTime<Utc>) {
        self.history.push(StatusEntry { status, at: now });
    }

    /// Whether another request names this same operation.
    pub fn same_operation(&self, name: &str, file_ids: &[FileId], kind: &str) -> bool {
        self.name == name && self.file_ids == file_ids && self.kind == kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyConfiguration {
    pub study_id: StudyId,
    pub study_name: String,
    #[serde(default)]
    pub sample_ids: StringIdBimap,
    #[serde(default)]
    pub file_ids: StringIdBimap,
    #[serde(default)]
    pub cohort_ids: StringIdBimap,
    #[serde(default)]
    pub indexed_files: BTreeSet<FileId>,
    #[serde(default)]
    pub samples_in_file: BTreeMap<FileId, BTreeSet<SampleId>>,
    #[serde(default)]
    pub variable_sets: Vec<VariableSet>,
    #[serde(default)]
    pub batch_operations: Vec<BatchOperation>,
    /// Monotonic; bumped by the adaptor on every persisted update and used
    /// for optimistic cache reads.
    pub timestamp: i64,
}

impl StudyConfiguration {
    pub fn new(study_id: StudyId, study_name: &str) -> Self {
        Self {
            study_id,
            study_name: study_name.to_string(),
            sample_ids: StringIdBimap::new(),
            file_ids: StringIdBimap::new(),
            cohort_ids: StringIdBimap::new(),
            indexed_files: BTreeSet::new(),
            samples_in_file: BTreeMap::new(),
            variable_sets: Vec::new(),
            batch_operations: Vec::new(),
            timestamp: 0,
        }
    }

    pub fn cohort_id(&self, name: &str) -> Option<CohortId> {
        self.cohort_ids.id(name)
    }

    /// Rebuild the non-persisted inverse indexes after deserialization.
    pub fn reindex(&mut self) {
        self.sample_ids.reindex();
        self.file_ids.reindex();
        self.cohort_ids.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bimap_consistency() {
        let mut map = StringIdBimap::new();
        map.insert("s1", 10).unwrap();
        map.insert("s1", 10).unwrap(); // re-insert of the same pair is fine
        k9::assert_equal!(map.id("s1"), Some(10));
        k9::assert_equal!(map.name(10), Some("s1"));

        let err = map.insert("s1", 11).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");
        let err = map.insert("s2", 10).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");
        k9::assert_equal!(map.len(), 1);
    }

    #[test]
    fn bimap_reindex_round_trips_through_serde() {
        let mut map = StringIdBimap::new();
        map.insert("s1", 10).unwrap();
        map.insert("s2", 11).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        let mut restored: StringIdBimap = serde_json::from_str(&json).unwrap();
        restored.reindex();
        k9::assert_equal!(restored.name(11), Some("s2"));
    }

    #[test]
    fn batch_operation_history_is_chronological() {
        let t0 = Utc::now();
        let mut op = BatchOperation::new("load", vec![1, 2], "index", t0);
        k9::assert_equal!(op.current_status(), OperationStatus::Ready);
        op.push_status(OperationStatus::Running, t0);
        op.push_status(OperationStatus::Error, t0);
        k9::assert_equal!(op.current_status(), OperationStatus::Error);
        k9::assert_equal!(op.history.len(), 3);
    }
}
