//! Admission control for batch operations.
//!
//! The state machine is `READY -> RUNNING -> {DONE | ERROR}`; `resume`
//! re-enters `RUNNING` from `ERROR` for the same `(name, files, kind)`.
//! A caller-supplied predicate decides which *different* operations may run
//! concurrently, so e.g. annotation loads can proceed while a variant index
//! forbids a second index.

use catalog_types::study_config::{BatchOperation, OperationStatus, StudyConfiguration};
use catalog_types::{CatalogError, FileId};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("operation '{name}' ({kind}) is already {status} on study {study_id}")]
    CurrentOperationInProgress {
        name: String,
        kind: String,
        status: OperationStatus,
        study_id: i64,
    },

    #[error(
        "operation '{other}' ({other_kind}, {status}) on study {study_id} \
         does not allow running '{name}' concurrently"
    )]
    OtherOperationInProgress {
        other: String,
        other_kind: String,
        status: OperationStatus,
        name: String,
        study_id: i64,
    },
}

impl From<AdmissionError> for CatalogError {
    fn from(err: AdmissionError) -> CatalogError {
        CatalogError::Conflict(err.to_string())
    }
}

/// A request to start (or resume) a batch operation.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub name: String,
    pub file_ids: Vec<FileId>,
    pub kind: String,
    pub resume: bool,
}

impl OperationRequest {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, file_ids: Vec<FileId>, kind: K) -> Self {
        Self {
            name: name.into(),
            file_ids,
            kind: kind.into(),
            resume: false,
        }
    }

    pub fn resume(mut self) -> Self {
        self.resume = true;
        self
    }
}

/// Arbitrates admission against the existing operation history and, on
/// success, appends (or resumes) the `RUNNING` record in place.
///
/// Returns a copy of the admitted operation.
pub fn admit_operation(
    config: &mut StudyConfiguration,
    request: &OperationRequest,
    allow_concurrent: &dyn Fn(&BatchOperation) -> bool,
    now: DateTime<Utc>,
) -> Result<BatchOperation, AdmissionError> {
    let mut resumable: Option<usize> = None;

    for (index, operation) in config.batch_operations.iter().enumerate() {
        let status = operation.current_status();
        let same = operation.same_operation(&request.name, &request.file_ids, &request.kind);

        match (same, status) {
            (true, OperationStatus::Running) => {
                return Err(AdmissionError::CurrentOperationInProgress {
                    name: request.name.clone(),
                    kind: request.kind.clone(),
                    status,
                    study_id: config.study_id,
                });
            }
            (true, OperationStatus::Done) => {
                if !request.resume {
                    return Err(AdmissionError::CurrentOperationInProgress {
                        name: request.name.clone(),
                        kind: request.kind.clone(),
                        status,
                        study_id: config.study_id,
                    });
                }
                // re-running a completed operation starts a fresh record
            }
            (true, OperationStatus::Error) => {
                if !request.resume {
                    return Err(AdmissionError::CurrentOperationInProgress {
                        name: request.name.clone(),
                        kind: request.kind.clone(),
                        status,
                        study_id: config.study_id,
                    });
                }
                resumable = Some(index);
            }
            (true, OperationStatus::Ready) => {
                // admitted but never started; reuse the record
                resumable = Some(index);
            }
            (false, OperationStatus::Running)
            | (false, OperationStatus::Done)
            | (false, OperationStatus::Error) => {
                if !allow_concurrent(operation) {
                    return Err(AdmissionError::OtherOperationInProgress {
                        other: operation.name.clone(),
                        other_kind: operation.kind.clone(),
                        status,
                        name: request.name.clone(),
                        study_id: config.study_id,
                    });
                }
            }
            (false, OperationStatus::Ready) => {}
        }
    }

    if let Some(index) = resumable {
        let operation = &mut config.batch_operations[index];
        operation.push_status(OperationStatus::Running, now);
        return Ok(operation.clone());
    }

    let mut operation =
        BatchOperation::new(&request.name, request.file_ids.clone(), &request.kind, now);
    operation.push_status(OperationStatus::Running, now);
    config.batch_operations.push(operation.clone());
    Ok(operation)
}

/// Record a terminal (or intermediate) status on a previously admitted
/// operation.
pub fn set_operation_status(
    config: &mut StudyConfiguration,
    name: &str,
    file_ids: &[FileId],
    kind: &str,
    status: OperationStatus,
    now: DateTime<Utc>,
) -> Result<BatchOperation, CatalogError> {
    let operation = config
        .batch_operations
        .iter_mut()
        .find(|op| op.same_operation(name, file_ids, kind))
        .ok_or_else(|| CatalogError::not_found("Batch operation", name))?;
    operation.push_status(status, now);
    Ok(operation.clone())
}
