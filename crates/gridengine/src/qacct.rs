//! Parser for the accounting (`qacct -j`) post-mortem probe. The output is
//! a column-aligned `key value` listing; only `exit_status` and `failed`
//! matter for classification.

use crate::status::JobStatus;
use crate::SgeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accounting {
    pub exit_status: i64,
    /// SGE's own failure indicator; non-zero means the queue, not the
    /// payload, failed the job.
    pub failed: i64,
}

impl Accounting {
    pub fn classify(&self) -> JobStatus {
        if self.failed != 0 {
            JobStatus::QueueError
        } else if self.exit_status == 0 {
            JobStatus::Finished
        } else {
            JobStatus::ExecutionError
        }
    }
}

/// Parse one `qacct -j` record.
pub fn parse_accounting(output: &str) -> Result<Accounting, SgeError> {
    let mut exit_status = None;
    let mut failed = None;

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        // `failed` can read "100 : assumedly after job"; take the leading
        // integer only.
        let value = parts.next();
        match key {
            "exit_status" => exit_status = Some(parse_int(key, value)?),
            "failed" => failed = Some(parse_int(key, value)?),
            _ => {}
        }
    }

    match (exit_status, failed) {
        (Some(exit_status), Some(failed)) => Ok(Accounting {
            exit_status,
            failed,
        }),
        _ => Err(SgeError::Malformed(
            "accounting record lacks exit_status or failed".to_string(),
        )),
    }
}

fn parse_int(key: &str, value: Option<&str>) -> Result<i64, SgeError> {
    let value = value
        .ok_or_else(|| SgeError::Malformed(format!("accounting field '{key}' has no value")))?;
    value
        .parse()
        .map_err(|_| SgeError::Malformed(format!("accounting field '{key}' is not numeric: '{value}'")))
}
