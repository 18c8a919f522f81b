//! Typed view of `qstat -xml`. Only the `(JB_name, state)` pairs matter for
//! reconciliation; the other modeled columns ride along untyped.

use crate::{ActiveJob, SgeError};
use instant_xml::FromXml;

/// Root element. The running section lives under `queue_info`, pending jobs
/// under a nested element that is also called `job_info`.
#[derive(Debug, FromXml)]
#[xml(rename = "job_info")]
pub struct QstatReport {
    pub queue_info: Option<QueueSection>,
    pub pending: Option<PendingSection>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "queue_info")]
pub struct QueueSection {
    pub job_list: Vec<JobEntry>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "job_info")]
pub struct PendingSection {
    pub job_list: Vec<JobEntry>,
}

#[derive(Debug, FromXml)]
#[xml(rename = "job_list")]
pub struct JobEntry {
    #[xml(rename = "JB_job_number")]
    pub number: Option<u64>,
    #[xml(rename = "JB_name")]
    pub name: String,
    #[xml(rename = "JB_owner")]
    pub owner: Option<String>,
    pub state: String,
}

/// Parse a full report into the flat active-job list, running first, then
/// pending, preserving report order.
pub fn parse_active_jobs(xml: &str) -> Result<Vec<ActiveJob>, SgeError> {
    let report: QstatReport =
        instant_xml::from_str(xml).map_err(|err| SgeError::Malformed(err.to_string()))?;

    let mut jobs = Vec::new();
    if let Some(section) = report.queue_info {
        jobs.extend(section.job_list);
    }
    if let Some(section) = report.pending {
        jobs.extend(section.job_list);
    }
    Ok(jobs
        .into_iter()
        .map(|entry| ActiveJob {
            name: entry.name,
            state: entry.state,
        })
        .collect())
}
