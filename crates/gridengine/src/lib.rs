//! Bridge to an SGE-style batch scheduler.
//!
//! Submission is fire-and-forget: the scheduler is the source of truth and
//! status is reconciled afterwards, first against the active queue
//! (`qstat -xml`) and then against the accounting log (`qacct`) for jobs
//! that already left the queue.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub mod config;
pub mod qacct;
pub mod sge;
pub mod status;
pub mod xml;

pub use config::{QueueConfig, SchedulerConfig};
pub use qacct::Accounting;
pub use sge::SgeScheduler;
pub use status::JobStatus;

#[derive(Error, Debug)]
pub enum SgeError {
    /// The scheduler binary could not be invoked or timed out.
    #[error("scheduler invocation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("scheduler invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("scheduler exited with {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    /// The scheduler answered but the output did not parse.
    #[error("malformed scheduler output: {0}")]
    Malformed(String),
}

/// One job visible in the active queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub name: String,
    pub state: String,
}

/// A submission as handed to the scheduler: everything already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommand {
    pub name: String,
    pub stdout: String,
    pub stderr: String,
    pub queue: String,
    pub command_line: String,
}

/// The narrow scheduler interface; production uses [`SgeScheduler`], tests
/// swap in a stub.
#[async_trait]
pub trait BatchScheduler: Send + Sync {
    /// Non-blocking submit; returns once the scheduler accepted the job.
    async fn submit(&self, command: &SubmitCommand) -> Result<(), SgeError>;

    /// Snapshot of the active queue (running and pending jobs).
    async fn query_active(&self) -> Result<Vec<ActiveJob>, SgeError>;

    /// Post-mortem accounting for a job that left the queue.
    async fn query_terminated(&self, job_name: &str) -> Result<Option<Accounting>, SgeError>;
}

pub struct GridEngineBridge {
    scheduler: std::sync::Arc<dyn BatchScheduler>,
    config: SchedulerConfig,
}

impl GridEngineBridge {
    pub fn new(scheduler: std::sync::Arc<dyn BatchScheduler>, config: SchedulerConfig) -> Self {
        Self { scheduler, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Submit a logical job. Returns the queue that was selected.
    pub async fn submit_job(
        &self,
        tool: &str,
        job_id: i64,
        out_dir: &str,
        command_line: &str,
        queue: Option<&str>,
    ) -> Result<String, SgeError> {
        let queue = match queue {
            Some(queue) => queue.to_string(),
            None => self.config.queue_for_tool(tool).to_string(),
        };
        let out_dir = out_dir.trim_end_matches('/');
        let command = SubmitCommand {
            name: format!("{tool}_{job_id}"),
            stdout: format!("{out_dir}/sge_out.log"),
            stderr: format!("{out_dir}/sge_err.log"),
            queue: queue.clone(),
            command_line: command_line.to_string(),
        };
        debug!("submitting job '{}' to queue '{queue}'", command.name);
        self.scheduler.submit(&command).await?;
        Ok(queue)
    }

    /// Reconcile the status of a previously submitted job.
    pub async fn status(&self, tool: &str, job_id: i64) -> Result<JobStatus, SgeError> {
        let needle = job_id.to_string();
        let active = self.scheduler.query_active().await?;
        if let Some(job) = active.iter().find(|j| j.name.contains(&needle)) {
            return Ok(JobStatus::from_state_letter(&job.state));
        }

        let name = format!("{tool}_{job_id}");
        match self.scheduler.query_terminated(&name).await? {
            Some(accounting) => Ok(accounting.classify()),
            None => Ok(JobStatus::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubScheduler {
        submitted: Mutex<Vec<SubmitCommand>>,
        active: Mutex<Vec<ActiveJob>>,
        terminated: Mutex<Option<Accounting>>,
    }

    #[async_trait]
    impl BatchScheduler for StubScheduler {
        async fn submit(&self, command: &SubmitCommand) -> Result<(), SgeError> {
            self.submitted.lock().unwrap().push(command.clone());
            Ok(())
        }

        async fn query_active(&self) -> Result<Vec<ActiveJob>, SgeError> {
            Ok(self.active.lock().unwrap().clone())
        }

        async fn query_terminated(
            &self,
            _job_name: &str,
        ) -> Result<Option<Accounting>, SgeError> {
            Ok(self.terminated.lock().unwrap().clone())
        }
    }

    fn config() -> SchedulerConfig {
        toml::from_str(
            r#"
            default_queue = "all.q"

            [[queues]]
            name = "fast.q"
            tools = ["bwa", "gatk"]

            [[queues]]
            name = "himem.q"
            tools = ["gatk"]
            "#,
        )
        .unwrap()
    }

    fn bridge(stub: Arc<StubScheduler>) -> GridEngineBridge {
        GridEngineBridge::new(stub, config())
    }

    #[tokio::test]
    async fn submit_renders_the_fixed_template() {
        let stub = Arc::new(StubScheduler::default());
        let queue = bridge(stub.clone())
            .submit_job("bwa", 1010, "/data/out/", "bwa mem ref.fa", None)
            .await
            .unwrap();
        k9::assert_equal!(queue, "fast.q");

        let submitted = stub.submitted.lock().unwrap();
        k9::assert_equal!(
            *submitted,
            vec![SubmitCommand {
                name: "bwa_1010".into(),
                stdout: "/data/out/sge_out.log".into(),
                stderr: "/data/out/sge_err.log".into(),
                queue: "fast.q".into(),
                command_line: "bwa mem ref.fa".into(),
            }]
        );
    }

    #[tokio::test]
    async fn explicit_queue_overrides_the_mapping() {
        let stub = Arc::new(StubScheduler::default());
        let queue = bridge(stub.clone())
            .submit_job("bwa", 1010, "/data/out", "bwa mem", Some("debug.q"))
            .await
            .unwrap();
        k9::assert_equal!(queue, "debug.q");
    }

    #[tokio::test]
    async fn status_prefers_the_active_queue() {
        let stub = Arc::new(StubScheduler::default());
        stub.active.lock().unwrap().push(ActiveJob {
            name: "bwa_1010".into(),
            state: "r".into(),
        });
        // accounting data exists too, but the active queue wins
        *stub.terminated.lock().unwrap() = Some(Accounting {
            exit_status: 1,
            failed: 0,
        });

        let status = bridge(stub).status("bwa", 1010).await.unwrap();
        k9::assert_equal!(status, JobStatus::Running);
    }

    #[tokio::test]
    async fn status_falls_back_to_accounting() {
        let stub = Arc::new(StubScheduler::default());
        *stub.terminated.lock().unwrap() = Some(Accounting {
            exit_status: 0,
            failed: 0,
        });
        let status = bridge(stub).status("bwa", 1010).await.unwrap();
        k9::assert_equal!(status, JobStatus::Finished);
    }

    #[tokio::test]
    async fn status_is_unknown_when_nothing_answers() {
        let stub = Arc::new(StubScheduler::default());
        let status = bridge(stub).status("bwa", 1010).await.unwrap();
        k9::assert_equal!(status, JobStatus::Unknown);
    }
}
