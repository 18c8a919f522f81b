//! The production scheduler backend: spawns the `qsub`/`qstat`/`qacct`
//! binaries and interprets their output.

use crate::qacct::parse_accounting;
use crate::xml::parse_active_jobs;
use crate::{Accounting, ActiveJob, BatchScheduler, SchedulerConfig, SgeError, SubmitCommand};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

pub struct SgeScheduler {
    config: SchedulerConfig,
}

impl SgeScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// The fixed submission template: inherit the environment, name the
    /// job, route stdout/stderr into the job's output directory, select the
    /// queue, then the command line.
    pub fn build_qsub_args(command: &SubmitCommand) -> Vec<String> {
        let mut args = vec![
            "-V".to_string(),
            "-N".to_string(),
            command.name.clone(),
            "-o".to_string(),
            command.stdout.clone(),
            "-e".to_string(),
            command.stderr.clone(),
            "-q".to_string(),
            command.queue.clone(),
            "-b".to_string(),
            "y".to_string(),
        ];
        args.extend(command.command_line.split_whitespace().map(str::to_string));
        args
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<std::process::Output, SgeError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        let label = format!("{cmd:?}");
        debug!("invoking {label}");
        match tokio::time::timeout(self.config.probe_timeout(), cmd.output()).await {
            Err(_) => Err(SgeError::Timeout(self.config.probe_timeout())),
            Ok(output) => Ok(output?),
        }
    }

    fn ensure_success(output: &std::process::Output) -> Result<(), SgeError> {
        if output.status.success() {
            return Ok(());
        }
        Err(SgeError::NonZeroExit {
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl BatchScheduler for SgeScheduler {
    async fn submit(&self, command: &SubmitCommand) -> Result<(), SgeError> {
        let args = Self::build_qsub_args(command);
        let output = self.run(&self.config.qsub_binary, &args).await?;
        Self::ensure_success(&output)?;
        debug!(
            "qsub accepted '{}': {}",
            command.name,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    async fn query_active(&self) -> Result<Vec<ActiveJob>, SgeError> {
        let args = ["-xml".to_string()];
        let output = self.run(&self.config.qstat_binary, &args).await?;
        Self::ensure_success(&output)?;
        parse_active_jobs(&String::from_utf8_lossy(&output.stdout))
    }

    async fn query_terminated(&self, job_name: &str) -> Result<Option<Accounting>, SgeError> {
        let args = ["-j".to_string(), job_name.to_string()];
        let output = self.run(&self.config.qacct_binary, &args).await?;
        if !output.status.success() {
            // qacct exits non-zero when the job never reached the
            // accounting log; that is a legitimate "no data" answer.
            return Ok(None);
        }
        parse_accounting(&String::from_utf8_lossy(&output.stdout)).map(Some)
    }
}
