use catalog::{CatalogManager, SubmitJobRequest};
use catalog_types::{CatalogError, Member};
use clap::Parser;

#[derive(Debug, Parser)]
pub enum JobCommand {
    /// Bulk job lookup over a comma-separated reference list
    Info(InfoCommand),
    /// Submit a job to the batch scheduler
    Submit(SubmitCommand),
    /// Reconcile a job's state against the scheduler
    Status(StatusCommand),
    /// Mark a job as visited
    Visit(VisitCommand),
    /// List a study's jobs, optionally by exact name
    Search(SearchCommand),
    /// Soft-delete (or hard-delete) a job
    Delete(DeleteCommand),
    /// Restore a trashed job
    Restore(RestoreCommand),
}

impl JobCommand {
    pub async fn run(
        &self,
        manager: &CatalogManager,
        caller: &Member,
    ) -> Result<(), CatalogError> {
        match self {
            Self::Info(cmd) => cmd.run(manager, caller).await,
            Self::Submit(cmd) => cmd.run(manager, caller).await,
            Self::Status(cmd) => cmd.run(manager, caller).await,
            Self::Visit(cmd) => cmd.run(manager, caller).await,
            Self::Search(cmd) => cmd.run(manager, caller).await,
            Self::Delete(cmd) => cmd.run(manager, caller).await,
            Self::Restore(cmd) => cmd.run(manager, caller).await,
        }
    }
}

#[derive(Debug, Parser)]
pub struct InfoCommand {
    /// Comma-separated job references
    #[arg(long)]
    refs: String,

    /// Convert per-item failures into per-item error records
    #[arg(long)]
    silent: bool,
}

impl InfoCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let results = manager.jobs().info(caller, &self.refs, self.silent).await?;
        let entries: Vec<serde_json::Value> = results
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "reference": entry.reference,
                    "result": entry.outcome.as_ref().ok(),
                    "error": entry.error_msg(),
                })
            })
            .collect();
        crate::print_json(&entries)
    }
}

#[derive(Debug, Parser)]
pub struct SubmitCommand {
    #[arg(long)]
    study: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    tool: String,

    #[arg(long)]
    out_dir: String,

    /// The command line, passed to the scheduler verbatim
    #[arg(long)]
    command: String,

    /// Scheduler queue; defaults to the tool->queue mapping
    #[arg(long)]
    queue: Option<String>,
}

impl SubmitCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let job = manager
            .jobs()
            .submit(
                caller,
                &self.study,
                SubmitJobRequest {
                    name: self.name.clone(),
                    tool_name: self.tool.clone(),
                    out_dir: self.out_dir.clone(),
                    command_line: self.command.clone(),
                    queue: self.queue.clone(),
                },
            )
            .await?;
        crate::print_json(&job)
    }
}

#[derive(Debug, Parser)]
pub struct StatusCommand {
    /// Job reference
    #[arg(long)]
    job: String,
}

impl StatusCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let status = manager.jobs().update_status(caller, &self.job).await?;
        crate::print_json(&status)
    }
}

#[derive(Debug, Parser)]
pub struct VisitCommand {
    #[arg(long)]
    job: String,
}

impl VisitCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let job = manager.jobs().visit(caller, &self.job).await?;
        crate::print_json(&job)
    }
}

#[derive(Debug, Parser)]
pub struct SearchCommand {
    #[arg(long)]
    study: String,

    /// Exact job name to look for
    #[arg(long)]
    name: Option<String>,
}

impl SearchCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let jobs = manager
            .jobs()
            .search(caller, &self.study, self.name.as_deref())
            .await?;
        crate::print_json(&jobs)
    }
}

#[derive(Debug, Parser)]
pub struct DeleteCommand {
    #[arg(long)]
    job: String,

    /// Mark for physical removal instead of the trash
    #[arg(long)]
    hard: bool,
}

impl DeleteCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let job = manager.jobs().delete(caller, &self.job, self.hard).await?;
        crate::print_json(&job)
    }
}

#[derive(Debug, Parser)]
pub struct RestoreCommand {
    #[arg(long)]
    job: String,
}

impl RestoreCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let job = manager.jobs().restore(caller, &self.job).await?;
        crate::print_json(&job)
    }
}
