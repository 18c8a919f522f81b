use crate::result::EntryResult;
use catalog_auth::{AuthContext, PermissionResolver};
use catalog_ref::{BulkEntry, Resolver};
use catalog_store::CatalogStore;
use catalog_types::entity::Job;
use catalog_types::{CatalogError, JobPermission, Member, Status, StudyPermission};
use gridengine::{GridEngineBridge, JobStatus, SgeError};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A logical job submission, before ids and queues are assigned.
#[derive(Debug, Clone)]
pub struct SubmitJobRequest {
    pub name: String,
    pub tool_name: String,
    pub out_dir: String,
    pub command_line: String,
    pub queue: Option<String>,
}

pub struct JobManager {
    store: Arc<dyn CatalogStore>,
    resolver: Arc<Resolver>,
    auth: Arc<PermissionResolver>,
    bridge: Arc<GridEngineBridge>,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        resolver: Arc<Resolver>,
        auth: Arc<PermissionResolver>,
        bridge: Arc<GridEngineBridge>,
    ) -> Self {
        Self {
            store,
            resolver,
            auth,
            bridge,
        }
    }

    /// Bulk info lookup over a comma-separated reference list. Results come
    /// back in input order; each entry carries its own outcome. In silent
    /// mode per-item failures (missing ids, denials) become error entries;
    /// otherwise the first failure aborts the whole request.
    pub async fn info(
        &self,
        caller: &Member,
        references: &str,
        silent: bool,
    ) -> Result<Vec<EntryResult<Job>>, CatalogError> {
        let entries = self
            .resolver
            .resolve_list(caller, catalog_types::EntityKind::Job, references, silent)
            .await?;

        let mut ctx = AuthContext::new();
        let mut results = Vec::with_capacity(entries.len());
        for (entry, reference) in entries.into_iter().zip(references.split(',')) {
            let reference = reference.trim().to_string();
            match entry {
                BulkEntry::Missing { error, .. } => {
                    results.push(EntryResult::err(reference, error));
                }
                BulkEntry::Found(resolved) => {
                    let decision = self
                        .auth
                        .check(&mut ctx, caller, resolved.entity_id, JobPermission::View)
                        .await?;
                    match decision.require() {
                        Ok(()) => {
                            let job = self.store.get_job(resolved.entity_id).await?;
                            results.push(EntryResult::ok(reference, job));
                        }
                        Err(err) if silent => {
                            results.push(EntryResult::err(reference, err));
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }
        Ok(results)
    }

    /// Mark a job as visited by its first reader.
    pub async fn visit(&self, caller: &Member, reference: &str) -> Result<Job, CatalogError> {
        let job = self.resolve_one(caller, reference).await?;
        let mut ctx = AuthContext::new();
        self.auth
            .check(&mut ctx, caller, job.id, JobPermission::View)
            .await?
            .require()?;

        let mut job = job;
        job.visited = true;
        self.store.update_job(&job).await?;
        Ok(job)
    }

    /// Jobs in a study, optionally by exact name, visible to the caller.
    pub async fn search(
        &self,
        caller: &Member,
        study_reference: &str,
        name: Option<&str>,
    ) -> Result<Vec<Job>, CatalogError> {
        let study_id = self.resolver.resolve_study_ref(caller, study_reference).await?;
        let jobs = self.store.search_jobs(study_id, name).await?;
        let mut ctx = AuthContext::new();
        self.auth.filter_viewable(&mut ctx, caller, jobs).await
    }

    /// Create the job record and hand it to the batch scheduler.
    pub async fn submit(
        &self,
        caller: &Member,
        study_reference: &str,
        request: SubmitJobRequest,
    ) -> Result<Job, CatalogError> {
        let study_id = self.resolver.resolve_study_ref(caller, study_reference).await?;
        self.auth
            .check_study(caller, study_id, StudyPermission::WriteJobs)
            .await?
            .require()?;

        let id = self.store.next_id().await?;
        let mut job = Job {
            id,
            study_id,
            name: request.name,
            tool_name: request.tool_name,
            user_id: caller.to_string(),
            out_dir: request.out_dir,
            command_line: request.command_line,
            queue: None,
            visited: false,
            execution_status: None,
            acl: vec![],
            status: Status::Ready,
        };
        self.store.create_job(job.clone()).await?;

        match self
            .bridge
            .submit_job(
                &job.tool_name,
                job.id,
                &job.out_dir,
                &job.command_line,
                request.queue.as_deref(),
            )
            .await
        {
            Ok(queue) => {
                info!("job {} ('{}') submitted to queue '{queue}'", job.id, job.name);
                job.queue = Some(queue);
                self.store.update_job(&job).await?;
                Ok(job)
            }
            Err(err) => {
                job.execution_status = Some(JobStatus::QueueError.to_string());
                self.store.update_job(&job).await?;
                Err(map_scheduler_error(err))
            }
        }
    }

    /// Reconcile the job's state against the scheduler and persist it.
    pub async fn update_status(
        &self,
        caller: &Member,
        reference: &str,
    ) -> Result<JobStatus, CatalogError> {
        let job = self.resolve_one(caller, reference).await?;
        let mut ctx = AuthContext::new();
        self.auth
            .check(&mut ctx, caller, job.id, JobPermission::View)
            .await?
            .require()?;

        let status = self
            .bridge
            .status(&job.tool_name, job.id)
            .await
            .map_err(map_scheduler_error)?;
        debug!("job {} reconciled to {status}", job.id);

        let mut job = job;
        job.execution_status = Some(status.to_string());
        self.store.update_job(&job).await?;
        Ok(status)
    }

    /// Soft delete sends the job to the trash; hard delete marks it for
    /// removal. Either way the terminal state is `DELETED`.
    pub async fn delete(
        &self,
        caller: &Member,
        reference: &str,
        hard: bool,
    ) -> Result<Job, CatalogError> {
        let job = self.resolve_one(caller, reference).await?;
        let mut ctx = AuthContext::new();
        self.auth
            .check(&mut ctx, caller, job.id, JobPermission::Delete)
            .await?
            .require()?;

        let next = if hard {
            Status::PendingDelete
        } else {
            Status::Trashed
        };
        let mut job = job;
        job.status = job.status.transition(next)?;
        self.store.update_job(&job).await?;
        Ok(job)
    }

    /// Bring a trashed job back.
    pub async fn restore(&self, caller: &Member, reference: &str) -> Result<Job, CatalogError> {
        let job = self.resolve_one(caller, reference).await?;
        let mut ctx = AuthContext::new();
        self.auth
            .check(&mut ctx, caller, job.id, JobPermission::Delete)
            .await?
            .require()?;

        let mut job = job;
        job.status = job.status.transition(Status::Ready)?;
        self.store.update_job(&job).await?;
        Ok(job)
    }

    async fn resolve_one(&self, caller: &Member, reference: &str) -> Result<Job, CatalogError> {
        let parsed = self.resolver.parser().parse(reference)?;
        if parsed.is_negated() {
            return Err(CatalogError::InvalidArgument(
                "a negated reference cannot be used here".to_string(),
            ));
        }
        let resolved = self
            .resolver
            .resolve_entity(caller, catalog_types::EntityKind::Job, &parsed)
            .await?;
        self.store.get_job(resolved.entity_id).await
    }
}

fn map_scheduler_error(err: SgeError) -> CatalogError {
    match err {
        SgeError::Malformed(message) => {
            CatalogError::InvalidArgument(format!("malformed scheduler output: {message}"))
        }
        other => {
            error!("scheduler interaction failed: {other:#}");
            CatalogError::Internal(anyhow::anyhow!(other))
        }
    }
}
