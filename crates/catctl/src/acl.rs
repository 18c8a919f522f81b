use catalog::CatalogManager;
use catalog_auth::{AclUpdate, AuthContext};
use catalog_types::{
    AclTemplate, CatalogError, CatalogId, EntityKind, JobPermission, Member, StudyId,
    StudyPermission,
};
use clap::Parser;
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Parser)]
pub enum AclCommand {
    /// One member's ACL entry
    Get(GetCommand),
    /// Every ACL entry on the target
    List(ListCommand),
    /// Create entries for members that have none yet
    Create(CreateCommand),
    /// Set, add to, or remove from an existing entry
    Update(UpdateCommand),
    /// Remove a member's entry entirely
    Remove(RemoveCommand),
    /// Remove a member's entry, tolerating that it may not exist
    Reset(ResetCommand),
}

impl AclCommand {
    pub async fn run(
        &self,
        manager: &CatalogManager,
        caller: &Member,
    ) -> Result<(), CatalogError> {
        match self {
            Self::Get(cmd) => cmd.run(manager, caller).await,
            Self::List(cmd) => cmd.run(manager, caller).await,
            Self::Create(cmd) => cmd.run(manager, caller).await,
            Self::Update(cmd) => cmd.run(manager, caller).await,
            Self::Remove(cmd) => cmd.run(manager, caller).await,
            Self::Reset(cmd) => cmd.run(manager, caller).await,
        }
    }
}

/// ACL targets addressable from the CLI. The core mutator is generic over
/// every entity kind; the CLI exposes the two the operators actually touch.
enum Target {
    Study(StudyId),
    Job(CatalogId),
}

async fn resolve_target(
    manager: &CatalogManager,
    caller: &Member,
    study: &Option<String>,
    job: &Option<String>,
) -> Result<Target, CatalogError> {
    match (study, job) {
        (Some(reference), None) => Ok(Target::Study(
            manager.studies().resolve(caller, reference).await?,
        )),
        (None, Some(reference)) => {
            let parsed = manager.resolver().parser().parse(reference)?;
            let resolved = manager
                .resolver()
                .resolve_entity(caller, EntityKind::Job, &parsed)
                .await?;
            Ok(Target::Job(resolved.entity_id))
        }
        _ => Err(CatalogError::InvalidArgument(
            "specify exactly one of --study or --job".to_string(),
        )),
    }
}

fn parse_member(raw: &str) -> Result<Member, CatalogError> {
    raw.parse().map_err(CatalogError::InvalidArgument)
}

fn parse_members(raw: &str) -> Result<Vec<Member>, CatalogError> {
    raw.split(',').map(|m| parse_member(m.trim())).collect()
}

fn parse_set<P: FromStr + Ord>(raw: &str, what: &str) -> Result<BTreeSet<P>, CatalogError> {
    raw.split(',')
        .map(|p| {
            p.trim().parse().map_err(|_| {
                CatalogError::InvalidArgument(format!("'{p}' is not a valid {what} permission"))
            })
        })
        .collect()
}

#[derive(Debug, Parser)]
pub struct GetCommand {
    #[arg(long)]
    study: Option<String>,

    #[arg(long)]
    job: Option<String>,

    #[arg(long)]
    member: String,
}

impl GetCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let member = parse_member(&self.member)?;
        match resolve_target(manager, caller, &self.study, &self.job).await? {
            Target::Study(study_id) => {
                let acl = manager
                    .acls()
                    .get_study_acl(caller, study_id, &member)
                    .await?;
                crate::print_json(&acl)
            }
            Target::Job(job_id) => {
                let mut ctx = AuthContext::new();
                let acl = manager
                    .acls()
                    .get_acl::<JobPermission>(&mut ctx, caller, job_id, &member)
                    .await?;
                crate::print_json(&acl)
            }
        }
    }
}

#[derive(Debug, Parser)]
pub struct ListCommand {
    #[arg(long)]
    study: Option<String>,

    #[arg(long)]
    job: Option<String>,
}

impl ListCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        match resolve_target(manager, caller, &self.study, &self.job).await? {
            Target::Study(study_id) => {
                let acls = manager.acls().get_all_study_acls(caller, study_id).await?;
                crate::print_json(&acls)
            }
            Target::Job(job_id) => {
                let mut ctx = AuthContext::new();
                let acls = manager
                    .acls()
                    .get_all_acls::<JobPermission>(&mut ctx, caller, job_id)
                    .await?;
                crate::print_json(&acls)
            }
        }
    }
}

#[derive(Debug, Parser)]
pub struct CreateCommand {
    #[arg(long)]
    study: Option<String>,

    #[arg(long)]
    job: Option<String>,

    /// Comma-separated members ('user', '@group', '*', 'anonymous')
    #[arg(long)]
    members: String,

    /// Comma-separated permission names
    #[arg(long, default_value = "")]
    permissions: String,

    /// Baseline template for study ACLs: 'admin' or 'view_only'
    #[arg(long)]
    template: Option<AclTemplate>,
}

impl CreateCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let members = parse_members(&self.members)?;
        match resolve_target(manager, caller, &self.study, &self.job).await? {
            Target::Study(study_id) => {
                let permissions = if self.permissions.is_empty() {
                    BTreeSet::new()
                } else {
                    parse_set::<StudyPermission>(&self.permissions, "study")?
                };
                let acls = manager
                    .acls()
                    .create_study_acl(caller, study_id, &members, permissions, self.template)
                    .await?;
                crate::print_json(&acls)
            }
            Target::Job(job_id) => {
                if self.template.is_some() {
                    return Err(CatalogError::InvalidArgument(
                        "templates apply to study ACLs only".to_string(),
                    ));
                }
                let permissions = parse_set::<JobPermission>(&self.permissions, "job")?;
                let mut ctx = AuthContext::new();
                let acls = manager
                    .acls()
                    .create_acl(&mut ctx, caller, job_id, &members, permissions)
                    .await?;
                crate::print_json(&acls)
            }
        }
    }
}

#[derive(Debug, Parser)]
pub struct UpdateCommand {
    #[arg(long)]
    study: Option<String>,

    #[arg(long)]
    job: Option<String>,

    #[arg(long)]
    member: String,

    /// Replace the permission set
    #[arg(long, conflicts_with_all = ["add", "remove"])]
    set: Option<String>,

    /// Add permissions to the set
    #[arg(long, conflicts_with = "remove")]
    add: Option<String>,

    /// Remove permissions from the set
    #[arg(long)]
    remove: Option<String>,
}

impl UpdateCommand {
    fn action<P: FromStr + Ord>(&self, what: &str) -> Result<AclUpdate<P>, CatalogError> {
        match (&self.set, &self.add, &self.remove) {
            (Some(raw), None, None) => Ok(AclUpdate::Set(parse_set(raw, what)?)),
            (None, Some(raw), None) => Ok(AclUpdate::Add(parse_set(raw, what)?)),
            (None, None, Some(raw)) => Ok(AclUpdate::Remove(parse_set(raw, what)?)),
            _ => Err(CatalogError::InvalidArgument(
                "specify exactly one of --set, --add or --remove".to_string(),
            )),
        }
    }

    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let member = parse_member(&self.member)?;
        match resolve_target(manager, caller, &self.study, &self.job).await? {
            Target::Study(study_id) => {
                let acl = manager
                    .acls()
                    .update_study_acl(caller, study_id, &member, self.action("study")?)
                    .await?;
                crate::print_json(&acl)
            }
            Target::Job(job_id) => {
                let mut ctx = AuthContext::new();
                let acl = manager
                    .acls()
                    .update_acl::<JobPermission>(
                        &mut ctx,
                        caller,
                        job_id,
                        &member,
                        self.action("job")?,
                    )
                    .await?;
                crate::print_json(&acl)
            }
        }
    }
}

#[derive(Debug, Parser)]
pub struct RemoveCommand {
    #[arg(long)]
    study: Option<String>,

    #[arg(long)]
    job: Option<String>,

    #[arg(long)]
    member: String,
}

impl RemoveCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let member = parse_member(&self.member)?;
        match resolve_target(manager, caller, &self.study, &self.job).await? {
            Target::Study(study_id) => {
                manager
                    .acls()
                    .remove_study_acl(caller, study_id, &member)
                    .await
            }
            Target::Job(job_id) => {
                let mut ctx = AuthContext::new();
                manager
                    .acls()
                    .remove_acl::<JobPermission>(&mut ctx, caller, job_id, &member)
                    .await
            }
        }
    }
}

#[derive(Debug, Parser)]
pub struct ResetCommand {
    #[arg(long)]
    study: Option<String>,

    #[arg(long)]
    job: Option<String>,

    #[arg(long)]
    member: String,
}

impl ResetCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let member = parse_member(&self.member)?;
        match resolve_target(manager, caller, &self.study, &self.job).await? {
            Target::Study(study_id) => {
                manager
                    .acls()
                    .reset_study_acl(caller, study_id, &member)
                    .await
            }
            Target::Job(job_id) => {
                let mut ctx = AuthContext::new();
                manager
                    .acls()
                    .reset_acl::<JobPermission>(&mut ctx, caller, job_id, &member)
                    .await
            }
        }
    }
}
