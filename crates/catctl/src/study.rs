use catalog::CatalogManager;
use catalog_store::{CatalogStore, LockToken};
use catalog_types::{CatalogError, Member, StudyPermission};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
pub enum StudyCommand {
    /// Acquire the study lock; prints the lease token
    Lock(LockCommand),
    /// Release a previously acquired lock token
    Unlock(UnlockCommand),
    /// Create a group
    GroupCreate(GroupCreateCommand),
    /// Add members to a group
    GroupAdd(GroupMembersCommand),
    /// Remove members from a group
    GroupRemove(GroupMembersCommand),
    /// Delete a group and its ACL entry
    GroupDelete(GroupDeleteCommand),
    /// List the variable sets visible to the caller
    VariableSets(VariableSetsCommand),
}

impl StudyCommand {
    pub async fn run(
        &self,
        manager: &CatalogManager,
        caller: &Member,
    ) -> Result<(), CatalogError> {
        match self {
            Self::Lock(cmd) => cmd.run(manager, caller).await,
            Self::Unlock(cmd) => cmd.run(manager, caller).await,
            Self::GroupCreate(cmd) => cmd.run(manager, caller).await,
            Self::GroupAdd(cmd) => cmd.run(manager, caller, true).await,
            Self::GroupRemove(cmd) => cmd.run(manager, caller, false).await,
            Self::GroupDelete(cmd) => cmd.run(manager, caller).await,
            Self::VariableSets(cmd) => cmd.run(manager, caller).await,
        }
    }
}

#[derive(Debug, Parser)]
pub struct LockCommand {
    #[arg(long)]
    study: String,

    /// Lease duration in seconds
    #[arg(long, default_value_t = 20)]
    duration: u64,

    /// Acquisition timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl LockCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let study_id = manager.studies().resolve(caller, &self.study).await?;
        manager
            .auth()
            .check_study(caller, study_id, StudyPermission::UpdateStudy)
            .await?
            .require()?;

        let token = manager
            .store()
            .lock_study(
                study_id,
                Duration::from_secs(self.duration),
                Duration::from_secs(self.timeout),
            )
            .await?;
        println!("{token}");
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct UnlockCommand {
    /// A token printed by `study lock`
    #[arg(long)]
    token: String,
}

impl UnlockCommand {
    async fn run(&self, manager: &CatalogManager, _caller: &Member) -> Result<(), CatalogError> {
        let token: LockToken = self
            .token
            .parse()
            .map_err(CatalogError::InvalidArgument)?;
        manager.store().unlock_study(token).await
    }
}

#[derive(Debug, Parser)]
pub struct GroupCreateCommand {
    #[arg(long)]
    study: String,

    /// Group name, without the '@' prefix
    #[arg(long)]
    name: String,

    /// Comma-separated user ids
    #[arg(long, default_value = "")]
    members: String,
}

impl GroupCreateCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let members = split_members(&self.members);
        let group = manager
            .studies()
            .create_group(caller, &self.study, &self.name, members)
            .await?;
        crate::print_json(&group)
    }
}

#[derive(Debug, Parser)]
pub struct GroupMembersCommand {
    #[arg(long)]
    study: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    members: String,
}

impl GroupMembersCommand {
    async fn run(
        &self,
        manager: &CatalogManager,
        caller: &Member,
        add: bool,
    ) -> Result<(), CatalogError> {
        let members = split_members(&self.members);
        let group = if add {
            manager
                .studies()
                .add_group_members(caller, &self.study, &self.name, members)
                .await?
        } else {
            manager
                .studies()
                .remove_group_members(caller, &self.study, &self.name, members)
                .await?
        };
        crate::print_json(&group)
    }
}

#[derive(Debug, Parser)]
pub struct GroupDeleteCommand {
    #[arg(long)]
    study: String,

    #[arg(long)]
    name: String,
}

impl GroupDeleteCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        manager
            .studies()
            .delete_group(caller, &self.study, &self.name)
            .await
    }
}

#[derive(Debug, Parser)]
pub struct VariableSetsCommand {
    #[arg(long)]
    study: String,
}

impl VariableSetsCommand {
    async fn run(&self, manager: &CatalogManager, caller: &Member) -> Result<(), CatalogError> {
        let sets = manager
            .studies()
            .variable_sets(caller, &self.study)
            .await?;
        crate::print_json(&sets)
    }
}

fn split_members(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}
