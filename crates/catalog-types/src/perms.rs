//! Permission enums for each entity kind, plus the static derivation table
//! that projects study-level permissions onto child entities.

use crate::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::IntoEnumIterator;

macro_rules! permission_enum {
    ($name:ident { $($variant:ident),* $(,)? }) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            strum::Display,
            strum::EnumString,
            strum::EnumIter,
        )]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),*
        }
    };
}

permission_enum!(StudyPermission {
    ViewStudy,
    UpdateStudy,
    ShareStudy,
    ViewFiles,
    WriteFiles,
    DeleteFiles,
    ShareFiles,
    DownloadFiles,
    UploadFiles,
    ViewFileHeaders,
    ViewFileContents,
    ViewJobs,
    WriteJobs,
    DeleteJobs,
    ShareJobs,
    ViewSamples,
    WriteSamples,
    DeleteSamples,
    ShareSamples,
    ViewSampleAnnotations,
    WriteSampleAnnotations,
    DeleteSampleAnnotations,
    ViewIndividuals,
    WriteIndividuals,
    DeleteIndividuals,
    ShareIndividuals,
    ViewIndividualAnnotations,
    WriteIndividualAnnotations,
    DeleteIndividualAnnotations,
    ViewCohorts,
    WriteCohorts,
    DeleteCohorts,
    ShareCohorts,
    ViewCohortAnnotations,
    WriteCohortAnnotations,
    DeleteCohortAnnotations,
    ViewDatasets,
    WriteDatasets,
    DeleteDatasets,
    ShareDatasets,
    ViewPanels,
    WritePanels,
    DeletePanels,
    SharePanels,
    ConfidentialVariableSetAccess,
});

permission_enum!(FilePermission {
    View,
    ViewHeader,
    ViewContent,
    Write,
    Delete,
    Download,
    Upload,
    Share,
});

permission_enum!(JobPermission {
    View,
    Update,
    Delete,
    Share,
});

permission_enum!(SamplePermission {
    View,
    Update,
    Delete,
    Share,
    ViewAnnotations,
    WriteAnnotations,
    DeleteAnnotations,
});

permission_enum!(IndividualPermission {
    View,
    Update,
    Delete,
    Share,
    ViewAnnotations,
    WriteAnnotations,
    DeleteAnnotations,
});

permission_enum!(CohortPermission {
    View,
    Update,
    Delete,
    Share,
    ViewAnnotations,
    WriteAnnotations,
    DeleteAnnotations,
});

permission_enum!(DatasetPermission {
    View,
    Update,
    Delete,
    Share,
});

permission_enum!(PanelPermission {
    View,
    Update,
    Delete,
    Share,
});

/// A permission enum scoped to one entity kind. The `implied_by` mapping is
/// the derivation table: each entity permission names the single study-level
/// permission that grants it implicitly.
pub trait EntityPermission:
    Copy
    + Ord
    + std::fmt::Debug
    + std::fmt::Display
    + std::str::FromStr<Err = strum::ParseError>
    + IntoEnumIterator
    + Send
    + Sync
    + 'static
{
    const KIND: EntityKind;

    fn implied_by(self) -> StudyPermission;

    /// The permission gating ACL administration on this entity kind.
    fn share() -> Self;

    /// The permission gating plain visibility.
    fn view() -> Self;
}

impl EntityPermission for FilePermission {
    const KIND: EntityKind = EntityKind::File;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewFiles,
            Self::ViewHeader => StudyPermission::ViewFileHeaders,
            Self::ViewContent => StudyPermission::ViewFileContents,
            Self::Write => StudyPermission::WriteFiles,
            Self::Delete => StudyPermission::DeleteFiles,
            Self::Download => StudyPermission::DownloadFiles,
            Self::Upload => StudyPermission::UploadFiles,
            Self::Share => StudyPermission::ShareFiles,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

impl EntityPermission for JobPermission {
    const KIND: EntityKind = EntityKind::Job;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewJobs,
            Self::Update => StudyPermission::WriteJobs,
            Self::Delete => StudyPermission::DeleteJobs,
            Self::Share => StudyPermission::ShareJobs,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

impl EntityPermission for SamplePermission {
    const KIND: EntityKind = EntityKind::Sample;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewSamples,
            Self::Update => StudyPermission::WriteSamples,
            Self::Delete => StudyPermission::DeleteSamples,
            Self::Share => StudyPermission::ShareSamples,
            Self::ViewAnnotations => StudyPermission::ViewSampleAnnotations,
            Self::WriteAnnotations => StudyPermission::WriteSampleAnnotations,
            Self::DeleteAnnotations => StudyPermission::DeleteSampleAnnotations,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

impl EntityPermission for IndividualPermission {
    const KIND: EntityKind = EntityKind::Individual;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewIndividuals,
            Self::Update => StudyPermission::WriteIndividuals,
            Self::Delete => StudyPermission::DeleteIndividuals,
            Self::Share => StudyPermission::ShareIndividuals,
            Self::ViewAnnotations => StudyPermission::ViewIndividualAnnotations,
            Self::WriteAnnotations => StudyPermission::WriteIndividualAnnotations,
            Self::DeleteAnnotations => StudyPermission::DeleteIndividualAnnotations,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

impl EntityPermission for CohortPermission {
    const KIND: EntityKind = EntityKind::Cohort;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewCohorts,
            Self::Update => StudyPermission::WriteCohorts,
            Self::Delete => StudyPermission::DeleteCohorts,
            Self::Share => StudyPermission::ShareCohorts,
            Self::ViewAnnotations => StudyPermission::ViewCohortAnnotations,
            Self::WriteAnnotations => StudyPermission::WriteCohortAnnotations,
            Self::DeleteAnnotations => StudyPermission::DeleteCohortAnnotations,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

impl EntityPermission for DatasetPermission {
    const KIND: EntityKind = EntityKind::Dataset;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewDatasets,
            Self::Update => StudyPermission::WriteDatasets,
            Self::Delete => StudyPermission::DeleteDatasets,
            Self::Share => StudyPermission::ShareDatasets,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

impl EntityPermission for PanelPermission {
    const KIND: EntityKind = EntityKind::Panel;

    fn implied_by(self) -> StudyPermission {
        match self {
            Self::View => StudyPermission::ViewPanels,
            Self::Update => StudyPermission::WritePanels,
            Self::Delete => StudyPermission::DeletePanels,
            Self::Share => StudyPermission::SharePanels,
        }
    }

    fn share() -> Self {
        Self::Share
    }

    fn view() -> Self {
        Self::View
    }
}

/// Project a study-level permission set onto an entity kind via the
/// derivation table.
pub fn project_study_permissions<P: EntityPermission>(
    study: &BTreeSet<StudyPermission>,
) -> BTreeSet<P> {
    P::iter().filter(|p| study.contains(&p.implied_by())).collect()
}
