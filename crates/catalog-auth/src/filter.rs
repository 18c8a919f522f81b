//! Visibility filtering for query results. Items the principal cannot
//! `VIEW` are dropped; annotation-bearing entities keep their row but lose
//! their annotation sets when `VIEW_ANNOTATIONS` is not granted.

use crate::context::AuthContext;
use crate::resolver::PermissionResolver;
use catalog_types::entity::{Cohort, Dataset, File, Individual, Job, Panel, Sample};
use catalog_types::{
    CatalogError, CatalogId, CohortPermission, DatasetPermission, EntityPermission,
    FilePermission, IndividualPermission, JobPermission, Member, PanelPermission,
    SamplePermission,
};

/// An entity whose rows are gated by a per-kind permission enum.
pub trait Secured {
    type Permission: EntityPermission;

    fn entity_id(&self) -> CatalogId;
}

/// An entity carrying annotation sets behind `VIEW_ANNOTATIONS`.
pub trait Annotated: Secured {
    fn view_annotations() -> Self::Permission;
    fn clear_annotations(&mut self);
}

macro_rules! secured {
    ($ty:ty, $perm:ty) => {
        impl Secured for $ty {
            type Permission = $perm;

            fn entity_id(&self) -> CatalogId {
                self.id
            }
        }
    };
}

secured!(File, FilePermission);
secured!(Job, JobPermission);
secured!(Sample, SamplePermission);
secured!(Individual, IndividualPermission);
secured!(Cohort, CohortPermission);
secured!(Dataset, DatasetPermission);
secured!(Panel, PanelPermission);

impl Annotated for Sample {
    fn view_annotations() -> SamplePermission {
        SamplePermission::ViewAnnotations
    }

    fn clear_annotations(&mut self) {
        self.annotation_sets = None;
    }
}

impl Annotated for Individual {
    fn view_annotations() -> IndividualPermission {
        IndividualPermission::ViewAnnotations
    }

    fn clear_annotations(&mut self) {
        self.annotation_sets = None;
    }
}

impl Annotated for Cohort {
    fn view_annotations() -> CohortPermission {
        CohortPermission::ViewAnnotations
    }

    fn clear_annotations(&mut self) {
        self.annotation_sets = None;
    }
}

impl PermissionResolver {
    /// Drop every item the principal cannot view. Order is preserved.
    pub async fn filter_viewable<T: Secured>(
        &self,
        ctx: &mut AuthContext,
        principal: &Member,
        items: Vec<T>,
    ) -> Result<Vec<T>, CatalogError> {
        let mut visible = Vec::with_capacity(items.len());
        for item in items {
            let decision = self
                .check(ctx, principal, item.entity_id(), T::Permission::view())
                .await?;
            if decision.is_allow() {
                visible.push(item);
            }
        }
        Ok(visible)
    }

    /// Null out annotation sets on items whose annotations the principal
    /// may not see. Call after `filter_viewable`.
    pub async fn scrub_annotations<T: Annotated>(
        &self,
        ctx: &mut AuthContext,
        principal: &Member,
        items: &mut [T],
    ) -> Result<(), CatalogError> {
        for item in items.iter_mut() {
            let decision = self
                .check(ctx, principal, item.entity_id(), T::view_annotations())
                .await?;
            if !decision.is_allow() {
                item.clear_annotations();
            }
        }
        Ok(())
    }
}
