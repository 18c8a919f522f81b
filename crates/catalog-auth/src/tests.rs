use crate::{AclMutator, AclUpdate, AuthContext, PermissionResolver};
use catalog_store::{CatalogStore, MemoryStore};
use catalog_types::entity::{
    AnnotationSet, File, FileType, Group, Job, Project, Sample, Study,
};
use catalog_types::{
    CatalogError, CatalogId, FilePermission, JobPermission, Member, SamplePermission, Status,
    StudyId, StudyPermission,
};
use maplit::btreeset;
use std::collections::BTreeSet;
use std::sync::Arc;

const STUDY: StudyId = 2;
const JOB: CatalogId = 100;

struct Fixture {
    store: Arc<MemoryStore>,
    resolver: PermissionResolver,
    mutator: AclMutator,
}

fn owner() -> Member {
    Member::user("ada")
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new(0));
    store
        .create_project(Project {
            id: 1,
            name: "1000 genomes".into(),
            alias: "1kg".into(),
            owner: "ada".into(),
            status: Status::Ready,
        })
        .await
        .unwrap();
    store
        .create_study(Study {
            id: STUDY,
            project_id: 1,
            name: "phase1".into(),
            alias: "phase1".into(),
            groups: vec![Group {
                name: "analysts".into(),
                members: vec!["bob".into()],
            }],
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
    store
        .create_job(Job {
            id: JOB,
            study_id: STUDY,
            name: "align".into(),
            tool_name: "bwa".into(),
            user_id: "ada".into(),
            out_dir: "/tmp/align".into(),
            command_line: "bwa mem ref.fa".into(),
            queue: None,
            visited: false,
            execution_status: None,
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
    Fixture {
        resolver: PermissionResolver::new(store.clone()),
        mutator: AclMutator::new(store.clone()),
        store,
    }
}

async fn add_file(store: &MemoryStore, id: CatalogId, path: &str) {
    store
        .create_file(File {
            id,
            study_id: STUDY,
            name: path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(path)
                .into(),
            path: path.into(),
            file_type: if path.ends_with('/') {
                FileType::Directory
            } else {
                FileType::File
            },
            sample_names: vec![],
            external: false,
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
}

/// Give a member a study-level ACL so Invariant B is satisfied.
async fn enroll(fx: &Fixture, member: Member, permissions: BTreeSet<StudyPermission>) {
    fx.mutator
        .create_study_acl(&owner(), STUDY, &[member], permissions, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn owner_is_always_allowed() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    for permission in [
        JobPermission::View,
        JobPermission::Update,
        JobPermission::Delete,
        JobPermission::Share,
    ] {
        let decision = fx
            .resolver
            .check(&mut ctx, &owner(), JOB, permission)
            .await
            .unwrap();
        assert!(decision.is_allow(), "{permission}");
    }
}

#[tokio::test]
async fn anonymous_is_denied_by_default() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    let decision = fx
        .resolver
        .check(&mut ctx, &Member::Anonymous, JOB, JobPermission::View)
        .await
        .unwrap();
    let err = decision.require().unwrap_err();
    assert!(matches!(err, CatalogError::PermissionDenied(_)), "{err:?}");
}

#[tokio::test]
async fn study_level_grant_and_revoke_for_everyone() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();

    fx.mutator
        .create_study_acl(
            &owner(),
            STUDY,
            &[Member::Anyone],
            btreeset! { StudyPermission::ViewJobs },
            None,
        )
        .await
        .unwrap();

    let acl = fx
        .mutator
        .get_study_acl(&owner(), STUDY, &Member::Anyone)
        .await
        .unwrap();
    k9::assert_equal!(acl.permissions, btreeset! { StudyPermission::ViewJobs });

    let decision = fx
        .resolver
        .check(&mut ctx, &Member::Anonymous, JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(decision.is_allow());

    fx.mutator
        .update_study_acl(
            &owner(),
            STUDY,
            &Member::Anyone,
            AclUpdate::Remove(btreeset! { StudyPermission::ViewJobs }),
        )
        .await
        .unwrap();

    let mut ctx = AuthContext::new();
    let decision = fx
        .resolver
        .check(&mut ctx, &Member::Anonymous, JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(!decision.is_allow());
}

#[tokio::test]
async fn entity_grant_overrides_study_silence() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();

    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::Anyone],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap();

    let decision = fx
        .resolver
        .check(&mut ctx, &Member::Anonymous, JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(decision.is_allow());

    fx.mutator
        .reset_acl::<JobPermission>(&mut ctx, &owner(), JOB, &Member::Anyone)
        .await
        .unwrap();

    let decision = fx
        .resolver
        .check(&mut ctx, &Member::Anonymous, JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(!decision.is_allow());
}

#[tokio::test]
async fn update_acl_add_keeps_existing_permissions() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewJobs }).await;

    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::user("eve")],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap();

    let acl = fx
        .mutator
        .update_acl(
            &mut ctx,
            &owner(),
            JOB,
            &Member::user("eve"),
            AclUpdate::Add(btreeset! { JobPermission::Delete }),
        )
        .await
        .unwrap();

    k9::assert_equal!(acl.permissions.len(), 2);
    assert!(acl.permissions.contains(&JobPermission::View));
    assert!(acl.permissions.contains(&JobPermission::Delete));
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewJobs }).await;

    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::user("eve")],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap();
    let expected = btreeset! { JobPermission::Update, JobPermission::Share };
    fx.mutator
        .update_acl(
            &mut ctx,
            &owner(),
            JOB,
            &Member::user("eve"),
            AclUpdate::Set(expected.clone()),
        )
        .await
        .unwrap();

    let acl = fx
        .mutator
        .get_acl::<JobPermission>(&mut ctx, &owner(), JOB, &Member::user("eve"))
        .await
        .unwrap();
    k9::assert_equal!(acl.permissions, expected);
}

#[tokio::test]
async fn members_can_ask_about_themselves_and_their_group() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(
        &fx,
        Member::group("analysts"),
        btreeset! { StudyPermission::ViewJobs },
    )
    .await;

    // bob holds no SHARE anywhere, but @analysts is his group
    let acl = fx
        .mutator
        .get_study_acl(&Member::user("bob"), STUDY, &Member::group("analysts"))
        .await
        .unwrap();
    k9::assert_equal!(acl.permissions, btreeset! { StudyPermission::ViewJobs });

    // a third party without SHARE is refused
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewJobs }).await;
    let err = fx
        .mutator
        .get_study_acl(&Member::user("eve"), STUDY, &Member::group("analysts"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::PermissionDenied(_)), "{err:?}");
}

#[tokio::test]
async fn child_acl_requires_study_membership() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    let err = fx
        .mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::user("carol")],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Precondition(_)), "{err:?}");

    // the wildcard and anonymous are exempt
    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::Anonymous],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_acl_creation_is_refused() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewJobs }).await;

    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::user("eve")],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap();
    let err = fx
        .mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::user("eve")],
            btreeset! { JobPermission::Update },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Precondition(_)), "{err:?}");
}

#[tokio::test]
async fn remove_acl_twice_fails_but_leaves_state_unchanged() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewJobs }).await;
    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            JOB,
            &[Member::user("eve")],
            btreeset! { JobPermission::View },
        )
        .await
        .unwrap();

    fx.mutator
        .remove_acl::<JobPermission>(&mut ctx, &owner(), JOB, &Member::user("eve"))
        .await
        .unwrap();
    let err = fx
        .mutator
        .remove_acl::<JobPermission>(&mut ctx, &owner(), JOB, &Member::user("eve"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }), "{err:?}");

    // reset of a missing entry is fine
    fx.mutator
        .reset_acl::<JobPermission>(&mut ctx, &owner(), JOB, &Member::user("eve"))
        .await
        .unwrap();
}

#[tokio::test]
async fn owner_study_acl_cannot_be_removed() {
    let fx = fixture().await;
    let err = fx
        .mutator
        .remove_study_acl(&owner(), STUDY, &owner())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Precondition(_)), "{err:?}");
}

#[tokio::test]
async fn study_fallback_projects_through_the_derivation_table() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewJobs }).await;

    let view = fx
        .resolver
        .check(&mut ctx, &Member::user("eve"), JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(view.is_allow());

    let delete = fx
        .resolver
        .check(&mut ctx, &Member::user("eve"), JOB, JobPermission::Delete)
        .await
        .unwrap();
    assert!(!delete.is_allow());
}

#[tokio::test]
async fn user_entry_beats_group_entry() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    enroll(
        &fx,
        Member::group("analysts"),
        btreeset! { StudyPermission::ViewJobs },
    )
    .await;
    enroll(&fx, Member::user("bob"), BTreeSet::new()).await;

    // the group grants VIEW through derivation, but bob's own (empty)
    // study entry takes precedence and denies
    let decision = fx
        .resolver
        .check(&mut ctx, &Member::user("bob"), JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(!decision.is_allow());
}

#[tokio::test]
async fn admin_requires_an_explicit_daemon_acl() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();

    let decision = fx
        .resolver
        .check(&mut ctx, &Member::Admin, JOB, JobPermission::View)
        .await
        .unwrap();
    k9::assert_equal!(
        decision,
        crate::Decision::Deny("admin lacks explicit daemon ACL".to_string())
    );

    fx.mutator
        .set_daemon_acl(STUDY, btreeset! { StudyPermission::ViewJobs })
        .await
        .unwrap();

    let view = fx
        .resolver
        .check(&mut ctx, &Member::Admin, JOB, JobPermission::View)
        .await
        .unwrap();
    assert!(view.is_allow());

    let update = fx
        .resolver
        .check(&mut ctx, &Member::Admin, JOB, JobPermission::Update)
        .await
        .unwrap();
    assert!(!update.is_allow());
}

#[tokio::test]
async fn folder_grant_is_inherited_down_the_tree() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    add_file(&fx.store, 10, "data/").await;
    add_file(&fx.store, 11, "data/batch1/").await;
    add_file(&fx.store, 12, "data/batch1/a.vcf").await;

    enroll(&fx, Member::user("eve"), BTreeSet::new()).await;
    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            10,
            &[Member::user("eve")],
            btreeset! { FilePermission::View },
        )
        .await
        .unwrap();

    let mut ctx = AuthContext::new();
    let decision = fx
        .resolver
        .check(&mut ctx, &Member::user("eve"), 12, FilePermission::View)
        .await
        .unwrap();
    assert!(decision.is_allow());
}

#[tokio::test]
async fn deeper_entry_shadows_a_folder_grant() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    add_file(&fx.store, 10, "data/").await;
    add_file(&fx.store, 12, "data/a.vcf").await;

    enroll(&fx, Member::user("eve"), BTreeSet::new()).await;
    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            10,
            &[Member::user("eve")],
            btreeset! { FilePermission::View },
        )
        .await
        .unwrap();
    // an explicit entry on the file itself, without VIEW
    fx.mutator
        .create_acl(
            &mut ctx,
            &owner(),
            12,
            &[Member::user("eve")],
            btreeset! { FilePermission::Download },
        )
        .await
        .unwrap();

    let mut ctx = AuthContext::new();
    let decision = fx
        .resolver
        .check(&mut ctx, &Member::user("eve"), 12, FilePermission::View)
        .await
        .unwrap();
    assert!(!decision.is_allow());
}

#[tokio::test]
async fn listing_files_reuses_the_request_cache() {
    let fx = fixture().await;
    add_file(&fx.store, 10, "data/").await;
    add_file(&fx.store, 11, "data/a.vcf").await;
    add_file(&fx.store, 12, "data/b.vcf").await;
    add_file(&fx.store, 13, "data/c.vcf").await;
    enroll(&fx, Member::user("eve"), btreeset! { StudyPermission::ViewFiles }).await;

    let mut ctx = AuthContext::new();
    let files = vec![
        fx.store.get_file(11).await.unwrap(),
        fx.store.get_file(12).await.unwrap(),
        fx.store.get_file(13).await.unwrap(),
    ];
    let visible = fx
        .resolver
        .filter_viewable(&mut ctx, &Member::user("eve"), files.clone())
        .await
        .unwrap();
    k9::assert_equal!(visible.len(), 3);

    // at most one bulk lookup per distinct ancestor-path set
    let lookups = ctx.bulk_lookups();
    assert!(lookups <= 3, "{lookups} lookups for 3 files");

    // a second pass over the same files is fully served from the cache
    fx.resolver
        .filter_viewable(&mut ctx, &Member::user("eve"), files)
        .await
        .unwrap();
    k9::assert_equal!(ctx.bulk_lookups(), lookups);
}

#[tokio::test]
async fn annotation_sets_are_scrubbed_without_view_annotations() {
    let fx = fixture().await;
    let mut ctx = AuthContext::new();
    fx.store
        .create_sample(Sample {
            id: 50,
            study_id: STUDY,
            name: "NA12878".into(),
            source: None,
            annotation_sets: Some(vec![AnnotationSet {
                name: "clinical".into(),
                variable_set_id: 1,
                annotations: Default::default(),
            }]),
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
    enroll(
        &fx,
        Member::user("eve"),
        btreeset! { StudyPermission::ViewSamples },
    )
    .await;

    let samples = vec![fx.store.get_sample(50).await.unwrap()];
    let mut visible = fx
        .resolver
        .filter_viewable(&mut ctx, &Member::user("eve"), samples)
        .await
        .unwrap();
    k9::assert_equal!(visible.len(), 1);

    fx.resolver
        .scrub_annotations(&mut ctx, &Member::user("eve"), &mut visible)
        .await
        .unwrap();
    assert!(visible[0].annotation_sets.is_none());

    // the owner keeps them
    let mut for_owner = vec![fx.store.get_sample(50).await.unwrap()];
    fx.resolver
        .scrub_annotations(&mut ctx, &owner(), &mut for_owner)
        .await
        .unwrap();
    assert!(for_owner[0].annotation_sets.is_some());

    // sample-level VIEW must also hold for a member without any grant
    let decision = fx
        .resolver
        .check(
            &mut ctx,
            &Member::user("carol"),
            50,
            SamplePermission::View,
        )
        .await
        .unwrap();
    assert!(!decision.is_allow());
}
