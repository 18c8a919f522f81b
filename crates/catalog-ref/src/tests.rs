use super::*;
use catalog_store::MemoryStore;
use catalog_types::entity::{Group, Job, Project, Study};
use catalog_types::{RawAcl, Status};

const OFFSET: CatalogId = 1000;

struct Fixture {
    resolver: Resolver,
    store: Arc<MemoryStore>,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new(OFFSET));
    store
        .create_project(Project {
            id: 1001,
            name: "1000 genomes".into(),
            alias: "1kg".into(),
            owner: "ada".into(),
            status: Status::Ready,
        })
        .await
        .unwrap();
    store
        .create_study(Study {
            id: 1002,
            project_id: 1001,
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
    let resolver = Resolver::new(store.clone(), OFFSET);
    Fixture { resolver, store }
}

async fn add_job(store: &MemoryStore, id: CatalogId, study_id: StudyId, name: &str) {
    store
        .create_job(Job {
            id,
            study_id,
            name: name.into(),
            tool_name: "gatk".into(),
            user_id: "ada".into(),
            out_dir: "/tmp/out".into(),
            command_line: "gatk Haplotype".into(),
            queue: None,
            visited: false,
            execution_status: None,
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn resolve_by_numeric_id() {
    let fx = fixture().await;
    add_job(&fx.store, 1010, 1002, "align").await;
    let resolved = fx
        .resolver
        .resolve_entity(
            &Member::user("ada"),
            EntityKind::Job,
            &EntityRef::Id(1010),
        )
        .await
        .unwrap();
    k9::assert_equal!(resolved.study_id, 1002);
    k9::assert_equal!(resolved.entity_id, 1010);
    assert!(!resolved.excluded);
}

#[tokio::test]
async fn missing_id_uses_the_envelope_message() {
    let fx = fixture().await;
    let err = fx
        .resolver
        .resolve_entity(&Member::user("ada"), EntityKind::Job, &EntityRef::Id(9999))
        .await
        .unwrap_err();
    k9::assert_equal!(err.to_string(), "Job id '9999' does not exist");
}

#[tokio::test]
async fn scoped_study_defaults_owner_to_caller() {
    let fx = fixture().await;
    let id = fx
        .resolver
        .resolve_study_ref(&Member::user("ada"), "1kg:phase1")
        .await
        .unwrap();
    k9::assert_equal!(id, 1002);

    // explicit owner works for other callers
    let id = fx
        .resolver
        .resolve_study_ref(&Member::user("bob"), "ada@1kg:phase1")
        .await
        .unwrap();
    k9::assert_equal!(id, 1002);

    // anonymous callers cannot use the abbreviated form
    let err = fx
        .resolver
        .resolve_study_ref(&Member::Anonymous, "1kg:phase1")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidArgument(_)), "{err:?}");
}

#[tokio::test]
async fn bare_study_name_respects_accessibility() {
    let fx = fixture().await;

    // the owner and a group member see it
    k9::assert_equal!(
        fx.resolver
            .resolve_study_ref(&Member::user("ada"), "phase1")
            .await
            .unwrap(),
        1002
    );
    k9::assert_equal!(
        fx.resolver
            .resolve_study_ref(&Member::user("bob"), "phase1")
            .await
            .unwrap(),
        1002
    );

    // an outsider does not
    let err = fx
        .resolver
        .resolve_study_ref(&Member::user("eve"), "phase1")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn bare_entity_name_errors_when_ambiguous() {
    let fx = fixture().await;
    fx.store
        .create_study(Study {
            id: 1003,
            project_id: 1001,
            name: "phase2".into(),
            alias: "phase2".into(),
            groups: vec![],
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
    add_job(&fx.store, 1010, 1002, "align").await;
    add_job(&fx.store, 1011, 1003, "align").await;

    let err = fx
        .resolver
        .resolve_entity(
            &Member::user("ada"),
            EntityKind::Job,
            &EntityRef::Name("align".into()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Ambiguous { .. }), "{err:?}");
}

#[tokio::test]
async fn negated_reference_resolves_with_exclusion() {
    let fx = fixture().await;
    add_job(&fx.store, 1010, 1002, "align").await;
    let parsed = fx.resolver.parser().parse("!align").unwrap();
    let resolved = fx
        .resolver
        .resolve_entity(&Member::user("ada"), EntityKind::Job, &parsed)
        .await
        .unwrap();
    assert!(resolved.excluded);
    k9::assert_equal!(resolved.entity_id, 1010);
}

#[tokio::test]
async fn silent_bulk_lookup_absorbs_missing_entries() {
    let fx = fixture().await;
    add_job(&fx.store, 1010, 1002, "j1").await;
    add_job(&fx.store, 1011, 1002, "j2").await;

    let entries = fx
        .resolver
        .resolve_list(&Member::user("ada"), EntityKind::Job, "1010,1011,0", true)
        .await
        .unwrap();
    k9::assert_equal!(entries.len(), 3);
    k9::assert_equal!(entries[0].adaptor_id(), 1010);
    k9::assert_equal!(entries[1].adaptor_id(), 1011);
    k9::assert_equal!(entries[2].adaptor_id(), MISSING_ID);
    match &entries[2] {
        BulkEntry::Missing { error, .. } => {
            k9::assert_equal!(error.to_string(), "Job id '0' does not exist");
        }
        other => panic!("expected Missing, got {other:?}"),
    }
}

#[tokio::test]
async fn non_silent_bulk_lookup_aborts_on_first_missing() {
    let fx = fixture().await;
    add_job(&fx.store, 1010, 1002, "j1").await;
    let err = fx
        .resolver
        .resolve_list(&Member::user("ada"), EntityKind::Job, "1010,0,1010", false)
        .await
        .unwrap_err();
    k9::assert_equal!(err.to_string(), "Job id '0' does not exist");
}

#[tokio::test]
async fn bulk_lookup_preserves_input_order() {
    let fx = fixture().await;
    add_job(&fx.store, 1010, 1002, "j1").await;
    add_job(&fx.store, 1011, 1002, "j2").await;

    let forward = fx
        .resolver
        .resolve_list(&Member::user("ada"), EntityKind::Job, "1010,1011", false)
        .await
        .unwrap();
    let reversed = fx
        .resolver
        .resolve_list(&Member::user("ada"), EntityKind::Job, "1011,1010", false)
        .await
        .unwrap();
    k9::assert_equal!(forward[0].adaptor_id(), 1010);
    k9::assert_equal!(forward[1].adaptor_id(), 1011);
    k9::assert_equal!(reversed[0].adaptor_id(), 1011);
    k9::assert_equal!(reversed[1].adaptor_id(), 1010);
}
