use super::*;
use catalog_store::MemoryStore;
use catalog_types::entity::{Project, Study};
use catalog_types::Status;
use maplit::hashmap;

const STUDY: StudyId = 2;

async fn manager() -> StudyConfigurationManager {
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
            groups: vec![],
            acl: vec![],
            status: Status::Ready,
        })
        .await
        .unwrap();
    StudyConfigurationManager::with_lock_settings(
        store,
        Duration::from_secs(20),
        Duration::from_millis(100),
    )
}

#[tokio::test]
async fn first_modify_creates_the_configuration() {
    let manager = manager().await;
    manager
        .modify(STUDY, |config| {
            config.cohort_ids.insert("ALL", 7)?;
            Ok(())
        })
        .await
        .unwrap();

    let config = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    k9::assert_equal!(config.study_name, "phase1");
    k9::assert_equal!(config.cohort_ids.id("ALL"), Some(7));

    // addressable by name as well
    let by_name = manager.get(ConfigKey::Name("phase1")).await.unwrap();
    k9::assert_equal!(by_name.study_id, STUDY);
}

#[tokio::test]
async fn reads_return_defensive_copies() {
    let manager = manager().await;
    manager.modify(STUDY, |_| Ok(())).await.unwrap();

    let mut copy = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    copy.sample_ids.insert("NA1", 0).unwrap();

    let fresh = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    assert!(fresh.sample_ids.is_empty());
}

#[tokio::test]
async fn cached_read_skips_deserialization_but_sees_writes() {
    let manager = manager().await;
    manager.modify(STUDY, |_| Ok(())).await.unwrap();

    let first = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    let second = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    k9::assert_equal!(first.timestamp, second.timestamp);

    manager
        .modify(STUDY, |config| {
            config.cohort_ids.insert("ALL", 7)?;
            Ok(())
        })
        .await
        .unwrap();

    let third = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    assert!(third.timestamp > first.timestamp);
    k9::assert_equal!(third.cohort_ids.id("ALL"), Some(7));
}

#[tokio::test]
async fn failed_mutation_releases_the_lock_and_persists_nothing() {
    let manager = manager().await;
    manager.modify(STUDY, |_| Ok(())).await.unwrap();

    let err = manager
        .modify(STUDY, |config| {
            config.cohort_ids.insert("ALL", 7)?;
            Err::<(), _>(CatalogError::Conflict("no thanks".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");

    // nothing was persisted
    let config = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    assert!(config.cohort_ids.id("ALL").is_none());

    // and the lock is free again
    manager.modify(STUDY, |_| Ok(())).await.unwrap();
}

#[tokio::test]
async fn modify_respects_a_held_lock() {
    let manager = manager().await;
    manager.modify(STUDY, |_| Ok(())).await.unwrap();

    let token = manager
        .store
        .lock_study(STUDY, Duration::from_secs(20), Duration::from_millis(100))
        .await
        .unwrap();

    let err = manager.modify(STUDY, |_| Ok(())).await.unwrap_err();
    assert!(matches!(err, CatalogError::Timeout { .. }), "{err:?}");

    manager.store.unlock_study(token).await.unwrap();
    manager.modify(STUDY, |_| Ok(())).await.unwrap();
}

#[tokio::test]
async fn batch_operation_admission_flow() {
    let manager = manager().await;
    let request = OperationRequest::new("L", vec![10, 11], "index");

    let op = manager
        .start_operation(STUDY, request.clone(), |_| true)
        .await
        .unwrap();
    k9::assert_equal!(
        op.current_status(),
        catalog_types::study_config::OperationStatus::Running
    );

    // the same operation again, without resume
    let err = manager
        .start_operation(STUDY, request.clone(), |_| true)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");

    manager
        .record_operation_status(
            STUDY,
            request.clone(),
            catalog_types::study_config::OperationStatus::Error,
        )
        .await
        .unwrap();

    let resumed = manager
        .start_operation(STUDY, request.resume(), |_| true)
        .await
        .unwrap();
    k9::assert_equal!(
        resumed.current_status(),
        catalog_types::study_config::OperationStatus::Running
    );

    // still a single record for the operation
    let config = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    k9::assert_equal!(config.batch_operations.len(), 1);
}

#[tokio::test]
async fn register_file_persists_bimaps_and_sample_map() {
    let manager = manager().await;

    let config = manager
        .register_file(
            STUDY,
            FileMetadata {
                file_id: 100,
                file_name: "batch1.vcf".into(),
                sample_names: vec!["NA1".into(), "NA2".into()],
            },
            Some(hashmap! { "NA1".to_string() => 5 }),
        )
        .await
        .unwrap();

    k9::assert_equal!(config.file_ids.id("batch1.vcf"), Some(100));
    k9::assert_equal!(config.sample_ids.id("NA1"), Some(5));
    k9::assert_equal!(config.sample_ids.id("NA2"), Some(1));
    assert!(config.samples_in_file[&100].contains(&5));

    manager.set_file_indexed(STUDY, 100).await.unwrap();
    let config = manager.get(ConfigKey::Id(STUDY)).await.unwrap();
    assert!(config.indexed_files.contains(&100));

    // a second registration of the indexed file is refused
    let err = manager
        .register_file(
            STUDY,
            FileMetadata {
                file_id: 100,
                file_name: "batch1.vcf".into(),
                sample_names: vec!["NA1".into(), "NA2".into()],
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");
}
