//! The study-configuration manager: a per-process cache over the adaptor's
//! configuration documents, with every mutation funneled through the study
//! lock.
//!
//! Readers never take the study lock: they get defensive copies (or a
//! shared read-only view) of the cached document, refreshed through the
//! adaptor's timestamp check. Writers acquire the lock, re-read the current
//! document, apply their change, persist, and refresh the cache before the
//! lock is released. A failed mutation discards the scratch copy, so no
//! partial state is ever persisted.

use catalog_store::{CatalogStore, ConfigKey, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT};
use catalog_types::study_config::{BatchOperation, OperationStatus, StudyConfiguration};
use catalog_types::{CatalogError, FileId, StudyId};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub mod admission;
pub mod batch;

pub use admission::{check_and_update_study_configuration, check_new_file, FileMetadata};
pub use batch::{admit_operation, set_operation_status, AdmissionError, OperationRequest};

#[derive(Default)]
struct Cache {
    by_id: HashMap<StudyId, Arc<StudyConfiguration>>,
    by_name: HashMap<String, StudyId>,
}

impl Cache {
    fn lookup(&self, key: ConfigKey<'_>) -> Option<Arc<StudyConfiguration>> {
        match key {
            ConfigKey::Id(id) => self.by_id.get(&id).cloned(),
            ConfigKey::Name(name) => self
                .by_name
                .get(name)
                .and_then(|id| self.by_id.get(id))
                .cloned(),
        }
    }

    fn store(&mut self, config: Arc<StudyConfiguration>) {
        self.by_name
            .insert(config.study_name.clone(), config.study_id);
        self.by_id.insert(config.study_id, config);
    }
}

pub struct StudyConfigurationManager {
    store: Arc<dyn CatalogStore>,
    cache: Mutex<Cache>,
    lock_duration: Duration,
    lock_timeout: Duration,
}

impl StudyConfigurationManager {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self::with_lock_settings(store, DEFAULT_LOCK_DURATION, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_settings(
        store: Arc<dyn CatalogStore>,
        lock_duration: Duration,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache: Mutex::new(Cache::default()),
            lock_duration,
            lock_timeout,
        }
    }

    /// A defensive copy of the configuration; the caller may mutate it
    /// freely without affecting the cache.
    pub async fn get(&self, key: ConfigKey<'_>) -> Result<StudyConfiguration, CatalogError> {
        Ok((*self.fetch(key).await?).clone())
    }

    /// A shared read-only view, for callers that only inspect.
    pub async fn get_view(
        &self,
        key: ConfigKey<'_>,
    ) -> Result<Arc<StudyConfiguration>, CatalogError> {
        self.fetch(key).await
    }

    async fn fetch(&self, key: ConfigKey<'_>) -> Result<Arc<StudyConfiguration>, CatalogError> {
        let cached = self.cache.lock().lookup(key);
        let cached_timestamp = cached.as_ref().map(|c| c.timestamp);
        match self
            .store
            .get_study_configuration(key, cached_timestamp)
            .await?
        {
            None => cached.ok_or_else(|| {
                CatalogError::Internal(anyhow::anyhow!(
                    "adaptor skipped the read for {key} without a cached timestamp"
                ))
            }),
            Some(mut fresh) => {
                fresh.reindex();
                let fresh = Arc::new(fresh);
                self.cache.lock().store(fresh.clone());
                Ok(fresh)
            }
        }
    }

    /// Run `mutate` on the current configuration under the study lock and
    /// persist the result. The lock is released on every exit path.
    pub async fn modify<T, F>(&self, study_id: StudyId, mutate: F) -> Result<T, CatalogError>
    where
        T: Send,
        F: FnOnce(&mut StudyConfiguration) -> Result<T, CatalogError> + Send,
    {
        let token = self
            .store
            .lock_study(study_id, self.lock_duration, self.lock_timeout)
            .await?;
        let result = self.modify_locked(study_id, mutate).await;
        if let Err(err) = self.store.unlock_study(token).await {
            warn!("failed to release the lock on study {study_id}: {err:#}");
        }
        result
    }

    async fn modify_locked<T, F>(&self, study_id: StudyId, mutate: F) -> Result<T, CatalogError>
    where
        F: FnOnce(&mut StudyConfiguration) -> Result<T, CatalogError>,
    {
        // Re-read under the lock; the cache may be stale.
        let mut config = match self
            .store
            .get_study_configuration(ConfigKey::Id(study_id), None)
            .await
        {
            Ok(Some(config)) => config,
            Ok(None) => {
                return Err(CatalogError::Internal(anyhow::anyhow!(
                    "adaptor returned no configuration for study {study_id} without a cached timestamp"
                )));
            }
            Err(CatalogError::NotFound { .. }) => {
                let study = self.store.get_study(study_id).await?;
                StudyConfiguration::new(study_id, &study.name)
            }
            Err(err) => return Err(err),
        };
        config.reindex();

        let value = mutate(&mut config)?;

        let write = self.store.update_study_configuration(&config).await?;
        config.timestamp = write.timestamp;
        self.cache.lock().store(Arc::new(config));
        Ok(value)
    }

    // ---- batch operations ----

    /// Admit (or resume) a batch operation and persist it as `RUNNING`.
    pub async fn start_operation<P>(
        &self,
        study_id: StudyId,
        request: OperationRequest,
        allow_concurrent: P,
    ) -> Result<BatchOperation, CatalogError>
    where
        P: Fn(&BatchOperation) -> bool + Send,
    {
        self.modify(study_id, move |config| {
            admit_operation(config, &request, &allow_concurrent, Utc::now()).map_err(Into::into)
        })
        .await
    }

    /// Append a status to a previously admitted operation's history.
    pub async fn record_operation_status(
        &self,
        study_id: StudyId,
        request: OperationRequest,
        status: OperationStatus,
    ) -> Result<BatchOperation, CatalogError> {
        self.modify(study_id, move |config| {
            set_operation_status(
                config,
                &request.name,
                &request.file_ids,
                &request.kind,
                status,
                Utc::now(),
            )
        })
        .await
    }

    // ---- file and sample admission ----

    /// Validate and register a file (and its samples) ahead of a load.
    pub async fn register_file(
        &self,
        study_id: StudyId,
        metadata: FileMetadata,
        explicit_samples: Option<HashMap<String, i64>>,
    ) -> Result<StudyConfiguration, CatalogError> {
        self.modify(study_id, move |config| {
            check_and_update_study_configuration(
                config,
                &metadata,
                explicit_samples.as_ref(),
            )?;
            Ok(config.clone())
        })
        .await
    }

    /// Mark a file as indexed once its load completed.
    pub async fn set_file_indexed(
        &self,
        study_id: StudyId,
        file_id: FileId,
    ) -> Result<(), CatalogError> {
        self.modify(study_id, move |config| {
            config.indexed_files.insert(file_id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests;
