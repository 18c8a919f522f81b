//! File and sample admission: the bookkeeping that must hold before a file
//! can be loaded into a study. Sample names get stable numeric ids in the
//! configuration bimap, the samples-in-file map must mirror the file's
//! declared sample set exactly, and a file name/id pair may only be
//! registered once.

use catalog_types::study_config::StudyConfiguration;
use catalog_types::{CatalogError, FileId, SampleId};
use std::collections::{BTreeSet, HashMap};

/// What the loader knows about the file being admitted.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub file_id: FileId,
    pub file_name: String,
    /// Sample names as declared by the file, in file order.
    pub sample_names: Vec<String>,
}

/// Validate (or assign) sample ids and register the file. Explicit
/// `sample_name -> id` mappings are honored when supplied; otherwise ids are
/// auto-assigned by position-in-file, then current sample count, then
/// `max + 1`.
pub fn check_and_update_study_configuration(
    config: &mut StudyConfiguration,
    metadata: &FileMetadata,
    explicit: Option<&HashMap<String, SampleId>>,
) -> Result<(), CatalogError> {
    if let Some(mapping) = explicit {
        for (name, id) in mapping {
            if !metadata.sample_names.iter().any(|s| s == name) {
                return Err(CatalogError::InvalidArgument(format!(
                    "sample '{name}' is not declared by file '{}'",
                    metadata.file_name
                )));
            }
            if *id < 0 {
                return Err(CatalogError::InvalidArgument(format!(
                    "sample '{name}' has a malformed id {id}"
                )));
            }
            match config.sample_ids.id(name) {
                Some(existing) if existing != *id => {
                    return Err(CatalogError::Conflict(format!(
                        "sample '{name}' is already registered with id {existing}, not {id}"
                    )));
                }
                _ => config.sample_ids.insert(name, *id)?,
            }
        }
    }

    // Auto-assign whatever the explicit mapping did not cover.
    for (position, name) in metadata.sample_names.iter().enumerate() {
        if config.sample_ids.id(name).is_some() {
            continue;
        }
        let id = assign_sample_id(config, position as SampleId);
        config.sample_ids.insert(name, id)?;
    }

    let declared: BTreeSet<SampleId> = metadata
        .sample_names
        .iter()
        .map(|name| {
            config
                .sample_ids
                .id(name)
                .expect("every declared sample was just registered")
        })
        .collect();

    match config.samples_in_file.get(&metadata.file_id) {
        Some(existing) if *existing != declared => {
            return Err(CatalogError::Conflict(format!(
                "file '{}' is already registered with a different sample set",
                metadata.file_name
            )));
        }
        _ => {
            config
                .samples_in_file
                .insert(metadata.file_id, declared);
        }
    }

    check_new_file(config, metadata.file_id, &metadata.file_name)
}

fn assign_sample_id(config: &StudyConfiguration, position: SampleId) -> SampleId {
    if !config.sample_ids.contains_id(position) {
        return position;
    }
    let count = config.sample_ids.len() as SampleId;
    if !config.sample_ids.contains_id(count) {
        return count;
    }
    config.sample_ids.max_id().unwrap_or(-1) + 1
}

/// Register the file in the name<->id bimap. Fails when the name maps to a
/// different id, the id maps to a different name, or the id was already
/// indexed.
pub fn check_new_file(
    config: &mut StudyConfiguration,
    file_id: FileId,
    file_name: &str,
) -> Result<(), CatalogError> {
    if let Some(existing) = config.file_ids.id(file_name) {
        if existing != file_id {
            return Err(CatalogError::Conflict(format!(
                "file '{file_name}' is already registered with id {existing}"
            )));
        }
    }
    if let Some(existing) = config.file_ids.name(file_id) {
        if existing != file_name {
            return Err(CatalogError::Conflict(format!(
                "file id {file_id} is already registered as '{existing}'"
            )));
        }
    }
    if config.indexed_files.contains(&file_id) {
        return Err(CatalogError::Conflict(format!(
            "file '{file_name}' ({file_id}) is already indexed"
        )));
    }
    config.file_ids.insert(file_name, file_id)?;
    Ok(())
}
