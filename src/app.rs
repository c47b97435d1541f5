use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::error::LyraError;
use crate::fs_util;
use crate::osf::{RemoteFile, RemoteFolder, StorageClient};
use crate::registry::{GroupEntry, Registry};
use crate::zenodo::ArchiveClient;

/// The four dataset operations, generic over the two remote services so
/// tests can substitute fakes. The registry is injected at construction.
pub struct App<A: ArchiveClient, S: StorageClient> {
    registry: Registry,
    archive: A,
    storage: S,
}

impl<A: ArchiveClient, S: StorageClient> App<A, S> {
    pub fn new(registry: Registry, archive: A, storage: S) -> Self {
        Self {
            registry,
            archive,
            storage,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Download a single dataset file into `folder` and return its path.
    ///
    /// A file already present at the target path is returned as-is without
    /// any network access; nothing re-verifies its content. Without an
    /// explicit `repository_id` the dataset must be in the registry.
    pub fn fetch_dataset(
        &self,
        dataset: &str,
        folder: &Utf8Path,
        repository_id: Option<&str>,
        filename: Option<&str>,
    ) -> Result<Utf8PathBuf, LyraError> {
        let target = folder.join(filename.unwrap_or(dataset));
        if target.as_std_path().exists() {
            info!("{target} already present, skipping download");
            return Ok(target);
        }

        let repository_id = match repository_id {
            Some(id) => id.to_string(),
            None => self.registry.repository_for(dataset)?.to_string(),
        };

        let bytes = self.archive.fetch_file(&repository_id, dataset)?;

        fs::create_dir_all(folder.as_std_path())
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        fs::write(target.as_std_path(), &bytes)
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        info!("downloaded {dataset} to {target}");
        Ok(target)
    }

    /// Download a named group of dataset files, or every group for "all"
    /// (case-insensitive). The first failure aborts the whole operation.
    pub fn fetch_group(
        &self,
        group: Option<&str>,
        folder: &Utf8Path,
        repository_id: Option<&str>,
    ) -> Result<Vec<Utf8PathBuf>, LyraError> {
        let name = match group {
            Some(name) if !name.is_empty() => name,
            _ => self.registry.default_group(),
        };

        let selected: Vec<&GroupEntry> = if name.eq_ignore_ascii_case("all") {
            self.registry.groups().iter().collect()
        } else {
            let group = self
                .registry
                .group(name)
                .ok_or_else(|| LyraError::UnknownGroup {
                    name: name.to_string(),
                    available: self.registry.available_groups(),
                })?;
            vec![group]
        };

        let repository_id = repository_id.unwrap_or_else(|| self.registry.group_repository());

        let mut paths = Vec::new();
        for group in selected {
            info!(
                "fetching group '{}' ({} files)",
                group.name,
                group.files.len()
            );
            for file in &group.files {
                paths.push(self.fetch_dataset(file, folder, Some(repository_id), None)?);
            }
        }
        Ok(paths)
    }

    /// Mirror a remote folder subtree into `folder`, then unpack downloaded
    /// archives unless `extract` is false.
    ///
    /// Individual file downloads and archive extractions that fail are
    /// reported as warnings and skipped; the call succeeds once the
    /// traversal completes.
    pub fn fetch_tree(
        &self,
        remote_path: &str,
        folder: &Utf8Path,
        project_id: &str,
        credential: Option<&str>,
        extract: bool,
    ) -> Result<Utf8PathBuf, LyraError> {
        fs::create_dir_all(folder.as_std_path())
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;

        let storage = self.storage.connect(project_id, credential)?;
        let mut current = storage.root()?;
        let trimmed = remote_path.trim_matches('/');
        if !trimmed.is_empty() {
            for segment in trimmed.split('/') {
                current = current
                    .folders()?
                    .into_iter()
                    .find(|subfolder| subfolder.name() == segment)
                    .ok_or_else(|| LyraError::PathNotFound {
                        segment: segment.to_string(),
                        path: remote_path.to_string(),
                    })?;
            }
        }

        mirror_folder(&*current, folder)?;

        if extract {
            fs_util::extract_archives(folder.as_std_path());
        }
        Ok(folder.to_owned())
    }

    /// Upload a local file to `remote_path` inside the project storage.
    ///
    /// An existing remote file is deleted first when `overwrite` is set;
    /// otherwise the call is a silent no-op. Intermediate remote folders
    /// must already exist.
    pub fn upload(
        &self,
        local_file: &Utf8Path,
        remote_path: &str,
        project_id: &str,
        credential: Option<&str>,
        overwrite: bool,
    ) -> Result<(), LyraError> {
        if !local_file.as_std_path().is_file() {
            return Err(LyraError::LocalFileNotFound(local_file.to_owned()));
        }

        let storage = self.storage.connect(project_id, credential)?;
        let full_path = remote_path.trim_matches('/').to_string();
        let needle = format!("/{full_path}");
        let existing = storage
            .files()?
            .into_iter()
            .find(|file| file.path() == needle);
        if let Some(existing) = existing {
            if overwrite {
                info!("remote file '{full_path}' already exists, deleting before re-upload");
                existing
                    .remove()
                    .map_err(|err| LyraError::OverwriteFailed(err.to_string()))?;
            } else {
                info!("remote file '{full_path}' already exists, skipping upload");
                return Ok(());
            }
        }

        let content = fs::read(local_file.as_std_path())
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        storage
            .create_file(&full_path, &content)
            .map_err(|err| LyraError::UploadFailed(err.to_string()))?;
        info!("uploaded {local_file} to '{full_path}'");
        Ok(())
    }
}

/// Recursive mirror. Failed file downloads warn and skip; listing failures
/// propagate since they indicate the connection is gone.
fn mirror_folder(folder: &dyn RemoteFolder, local: &Utf8Path) -> Result<(), LyraError> {
    fs::create_dir_all(local.as_std_path())
        .map_err(|err| LyraError::Filesystem(err.to_string()))?;

    for file in folder.files()? {
        let target = local.join(file.name());
        if let Err(err) = download_file(&*file, &target) {
            warn!("failed to download {target}: {err}");
        }
    }
    for subfolder in folder.folders()? {
        let target = local.join(subfolder.name());
        mirror_folder(&*subfolder, &target)?;
    }
    Ok(())
}

fn download_file(file: &dyn RemoteFile, target: &Utf8Path) -> Result<(), LyraError> {
    let mut sink = fs::File::create(target.as_std_path())
        .map_err(|err| LyraError::Filesystem(err.to_string()))?;
    file.write_to(&mut sink)
}
