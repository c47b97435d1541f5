use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use lyra_dataset_manager::app::App;
use lyra_dataset_manager::error::LyraError;
use lyra_dataset_manager::osf::{ProjectStorage, RemoteFile, RemoteFolder, StorageClient};
use lyra_dataset_manager::registry::Registry;
use lyra_dataset_manager::zenodo::ArchiveClient;

#[derive(Clone)]
struct FakeFile {
    name: String,
    content: Vec<u8>,
    fail: bool,
}

impl FakeFile {
    fn new(name: &str, content: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_vec(),
            fail: false,
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            content: Vec::new(),
            fail: true,
        }
    }
}

impl RemoteFile for FakeFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.name
    }

    fn write_to(&self, sink: &mut dyn std::io::Write) -> Result<(), LyraError> {
        if self.fail {
            return Err(LyraError::StorageHttp("simulated download failure".to_string()));
        }
        sink.write_all(&self.content)
            .map_err(|err| LyraError::Filesystem(err.to_string()))
    }

    fn remove(&self) -> Result<(), LyraError> {
        Err(LyraError::StorageHttp("remove not supported".to_string()))
    }
}

#[derive(Clone)]
struct FakeFolder {
    name: String,
    files: Vec<FakeFile>,
    folders: Vec<FakeFolder>,
}

impl FakeFolder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Vec::new(),
            folders: Vec::new(),
        }
    }

    fn with_file(mut self, file: FakeFile) -> Self {
        self.files.push(file);
        self
    }

    fn with_folder(mut self, folder: FakeFolder) -> Self {
        self.folders.push(folder);
        self
    }
}

impl RemoteFolder for FakeFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn files(&self) -> Result<Vec<Box<dyn RemoteFile>>, LyraError> {
        Ok(self
            .files
            .iter()
            .cloned()
            .map(|file| Box::new(file) as Box<dyn RemoteFile>)
            .collect())
    }

    fn folders(&self) -> Result<Vec<Box<dyn RemoteFolder>>, LyraError> {
        Ok(self
            .folders
            .iter()
            .cloned()
            .map(|folder| Box::new(folder) as Box<dyn RemoteFolder>)
            .collect())
    }
}

struct FakeStorage {
    root: FakeFolder,
}

impl ProjectStorage for FakeStorage {
    fn root(&self) -> Result<Box<dyn RemoteFolder>, LyraError> {
        Ok(Box::new(self.root.clone()))
    }

    fn create_file(&self, _path: &str, _content: &[u8]) -> Result<(), LyraError> {
        Err(LyraError::StorageHttp("create not supported".to_string()))
    }
}

#[derive(Clone)]
struct FakeStorageClient {
    root: FakeFolder,
}

impl StorageClient for FakeStorageClient {
    fn connect(
        &self,
        _project_id: &str,
        _credential: Option<&str>,
    ) -> Result<Box<dyn ProjectStorage>, LyraError> {
        Ok(Box::new(FakeStorage {
            root: self.root.clone(),
        }))
    }
}

struct NopArchive;

impl ArchiveClient for NopArchive {
    fn fetch_file(&self, _repository_id: &str, _dataset: &str) -> Result<Vec<u8>, LyraError> {
        Err(LyraError::ConnectionFailure {
            dataset: "unused".to_string(),
            cause: "not configured".to_string(),
        })
    }
}

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

fn tree_app(root: FakeFolder) -> App<NopArchive, FakeStorageClient> {
    App::new(Registry::standard(), NopArchive, FakeStorageClient { root })
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn mirrors_the_whole_tree() {
    let root = FakeFolder::new("osfstorage")
        .with_file(FakeFile::new("a.txt", b"alpha"))
        .with_folder(FakeFolder::new("sub").with_file(FakeFile::new("b.txt", b"beta")));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    let returned = app.fetch_tree("", &folder, "un5ct", None, true).unwrap();

    assert_eq!(returned, folder);
    assert_eq!(
        std::fs::read(folder.join("a.txt").as_std_path()).unwrap(),
        b"alpha"
    );
    assert_eq!(
        std::fs::read(folder.join("sub").join("b.txt").as_std_path()).unwrap(),
        b"beta"
    );
}

#[test]
fn resolved_subfolder_contents_land_in_destination_root() {
    let root = FakeFolder::new("osfstorage")
        .with_file(FakeFile::new("a.txt", b"alpha"))
        .with_folder(FakeFolder::new("sub").with_file(FakeFile::new("b.txt", b"beta")));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    app.fetch_tree("sub", &folder, "un5ct", None, true).unwrap();

    assert!(folder.join("b.txt").as_std_path().exists());
    assert!(!folder.join("a.txt").as_std_path().exists());
}

#[test]
fn missing_segment_fails_before_any_download() {
    let root = FakeFolder::new("osfstorage")
        .with_folder(FakeFolder::new("sub").with_file(FakeFile::new("b.txt", b"beta")));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    let err = app
        .fetch_tree("sub/missing", &folder, "un5ct", None, true)
        .unwrap_err();

    assert_matches!(
        err,
        LyraError::PathNotFound { ref segment, ref path }
            if segment == "missing" && path == "sub/missing"
    );
    let entries: Vec<_> = std::fs::read_dir(folder.as_std_path()).unwrap().collect();
    assert!(entries.is_empty());
}

#[test]
fn failed_file_does_not_abort_siblings_or_cousins() {
    let root = FakeFolder::new("osfstorage")
        .with_file(FakeFile::failing("broken.bin"))
        .with_file(FakeFile::new("a.txt", b"alpha"))
        .with_folder(FakeFolder::new("sub").with_file(FakeFile::new("b.txt", b"beta")));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    let returned = app.fetch_tree("", &folder, "un5ct", None, false).unwrap();

    assert_eq!(returned, folder);
    assert!(folder.join("a.txt").as_std_path().exists());
    assert!(folder.join("sub").join("b.txt").as_std_path().exists());
}

#[test]
fn archives_are_extracted_and_removed() {
    let archive = zip_bytes(&[("inner.csv", b"x,y\n1,2\n")]);
    let root = FakeFolder::new("osfstorage").with_file(FakeFile::new("data.zip", &archive));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    app.fetch_tree("", &folder, "un5ct", None, true).unwrap();

    assert!(folder.join("data").join("inner.csv").as_std_path().exists());
    assert!(!folder.join("data.zip").as_std_path().exists());
}

#[test]
fn extraction_can_be_disabled() {
    let archive = zip_bytes(&[("inner.csv", b"x\n")]);
    let root = FakeFolder::new("osfstorage").with_file(FakeFile::new("data.zip", &archive));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    app.fetch_tree("", &folder, "un5ct", None, false).unwrap();

    assert!(folder.join("data.zip").as_std_path().exists());
    assert!(!folder.join("data").as_std_path().exists());
}

#[test]
fn corrupt_archive_is_reported_not_fatal() {
    let root = FakeFolder::new("osfstorage")
        .with_file(FakeFile::new("bad.zip", b"this is not a zip"))
        .with_file(FakeFile::new("keep.txt", b"kept"));
    let app = tree_app(root);

    let temp = tempfile::tempdir().unwrap();
    let folder = utf8(temp.path());
    let returned = app.fetch_tree("", &folder, "un5ct", None, true).unwrap();

    assert_eq!(returned, folder);
    assert!(folder.join("bad.zip").as_std_path().exists());
    assert!(folder.join("keep.txt").as_std_path().exists());
}
