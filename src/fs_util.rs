use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::LyraError;

/// Integrity self-test: open the archive and drain every entry so checksums
/// are verified without writing anything.
pub fn validate_zip(zip_path: &Path) -> Result<(), LyraError> {
    let archive_name = zip_path.display().to_string();
    let file = fs::File::open(zip_path)
        .map_err(|err| LyraError::Filesystem(format!("open zip {archive_name}: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|_| LyraError::CorruptArchive {
        archive: archive_name.clone(),
        entry: "central directory".to_string(),
    })?;

    for i in 0..archive.len() {
        let entry_name = archive
            .name_for_index(i)
            .unwrap_or("unnamed entry")
            .to_string();
        let mut entry = archive.by_index(i).map_err(|_| LyraError::CorruptArchive {
            archive: archive_name.clone(),
            entry: entry_name.clone(),
        })?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink()).map_err(|_| LyraError::CorruptArchive {
            archive: archive_name.clone(),
            entry: entry_name,
        })?;
    }
    Ok(())
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), LyraError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| LyraError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| LyraError::Filesystem(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(LyraError::Filesystem(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| LyraError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| LyraError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| LyraError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

/// Sweep the destination tree: every `*.zip` is verified, unpacked into a
/// sibling directory named after the archive (extension stripped), and then
/// deleted. Failures are reported per archive and never abort the sweep.
///
/// The file list is snapshotted before any extraction, so archives nested
/// inside freshly unpacked output stay untouched until a later call.
pub fn extract_archives(root: &Path) {
    let archives: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("zip"))
                .unwrap_or(false)
        })
        .collect();

    for archive in archives {
        match extract_and_remove(&archive) {
            Ok(()) => info!("unzipped and deleted {}", archive.display()),
            Err(err) => warn!("skipping archive {}: {err}", archive.display()),
        }
    }
}

fn extract_and_remove(zip_path: &Path) -> Result<(), LyraError> {
    validate_zip(zip_path)?;
    let target_dir = zip_path.with_extension("");
    fs::create_dir_all(&target_dir).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    extract_zip(zip_path, &target_dir)?;
    fs::remove_file(zip_path).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn force_copy(source: &Path, dest: &Path) -> Result<(), LyraError> {
    if dest.exists() {
        fs::remove_file(dest).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    }
    fs::copy(source, dest).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn force_move(source: &Path, dest: &Path) -> Result<(), LyraError> {
    if dest.exists() {
        fs::remove_file(dest).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    }
    fs::rename(source, dest).map_err(|err| LyraError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn sweep_extracts_into_sibling_dir_and_removes_archive() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("data.zip");
        write_zip(&zip_path, &[("inner.csv", b"a,b\n1,2\n")]);

        extract_archives(temp.path());

        assert!(temp.path().join("data").join("inner.csv").exists());
        assert!(!zip_path.exists());
    }

    #[test]
    fn sweep_reaches_nested_directories() {
        let temp = tempfile::tempdir().unwrap();
        let sub = temp.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        write_zip(&sub.join("b.zip"), &[("b.txt", b"b")]);

        extract_archives(temp.path());

        assert!(sub.join("b").join("b.txt").exists());
        assert!(!sub.join("b.zip").exists());
    }

    #[test]
    fn sweep_leaves_corrupt_archive_in_place() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.zip");
        let bad = temp.path().join("bad.zip");
        write_zip(&good, &[("ok.txt", b"ok")]);
        fs::write(&bad, b"this is not a zip archive").unwrap();

        extract_archives(temp.path());

        assert!(bad.exists());
        assert!(temp.path().join("good").join("ok.txt").exists());
        assert!(!good.exists());
    }

    #[test]
    fn validate_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let bad = temp.path().join("bad.zip");
        fs::write(&bad, b"garbage").unwrap();

        let err = validate_zip(&bad).unwrap_err();
        assert_matches!(err, LyraError::CorruptArchive { .. });
    }

    #[test]
    fn validate_accepts_well_formed_archive() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.zip");
        write_zip(&good, &[("a.txt", b"a"), ("dir/b.txt", b"b")]);

        validate_zip(&good).unwrap();
    }

    #[test]
    fn force_copy_replaces_existing_target() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src.txt");
        let dst = temp.path().join("dst.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        force_copy(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"new");
        assert!(src.exists());
    }
}
