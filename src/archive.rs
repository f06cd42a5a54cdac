//! Archive extraction for downloaded toolchains.
//!
//! Codecs only unpack; removing the source archive is the caller's job.

use crate::error::{Result, RungoError};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, warn};

pub trait ArchiveCodec {
    fn name(&self) -> &'static str;

    /// Unpack every directory and regular file of `archive` under `dest`
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

pub struct TarGzCodec;

pub struct ZipCodec;

/// Pick a codec from the archive's file name
pub fn codec_for(archive: &Path) -> Result<Box<dyn ArchiveCodec>> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        Ok(Box::new(TarGzCodec))
    } else if file_name.ends_with(".zip") {
        Ok(Box::new(ZipCodec))
    } else {
        Err(RungoError::UnsupportedArchive(file_name.to_string()))
    }
}

pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let codec = codec_for(archive)?;
    debug!(
        "extracting {} into {} ({})",
        archive.display(),
        dest.display(),
        codec.name()
    );
    std::fs::create_dir_all(dest).map_err(|e| extract_failed(archive, e))?;
    codec.extract(archive, dest)
}

fn extract_failed(archive: &Path, message: impl ToString) -> RungoError {
    RungoError::ExtractFailed {
        archive: archive.display().to_string(),
        message: message.to_string(),
    }
}

/// Relative path with no root, prefix or parent components
fn sanitized(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn write_file<R: io::Read>(reader: &mut R, target: &Path, mode: Option<u32>) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = File::create(target)?;
    io::copy(reader, &mut out)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

impl ArchiveCodec for TarGzCodec {
    fn name(&self) -> &'static str {
        "tar.gz"
    }

    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<()> {
        let tar_gz = File::open(archive_path).map_err(|e| extract_failed(archive_path, e))?;
        let mut archive = Archive::new(GzDecoder::new(tar_gz));

        let entries = archive
            .entries()
            .map_err(|e| extract_failed(archive_path, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| extract_failed(archive_path, e))?;
            let entry_path = entry
                .path()
                .map_err(|e| extract_failed(archive_path, e))?
                .into_owned();

            let Some(relative) = sanitized(&entry_path) else {
                warn!("skipping tar entry with unsafe path {}", entry_path.display());
                continue;
            };
            let target = dest.join(relative);

            match entry.header().entry_type() {
                EntryType::Directory => {
                    if !target.is_dir() {
                        std::fs::create_dir_all(&target)
                            .map_err(|e| extract_failed(archive_path, e))?;
                    }
                }
                EntryType::Regular | EntryType::Continuous => {
                    let mode = entry.header().mode().ok();
                    write_file(&mut entry, &target, mode)
                        .map_err(|e| extract_failed(archive_path, e))?;
                }
                other => {
                    debug!("ignoring tar entry {} of type {:?}", entry_path.display(), other);
                }
            }
        }

        Ok(())
    }
}

impl ArchiveCodec for ZipCodec {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive_path).map_err(|e| extract_failed(archive_path, e))?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| extract_failed(archive_path, e))?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| extract_failed(archive_path, e))?;

            let Some(relative) = entry.enclosed_name() else {
                warn!("skipping zip entry with unsafe path {}", entry.name());
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| extract_failed(archive_path, e))?;
                continue;
            }

            let mode = entry.unix_mode();
            if mode.is_some_and(|m| m & 0o170000 == 0o120000) {
                debug!("ignoring zip symlink {}", entry.name());
                continue;
            }

            write_file(&mut entry, &target, mode).map_err(|e| extract_failed(archive_path, e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    const FILES: &[(&str, &[u8], u32)] = &[
        ("go/VERSION", b"go1.22.0\n", 0o644),
        ("go/bin/go", b"#!/bin/sh\necho go\n", 0o755),
        ("go/src/fmt/print.go", b"package fmt\n", 0o644),
    ];
    const DIRS: &[&str] = &["go/", "go/bin/", "go/src/", "go/src/fmt/", "go/pkg/empty/"];

    fn build_tar_gz(path: &Path) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        for dir in DIRS {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder.append_data(&mut header, dir, io::empty()).unwrap();
        }
        for (name, data, mode) in FILES {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_mode(*mode);
            header.set_size(data.len() as u64);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        builder
            .append_link(&mut header, "go/bin/gofmt-link", "go")
            .unwrap();

        builder.into_inner().unwrap().finish().unwrap();
    }

    fn build_zip(path: &Path) {
        use std::io::Write;

        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for dir in DIRS {
            let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
            writer.add_directory(*dir, options).unwrap();
        }
        for (name, data, mode) in FILES {
            let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Relative path -> (is_dir, contents) for every entry under `root`
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, (bool, Vec<u8>)> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|entry| {
                let entry = entry.unwrap();
                let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
                let is_dir = entry.file_type().is_dir();
                let contents = if is_dir {
                    Vec::new()
                } else {
                    std::fs::read(entry.path()).unwrap()
                };
                (relative, (is_dir, contents))
            })
            .collect()
    }

    fn assert_expected_tree(root: &Path) {
        let tree = snapshot(root);
        for (name, data, _) in FILES {
            let (is_dir, contents) = &tree[&PathBuf::from(name)];
            assert!(!is_dir);
            assert_eq!(contents.as_slice(), *data);
        }
        assert!(tree[&PathBuf::from("go/pkg/empty")].0);
        assert!(!tree.contains_key(&PathBuf::from("go/bin/gofmt-link")));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = |p: &str| {
                std::fs::metadata(root.join(p)).unwrap().permissions().mode() & 0o777
            };
            assert_eq!(mode("go/bin/go"), 0o755);
            assert_eq!(mode("go/VERSION"), 0o644);
        }
    }

    #[test]
    fn test_codec_selection() {
        assert_eq!(codec_for(Path::new("go1.22.0.linux-amd64.tar.gz")).unwrap().name(), "tar.gz");
        assert_eq!(codec_for(Path::new("go1.22.0.windows-amd64.zip")).unwrap().name(), "zip");
        assert!(matches!(
            codec_for(Path::new("go1.22.0.darwin-amd64.pkg")),
            Err(RungoError::UnsupportedArchive(_))
        ));
    }

    #[test]
    fn test_extract_tar_gz_reproduces_tree() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("go1.22.0.linux-amd64.tar.gz");
        build_tar_gz(&archive);

        let dest = temp.path().join("out");
        extract(&archive, &dest).unwrap();

        assert_expected_tree(&dest);
        assert!(archive.exists(), "codec must leave the archive in place");
    }

    #[test]
    fn test_zip_matches_tar_gz_output() {
        let temp = TempDir::new().unwrap();
        let tar_path = temp.path().join("go.tar.gz");
        let zip_path = temp.path().join("go.zip");
        build_tar_gz(&tar_path);
        build_zip(&zip_path);

        let from_tar = temp.path().join("tar");
        let from_zip = temp.path().join("zip");
        extract(&tar_path, &from_tar).unwrap();
        extract(&zip_path, &from_zip).unwrap();

        assert_expected_tree(&from_zip);
        assert_eq!(snapshot(&from_tar), snapshot(&from_zip));
    }

    #[test]
    fn test_unsafe_paths_are_skipped() {
        assert_eq!(sanitized(Path::new("go/bin/go")), Some(PathBuf::from("go/bin/go")));
        assert_eq!(sanitized(Path::new("./go/")), Some(PathBuf::from("go")));
        assert_eq!(sanitized(Path::new("../etc/passwd")), None);
        assert_eq!(sanitized(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_truncated_tar_gz_is_extract_failure() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("go1.22.0.linux-amd64.tar.gz");

        // LCG noise so gzip cannot shrink the payload much
        let mut seed: u32 = 0x2545_f491;
        let data: Vec<u8> = (0..200 * 1024)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (seed >> 16) as u8
            })
            .collect();

        let mut builder =
            tar::Builder::new(GzEncoder::new(File::create(&archive).unwrap(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(data.len() as u64);
        builder.append_data(&mut header, "go/pkg/blob", data.as_slice()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let full = std::fs::read(&archive).unwrap();
        std::fs::write(&archive, &full[..full.len() / 2]).unwrap();

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, RungoError::ExtractFailed { .. }), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_blocked_target_is_extract_failure() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("go.tar.gz");
        build_tar_gz(&archive);

        let dest = temp.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("go"), "in the way").unwrap();

        let err = extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, RungoError::ExtractFailed { .. }), "got {err:?}");
    }

    #[test]
    fn test_corrupt_archive_is_extract_failure() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        std::fs::write(&archive, b"not a zip").unwrap();

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, RungoError::ExtractFailed { .. }));
    }
}
