//! Archive staging: unpack a tar.gz into a fresh timestamped snapshot
//! directory under the staging root.
//!
//! Entries are written strictly in archive order. Only directories and
//! regular files are accepted; anything else aborts the extraction and
//! leaves the partial snapshot in place for the caller to treat as failed.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("failed to open archive {path}: {source}")]
  OpenArchive {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create staging directory {path}: {source}")]
  CreateDest {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read archive entry: {0}")]
  ReadEntry(#[source] io::Error),

  #[error("archive entry {path} escapes the staging directory")]
  UnsafePath { path: PathBuf },

  #[error("unsupported entry type {kind:?} for {path}")]
  UnsupportedEntry { path: PathBuf, kind: EntryType },

  #[error("failed to write {path}: {source}")]
  WriteEntry {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Unpack `archive` (tar.gz) into `dest`, creating `dest` if needed.
///
/// An already existing `dest` is reused, matching the behavior of two
/// stagings landing on the same name.
pub fn extract(archive: &Path, dest: &Path) -> Result<(), ExtractError> {
  match fs::create_dir(dest) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
    Err(source) => {
      return Err(ExtractError::CreateDest {
        path: dest.to_path_buf(),
        source,
      });
    }
  }

  let file = File::open(archive).map_err(|source| ExtractError::OpenArchive {
    path: archive.to_path_buf(),
    source,
  })?;
  let decoder = GzDecoder::new(BufReader::new(file));
  let mut tar = Archive::new(decoder);

  for entry in tar.entries().map_err(ExtractError::ReadEntry)? {
    let mut entry = entry.map_err(ExtractError::ReadEntry)?;
    let entry_path = entry.path().map_err(ExtractError::ReadEntry)?.into_owned();

    if entry_path
      .components()
      .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
    {
      return Err(ExtractError::UnsafePath { path: entry_path });
    }

    let dest_path = dest.join(&entry_path);
    let kind = entry.header().entry_type();

    match kind {
      EntryType::Directory => {
        fs::create_dir_all(&dest_path).map_err(|source| ExtractError::WriteEntry {
          path: dest_path.clone(),
          source,
        })?;
        set_entry_mode(&dest_path, entry.header())?;
      }
      EntryType::Regular => {
        if let Some(parent) = dest_path.parent() {
          fs::create_dir_all(parent).map_err(|source| ExtractError::WriteEntry {
            path: parent.to_path_buf(),
            source,
          })?;
        }

        debug!(path = %dest_path.display(), "extracting");

        let mut out = File::create(&dest_path).map_err(|source| ExtractError::WriteEntry {
          path: dest_path.clone(),
          source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|source| ExtractError::WriteEntry {
          path: dest_path.clone(),
          source,
        })?;
        set_entry_mode(&dest_path, entry.header())?;
      }
      kind => {
        return Err(ExtractError::UnsupportedEntry {
          path: entry_path,
          kind,
        });
      }
    }
  }

  Ok(())
}

/// Extract `archive` into a new snapshot named by the current unix time,
/// returning the snapshot path.
pub fn stage_snapshot(archive: &Path, staging_dir: &Path) -> Result<PathBuf, ExtractError> {
  let timestamp = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs();

  let snapshot = staging_dir.join(timestamp.to_string());
  extract(archive, &snapshot)?;

  info!(snapshot = %snapshot.display(), "staged snapshot");
  Ok(snapshot)
}

#[cfg(unix)]
fn set_entry_mode(path: &Path, header: &tar::Header) -> Result<(), ExtractError> {
  use std::os::unix::fs::PermissionsExt;

  if let Ok(mode) = header.mode() {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| ExtractError::WriteEntry {
      path: path.to_path_buf(),
      source,
    })?;
  }
  Ok(())
}

#[cfg(not(unix))]
fn set_entry_mode(_path: &Path, _header: &tar::Header) -> Result<(), ExtractError> {
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use flate2::Compression;
  use flate2::write::GzEncoder;
  use tempfile::TempDir;

  fn build_archive(dest: &Path, entries: &[(&str, Option<&[u8]>)]) {
    let file = File::create(dest).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, content) in entries {
      match content {
        Some(bytes) => {
          let mut header = tar::Header::new_gnu();
          header.set_entry_type(EntryType::Regular);
          header.set_mode(0o644);
          header.set_size(bytes.len() as u64);
          write_raw_path(&mut header, path);
          header.set_cksum();
          builder.append(&header, *bytes).unwrap();
        }
        None => {
          let mut header = tar::Header::new_gnu();
          header.set_entry_type(EntryType::Directory);
          header.set_mode(0o755);
          header.set_size(0);
          write_raw_path(&mut header, path);
          header.set_cksum();
          builder.append(&header, io::empty()).unwrap();
        }
      }
    }

    builder.into_inner().unwrap().finish().unwrap();
  }

  // `Header::set_path` refuses `..` components, which the traversal
  // fixture needs; write the name field directly instead.
  fn write_raw_path(header: &mut tar::Header, path: &str) {
    header.as_gnu_mut().unwrap().name[..path.len()].copy_from_slice(path.as_bytes());
  }

  #[test]
  fn extract_reproduces_files_and_directories() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");
    build_archive(&archive, &[("a/", None), ("a/b.txt", Some(b"X")), ("a/c/", None)]);

    let dest = temp.path().join("out");
    extract(&archive, &dest).unwrap();

    assert_eq!(fs::read_to_string(dest.join("a/b.txt")).unwrap(), "X");
    assert!(dest.join("a/c").is_dir());
  }

  #[test]
  fn extract_creates_missing_parent_directories() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");
    // No directory entry for "deep/" at all
    build_archive(&archive, &[("deep/nested/file.txt", Some(b"data"))]);

    let dest = temp.path().join("out");
    extract(&archive, &dest).unwrap();

    assert_eq!(fs::read_to_string(dest.join("deep/nested/file.txt")).unwrap(), "data");
  }

  #[test]
  fn extract_tolerates_existing_destination() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");
    build_archive(&archive, &[("f.txt", Some(b"v2"))]);

    let dest = temp.path().join("out");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("stale.txt"), "v1").unwrap();

    extract(&archive, &dest).unwrap();

    assert_eq!(fs::read_to_string(dest.join("f.txt")).unwrap(), "v2");
    // Pre-existing content is not cleaned up
    assert!(dest.join("stale.txt").exists());
  }

  #[cfg(unix)]
  #[test]
  fn extract_preserves_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");

    let file = File::create(&archive).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(0o755);
    header.set_size(3);
    builder.append_data(&mut header, "run.sh", &b"#!x"[..]).unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    let dest = temp.path().join("out");
    extract(&archive, &dest).unwrap();

    let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
  }

  #[test]
  fn extract_rejects_symlink_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");

    let file = File::create(&archive).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(EntryType::Symlink);
    header.set_size(0);
    builder.append_link(&mut header, "link", "target").unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    let dest = temp.path().join("out");
    let result = extract(&archive, &dest);

    assert!(matches!(result, Err(ExtractError::UnsupportedEntry { .. })));
  }

  #[test]
  fn extract_rejects_parent_dir_traversal() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");
    build_archive(&archive, &[("../escape.txt", Some(b"nope"))]);

    let dest = temp.path().join("out");
    let result = extract(&archive, &dest);

    assert!(matches!(result, Err(ExtractError::UnsafePath { .. })));
    assert!(!temp.path().join("escape.txt").exists());
  }

  #[test]
  fn extract_missing_archive_is_open_error() {
    let temp = TempDir::new().unwrap();
    let result = extract(&temp.path().join("absent.tar.gz"), &temp.path().join("out"));
    assert!(matches!(result, Err(ExtractError::OpenArchive { .. })));
  }

  #[test]
  fn stage_snapshot_uses_numeric_name() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("app.tar.gz");
    build_archive(&archive, &[("f.txt", Some(b"data"))]);

    let staging = temp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();

    let snapshot = stage_snapshot(&archive, &staging).unwrap();

    assert_eq!(snapshot.parent().unwrap(), staging);
    let name = snapshot.file_name().unwrap().to_str().unwrap();
    assert!(name.parse::<u64>().is_ok());
    assert_eq!(fs::read_to_string(snapshot.join("f.txt")).unwrap(), "data");
  }
}
