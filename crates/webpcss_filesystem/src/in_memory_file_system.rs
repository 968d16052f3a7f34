use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::normalize_path::normalize_path;
use crate::FileSystem;

#[cfg(not(target_os = "windows"))]
fn root_dir() -> PathBuf {
  PathBuf::from("/")
}

#[cfg(target_os = "windows")]
fn root_dir() -> PathBuf {
  PathBuf::from("C:/")
}

/// In memory implementation of a file-system entry
#[derive(Debug)]
enum InMemoryFileSystemEntry {
  File { contents: Vec<u8> },
  Directory,
}

/// In memory implementation of the `FileSystem` trait, for testing purposes.
#[derive(Debug)]
pub struct InMemoryFileSystem {
  files: RwLock<HashMap<PathBuf, InMemoryFileSystemEntry>>,
  current_working_directory: RwLock<PathBuf>,
}

impl Default for InMemoryFileSystem {
  fn default() -> Self {
    Self {
      files: Default::default(),
      current_working_directory: RwLock::new(root_dir()),
    }
  }
}

impl InMemoryFileSystem {
  /// Change the current working directory. Used for resolving relative paths.
  pub fn set_current_working_directory(&self, cwd: &Path) {
    let cwd = self.resolve(cwd);
    let mut state = self.current_working_directory.write();
    *state = cwd;
  }

  pub fn write_file(&self, path: &Path, contents: impl AsRef<[u8]>) {
    let path = self.resolve(path);
    let mut files = self.files.write();

    files.insert(
      path.clone(),
      InMemoryFileSystemEntry::File {
        contents: contents.as_ref().to_vec(),
      },
    );

    let mut dir = path.parent();
    while let Some(path) = dir {
      files.insert(path.to_path_buf(), InMemoryFileSystemEntry::Directory);
      dir = path.parent();
    }
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    normalize_path(&self.current_working_directory.read(), path)
  }
}

impl FileSystem for InMemoryFileSystem {
  fn cwd(&self) -> io::Result<PathBuf> {
    Ok(self.current_working_directory.read().clone())
  }

  fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
    Ok(self.resolve(path))
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    let path = self.resolve(path);
    let files = self.files.read();
    match files.get(&path) {
      None => Err(io::Error::new(io::ErrorKind::NotFound, "File not found")),
      Some(InMemoryFileSystemEntry::File { contents }) => Ok(contents.clone()),
      Some(InMemoryFileSystemEntry::Directory) => Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "Path is a directory",
      )),
    }
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    let path = self.resolve(path);
    let files = self.files.read();
    match files.get(&path) {
      None => Err(io::Error::new(io::ErrorKind::NotFound, "File not found")),
      Some(InMemoryFileSystemEntry::File { contents }) => Ok(contents.len() as u64),
      Some(InMemoryFileSystemEntry::Directory) => Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "Path is a directory",
      )),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_absolute_noop() {
    let fs = InMemoryFileSystem::default();
    let path = root_dir().join("foo/bar");
    let result = fs.absolute(&path).unwrap();
    assert_eq!(result, path);
  }

  #[test]
  fn test_remove_relative_dots() {
    let fs = InMemoryFileSystem::default();
    let result = fs.absolute(&root_dir().join("foo/./bar")).unwrap();
    assert_eq!(result, root_dir().join("foo/bar"));
  }

  #[test]
  fn test_remove_relative_parent_dots() {
    let fs = InMemoryFileSystem::default();
    let result = fs
      .absolute(&root_dir().join("foo/./bar/../baz/"))
      .unwrap();
    assert_eq!(result, root_dir().join("foo/baz"));
  }

  #[test]
  fn test_parent_dots_stop_at_root() {
    let fs = InMemoryFileSystem::default();
    let result = fs.absolute(&root_dir().join("../../foo")).unwrap();
    assert_eq!(result, root_dir().join("foo"));
  }

  #[test]
  fn test_with_cwd() {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(&root_dir().join("other"));
    let result = fs.absolute(Path::new("./foo/./bar/../baz/")).unwrap();
    assert_eq!(result, root_dir().join("other/foo/baz"));
    assert!(result.is_absolute());
  }

  #[test]
  fn test_read_file() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(&root_dir().join("foo/bar.png"), b"contents");

    assert_eq!(
      fs.read(&root_dir().join("foo/bar.png")).unwrap(),
      b"contents".to_vec()
    );
    assert_eq!(fs.file_size(&root_dir().join("foo/bar.png")).unwrap(), 8);
  }

  #[test]
  fn test_read_file_not_found() {
    let fs = InMemoryFileSystem::default();
    let result = fs.read(&root_dir().join("foo/bar.png"));
    assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
  }

  #[test]
  fn test_directories_have_no_file_size() {
    let fs = InMemoryFileSystem::default();
    fs.write_file(&root_dir().join("foo/bar.png"), b"");

    assert_eq!(fs.file_size(&root_dir().join("foo/bar.png")).unwrap(), 0);
    assert!(fs.file_size(&root_dir().join("foo")).is_err());
  }

  #[test]
  fn test_changing_the_cwd_will_correctly_resolve_files() {
    let fs = InMemoryFileSystem::default();
    fs.set_current_working_directory(&root_dir().join("foo"));

    fs.write_file(Path::new("bar.png"), b"abc");
    assert_eq!(fs.file_size(Path::new("bar.png")).unwrap(), 3);

    fs.set_current_working_directory(&root_dir());
    assert_eq!(fs.read(&root_dir().join("foo/bar.png")).unwrap(), b"abc");
  }
}
