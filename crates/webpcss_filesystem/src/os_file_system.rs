use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::normalize_path::normalize_path;
use crate::FileSystem;

#[derive(Default, Debug)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn cwd(&self) -> io::Result<PathBuf> {
    std::env::current_dir()
  }

  fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
    let cwd = self.cwd()?;
    Ok(normalize_path(&cwd, path))
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
  }

  fn file_size(&self, path: &Path) -> io::Result<u64> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "Path is not a file",
      ));
    }

    Ok(metadata.len())
  }
}
