use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// In-memory file-system for testing
pub mod in_memory_file_system;

/// File-system implementation using std::fs
pub mod os_file_system;

mod normalize_path;

/// FileSystem abstraction instance
///
/// This should be `OsFileSystem` for non-testing environments and `InMemoryFileSystem` for testing.
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting the file-system operations needed to locate and read images
/// referenced from a stylesheet.
#[mockall::automock]
pub trait FileSystem: std::fmt::Debug {
  fn cwd(&self) -> io::Result<PathBuf>;

  /// Make `path` absolute against the current working directory and normalize `.` and `..`
  /// components. This does not touch the disk and does not follow symlinks.
  fn absolute(&self, path: &Path) -> io::Result<PathBuf>;

  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  /// Size in bytes of the file at `path`
  fn file_size(&self, path: &Path) -> io::Result<u64>;
}
