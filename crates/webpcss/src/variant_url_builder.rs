use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use webpcss_filesystem::FileSystemRef;
use webpcss_image::WebpEncoder;

use crate::ReferenceError;

/// Work that needs the image bytes before a variant URL can be decided
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariantJob {
  /// Rename, but only if the file is at least `min_add_class_file_size` bytes
  CheckSize(PathBuf),
  InlineFile(PathBuf),
  InlineDataUri(String),
}

/// Outcome of a [`VariantJob`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Variant {
  /// The renamed URL still has to be computed
  Rename,
  /// A complete `data:image/webp;base64,...` URL
  Inline(String),
}

pub async fn build_variant(
  job: VariantJob,
  file_system: &FileSystemRef,
  encoder: &dyn WebpEncoder,
  min_size: u64,
) -> Result<Variant, ReferenceError> {
  match job {
    VariantJob::CheckSize(path) => {
      let size = file_system
        .file_size(&path)
        .map_err(|source| ReferenceError::Io { path, source })?;
      check_size(size, min_size)?;
      Ok(Variant::Rename)
    }
    VariantJob::InlineFile(path) => {
      let bytes = file_system
        .read(&path)
        .map_err(|source| ReferenceError::Io { path, source })?;
      inline(bytes, encoder, min_size).await
    }
    VariantJob::InlineDataUri(url) => {
      let bytes = decode_data_uri(&url)?;
      inline(bytes, encoder, min_size).await
    }
  }
}

async fn inline(
  bytes: Vec<u8>,
  encoder: &dyn WebpEncoder,
  min_size: u64,
) -> Result<Variant, ReferenceError> {
  check_size(bytes.len() as u64, min_size)?;
  let webp = encoder.encode(bytes).await.map_err(ReferenceError::Encode)?;
  Ok(Variant::Inline(webp_data_uri(&webp)))
}

pub fn check_size(size: u64, min_size: u64) -> Result<(), ReferenceError> {
  if size < min_size {
    return Err(ReferenceError::TooSmall { size, min_size });
  }
  Ok(())
}

pub fn webp_data_uri(webp: &[u8]) -> String {
  format!("data:image/webp;base64,{}", STANDARD.encode(webp))
}

/// Bytes of a `data:...;base64,<payload>` URL. Whitespace inside the payload is ignored.
pub fn decode_data_uri(url: &str) -> Result<Vec<u8>, ReferenceError> {
  let (header, payload) = url.split_once(',').ok_or(ReferenceError::NotBase64)?;
  if !header
    .split(';')
    .skip(1)
    .any(|part| part.trim().eq_ignore_ascii_case("base64"))
  {
    return Err(ReferenceError::NotBase64);
  }

  let payload: String = payload
    .chars()
    .filter(|c| !c.is_ascii_whitespace())
    .collect();
  Ok(STANDARD.decode(payload)?)
}

#[cfg(test)]
mod tests {
  use std::path::Path;
  use std::sync::Arc;

  use pretty_assertions::assert_eq;
  use webpcss_filesystem::in_memory_file_system::InMemoryFileSystem;
  use webpcss_image::MockWebpEncoder;

  use super::*;

  fn file_system() -> FileSystemRef {
    let file_system = InMemoryFileSystem::default();
    file_system.write_file(Path::new("/images/a.png"), b"0123456789");
    Arc::new(file_system)
  }

  fn fake_encoder() -> MockWebpEncoder {
    let mut encoder = MockWebpEncoder::new();
    encoder
      .expect_encode()
      .returning(|bytes| Ok([b"WEBP".as_slice(), bytes.as_slice()].concat()));
    encoder
  }

  fn unused_encoder() -> MockWebpEncoder {
    let mut encoder = MockWebpEncoder::new();
    encoder.expect_encode().never();
    encoder
  }

  #[tokio::test]
  async fn checks_file_size_before_renaming() {
    let file_system = file_system();
    let encoder = unused_encoder();
    let job = || VariantJob::CheckSize(PathBuf::from("/images/a.png"));

    let variant = build_variant(job(), &file_system, &encoder, 10).await;
    assert_eq!(variant.unwrap(), Variant::Rename);

    let variant = build_variant(job(), &file_system, &encoder, 11).await;
    assert!(matches!(
      variant,
      Err(ReferenceError::TooSmall {
        size: 10,
        min_size: 11
      })
    ));
  }

  #[tokio::test]
  async fn reports_missing_files() {
    let file_system = file_system();
    let encoder = unused_encoder();

    let variant = build_variant(
      VariantJob::InlineFile(PathBuf::from("/images/missing.png")),
      &file_system,
      &encoder,
      0,
    )
    .await;

    assert!(matches!(variant, Err(ReferenceError::Io { path, .. }) if path == Path::new("/images/missing.png")));
  }

  #[tokio::test]
  async fn inlines_files_as_webp_data_uris() {
    let file_system = file_system();

    let variant = build_variant(
      VariantJob::InlineFile(PathBuf::from("/images/a.png")),
      &file_system,
      &fake_encoder(),
      1,
    )
    .await;

    assert_eq!(
      variant.unwrap(),
      Variant::Inline(webp_data_uri(b"WEBP0123456789"))
    );
  }

  #[tokio::test]
  async fn inlines_data_uris() {
    let url = format!("data:image/png;base64,{}", STANDARD.encode(b"pixels"));

    let variant = build_variant(
      VariantJob::InlineDataUri(url),
      &file_system(),
      &fake_encoder(),
      0,
    )
    .await;

    assert_eq!(
      variant.unwrap(),
      Variant::Inline(format!(
        "data:image/webp;base64,{}",
        STANDARD.encode(b"WEBPpixels")
      ))
    );
  }

  #[tokio::test]
  async fn size_gate_applies_to_decoded_payloads() {
    let url = format!("data:image/png;base64,{}", STANDARD.encode(b"pixels"));

    let variant = build_variant(
      VariantJob::InlineDataUri(url),
      &file_system(),
      &unused_encoder(),
      7,
    )
    .await;

    assert!(matches!(variant, Err(ReferenceError::TooSmall { size: 6, .. })));
  }

  #[tokio::test]
  async fn reports_encoder_failures() {
    let mut encoder = MockWebpEncoder::new();
    encoder
      .expect_encode()
      .returning(|_| Err(anyhow::anyhow!("corrupt image")));

    let variant = build_variant(
      VariantJob::InlineFile(PathBuf::from("/images/a.png")),
      &file_system(),
      &encoder,
      0,
    )
    .await;

    assert_eq!(
      variant.unwrap_err().to_string(),
      "Failed to encode webp: corrupt image"
    );
  }

  #[test]
  fn decodes_base64_payloads() {
    assert_eq!(
      decode_data_uri("data:image/png;base64,cGl4\nZWxz").unwrap(),
      b"pixels"
    );
    assert!(matches!(
      decode_data_uri("data:image/png,pixels"),
      Err(ReferenceError::NotBase64)
    ));
    assert!(matches!(
      decode_data_uri("data:image/png;base64,***"),
      Err(ReferenceError::Base64(_))
    ));
  }
}
