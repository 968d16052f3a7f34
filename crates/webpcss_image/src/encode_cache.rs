use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::WebpEncoder;
use crate::WebpEncoderRef;

pub type EncodeCacheRef = Arc<EncodeCache>;

/// Encoded WebP bytes keyed by a hash of the source image.
///
/// Shared between transforms so an image referenced by many stylesheets is only encoded once.
#[derive(Debug, Default)]
pub struct EncodeCache {
  entries: RwLock<HashMap<u64, Arc<Vec<u8>>>>,
}

impl EncodeCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, source: &[u8]) -> Option<Arc<Vec<u8>>> {
    self.entries.read().get(&hash_source(source)).cloned()
  }

  pub fn insert(&self, source: &[u8], encoded: Vec<u8>) -> Arc<Vec<u8>> {
    let encoded = Arc::new(encoded);
    self
      .entries
      .write()
      .insert(hash_source(source), encoded.clone());
    encoded
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }

  pub fn clear(&self) {
    self.entries.write().clear();
  }
}

#[tracing::instrument(level = "trace", skip_all, ret)]
fn hash_source(source: &[u8]) -> u64 {
  xxhash_rust::xxh3::xxh3_64(source)
}

/// Wraps another encoder and consults an [`EncodeCache`] before encoding.
///
/// Failed encodes are not cached.
#[derive(Debug)]
pub struct CachedWebpEncoder {
  inner: WebpEncoderRef,
  cache: EncodeCacheRef,
}

impl CachedWebpEncoder {
  pub fn new(inner: WebpEncoderRef, cache: EncodeCacheRef) -> Self {
    CachedWebpEncoder { inner, cache }
  }
}

#[async_trait]
impl WebpEncoder for CachedWebpEncoder {
  #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
  async fn encode(&self, source: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    if let Some(encoded) = self.cache.get(&source) {
      tracing::trace!("Encode cache hit");
      return Ok(encoded.as_ref().clone());
    }

    let encoded = self.inner.encode(source.clone()).await?;
    self.cache.insert(&source, encoded.clone());

    Ok(encoded)
  }
}
