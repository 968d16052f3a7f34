use std::borrow::Cow;
use std::path::Path;
use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use webpcss_filesystem::FileSystemRef;

use crate::options::LocatorRequest;
use crate::options::ResolvedOptions;
use crate::url_classifier::split_query;
use crate::url_classifier::UrlKind;
use crate::url_extractor::UrlReference;
use crate::ReferenceError;
use crate::WebpCssError;

/// Maps local URLs to image files
#[derive(Debug)]
pub struct ResourceResolver<'a> {
  options: &'a ResolvedOptions,
  file_system: &'a FileSystemRef,
  /// Absolute path of the stylesheet being transformed
  css_file_path: Option<&'a Path>,
}

impl<'a> ResourceResolver<'a> {
  pub fn new(
    options: &'a ResolvedOptions,
    file_system: &'a FileSystemRef,
    css_file_path: Option<&'a Path>,
  ) -> Self {
    ResourceResolver {
      options,
      file_system,
      css_file_path,
    }
  }

  /// Where the image behind `reference` lives.
  ///
  /// A configured locator wins over every other option and its answer is used as is.
  /// Errors from the locator abort the transform. Anything else that prevents locating the
  /// file is a [`ReferenceError`].
  pub fn resolve(
    &self,
    reference: &UrlReference,
  ) -> Result<Result<PathBuf, ReferenceError>, WebpCssError> {
    if let Some(locator) = &self.options.local_img_file_locator {
      let request = LocatorRequest {
        url: &reference.url,
        css_file_path: self.css_file_path,
      };
      let path = locator
        .locate(&request)
        .map_err(|source| WebpCssError::Locator {
          url: reference.url.clone(),
          source,
        })?;
      return Ok(Ok(path));
    }

    Ok(self.resolve_path(reference))
  }

  fn resolve_path(&self, reference: &UrlReference) -> Result<PathBuf, ReferenceError> {
    if reference.kind == UrlKind::PreprocessorAlias || !reference.kind.is_local() {
      return Err(ReferenceError::Unresolvable(reference.url.clone()));
    }

    let relative = url_to_relative_path(&reference.url);
    let css_dir = self
      .css_file_path
      .filter(|_| self.options.resolve_url_relative_to_file)
      .and_then(|css_file_path| css_file_path.parent());

    let base: Cow<'_, Path> = match (css_dir, &self.options.image_root) {
      (Some(css_dir), _) => Cow::Borrowed(css_dir),
      (None, Some(image_root)) if reference.kind == UrlKind::LocalRootRelative => {
        Cow::Borrowed(image_root)
      }
      _ => match &self.options.css_root {
        Some(css_root) => Cow::Borrowed(css_root),
        None => Cow::Owned(self.file_system.cwd().map_err(|source| ReferenceError::Io {
          path: PathBuf::from("."),
          source,
        })?),
      },
    };

    let path = base.join(relative);
    match self.file_system.absolute(&path) {
      Ok(absolute) => Ok(absolute),
      Err(source) => Err(ReferenceError::Io { path, source }),
    }
  }
}

/// File path part of a URL: no query or fragment, percent escapes decoded and relative to
/// whatever root it is joined to
fn url_to_relative_path(url: &str) -> PathBuf {
  let (path, _) = split_query(url);
  let path = percent_decode_str(path).decode_utf8_lossy();
  PathBuf::from(path.trim_start_matches('/'))
}
