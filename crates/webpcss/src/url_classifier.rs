use crate::options::ResolvedOptions;
use crate::url_extractor::UrlReference;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UrlKind {
  DataUriWebp,
  DataUriSvg,
  DataUriOther,
  /// `http://`, `https://` or protocol-relative `//`
  Remote,
  LocalRelative,
  /// Starts with a single `/`
  LocalRootRelative,
  /// Starts with `~`, a module alias understood by CSS preprocessors and bundlers
  PreprocessorAlias,
}

impl UrlKind {
  pub fn of(url: &str) -> UrlKind {
    if starts_with_ignore_case(url, "data:") {
      if starts_with_ignore_case(url, "data:image/webp") {
        UrlKind::DataUriWebp
      } else if starts_with_ignore_case(url, "data:image/svg") {
        UrlKind::DataUriSvg
      } else {
        UrlKind::DataUriOther
      }
    } else if starts_with_ignore_case(url, "http://")
      || starts_with_ignore_case(url, "https://")
      || url.starts_with("//")
    {
      UrlKind::Remote
    } else if url.starts_with('~') {
      UrlKind::PreprocessorAlias
    } else if url.starts_with('/') {
      UrlKind::LocalRootRelative
    } else {
      UrlKind::LocalRelative
    }
  }

  pub fn is_local(&self) -> bool {
    matches!(
      self,
      UrlKind::LocalRelative | UrlKind::LocalRootRelative | UrlKind::PreprocessorAlias
    )
  }
}

/// How the variant of an eligible reference is produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
  /// Point at a renamed sibling file
  Rename,
  /// Read the file, encode it and embed it as a data URI
  InlineFile,
  /// Decode the base64 payload, encode it and embed it as a data URI
  InlineDataUri,
}

/// Decides whether a reference gets a webp variant and how.
///
/// Checks that need the image itself (existence and size) happen later.
pub fn classify(reference: &UrlReference, options: &ResolvedOptions) -> Option<Strategy> {
  let url = reference.url.as_str();

  match reference.kind {
    UrlKind::DataUriWebp | UrlKind::DataUriSvg => None,
    UrlKind::DataUriOther => {
      let subtype = base64_image_subtype(url)?;
      options
        .has_extension(subtype)
        .then_some(Strategy::InlineDataUri)
    }
    UrlKind::Remote if !options.replace_remote_image => None,
    kind => {
      if !options.matches_replace_from(url) {
        return None;
      }

      match (options.inline, kind) {
        // There is nothing local to read
        (true, UrlKind::Remote) => None,
        (true, _) => Some(Strategy::InlineFile),
        (false, _) => Some(Strategy::Rename),
      }
    }
  }
}

/// MIME subtype of an `image/*` data URI with a base64 payload
pub fn base64_image_subtype(url: &str) -> Option<&str> {
  if !starts_with_ignore_case(url, "data:image/") {
    return None;
  }

  let header = &url["data:image/".len()..url.find(',')?];
  let mut parts = header.split(';');
  let subtype = parts.next()?;
  parts
    .any(|part| part.trim().eq_ignore_ascii_case("base64"))
    .then_some(subtype)
}

/// Splits a URL into its path and its `?query` / `#fragment` suffix
pub fn split_query(url: &str) -> (&str, &str) {
  match url.find(&['?', '#'][..]) {
    Some(index) => url.split_at(index),
    None => (url, ""),
  }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
  value
    .as_bytes()
    .get(..prefix.len())
    .is_some_and(|start| start.eq_ignore_ascii_case(prefix.as_bytes()))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use regex::Regex;

  use crate::url_extractor::extract_urls;
  use crate::WebpCssOptions;

  use super::*;

  fn classify_with(url: &str, options: WebpCssOptions) -> Option<Strategy> {
    let options = ResolvedOptions::new(&options).unwrap();
    let reference = extract_urls(&format!("url({url})")).remove(0);
    classify(&reference, &options)
  }

  fn classify_default(url: &str) -> Option<Strategy> {
    classify_with(url, WebpCssOptions::default())
  }

  #[test]
  fn tags_urls_by_kind() {
    assert_eq!(UrlKind::of("data:image/webp;base64,AA=="), UrlKind::DataUriWebp);
    assert_eq!(UrlKind::of("DATA:image/SVG+xml,%3csvg"), UrlKind::DataUriSvg);
    assert_eq!(UrlKind::of("data:image/png;base64,AA=="), UrlKind::DataUriOther);
    assert_eq!(UrlKind::of("https://foo.com/a.png"), UrlKind::Remote);
    assert_eq!(UrlKind::of("HTTP://foo.com/a.png"), UrlKind::Remote);
    assert_eq!(UrlKind::of("//foo.com/a.png"), UrlKind::Remote);
    assert_eq!(UrlKind::of("~/images/a.png"), UrlKind::PreprocessorAlias);
    assert_eq!(UrlKind::of("/images/a.png"), UrlKind::LocalRootRelative);
    assert_eq!(UrlKind::of("../images/a.png"), UrlKind::LocalRelative);
  }

  #[test]
  fn renames_default_raster_extensions() {
    assert_eq!(classify_default("test.png"), Some(Strategy::Rename));
    assert_eq!(classify_default("test.jpg"), Some(Strategy::Rename));
    assert_eq!(classify_default("test.JPEG"), Some(Strategy::Rename));
    assert_eq!(classify_default("test.png?v=2#top"), Some(Strategy::Rename));
    assert_eq!(classify_default("test.gif"), None);
    assert_eq!(classify_default("test.webp"), None);
    assert_eq!(classify_default("test.png.bak"), None);
  }

  #[test]
  fn never_touches_webp_or_svg_data_uris() {
    for inline in [false, true] {
      let options = || WebpCssOptions {
        inline,
        ..WebpCssOptions::default()
      };
      assert_eq!(classify_with("data:image/webp;base64,AA==", options()), None);
      assert_eq!(classify_with("data:image/svg+xml;base64,AA==", options()), None);
    }
  }

  #[test]
  fn inlines_raster_data_uris() {
    assert_eq!(
      classify_default("data:image/png;base64,AA=="),
      Some(Strategy::InlineDataUri)
    );
    assert_eq!(
      classify_default("data:image/jpg;base64,AA=="),
      Some(Strategy::InlineDataUri)
    );
    assert_eq!(classify_default("data:image/gif;base64,AA=="), None);
    assert_eq!(classify_default("data:image/png,raw"), None);
    assert_eq!(classify_default("data:text/plain;base64,AA=="), None);
  }

  #[test]
  fn gates_remote_urls() {
    assert_eq!(classify_default("//foo.com/test.jpg"), Some(Strategy::Rename));

    let options = || WebpCssOptions {
      replace_remote_image: false,
      ..WebpCssOptions::default()
    };
    assert_eq!(classify_with("//foo.com/test.jpg", options()), None);
    assert_eq!(classify_with("https://foo.com/test.jpg", options()), None);
  }

  #[test]
  fn remote_urls_are_not_inlined() {
    let options = WebpCssOptions {
      inline: true,
      ..WebpCssOptions::default()
    };
    assert_eq!(classify_with("https://foo.com/test.jpg", options), None);
  }

  #[test]
  fn custom_replace_from_decides_eligibility() {
    let options = || WebpCssOptions {
      replace_from: Some(Regex::new(r"\.gif").unwrap()),
      ..WebpCssOptions::default()
    };
    assert_eq!(classify_with("test.gif", options()), Some(Strategy::Rename));
    assert_eq!(classify_with("test.png", options()), None);
  }

  #[test]
  fn custom_extensions() {
    let options = || WebpCssOptions {
      extensions: vec!["gif".into()],
      ..WebpCssOptions::default()
    };
    assert_eq!(classify_with("test.gif", options()), Some(Strategy::Rename));
    assert_eq!(classify_with("test.png", options()), None);
    assert_eq!(
      classify_with("data:image/gif;base64,AA==", options()),
      Some(Strategy::InlineDataUri)
    );
  }

  #[test]
  fn splits_query_and_fragment() {
    assert_eq!(split_query("a.png?v=1#x"), ("a.png", "?v=1#x"));
    assert_eq!(split_query("a.png#x"), ("a.png", "#x"));
    assert_eq!(split_query("a.png"), ("a.png", ""));
  }
}
