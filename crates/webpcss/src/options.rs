use std::fmt::Debug;
use std::fmt::Formatter;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Captures;
use regex::Regex;
use serde::Deserialize;
use serde::Deserializer;

use crate::url_classifier::split_query;
use crate::WebpCssError;

const DEFAULT_WEBP_CLASS: &str = ".webp";
const DEFAULT_REPLACE_TO: &str = ".webp";
const DEFAULT_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// What a `replace_to` function receives for each eligible URL
#[derive(Debug)]
pub struct ReplaceInfo<'a> {
  pub url: &'a str,
  /// Groups of the first `replace_from` match, the whole match first
  pub captures: Vec<Option<&'a str>>,
}

/// What a `localImgFileLocator` receives for each local URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatorRequest<'a> {
  pub url: &'a str,
  /// Absolute path of the stylesheet, when known
  pub css_file_path: Option<&'a Path>,
}

type ReplaceToFn = dyn Fn(&ReplaceInfo<'_>) -> anyhow::Result<String> + Send + Sync;
type LocatorFn = dyn Fn(&LocatorRequest<'_>) -> anyhow::Result<PathBuf> + Send + Sync;

#[derive(Clone)]
pub enum ReplaceTo {
  /// Replacement for each `replace_from` match. `$1`, `${name}` and `$0` expand to groups.
  Template(String),
  /// Computes the whole replacement URL
  Function(Arc<ReplaceToFn>),
}

impl Debug for ReplaceTo {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ReplaceTo::Template(template) => f.debug_tuple("Template").field(template).finish(),
      ReplaceTo::Function(_) => f.write_str("Function(..)"),
    }
  }
}

impl<'de> Deserialize<'de> for ReplaceTo {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    String::deserialize(deserializer).map(ReplaceTo::Template)
  }
}

/// Maps a URL found in a stylesheet to the image file on disk
#[derive(Clone)]
pub struct LocalImgFileLocator(Arc<LocatorFn>);

impl LocalImgFileLocator {
  pub fn new(
    locate: impl Fn(&LocatorRequest<'_>) -> anyhow::Result<PathBuf> + Send + Sync + 'static,
  ) -> Self {
    LocalImgFileLocator(Arc::new(locate))
  }

  pub fn locate(&self, request: &LocatorRequest<'_>) -> anyhow::Result<PathBuf> {
    (self.0)(request)
  }
}

impl Debug for LocalImgFileLocator {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str("LocalImgFileLocator(..)")
  }
}

/// Options accepted by the transform.
///
/// Field names in JSON follow the option names users already write in their configs,
/// e.g. `{"webpClass": ".webp", "noWebpClass": ".no-webp", "replace_to": ".$1.webp"}`.
/// Callbacks can only be set from Rust.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebpCssOptions {
  #[serde(rename = "webpClass")]
  pub webp_class: String,

  #[serde(rename = "noWebpClass")]
  pub no_webp_class: Option<String>,

  #[serde(deserialize_with = "deserialize_regex")]
  pub replace_from: Option<Regex>,

  pub replace_to: Option<ReplaceTo>,

  #[serde(rename = "replaceRemoteImage")]
  pub replace_remote_image: bool,

  #[serde(rename = "copyBackgroundSize")]
  pub copy_background_size: bool,

  pub inline: bool,

  #[serde(rename = "resolveUrlRelativeToFile")]
  pub resolve_url_relative_to_file: bool,

  pub css_root: Option<PathBuf>,

  #[serde(alias = "img_root")]
  pub image_root: Option<PathBuf>,

  #[serde(skip)]
  pub local_img_file_locator: Option<LocalImgFileLocator>,

  #[serde(rename = "minAddClassFileSize")]
  pub min_add_class_file_size: u64,

  pub extensions: Vec<String>,
}

impl Default for WebpCssOptions {
  fn default() -> Self {
    WebpCssOptions {
      webp_class: DEFAULT_WEBP_CLASS.to_string(),
      no_webp_class: None,
      replace_from: None,
      replace_to: None,
      replace_remote_image: true,
      copy_background_size: false,
      inline: false,
      resolve_url_relative_to_file: false,
      css_root: None,
      image_root: None,
      local_img_file_locator: None,
      min_add_class_file_size: 0,
      extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    }
  }
}

impl WebpCssOptions {
  pub fn from_json(json: &str) -> Result<Self, WebpCssError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn with_replace_to_fn(
    mut self,
    replace_to: impl Fn(&ReplaceInfo<'_>) -> anyhow::Result<String> + Send + Sync + 'static,
  ) -> Self {
    self.replace_to = Some(ReplaceTo::Function(Arc::new(replace_to)));
    self
  }

  pub fn with_local_img_file_locator(
    mut self,
    locate: impl Fn(&LocatorRequest<'_>) -> anyhow::Result<PathBuf> + Send + Sync + 'static,
  ) -> Self {
    self.local_img_file_locator = Some(LocalImgFileLocator::new(locate));
    self
  }
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
  D: Deserializer<'de>,
{
  Option::<String>::deserialize(deserializer)?
    .map(|pattern| Regex::new(&pattern).map_err(serde::de::Error::custom))
    .transpose()
}

/// Options with defaults applied, computed once per transform
#[derive(Debug)]
pub struct ResolvedOptions {
  pub webp_class: String,
  pub no_webp_class: Option<String>,
  replace_from: Option<Regex>,
  custom_replace_from: bool,
  replace_to: ReplaceTo,
  pub replace_remote_image: bool,
  pub copy_background_size: bool,
  pub inline: bool,
  pub resolve_url_relative_to_file: bool,
  pub css_root: Option<PathBuf>,
  pub image_root: Option<PathBuf>,
  pub local_img_file_locator: Option<LocalImgFileLocator>,
  pub min_add_class_file_size: u64,
  extensions: Vec<String>,
}

impl ResolvedOptions {
  pub fn new(options: &WebpCssOptions) -> Result<Self, WebpCssError> {
    let extensions: Vec<String> = options
      .extensions
      .iter()
      .map(|extension| extension.trim_start_matches('.').to_ascii_lowercase())
      .filter(|extension| !extension.is_empty())
      .collect();

    let (replace_from, custom_replace_from) = match &options.replace_from {
      Some(pattern) => (Some(pattern.clone()), true),
      None if extensions.is_empty() => (None, false),
      None => {
        let alternatives: Vec<String> = extensions.iter().map(|e| regex::escape(e)).collect();
        let pattern = Regex::new(&format!(r"(?i)\.({})$", alternatives.join("|")))?;
        (Some(pattern), false)
      }
    };

    Ok(ResolvedOptions {
      webp_class: options.webp_class.clone(),
      no_webp_class: options.no_webp_class.clone(),
      replace_from,
      custom_replace_from,
      replace_to: options
        .replace_to
        .clone()
        .unwrap_or_else(|| ReplaceTo::Template(DEFAULT_REPLACE_TO.to_string())),
      replace_remote_image: options.replace_remote_image,
      copy_background_size: options.copy_background_size,
      inline: options.inline,
      resolve_url_relative_to_file: options.resolve_url_relative_to_file,
      css_root: options.css_root.clone(),
      image_root: options.image_root.clone(),
      local_img_file_locator: options.local_img_file_locator.clone(),
      min_add_class_file_size: options.min_add_class_file_size,
      extensions,
    })
  }

  pub fn has_extension(&self, extension: &str) -> bool {
    self
      .extensions
      .iter()
      .any(|candidate| candidate.eq_ignore_ascii_case(extension))
  }

  /// A custom `replace_from` sees the whole URL. The default one only sees the path, so
  /// `a.png?v=1` still matches.
  fn pattern_target<'u>(&self, url: &'u str) -> (&'u str, &'u str) {
    if self.custom_replace_from {
      (url, "")
    } else {
      split_query(url)
    }
  }

  pub fn matches_replace_from(&self, url: &str) -> bool {
    let (target, _) = self.pattern_target(url);
    self
      .replace_from
      .as_ref()
      .is_some_and(|pattern| pattern.is_match(target))
  }

  /// The renamed URL for an eligible reference
  pub fn rename(&self, url: &str) -> Result<String, WebpCssError> {
    let Some(pattern) = &self.replace_from else {
      return Ok(url.to_string());
    };
    let (target, suffix) = self.pattern_target(url);

    match &self.replace_to {
      ReplaceTo::Template(template) => {
        let replaced = if self.custom_replace_from {
          pattern.replace_all(target, template.as_str())
        } else {
          pattern.replace(target, template.as_str())
        };
        Ok(format!("{replaced}{suffix}"))
      }
      ReplaceTo::Function(replace_to) => {
        let captures = pattern
          .captures(target)
          .map(|captures| capture_groups(&captures))
          .unwrap_or_default();

        replace_to(&ReplaceInfo { url, captures }).map_err(|source| WebpCssError::ReplaceTo {
          url: url.to_string(),
          source,
        })
      }
    }
  }
}

fn capture_groups<'a>(captures: &Captures<'a>) -> Vec<Option<&'a str>> {
  captures
    .iter()
    .map(|group| group.map(|group| group.as_str()))
    .collect()
}
