use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use webpcss_filesystem::os_file_system::OsFileSystem;
use webpcss_filesystem::FileSystemRef;
use webpcss_image::CachedWebpEncoder;
use webpcss_image::EncodeCacheRef;
use webpcss_image::ImageWebpEncoder;
use webpcss_image::WebpEncoderRef;
use webpcss_stylesheet::Node;
use webpcss_stylesheet::Stylesheet;

use crate::declaration_splitter::ReferenceId;
use crate::declaration_splitter::Replacements;
use crate::options::ResolvedOptions;
use crate::resource_resolver::ResourceResolver;
use crate::rule_duplicator::rules;
use crate::rule_duplicator::RuleDuplicator;
use crate::url_classifier::classify;
use crate::url_classifier::Strategy;
use crate::url_classifier::UrlKind;
use crate::url_extractor::extract_urls;
use crate::variant_url_builder::build_variant;
use crate::variant_url_builder::Variant;
use crate::variant_url_builder::VariantJob;
use crate::WebpCssError;
use crate::WebpCssOptions;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformMeta {
  /// Path of the stylesheet, used to resolve URLs relative to it
  pub from: Option<PathBuf>,
}

impl TransformMeta {
  pub fn for_file(path: impl Into<PathBuf>) -> Self {
    TransformMeta {
      from: Some(path.into()),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformOutput {
  pub css: String,
}

/// A reference whose replacement is known once its job has finished
struct PendingReference {
  id: ReferenceId,
  url: String,
  job: Option<VariantJob>,
}

#[derive(Debug)]
pub struct WebpCss {
  options: WebpCssOptions,
  file_system: FileSystemRef,
  encoder: WebpEncoderRef,
}

impl WebpCss {
  pub fn new(options: WebpCssOptions) -> Self {
    WebpCss {
      options,
      file_system: Arc::new(OsFileSystem),
      encoder: Arc::new(ImageWebpEncoder),
    }
  }

  pub fn with_file_system(mut self, file_system: FileSystemRef) -> Self {
    self.file_system = file_system;
    self
  }

  pub fn with_encoder(mut self, encoder: WebpEncoderRef) -> Self {
    self.encoder = encoder;
    self
  }

  /// Reuse encoded images across transforms. Wraps the encoder set so far.
  pub fn with_cache(mut self, cache: EncodeCacheRef) -> Self {
    self.encoder = Arc::new(CachedWebpEncoder::new(self.encoder, cache));
    self
  }

  pub fn options(&self) -> &WebpCssOptions {
    &self.options
  }

  /// Adds the webp rules to `css`.
  ///
  /// CSS that cannot be parsed comes back unchanged. Images that cannot be read or encoded
  /// are skipped. Only errors raised by caller supplied options fail the transform.
  #[tracing::instrument(level = "debug", skip_all, fields(from = ?meta.from))]
  pub async fn transform(
    &self,
    css: &str,
    meta: &TransformMeta,
  ) -> Result<TransformOutput, WebpCssError> {
    let mut stylesheet = match Stylesheet::parse(css) {
      Ok(stylesheet) => stylesheet,
      Err(error) => {
        tracing::warn!(%error, "Failed to parse stylesheet, leaving it unchanged");
        return Ok(TransformOutput {
          css: css.to_string(),
        });
      }
    };

    let options = ResolvedOptions::new(&self.options)?;
    let css_file_path = match &meta.from {
      Some(from) => Some(
        self
          .file_system
          .absolute(from)
          .unwrap_or_else(|_| from.clone()),
      ),
      None => None,
    };

    let pending = self.plan(&stylesheet, &options, css_file_path.as_deref())?;
    let replacements = self.replacements(pending, &options).await?;
    if replacements.is_empty() {
      return Ok(TransformOutput {
        css: css.to_string(),
      });
    }

    let duplicated = RuleDuplicator::new(&options, &replacements).duplicate(&mut stylesheet);
    tracing::debug!(
      duplicated,
      references = replacements.len(),
      "Added webp rules"
    );

    Ok(TransformOutput {
      css: stylesheet.to_css(),
    })
  }

  /// Classifies every reference and decides what has to be read or encoded
  fn plan(
    &self,
    stylesheet: &Stylesheet,
    options: &ResolvedOptions,
    css_file_path: Option<&Path>,
  ) -> Result<Vec<PendingReference>, WebpCssError> {
    let resolver = ResourceResolver::new(options, &self.file_system, css_file_path);
    let needs_file = options.min_add_class_file_size > 0;
    let mut pending = Vec::new();

    for (rule_index, rule) in rules(&stylesheet.nodes).into_iter().enumerate() {
      for (node_index, node) in rule.nodes.iter().enumerate() {
        let Node::Declaration(declaration) = node else {
          continue;
        };

        for (url_index, reference) in extract_urls(&declaration.value).into_iter().enumerate() {
          let id = ReferenceId {
            rule: rule_index,
            node: node_index,
            url: url_index,
          };

          let Some(strategy) = classify(&reference, options) else {
            tracing::trace!(url = %reference.url, "Not eligible");
            continue;
          };

          let job = match strategy {
            Strategy::InlineDataUri => Some(VariantJob::InlineDataUri(reference.url.clone())),
            Strategy::Rename if !needs_file || reference.kind == UrlKind::Remote => None,
            Strategy::Rename | Strategy::InlineFile => match resolver.resolve(&reference)? {
              Ok(path) if strategy == Strategy::Rename => Some(VariantJob::CheckSize(path)),
              Ok(path) => Some(VariantJob::InlineFile(path)),
              Err(error) => {
                tracing::debug!(url = %reference.url, %error, "Skipping image");
                continue;
              }
            },
          };

          pending.push(PendingReference {
            id,
            url: reference.url,
            job,
          });
        }
      }
    }

    Ok(pending)
  }

  /// Runs the jobs concurrently and computes every replacement URL
  async fn replacements(
    &self,
    pending: Vec<PendingReference>,
    options: &ResolvedOptions,
  ) -> Result<Replacements, WebpCssError> {
    let mut renames = Vec::new();
    let mut replacements = Replacements::new();
    let mut tasks = JoinSet::new();

    for PendingReference { id, url, job } in pending {
      let Some(job) = job else {
        renames.push((id, url));
        continue;
      };

      let file_system = self.file_system.clone();
      let encoder = self.encoder.clone();
      let min_size = options.min_add_class_file_size;

      tracing::trace!(%url, ?job, "Scheduling image job");
      tasks.spawn(async move {
        let variant = build_variant(job, &file_system, encoder.as_ref(), min_size).await;
        (id, url, variant)
      });
    }

    while let Some(result) = tasks.join_next().await {
      let (id, url, variant) = result?;
      match variant {
        Ok(Variant::Rename) => renames.push((id, url)),
        Ok(Variant::Inline(data_uri)) => {
          replacements.insert(id, data_uri);
        }
        Err(error) => tracing::debug!(%url, %error, "Skipping image"),
      }
    }

    // Callbacks see references in document order
    renames.sort_by_key(|(id, _)| *id);
    for (id, url) in renames {
      let renamed = options.rename(&url)?;
      replacements.insert(id, renamed);
    }

    Ok(replacements)
  }
}

/// Transforms `css` with the default file system and encoder
pub async fn transform(
  css: &str,
  options: WebpCssOptions,
  meta: &TransformMeta,
) -> Result<TransformOutput, WebpCssError> {
  WebpCss::new(options).transform(css, meta).await
}
