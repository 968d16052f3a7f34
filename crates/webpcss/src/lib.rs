//! Adds `.webp` scoped copies of CSS rules that reference raster images.
//!
//! ```css
//! .hero { background: url(hero.png) no-repeat; }
//! ```
//!
//! becomes
//!
//! ```css
//! .hero { background: url(hero.png) no-repeat; }
//! .webp .hero { background: url(hero.webp) no-repeat; }
//! ```
//!
//! Pages then put the `webp` class on `<html>` when the browser supports WebP. Images can
//! also be inlined as base64 WebP data URIs, and a `no-webp` fallback class can be emitted
//! for the original URLs.

pub use error::*;
pub use options::*;
pub use transform::*;
pub use webpcss_image::EncodeCache;

pub mod declaration_splitter;
mod error;
mod options;
pub mod resource_resolver;
pub mod rule_duplicator;
pub mod selector_rewriter;
mod transform;
pub mod url_classifier;
pub mod url_extractor;
pub mod variant_url_builder;
