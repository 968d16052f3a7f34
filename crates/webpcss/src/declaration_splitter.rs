use std::collections::HashMap;

use cssparser::serialize_string;
use webpcss_stylesheet::Declaration;
use webpcss_stylesheet::Node;
use webpcss_stylesheet::Rule;

use crate::url_extractor::extract_urls;
use crate::url_extractor::UrlReference;

/// Identifies one `url()` token in a stylesheet.
///
/// Rules are numbered in the order [`crate::rule_duplicator::rules`] visits them, and
/// declarations by their position among the rule's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId {
  pub rule: usize,
  pub node: usize,
  pub url: usize,
}

/// Replacement URLs of the eligible references
pub type Replacements = HashMap<ReferenceId, String>;

/// The children of a rule, sorted for the rules built from it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationSplit {
  /// Declarations of the webp variant rule, image URLs replaced
  pub variant: Vec<Node>,
  /// Image declarations as written
  pub image: Vec<Node>,
  /// Everything that is not an image declaration
  pub rest: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleClassification {
  NoImageRefs,
  HasOnlyIneligibleRefs,
  HasEligibleRefs(DeclarationSplit),
}

pub fn split_declarations(
  rule: &Rule,
  rule_index: usize,
  replacements: &Replacements,
  copy_background_size: bool,
) -> RuleClassification {
  let mut has_refs = false;
  let mut split = DeclarationSplit::default();

  for (index, node) in rule.nodes.iter().enumerate() {
    let Node::Declaration(declaration) = node else {
      split.rest.push(node.clone());
      continue;
    };

    let references = extract_urls(&declaration.value);
    has_refs |= !references.is_empty();

    let rewritten = rewrite_value(&declaration.value, &references, |url| {
      replacements.get(&ReferenceId {
        rule: rule_index,
        node: index,
        url,
      })
    });

    match rewritten {
      Some(value) => {
        split.variant.push(Node::Declaration(Declaration {
          value,
          ..declaration.clone()
        }));
        split.image.push(node.clone());
      }
      None => {
        if copy_background_size && declaration.prop.eq_ignore_ascii_case("background-size") {
          split.variant.push(node.clone());
        }
        split.rest.push(node.clone());
      }
    }
  }

  if !split.image.is_empty() {
    RuleClassification::HasEligibleRefs(split)
  } else if has_refs {
    RuleClassification::HasOnlyIneligibleRefs
  } else {
    RuleClassification::NoImageRefs
  }
}

/// Replaces the `url()` tokens that have a replacement. `None` when there are none.
pub fn rewrite_value<'r>(
  value: &str,
  references: &[UrlReference],
  replacement: impl Fn(usize) -> Option<&'r String>,
) -> Option<String> {
  let mut rewritten = String::with_capacity(value.len());
  let mut last = 0;
  let mut replaced = false;

  for (index, reference) in references.iter().enumerate() {
    let Some(url) = replacement(index) else {
      continue;
    };
    rewritten.push_str(&value[last..reference.span.start]);
    push_url(&mut rewritten, url, reference.quote);
    last = reference.span.end;
    replaced = true;
  }

  if !replaced {
    return None;
  }
  rewritten.push_str(&value[last..]);
  Some(rewritten)
}

/// Writes `url(...)`, quoting the URL only when it cannot stand bare.
///
/// A quoted source keeps its quote character. Its escapes are still valid inside it.
fn push_url(out: &mut String, url: &str, quote: Option<char>) {
  out.push_str("url(");
  let needs_quotes =
    url.contains(|code: char| code.is_ascii_whitespace() || matches!(code, '"' | '\'' | '(' | ')'));

  match quote {
    Some(quote) if needs_quotes => {
      out.push(quote);
      out.push_str(url);
      out.push(quote);
    }
    None if needs_quotes && !url.contains('\\') => {
      // Writing to a String cannot fail
      let _ = serialize_string(url, out);
    }
    _ => out.push_str(url),
  }
  out.push(')');
}
