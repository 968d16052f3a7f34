//! Lossless CSS rule tree.
//!
//! The tree keeps the exact whitespace written around every node in its [`Raws`], so a
//! stylesheet that is parsed and printed again comes back byte for byte. Nodes built in code
//! leave their raws unset and the printer infers spacing from the rest of the document.

use std::fmt::Display;
use std::fmt::Formatter;

pub use parse::parse;
pub use parse::StylesheetError;

mod parse;
mod stringify;

/// Formatting captured around a node.
///
/// `None` means the node was synthesized and the value is inferred when printing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Raws {
  /// Whitespace (and stray semicolons) before the node
  pub before: Option<String>,
  /// Between a selector / at-rule params and `{`, or between a property and its value
  /// (colon included)
  pub between: Option<String>,
  /// Between the last child and the closing `}`
  pub after: Option<String>,
  /// Between an at-rule name and its params
  pub after_name: Option<String>,
  /// Whether the last declaration of the block is followed by `;`
  pub semicolon: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
  pub nodes: Vec<Node>,
  pub raws: Raws,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
  AtRule(AtRule),
  Rule(Rule),
  Declaration(Declaration),
  Comment(Comment),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtRule {
  pub name: String,
  pub params: String,
  /// `None` for statement at-rules such as `@import` that end in `;`
  pub nodes: Option<Vec<Node>>,
  pub raws: Raws,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
  pub selector: String,
  pub nodes: Vec<Node>,
  pub raws: Raws,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Declaration {
  pub prop: String,
  pub value: String,
  pub raws: Raws,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comment {
  pub text: String,
  pub raws: Raws,
}

impl Stylesheet {
  pub fn parse(css: &str) -> Result<Self, StylesheetError> {
    parse::parse(css)
  }

  pub fn to_css(&self) -> String {
    stringify::stringify(self)
  }
}

impl Display for Stylesheet {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.to_css())
  }
}

impl Node {
  pub fn raws(&self) -> &Raws {
    match self {
      Node::AtRule(at_rule) => &at_rule.raws,
      Node::Rule(rule) => &rule.raws,
      Node::Declaration(declaration) => &declaration.raws,
      Node::Comment(comment) => &comment.raws,
    }
  }

  pub fn raws_mut(&mut self) -> &mut Raws {
    match self {
      Node::AtRule(at_rule) => &mut at_rule.raws,
      Node::Rule(rule) => &mut rule.raws,
      Node::Declaration(declaration) => &mut declaration.raws,
      Node::Comment(comment) => &mut comment.raws,
    }
  }

  /// Children of a rule or block at-rule
  pub fn nodes(&self) -> Option<&[Node]> {
    match self {
      Node::AtRule(at_rule) => at_rule.nodes.as_deref(),
      Node::Rule(rule) => Some(&rule.nodes),
      Node::Declaration(_) | Node::Comment(_) => None,
    }
  }
}

impl Raws {
  /// Forget the spacing that depends on where the node sits so it can be moved elsewhere.
  ///
  /// `between` and `semicolon` describe the inside of the node and are kept.
  pub fn clean(&mut self) {
    self.before = None;
    self.after = None;
  }
}

impl Rule {
  pub fn new(selector: impl Into<String>) -> Self {
    Rule {
      selector: selector.into(),
      ..Rule::default()
    }
  }

  pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
    self.nodes.iter().filter_map(|node| match node {
      Node::Declaration(declaration) => Some(declaration),
      _ => None,
    })
  }

  /// Copy of this rule with a new selector and no children
  pub fn clone_empty(&self, selector: impl Into<String>) -> Rule {
    Rule {
      selector: selector.into(),
      nodes: Vec::new(),
      raws: self.raws.clone(),
    }
  }
}

impl AtRule {
  pub fn new(name: impl Into<String>, params: impl Into<String>) -> Self {
    AtRule {
      name: name.into(),
      params: params.into(),
      nodes: Some(Vec::new()),
      raws: Raws::default(),
    }
  }

  /// Copy of this at-rule with the same name, params and formatting but an empty block
  pub fn clone_empty(&self) -> AtRule {
    AtRule {
      name: self.name.clone(),
      params: self.params.clone(),
      nodes: Some(Vec::new()),
      raws: self.raws.clone(),
    }
  }
}

impl Declaration {
  pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
    Declaration {
      prop: prop.into(),
      value: value.into(),
      raws: Raws::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn clone_is_independent_of_the_original() {
    let stylesheet = Stylesheet::parse("@media print { .a { color: red; } }").unwrap();
    let mut copy = stylesheet.clone();

    if let Node::AtRule(at_rule) = &mut copy.nodes[0] {
      at_rule.nodes.as_mut().unwrap().clear();
    }

    assert_eq!(stylesheet.to_css(), "@media print { .a { color: red; } }");
    assert_eq!(copy.to_css(), "@media print { }");
  }

  #[test]
  fn declarations_skips_comments() {
    let stylesheet = Stylesheet::parse(".a { /* x */ color: red; top: 0 }").unwrap();
    let Node::Rule(rule) = &stylesheet.nodes[0] else {
      panic!("expected a rule");
    };

    let props: Vec<&str> = rule.declarations().map(|d| d.prop.as_str()).collect();
    assert_eq!(props, vec!["color", "top"]);
  }

  #[test]
  fn clone_empty_keeps_formatting() {
    let stylesheet = Stylesheet::parse("@media all{.a{color:red}}").unwrap();
    let Node::AtRule(at_rule) = &stylesheet.nodes[0] else {
      panic!("expected an at-rule");
    };

    let copy = at_rule.clone_empty();
    assert_eq!(copy.name, "media");
    assert_eq!(copy.params, "all");
    assert_eq!(copy.raws, at_rule.raws);
    assert_eq!(copy.nodes, Some(Vec::new()));
  }
}
