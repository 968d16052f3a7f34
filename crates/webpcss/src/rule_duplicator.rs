use std::mem;

use webpcss_stylesheet::Node;
use webpcss_stylesheet::Rule;
use webpcss_stylesheet::Stylesheet;

use crate::declaration_splitter::split_declarations;
use crate::declaration_splitter::DeclarationSplit;
use crate::declaration_splitter::Replacements;
use crate::declaration_splitter::RuleClassification;
use crate::options::ResolvedOptions;
use crate::selector_rewriter::rewrite_selector;

/// Rules in the order the duplicator numbers them: depth first through at-rules. Rules
/// nested in rules are not visited.
pub fn rules(nodes: &[Node]) -> Vec<&Rule> {
  let mut found = Vec::new();
  collect_rules(nodes, &mut found);
  found
}

fn collect_rules<'a>(nodes: &'a [Node], found: &mut Vec<&'a Rule>) {
  for node in nodes {
    match node {
      Node::Rule(rule) => found.push(rule),
      Node::AtRule(at_rule) => {
        if let Some(children) = &at_rule.nodes {
          collect_rules(children, found);
        }
      }
      Node::Declaration(_) | Node::Comment(_) => {}
    }
  }
}

/// Adds webp variant rules, and optionally no-webp rules, for every rule with a replacement.
///
/// Variants are appended after the last root node in document order. A variant found inside
/// at-rules is wrapped in fresh copies of those at-rules, one copy per top-level at-rule.
#[derive(Debug)]
pub struct RuleDuplicator<'a> {
  webp_class: &'a str,
  no_webp_class: Option<&'a str>,
  copy_background_size: bool,
  replacements: &'a Replacements,
}

impl<'a> RuleDuplicator<'a> {
  pub fn new(options: &'a ResolvedOptions, replacements: &'a Replacements) -> Self {
    RuleDuplicator {
      webp_class: &options.webp_class,
      no_webp_class: options.no_webp_class.as_deref(),
      copy_background_size: options.copy_background_size,
      replacements,
    }
  }

  /// Returns the number of rules that got a variant
  pub fn duplicate(&self, stylesheet: &mut Stylesheet) -> usize {
    let mut rule_index = 0;
    let mut duplicated = 0;
    let nodes = mem::take(&mut stylesheet.nodes);
    let (mut nodes, variants) = self.process(nodes, &mut rule_index, &mut duplicated);

    for mut variant in variants {
      variant.raws_mut().before = None;
      nodes.push(variant);
    }

    stylesheet.nodes = nodes;
    duplicated
  }

  /// Rewrites `nodes` in place and returns the variants collected below them
  fn process(
    &self,
    nodes: Vec<Node>,
    rule_index: &mut usize,
    duplicated: &mut usize,
  ) -> (Vec<Node>, Vec<Node>) {
    let mut output = Vec::with_capacity(nodes.len());
    let mut variants = Vec::new();

    for node in nodes {
      match node {
        Node::Rule(rule) => {
          let index = *rule_index;
          *rule_index += 1;

          match split_declarations(&rule, index, self.replacements, self.copy_background_size) {
            RuleClassification::NoImageRefs | RuleClassification::HasOnlyIneligibleRefs => {
              output.push(Node::Rule(rule));
            }
            RuleClassification::HasEligibleRefs(split) => {
              *duplicated += 1;
              self.duplicate_rule(rule, split, &mut output, &mut variants);
            }
          }
        }
        Node::AtRule(mut at_rule) => {
          if let Some(children) = at_rule.nodes.take() {
            let (children, nested) = self.process(children, rule_index, duplicated);
            if !nested.is_empty() {
              let mut wrapper = at_rule.clone_empty();
              wrapper.nodes = Some(nested);
              variants.push(Node::AtRule(wrapper));
            }
            at_rule.nodes = Some(children);
          }
          output.push(Node::AtRule(at_rule));
        }
        node => output.push(node),
      }
    }

    (output, variants)
  }

  fn duplicate_rule(
    &self,
    rule: Rule,
    split: DeclarationSplit,
    output: &mut Vec<Node>,
    variants: &mut Vec<Node>,
  ) {
    let mut variant = rule.clone_empty(rewrite_selector(&rule.selector, self.webp_class));
    variant.raws.clean();
    variant.nodes = split.variant;
    variants.push(Node::Rule(variant));

    let Some(no_webp_class) = self.no_webp_class else {
      output.push(Node::Rule(rule));
      return;
    };

    let mut no_webp = rule.clone_empty(rewrite_selector(&rule.selector, no_webp_class));
    no_webp.nodes = split.image;
    output.push(Node::Rule(no_webp));

    // Comments alone do not keep the original rule
    if split
      .rest
      .iter()
      .any(|node| !matches!(node, Node::Comment(_)))
    {
      let mut rest = rule;
      rest.raws.clean();
      rest.nodes = split.rest;
      output.push(Node::Rule(rest));
    }
  }
}
