use crate::Node;
use crate::Raws;
use crate::Stylesheet;

const DEFAULT_INDENT: &str = "  ";

pub fn stringify(stylesheet: &Stylesheet) -> String {
  let stringifier = Stringifier::new(stylesheet);
  let mut out = String::new();

  stringifier.body(
    &mut out,
    &stylesheet.nodes,
    stylesheet.raws.semicolon.unwrap_or(false),
    0,
  );
  out.push_str(stylesheet.raws.after.as_deref().unwrap_or(""));
  out
}

/// Prints nodes using their raws, inferring missing raws from the rest of the document.
struct Stringifier {
  /// Spacing before block nodes, taken from the first block that was not the first root child
  detected_before: Option<String>,
  indent: String,
}

impl Stringifier {
  fn new(stylesheet: &Stylesheet) -> Self {
    let mut detected_before = None;
    let mut indent = None;

    for (index, node) in stylesheet.nodes.iter().enumerate() {
      visit_blocks(node, 0, &mut |node, depth| {
        let Some(before) = node.raws().before.as_deref() else {
          return;
        };

        if detected_before.is_none() && !(depth == 0 && index == 0) {
          detected_before = Some(before.to_string());
        }

        if indent.is_none() && depth > 0 {
          if let Some(newline) = before.rfind('\n') {
            let line = &before[newline + 1..];
            let width = line.len() / depth;
            if width > 0 && line.len() % depth == 0 {
              indent = Some(line[..width].to_string());
            }
          }
        }
      });
    }

    Stringifier {
      detected_before,
      indent: indent.unwrap_or_else(|| DEFAULT_INDENT.to_string()),
    }
  }

  fn body(&self, out: &mut String, nodes: &[Node], semicolon: bool, depth: usize) {
    let last = nodes
      .iter()
      .rposition(|node| !matches!(node, Node::Comment(_)))
      .unwrap_or(nodes.len().saturating_sub(1));

    for (index, node) in nodes.iter().enumerate() {
      out.push_str(&self.before(node, depth == 0 && index == 0, depth));
      self.node(out, node, last != index || semicolon, depth);
    }
  }

  fn node(&self, out: &mut String, node: &Node, semicolon: bool, depth: usize) {
    match node {
      Node::Declaration(declaration) => {
        out.push_str(&declaration.prop);
        out.push_str(declaration.raws.between.as_deref().unwrap_or(": "));
        out.push_str(&declaration.value);
        if semicolon {
          out.push(';');
        }
      }
      Node::Comment(comment) => {
        out.push_str("/*");
        out.push_str(&comment.text);
        out.push_str("*/");
      }
      Node::Rule(rule) => {
        out.push_str(&rule.selector);
        out.push_str(rule.raws.between.as_deref().unwrap_or(" "));
        self.block(out, &rule.nodes, &rule.raws, depth);
      }
      Node::AtRule(at_rule) => {
        out.push('@');
        out.push_str(&at_rule.name);
        if !at_rule.params.is_empty() {
          out.push_str(at_rule.raws.after_name.as_deref().unwrap_or(" "));
          out.push_str(&at_rule.params);
        }

        match &at_rule.nodes {
          Some(nodes) => {
            out.push_str(at_rule.raws.between.as_deref().unwrap_or(" "));
            self.block(out, nodes, &at_rule.raws, depth);
          }
          None => {
            out.push_str(at_rule.raws.between.as_deref().unwrap_or(""));
            if semicolon {
              out.push(';');
            }
          }
        }
      }
    }
  }

  fn block(&self, out: &mut String, nodes: &[Node], raws: &Raws, depth: usize) {
    out.push('{');
    self.body(out, nodes, raws.semicolon.unwrap_or(true), depth + 1);
    match raws.after.as_deref() {
      Some(after) => out.push_str(after),
      None => out.push_str(&self.inferred_after(nodes, depth)),
    }
    out.push('}');
  }

  fn before(&self, node: &Node, is_first_root_child: bool, depth: usize) -> String {
    if let Some(before) = node.raws().before.as_deref() {
      return before.to_string();
    }

    match node {
      Node::Rule(_) | Node::AtRule(_) => {
        if is_first_root_child {
          return String::new();
        }
        let detected = self.detected_before.as_deref().unwrap_or("\n");
        self.reindent(detected, depth)
      }
      Node::Declaration(_) | Node::Comment(_) => {
        if depth == 0 {
          if is_first_root_child {
            String::new()
          } else {
            "\n".to_string()
          }
        } else {
          " ".to_string()
        }
      }
    }
  }

  /// A block whose first child sits on the same line as `{` closes on that line too
  fn inferred_after(&self, nodes: &[Node], depth: usize) -> String {
    let Some(first) = nodes.first() else {
      return String::new();
    };

    let first_before = self.before(first, false, depth + 1);
    if first_before.contains('\n') {
      format!("\n{}", self.indent.repeat(depth))
    } else {
      " ".to_string()
    }
  }

  fn reindent(&self, spacing: &str, depth: usize) -> String {
    let mut value = match spacing.rfind('\n') {
      Some(newline) => {
        let mut value = spacing[..=newline].to_string();
        value.push_str(&self.indent.repeat(depth));
        value
      }
      None => spacing.to_string(),
    };
    value.retain(|c| c.is_whitespace());
    value
  }
}

fn visit_blocks(node: &Node, depth: usize, visit: &mut dyn FnMut(&Node, usize)) {
  let Some(children) = node.nodes() else {
    return;
  };

  visit(node, depth);
  for child in children {
    visit_blocks(child, depth + 1, visit);
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use crate::AtRule;
  use crate::Declaration;
  use crate::Rule;

  use super::*;

  fn rule(selector: &str, declarations: &[(&str, &str)]) -> Node {
    let mut rule = Rule::new(selector);
    for (prop, value) in declarations {
      rule
        .nodes
        .push(Node::Declaration(Declaration::new(*prop, *value)));
    }
    Node::Rule(rule)
  }

  #[test]
  fn prints_synthesized_rules_on_new_lines_by_default() {
    let mut stylesheet = Stylesheet::parse(".a { color: red; }").unwrap();
    stylesheet
      .nodes
      .push(rule(".b", &[("background", "url(b.webp)")]));

    assert_eq!(
      stylesheet.to_css(),
      ".a { color: red; }\n.b { background: url(b.webp); }"
    );
  }

  #[test]
  fn follows_spacing_of_existing_rules() {
    let mut stylesheet = Stylesheet::parse(".a { color: red; }.b { color: blue; }").unwrap();
    stylesheet.nodes.push(rule(".c", &[("top", "0")]));

    assert_eq!(
      stylesheet.to_css(),
      ".a { color: red; }.b { color: blue; }.c { top: 0; }"
    );
  }

  #[test]
  fn follows_spacing_of_nested_rules() {
    let mut stylesheet = Stylesheet::parse("@media print { .a { color: red; } }").unwrap();
    let mut media = AtRule::new("media", "print");
    media
      .nodes
      .as_mut()
      .unwrap()
      .push(rule(".b", &[("top", "0")]));
    stylesheet.nodes.push(Node::AtRule(media));

    assert_eq!(
      stylesheet.to_css(),
      "@media print { .a { color: red; } } @media print { .b { top: 0; } }"
    );
  }

  #[test]
  fn indents_synthesized_rules_in_multiline_documents() {
    let mut stylesheet =
      Stylesheet::parse("@media print {\n  .a {\n    color: red;\n  }\n}\n.z {}").unwrap();

    let Node::AtRule(media) = &mut stylesheet.nodes[0] else {
      panic!("expected an at-rule");
    };
    let mut inner = Rule::new(".b");
    let mut declaration = Declaration::new("top", "0");
    declaration.raws.before = Some("\n    ".into());
    inner.nodes.push(Node::Declaration(declaration));
    media.nodes.as_mut().unwrap().push(Node::Rule(inner));

    assert_eq!(
      stylesheet.to_css(),
      "@media print {\n  .a {\n    color: red;\n  }\n  .b {\n    top: 0;\n  }\n}\n.z {}"
    );
  }

  #[test]
  fn omits_last_semicolon_when_source_did() {
    let mut stylesheet = Stylesheet::parse(".a { color: red }").unwrap();
    let Node::Rule(rule) = &mut stylesheet.nodes[0] else {
      panic!("expected a rule");
    };
    rule
      .nodes
      .push(Node::Declaration(Declaration::new("top", "0")));

    assert_eq!(stylesheet.to_css(), ".a { color: red; top: 0 }");
  }

  #[test]
  fn prints_statement_at_rules() {
    let mut stylesheet = Stylesheet::default();
    stylesheet.nodes.push(Node::AtRule(AtRule {
      nodes: None,
      ..AtRule::new("import", "url(a.css)")
    }));
    stylesheet.nodes.push(rule(".a", &[]));

    assert_eq!(stylesheet.to_css(), "@import url(a.css);\n.a {}");
  }
}
