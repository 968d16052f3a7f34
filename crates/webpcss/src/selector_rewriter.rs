/// Scopes every selector of a list under `class`.
///
/// `.a, .b` becomes `.webp .a, .webp .b`. A selector on the `html` element gets the class
/// attached to it instead (`html.test` becomes `html.webp.test`), and selectors already
/// scoped under `class` are left alone, so rewriting twice changes nothing.
pub fn rewrite_selector(selector: &str, class: &str) -> String {
  split_selector_list(selector)
    .into_iter()
    .map(str::trim)
    .filter(|component| !component.is_empty())
    .map(|component| scope_selector(component, class))
    .collect::<Vec<_>>()
    .join(", ")
}

fn scope_selector(selector: &str, class: &str) -> String {
  if class.is_empty() || starts_with_token(selector, class) {
    return selector.to_string();
  }

  if starts_with_token(&selector.to_ascii_lowercase(), "html") {
    let compound = &selector[..compound_end(selector)];
    if contains_token(compound, class) {
      return selector.to_string();
    }
    return format!("{}{}{}", &selector[..4], class, &selector[4..]);
  }

  format!("{class} {selector}")
}

/// `selector` starts with `prefix` and the next character cannot continue an identifier
fn starts_with_token(selector: &str, prefix: &str) -> bool {
  selector.starts_with(prefix)
    && selector[prefix.len()..]
      .chars()
      .next()
      .map_or(true, |next| !is_ident_char(next))
}

fn contains_token(compound: &str, class: &str) -> bool {
  compound
    .match_indices(class)
    .any(|(index, _)| starts_with_token(&compound[index..], class))
}

fn is_ident_char(c: char) -> bool {
  c.is_alphanumeric() || c == '-' || c == '_' || c == '\\' || !c.is_ascii()
}

/// End of the first compound selector: the first combinator or whitespace outside brackets
fn compound_end(selector: &str) -> usize {
  let mut depth = 0usize;
  for (index, c) in selector.char_indices() {
    match c {
      '(' | '[' => depth += 1,
      ')' | ']' => depth = depth.saturating_sub(1),
      '>' | '+' | '~' if depth == 0 => return index,
      c if c.is_whitespace() && depth == 0 => return index,
      _ => {}
    }
  }
  selector.len()
}

/// Splits on commas that are not inside parentheses, brackets or strings
fn split_selector_list(selector: &str) -> Vec<&str> {
  let bytes = selector.as_bytes();
  let mut parts = Vec::new();
  let mut depth = 0usize;
  let mut quote: Option<u8> = None;
  let mut start = 0;
  let mut pos = 0;

  while pos < bytes.len() {
    let code = bytes[pos];
    match quote {
      Some(_) if code == b'\\' => pos += 1,
      Some(q) if code == q => quote = None,
      Some(_) => {}
      None => match code {
        b'\\' => pos += 1,
        b'"' | b'\'' => quote = Some(code),
        b'(' | b'[' => depth += 1,
        b')' | b']' => depth = depth.saturating_sub(1),
        b',' if depth == 0 => {
          parts.push(&selector[start..pos]);
          start = pos + 1;
        }
        _ => {}
      },
    }
    pos += 1;
  }

  parts.push(&selector[start.min(selector.len())..]);
  parts
}
