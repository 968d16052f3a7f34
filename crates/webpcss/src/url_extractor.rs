use std::ops::Range;

use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::Token;

use crate::url_classifier::UrlKind;

/// A `url(...)` token found in a declaration value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlReference {
  /// Byte range of the whole token, from `url` to the closing parenthesis
  pub span: Range<usize>,
  /// The URL with quotes removed. Escapes are kept as written.
  pub url: String,
  pub quote: Option<char>,
  pub kind: UrlKind,
}

/// Stops the walk at an unterminated `url(`
type Walk<'i, T> = Result<T, ParseError<'i, ()>>;

/// Finds every `url(...)` token in a declaration value, in order.
///
/// Quoted strings and comments that are not the argument of `url(` are skipped, as are
/// functions whose name only ends in `url`. Functions such as `image-set()` are searched.
/// An unterminated or malformed `url(` ends the walk.
pub fn extract_urls(value: &str) -> Vec<UrlReference> {
  let mut input = ParserInput::new(value);
  let mut parser = Parser::new(&mut input);
  let mut references = Vec::new();

  // An error only means the walk stopped early
  let _ = collect_urls(&mut parser, &mut references);
  references
}

fn collect_urls<'i, 't>(
  parser: &mut Parser<'i, 't>,
  references: &mut Vec<UrlReference>,
) -> Walk<'i, ()> {
  loop {
    let start = parser.position();
    let token = match parser.next_including_whitespace_and_comments() {
      Ok(token) => token.clone(),
      Err(_) => return Ok(()),
    };

    match &token {
      Token::UnquotedUrl(_) => {
        let source = parser.slice_from(start);
        let url = source
          .strip_suffix(')')
          .filter(|inner| !ends_in_escape(inner))
          .and_then(|inner| inner.split_once('('))
          .map(|(_, url)| url.trim_matches(is_whitespace))
          .ok_or_else(|| stop(parser))?;

        references.push(UrlReference {
          span: start.byte_index()..parser.position().byte_index(),
          url: url.to_string(),
          quote: None,
          kind: UrlKind::of(url),
        });
      }
      Token::Function(name) if name.eq_ignore_ascii_case("url") => {
        let (url, quote) = parser.parse_nested_block(|nested| quoted_argument(nested))?;
        if !parser.slice_from(start).ends_with(')') {
          return Err(stop(parser));
        }

        references.push(UrlReference {
          span: start.byte_index()..parser.position().byte_index(),
          url: url.to_string(),
          quote: Some(quote),
          kind: UrlKind::of(url),
        });
      }
      Token::Function(_)
      | Token::ParenthesisBlock
      | Token::SquareBracketBlock
      | Token::CurlyBracketBlock => {
        parser.parse_nested_block(|nested| collect_urls(nested, references))?;
      }
      Token::BadUrl(_) => return Err(stop(parser)),
      _ => {}
    }
  }
}

/// The single quoted string inside `url(...)`, without its quotes
fn quoted_argument<'i, 't>(parser: &mut Parser<'i, 't>) -> Walk<'i, (&'i str, char)> {
  let mut argument = None;

  loop {
    let start = parser.position();
    let token = match parser.next_including_whitespace_and_comments() {
      Ok(token) => token.clone(),
      Err(_) => break,
    };

    match token {
      Token::WhiteSpace(_) => {}
      Token::QuotedString(_) if argument.is_none() => {
        let source = parser.slice_from(start);
        let quote = source.chars().next().unwrap_or('"');
        let inner = source[1..]
          .strip_suffix(quote)
          .filter(|inner| !ends_in_escape(inner))
          .ok_or_else(|| stop(parser))?;
        argument = Some((inner, quote));
      }
      _ => return Err(stop(parser)),
    }
  }

  argument.ok_or_else(|| stop(parser))
}

fn stop<'i>(parser: &Parser<'i, '_>) -> ParseError<'i, ()> {
  parser.new_custom_error(())
}

/// Whether `text` ends in an odd number of backslashes, escaping what follows
fn ends_in_escape(text: &str) -> bool {
  (text.len() - text.trim_end_matches('\\').len()) % 2 == 1
}

fn is_whitespace(code: char) -> bool {
  matches!(code, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn urls(value: &str) -> Vec<String> {
    extract_urls(value).into_iter().map(|r| r.url).collect()
  }

  #[test]
  fn finds_bare_and_quoted_urls() {
    let value = "url(a.png), url('b.png'), url(\"c.png\")";
    let references = extract_urls(value);

    assert_eq!(
      references
        .iter()
        .map(|r| (r.url.as_str(), r.quote))
        .collect::<Vec<_>>(),
      vec![("a.png", None), ("b.png", Some('\'')), ("c.png", Some('"'))]
    );
    assert_eq!(&value[references[1].span.clone()], "url('b.png')");
  }

  #[test]
  fn keeps_surrounding_shorthand_offsets() {
    let value = "transparent url( test.png ) no-repeat";
    let references = extract_urls(value);

    assert_eq!(references.len(), 1);
    assert_eq!(references[0].url, "test.png");
    assert_eq!(&value[references[0].span.clone()], "url( test.png )");
  }

  #[test]
  fn finds_multiple_urls_across_lines() {
    let value = "url(number.png) 600px 10px no-repeat,\nurl(\"thingy.png\") 10px 10px no-repeat,\nurl('Paper-4.png')";
    assert_eq!(urls(value), vec!["number.png", "thingy.png", "Paper-4.png"]);
  }

  #[test]
  fn matches_function_name_case_insensitively() {
    assert_eq!(urls("URL(a.png) Url(b.png)"), vec!["a.png", "b.png"]);
  }

  #[test]
  fn ignores_urls_inside_strings_and_comments() {
    assert_eq!(urls("\"url(a.png)\" /* url(b.png) */ url(c.png)"), vec!["c.png"]);
  }

  #[test]
  fn ignores_functions_ending_in_url() {
    assert_eq!(urls("my-url(a.png) xurl(b.png)"), Vec::<String>::new());
  }

  #[test]
  fn keeps_data_uri_payloads_intact() {
    let value = "url(data:image/png;base64,iVBORw0KGgo=) no-repeat";
    assert_eq!(urls(value), vec!["data:image/png;base64,iVBORw0KGgo="]);

    let svg = "url(\"data:image/svg+xml,%3csvg xmlns='http://www.w3.org/2000/svg'%3e%3c/svg%3e\")";
    assert_eq!(
      urls(svg),
      vec!["data:image/svg+xml,%3csvg xmlns='http://www.w3.org/2000/svg'%3e%3c/svg%3e"]
    );
  }

  #[test]
  fn stops_at_unterminated_urls() {
    assert_eq!(urls("url(a.png"), Vec::<String>::new());
    assert_eq!(urls("url('a.png) url(b.png)"), Vec::<String>::new());
    assert_eq!(urls("url(a b.png) url(c.png)"), Vec::<String>::new());
  }

  #[test]
  fn finds_urls_inside_other_functions() {
    assert_eq!(
      urls("image-set(url(a.png) 1x, url('b.png') 2x)"),
      vec!["a.png", "b.png"]
    );
  }

  #[test]
  fn handles_escaped_parentheses() {
    assert_eq!(urls(r"url(a\).png)"), vec![r"a\).png"]);
  }

  #[test]
  fn tags_each_reference() {
    let kinds: Vec<UrlKind> = extract_urls("url(a.png) url(/b.png) url(//c.com/d.png)")
      .into_iter()
      .map(|r| r.kind)
      .collect();

    assert_eq!(
      kinds,
      vec![
        UrlKind::LocalRelative,
        UrlKind::LocalRootRelative,
        UrlKind::Remote
      ]
    );
  }
}
