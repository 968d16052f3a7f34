use cssparser::ParseError;
use cssparser::ParseErrorKind;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::Token;
use thiserror::Error;

use crate::AtRule;
use crate::Comment;
use crate::Declaration;
use crate::Node;
use crate::Raws;
use crate::Rule;
use crate::Stylesheet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StylesheetError {
  #[error("{message} at {line}:{column}")]
  Syntax {
    message: &'static str,
    line: usize,
    column: usize,
  },
}

type ParseResult<'i, T> = Result<T, ParseError<'i, StylesheetError>>;

/// What ended a prelude or declaration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Terminator {
  Open,
  Semicolon,
  /// End of input, or the `}` closing the enclosing block
  End,
}

struct Scan {
  /// Offset of the terminator
  end: usize,
  terminator: Terminator,
  /// First top level `:`
  colon: Option<usize>,
  /// First token after the colon that is not whitespace
  value_start: Option<usize>,
}

struct Body {
  nodes: Vec<Node>,
  after: String,
  semicolon: bool,
  /// Offset where the children stop, before any closing `}`
  end: usize,
}

/// Parse `css` into a [`Stylesheet`], keeping every byte of formatting in the node raws.
///
/// Tokens come from `cssparser`. Raws are sliced out of the source between token offsets.
pub fn parse(css: &str) -> Result<Stylesheet, StylesheetError> {
  let mut input = ParserInput::new(css);
  let mut parser = Parser::new(&mut input);

  let body = StylesheetParser { css }
    .parse_nodes(&mut parser)
    .map_err(into_stylesheet_error)?;

  Ok(Stylesheet {
    nodes: body.nodes,
    raws: Raws {
      after: Some(body.after),
      semicolon: Some(body.semicolon),
      ..Raws::default()
    },
  })
}

fn into_stylesheet_error(error: ParseError<'_, StylesheetError>) -> StylesheetError {
  match error.kind {
    ParseErrorKind::Custom(error) => error,
    ParseErrorKind::Basic(_) => StylesheetError::Syntax {
      message: "Unexpected token",
      line: error.location.line as usize + 1,
      column: error.location.column as usize,
    },
  }
}

struct StylesheetParser<'i> {
  css: &'i str,
}

impl<'i> StylesheetParser<'i> {
  /// Parse children until the end of `parser`, which is either the whole input or the
  /// inside of a `{}` block.
  fn parse_nodes<'t>(&self, parser: &mut Parser<'i, 't>) -> ParseResult<'i, Body> {
    let css = self.css;
    let mut nodes = Vec::new();
    let mut before_start = parser.position().byte_index();
    let mut semicolon = false;

    loop {
      let state = parser.state();
      let start = parser.position().byte_index();
      let token = match parser.next_including_whitespace_and_comments() {
        Ok(token) => token.clone(),
        Err(_) => break,
      };

      let end = match &token {
        // Stray semicolons stay in the next node's `before`
        Token::WhiteSpace(_) | Token::Semicolon => continue,
        Token::CloseCurlyBracket => return Err(self.error(parser, start, "Unexpected }")),
        Token::Comment(text) => {
          self.check_token(parser, &token, start)?;
          nodes.push(Node::Comment(Comment {
            text: text.to_string(),
            raws: Raws {
              before: Some(css[before_start..start].to_string()),
              ..Raws::default()
            },
          }));
          parser.position().byte_index()
        }
        Token::AtKeyword(_) => {
          let before = css[before_start..start].to_string();
          let (at_rule, end, terminated) = self.parse_at_rule(parser, before, start)?;
          semicolon = terminated;
          nodes.push(Node::AtRule(at_rule));
          end
        }
        _ => {
          parser.reset(&state);
          let before = css[before_start..start].to_string();
          let scan = self.scan(parser)?;
          if scan.terminator == Terminator::Open {
            let (rule, end) = self.parse_rule(parser, before, start, scan)?;
            nodes.push(Node::Rule(rule));
            semicolon = false;
            end
          } else {
            let (declaration, end, terminated) = self.parse_declaration(parser, before, start, scan)?;
            nodes.push(Node::Declaration(declaration));
            semicolon = terminated;
            end
          }
        }
      };

      before_start = end;
    }

    let end = parser.position().byte_index();
    Ok(Body {
      nodes,
      after: css[before_start..end].to_string(),
      semicolon,
      end,
    })
  }

  fn parse_rule<'t>(
    &self,
    parser: &mut Parser<'i, 't>,
    before: String,
    start: usize,
    scan: Scan,
  ) -> ParseResult<'i, (Rule, usize)> {
    let prelude = &self.css[start..scan.end];
    let selector = prelude.trim_end();
    let between = &prelude[selector.len()..];

    let body = self.parse_block(parser, scan.end)?;

    Ok((
      Rule {
        selector: selector.to_string(),
        nodes: body.nodes,
        raws: Raws {
          before: Some(before),
          between: Some(between.to_string()),
          after: Some(body.after),
          semicolon: Some(body.semicolon),
          ..Raws::default()
        },
      },
      parser.position().byte_index(),
    ))
  }

  fn parse_declaration<'t>(
    &self,
    parser: &Parser<'i, 't>,
    before: String,
    start: usize,
    scan: Scan,
  ) -> ParseResult<'i, (Declaration, usize, bool)> {
    let css = self.css;
    let Some(colon) = scan.colon else {
      return Err(self.error(parser, start, "Unknown word"));
    };

    let prop = css[start..colon].trim_end();
    if prop.is_empty() {
      return Err(self.error(parser, start, "Missing property name"));
    }

    let value_start = scan.value_start.unwrap_or(scan.end);
    let between = css[start + prop.len()..value_start].to_string();
    let terminated = scan.terminator == Terminator::Semicolon;
    let (value, end) = if terminated {
      (&css[value_start..scan.end], scan.end + 1)
    } else {
      // Trailing whitespace belongs to the enclosing block's `after`
      let value = css[value_start..scan.end].trim_end();
      (value, value_start + value.len())
    };

    Ok((
      Declaration {
        prop: prop.to_string(),
        value: value.to_string(),
        raws: Raws {
          before: Some(before),
          between: Some(between),
          ..Raws::default()
        },
      },
      end,
      terminated,
    ))
  }

  /// Parse an at-rule whose `@name` token starting at `start` was just consumed
  fn parse_at_rule<'t>(
    &self,
    parser: &mut Parser<'i, 't>,
    before: String,
    start: usize,
  ) -> ParseResult<'i, (AtRule, usize, bool)> {
    let css = self.css;
    let name_end = parser.position().byte_index();
    let name = css[start + 1..name_end].to_string();

    let scan = self.scan(parser)?;
    let rest = &css[name_end..scan.end];
    let params = rest.trim();
    let (after_name, between) = if params.is_empty() {
      ("", rest)
    } else {
      let after_name = &rest[..rest.len() - rest.trim_start().len()];
      (after_name, &rest[after_name.len() + params.len()..])
    };

    let mut at_rule = AtRule {
      name,
      params: params.to_string(),
      nodes: None,
      raws: Raws {
        before: Some(before),
        between: Some(between.to_string()),
        after_name: Some(after_name.to_string()),
        ..Raws::default()
      },
    };

    match scan.terminator {
      Terminator::Open => {
        let body = self.parse_block(parser, scan.end)?;
        at_rule.raws.after = Some(body.after);
        at_rule.raws.semicolon = Some(body.semicolon);
        at_rule.nodes = Some(body.nodes);
        Ok((at_rule, parser.position().byte_index(), false))
      }
      Terminator::Semicolon => Ok((at_rule, scan.end + 1, true)),
      Terminator::End => {
        at_rule.raws.between = Some(String::new());
        let end = scan.end - (rest.len() - rest.trim_end().len());
        Ok((at_rule, end, false))
      }
    }
  }

  /// Parse the children of the `{` block at `open` that the parser just returned
  fn parse_block<'t>(&self, parser: &mut Parser<'i, 't>, open: usize) -> ParseResult<'i, Body> {
    let body = parser.parse_nested_block(|nested| self.parse_nodes(nested))?;

    // A closed block leaves the parser past its `}`
    if parser.position().byte_index() == body.end {
      return Err(self.error(parser, open, "Unclosed block"));
    }
    Ok(body)
  }

  /// Read tokens up to the first top level `{`, `;` or the end of the block
  fn scan<'t>(&self, parser: &mut Parser<'i, 't>) -> ParseResult<'i, Scan> {
    let mut colon = None;
    let mut value_start = None;

    loop {
      let start = parser.position().byte_index();
      let token = match parser.next_including_whitespace_and_comments() {
        Ok(token) => token.clone(),
        Err(_) => {
          return Ok(Scan {
            end: start,
            terminator: Terminator::End,
            colon,
            value_start,
          })
        }
      };

      let terminator = match &token {
        Token::CurlyBracketBlock => Terminator::Open,
        Token::Semicolon => Terminator::Semicolon,
        Token::CloseCurlyBracket => return Err(self.error(parser, start, "Unexpected }")),
        _ => {
          if colon.is_some() && value_start.is_none() && !matches!(token, Token::WhiteSpace(_)) {
            value_start = Some(start);
          }
          if colon.is_none() && matches!(token, Token::Colon) {
            colon = Some(start);
          }
          self.check_token(parser, &token, start)?;
          continue;
        }
      };

      return Ok(Scan {
        end: start,
        terminator,
        colon,
        value_start,
      });
    }
  }

  /// Reject unterminated strings and comments, looking inside nested blocks
  fn check_token<'t>(
    &self,
    parser: &mut Parser<'i, 't>,
    token: &Token<'i>,
    start: usize,
  ) -> ParseResult<'i, ()> {
    match token {
      Token::QuotedString(_) => {
        let source = &self.css[start..parser.position().byte_index()];
        if is_closed_string(source) {
          Ok(())
        } else {
          Err(self.error(parser, start, "Unclosed string"))
        }
      }
      Token::BadString(_) => Err(self.error(parser, start, "Unclosed string")),
      Token::Comment(_) => {
        let source = &self.css[start..parser.position().byte_index()];
        if source.len() >= 4 && source.ends_with("*/") {
          Ok(())
        } else {
          Err(self.error(parser, start, "Unclosed comment"))
        }
      }
      Token::Function(_)
      | Token::ParenthesisBlock
      | Token::SquareBracketBlock
      | Token::CurlyBracketBlock => parser.parse_nested_block(|nested| loop {
        let start = nested.position().byte_index();
        let token = match nested.next_including_whitespace_and_comments() {
          Ok(token) => token.clone(),
          Err(_) => return Ok(()),
        };
        self.check_token(nested, &token, start)?;
      }),
      _ => Ok(()),
    }
  }

  fn error<'t>(
    &self,
    parser: &Parser<'i, 't>,
    offset: usize,
    message: &'static str,
  ) -> ParseError<'i, StylesheetError> {
    let offset = offset.min(self.css.len());
    let preceding = &self.css[..offset];
    let line = preceding.matches('\n').count() + 1;
    let line_start = preceding.rfind('\n').map_or(0, |index| index + 1);
    let column = preceding[line_start..].chars().count() + 1;

    parser.new_custom_error(StylesheetError::Syntax {
      message,
      line,
      column,
    })
  }
}

/// Whether a quoted string token ends with its own, unescaped, quote
fn is_closed_string(source: &str) -> bool {
  let Some(quote) = source.chars().next() else {
    return false;
  };
  let Some(inner) = source[1..].strip_suffix(quote) else {
    return false;
  };
  let backslashes = inner.len() - inner.trim_end_matches('\\').len();
  backslashes % 2 == 0
}
