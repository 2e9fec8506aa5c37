//! Computes which declaration of a set of stylesheets wins for an element.
//!
//! Used to check emitted CSS without a browser: nested rules are flattened the way CSS
//! nesting defines them and declarations are ranked by importance, then specificity,
//! then source order. At-rule blocks are skipped.

use std::collections::BTreeMap;

use crate::specificity::{split_top_level, ElementPath, Selector, SelectorError, Specificity};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CascadeError {
  #[error(transparent)]
  Selector(#[from] SelectorError),
  #[error("invalid declaration `{0}`")]
  InvalidDeclaration(String),
  #[error("unexpected `}}`")]
  UnexpectedBrace,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CssDeclaration {
  /// Lowercased property name
  pub property: String,
  pub value: String,
  pub important: bool,
}

/// A style rule with nesting resolved into its selectors.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatRule {
  pub selectors: Vec<Selector>,
  pub declarations: Vec<CssDeclaration>,
}

/// Parse a stylesheet into flat rules, parents before the rules nested in them.
pub fn parse_stylesheet(css: &str) -> Result<Vec<FlatRule>, CascadeError> {
  let mut parser = StylesheetParser {
    chars: css.chars().collect(),
    position: 0,
    rules: Vec::new(),
  };
  parser.parse_block(None)?;
  Ok(parser.rules)
}

/// The value a property cascades to, and the rule it comes from.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadedValue {
  pub value: String,
  /// The matching selector of the winning rule
  pub selector: String,
  pub specificity: Specificity,
  pub important: bool,
}

/// Fields in comparison order, a greater priority wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CascadePriority {
  important: bool,
  specificity: Specificity,
  sheet: usize,
  rule: usize,
  declaration: usize,
}

/// Cascaded value of every property set on the last element of `path` by `sheets`,
/// which are applied in order.
pub fn computed_style(
  sheets: &[&str],
  path: &ElementPath,
) -> Result<BTreeMap<String, CascadedValue>, CascadeError> {
  let mut winners: BTreeMap<String, (CascadePriority, CascadedValue)> = BTreeMap::new();

  for (sheet, css) in sheets.iter().enumerate() {
    for (rule_index, rule) in parse_stylesheet(css)?.iter().enumerate() {
      let Some(selector) = rule
        .selectors
        .iter()
        .filter(|selector| selector.matches(path))
        .max_by_key(|selector| selector.specificity())
      else {
        continue;
      };

      for (declaration_index, declaration) in rule.declarations.iter().enumerate() {
        let priority = CascadePriority {
          important: declaration.important,
          specificity: selector.specificity(),
          sheet,
          rule: rule_index,
          declaration: declaration_index,
        };

        let wins = winners
          .get(&declaration.property)
          .map_or(true, |(current, _)| priority > *current);
        if wins {
          winners.insert(
            declaration.property.clone(),
            (
              priority,
              CascadedValue {
                value: declaration.value.clone(),
                selector: selector.source.clone(),
                specificity: priority.specificity,
                important: declaration.important,
              },
            ),
          );
        }
      }
    }
  }

  Ok(
    winners
      .into_iter()
      .map(|(property, (_, value))| (property, value))
      .collect(),
  )
}

struct StylesheetParser {
  chars: Vec<char>,
  position: usize,
  rules: Vec<FlatRule>,
}

enum Terminator {
  Semicolon,
  OpenBrace,
  CloseBrace,
  End,
}

impl StylesheetParser {
  fn peek(&self) -> Option<char> {
    self.chars.get(self.position).copied()
  }

  /// Parse items until the end of the enclosing block. `parents` are the resolved
  /// selectors of the enclosing style rule, if any.
  fn parse_block(
    &mut self,
    parents: Option<&[String]>,
  ) -> Result<Vec<CssDeclaration>, CascadeError> {
    let mut declarations = Vec::new();

    loop {
      let (prelude, terminator) = self.prelude();
      let prelude = prelude.trim();

      match terminator {
        Terminator::OpenBrace if prelude.starts_with('@') => self.skip_block(),
        Terminator::OpenBrace => {
          let selectors = resolve_nesting(prelude, parents);
          let parsed = selectors
            .iter()
            .map(|selector| Selector::parse(selector))
            .collect::<Result<Vec<_>, _>>()?;

          let index = self.rules.len();
          self.rules.push(FlatRule {
            selectors: parsed,
            declarations: Vec::new(),
          });
          let nested = self.parse_block(Some(selectors.as_slice()))?;
          if let Some(rule) = self.rules.get_mut(index) {
            rule.declarations = nested;
          }
        }
        Terminator::Semicolon | Terminator::CloseBrace | Terminator::End => {
          if !prelude.is_empty() && !prelude.starts_with('@') {
            if parents.is_none() {
              return Err(CascadeError::InvalidDeclaration(prelude.to_string()));
            }
            declarations.push(parse_declaration(prelude)?);
          }

          match terminator {
            Terminator::CloseBrace if parents.is_none() => {
              return Err(CascadeError::UnexpectedBrace);
            }
            Terminator::CloseBrace | Terminator::End => return Ok(declarations),
            _ => {}
          }
        }
      }
    }
  }

  /// Read up to the next `;`, `{` or `}` outside of strings, comments, parentheses and
  /// brackets, consuming the terminator. Comments are dropped.
  fn prelude(&mut self) -> (String, Terminator) {
    let mut prelude = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    while let Some(c) = self.peek() {
      self.position += 1;

      if let Some(open) = quote {
        prelude.push(c);
        if c == '\\' {
          if let Some(escaped) = self.peek() {
            prelude.push(escaped);
            self.position += 1;
          }
        } else if c == open {
          quote = None;
        }
        continue;
      }

      match c {
        '/' if self.peek() == Some('*') => self.skip_comment(),
        '"' | '\'' => {
          quote = Some(c);
          prelude.push(c);
        }
        '(' | '[' => {
          depth += 1;
          prelude.push(c);
        }
        ')' | ']' => {
          depth = depth.saturating_sub(1);
          prelude.push(c);
        }
        ';' if depth == 0 => return (prelude, Terminator::Semicolon),
        '{' if depth == 0 => return (prelude, Terminator::OpenBrace),
        '}' if depth == 0 => return (prelude, Terminator::CloseBrace),
        _ => prelude.push(c),
      }
    }

    (prelude, Terminator::End)
  }

  fn skip_comment(&mut self) {
    self.position += 1;
    let mut previous = '\0';
    while let Some(c) = self.peek() {
      self.position += 1;
      if previous == '*' && c == '/' {
        return;
      }
      previous = c;
    }
  }

  /// Skip the contents of a block whose `{` was just consumed.
  fn skip_block(&mut self) {
    let mut depth = 1usize;
    loop {
      let (_, terminator) = self.prelude();
      match terminator {
        Terminator::OpenBrace => depth += 1,
        Terminator::CloseBrace => {
          depth -= 1;
          if depth == 0 {
            return;
          }
        }
        Terminator::Semicolon => {}
        Terminator::End => return,
      }
    }
  }
}

/// Turn the selector list of a nested rule into absolute selectors. `&` stands for the
/// parent selectors, a selector without `&` is relative to them.
fn resolve_nesting(prelude: &str, parents: Option<&[String]>) -> Vec<String> {
  let selectors = split_top_level(prelude, ',')
    .into_iter()
    .map(str::trim)
    .filter(|selector| !selector.is_empty());

  let parent = match parents {
    None => return selectors.map(String::from).collect(),
    Some([single]) => single.clone(),
    Some(parents) => format!(":is({})", parents.join(", ")),
  };

  selectors
    .map(|selector| {
      if selector.contains('&') {
        selector.replace('&', &parent)
      } else {
        format!("{parent} {selector}")
      }
    })
    .collect()
}

fn parse_declaration(text: &str) -> Result<CssDeclaration, CascadeError> {
  let Some((property, value)) = text.split_once(':') else {
    return Err(CascadeError::InvalidDeclaration(text.to_string()));
  };
  let property = property.trim();
  if property.is_empty() {
    return Err(CascadeError::InvalidDeclaration(text.to_string()));
  }

  let value = value.trim();
  let (value, important) = match value.rfind('!') {
    Some(bang) if value[bang + 1..].trim().eq_ignore_ascii_case("important") => {
      (value[..bang].trim_end(), true)
    }
    _ => (value, false),
  };

  Ok(CssDeclaration {
    property: property.to_ascii_lowercase(),
    value: value.to_string(),
    important,
  })
}
