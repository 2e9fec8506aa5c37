//! Selector parsing, specificity and matching against an element's ancestry.
//!
//! Only what is needed to reason about emitted stylesheets is supported: type, class,
//! id, attribute, pseudo-class and pseudo-element selectors, the four combinators and
//! the `:is()`, `:where()`, `:not()` and `:has()` functional pseudo-classes.
//!
//! Specificity follows <https://www.w3.org/TR/selectors-4/#specificity-rules>.

use std::collections::BTreeMap;
use std::ops::Add;

/// Specificity triple `(ids, classes, types)`, ordered the way the cascade compares it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u16, pub u16, pub u16);

impl Add for Specificity {
  type Output = Specificity;

  fn add(self, other: Specificity) -> Specificity {
    Specificity(
      self.0.saturating_add(other.0),
      self.1.saturating_add(other.1),
      self.2.saturating_add(other.2),
    )
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
  /// `a b`
  Descendant,
  /// `a > b`
  Child,
  /// `a + b`
  NextSibling,
  /// `a ~ b`
  SubsequentSibling,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SimpleSelector {
  Universal,
  Type(String),
  Class(String),
  Id(String),
  Attribute {
    name: String,
    /// `=`, `~=`, `|=`, `^=`, `$=` or `*=`
    operator: Option<String>,
    value: Option<String>,
  },
  /// `:hover`, `:nth-child(2n)`
  PseudoClass { name: String, argument: Option<String> },
  /// `:is()`, `:where()`, `:not()`, `:has()`
  Logical { name: String, arguments: Vec<Selector> },
  PseudoElement(String),
}

impl SimpleSelector {
  fn specificity(&self) -> Specificity {
    match self {
      SimpleSelector::Universal => Specificity::default(),
      SimpleSelector::Type(_) | SimpleSelector::PseudoElement(_) => Specificity(0, 0, 1),
      SimpleSelector::Class(_)
      | SimpleSelector::Attribute { .. }
      | SimpleSelector::PseudoClass { .. } => Specificity(0, 1, 0),
      SimpleSelector::Id(_) => Specificity(1, 0, 0),
      SimpleSelector::Logical { name, .. } if name == "where" => Specificity::default(),
      SimpleSelector::Logical { arguments, .. } => arguments
        .iter()
        .map(Selector::specificity)
        .max()
        .unwrap_or_default(),
    }
  }

  fn matches(&self, path: &[Element], index: usize) -> bool {
    let Some(element) = path.get(index) else {
      return false;
    };

    match self {
      SimpleSelector::Universal => true,
      SimpleSelector::Type(tag) => element.tag.eq_ignore_ascii_case(tag),
      SimpleSelector::Class(class) => element.classes.iter().any(|candidate| candidate == class),
      SimpleSelector::Id(id) => element.id.as_deref() == Some(id.as_str()),
      SimpleSelector::Attribute {
        name,
        operator,
        value,
      } => match (element.attributes.get(name), operator.as_deref(), value) {
        (None, _, _) => false,
        (Some(_), None, _) | (Some(_), _, None) => true,
        (Some(actual), Some(operator), Some(expected)) => match operator {
          "=" => actual == expected,
          "~=" => actual.split_whitespace().any(|word| word == expected),
          "|=" => actual == expected || actual.starts_with(&format!("{expected}-")),
          "^=" => actual.starts_with(expected.as_str()),
          "$=" => actual.ends_with(expected.as_str()),
          "*=" => actual.contains(expected.as_str()),
          _ => false,
        },
      },
      SimpleSelector::PseudoClass { name, argument } => match (name.as_str(), argument) {
        ("root", None) => index == 0,
        (state, None) => element.states.iter().any(|candidate| candidate == state),
        // Sibling positions are unknown
        (_, Some(_)) => false,
      },
      SimpleSelector::Logical { name, arguments } => {
        let scope = &path[..=index];
        match name.as_str() {
          "is" | "where" | "matches" => arguments
            .iter()
            .any(|argument| argument.matches_slice(scope)),
          "not" => !arguments.iter().any(|argument| argument.matches_slice(scope)),
          // Descendants are unknown
          _ => false,
        }
      }
      SimpleSelector::PseudoElement(_) => false,
    }
  }
}

/// Simple selectors not separated by a combinator, eg. `button.primary:hover`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompoundSelector {
  pub simples: Vec<SimpleSelector>,
}

impl CompoundSelector {
  pub fn specificity(&self) -> Specificity {
    self
      .simples
      .iter()
      .map(SimpleSelector::specificity)
      .fold(Specificity::default(), Add::add)
  }

  fn matches(&self, path: &[Element], index: usize) -> bool {
    self.simples.iter().all(|simple| simple.matches(path, index))
  }
}

/// A complex selector: compounds joined by combinators, read left to right.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
  /// Text the selector was parsed from
  pub source: String,
  pub compounds: Vec<CompoundSelector>,
  /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
  pub combinators: Vec<Combinator>,
}

impl Selector {
  pub fn parse(text: &str) -> Result<Selector, SelectorError> {
    SelectorParser::new(text).parse()
  }

  pub fn specificity(&self) -> Specificity {
    self
      .compounds
      .iter()
      .map(CompoundSelector::specificity)
      .fold(Specificity::default(), Add::add)
  }

  /// Whether the last element of `path` is matched, given its ancestors.
  pub fn matches(&self, path: &ElementPath) -> bool {
    self.matches_slice(&path.elements)
  }

  fn matches_slice(&self, path: &[Element]) -> bool {
    match (self.compounds.len().checked_sub(1), path.len().checked_sub(1)) {
      (Some(compound), Some(element)) => self.matches_from(path, compound, element),
      _ => false,
    }
  }

  fn matches_from(&self, path: &[Element], compound: usize, element: usize) -> bool {
    let Some(selector) = self.compounds.get(compound) else {
      return false;
    };
    if !selector.matches(path, element) {
      return false;
    }
    if compound == 0 {
      return true;
    }

    match self.combinators.get(compound - 1) {
      Some(Combinator::Child) => {
        element > 0 && self.matches_from(path, compound - 1, element - 1)
      }
      Some(Combinator::Descendant) => {
        (0..element).rev().any(|ancestor| self.matches_from(path, compound - 1, ancestor))
      }
      // Only the ancestry is known
      Some(Combinator::NextSibling) | Some(Combinator::SubsequentSibling) | None => false,
    }
  }
}

/// Parse a comma separated selector list.
pub fn parse_selector_list(text: &str) -> Result<Vec<Selector>, SelectorError> {
  split_top_level(text, ',')
    .into_iter()
    .map(Selector::parse)
    .collect()
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("invalid selector `{selector}`: {message}")]
pub struct SelectorError {
  pub selector: String,
  pub message: String,
}

/// One element of a document, as far as selector matching is concerned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
  pub tag: String,
  pub id: Option<String>,
  pub classes: Vec<String>,
  pub attributes: BTreeMap<String, String>,
  /// Active user action pseudo-classes, eg. `hover`
  pub states: Vec<String>,
}

impl Element {
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      ..Default::default()
    }
  }

  pub fn with_class(mut self, class: impl Into<String>) -> Self {
    self.classes.push(class.into());
    self
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.attributes.insert(name.into(), value.into());
    self
  }

  pub fn with_state(mut self, state: impl Into<String>) -> Self {
    self.states.push(state.into());
    self
  }
}

/// An element and its ancestors, root first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementPath {
  pub elements: Vec<Element>,
}

impl ElementPath {
  pub fn new(root: Element) -> Self {
    Self {
      elements: vec![root],
    }
  }

  pub fn child(mut self, element: Element) -> Self {
    self.elements.push(element);
    self
  }
}

/// Split `text` at every `separator` outside of strings, parentheses and brackets.
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<&str> {
  let mut parts = Vec::new();
  let mut depth = 0usize;
  let mut quote: Option<char> = None;
  let mut escaped = false;
  let mut start = 0;

  for (index, c) in text.char_indices() {
    if escaped {
      escaped = false;
      continue;
    }
    match (quote, c) {
      (_, '\\') => escaped = true,
      (Some(open), c) if c == open => quote = None,
      (Some(_), _) => {}
      (None, '"' | '\'') => quote = Some(c),
      (None, '(' | '[') => depth += 1,
      (None, ')' | ']') => depth = depth.saturating_sub(1),
      (None, c) if c == separator && depth == 0 => {
        parts.push(&text[start..index]);
        start = index + c.len_utf8();
      }
      _ => {}
    }
  }
  parts.push(&text[start..]);
  parts
}

struct SelectorParser<'a> {
  source: &'a str,
  chars: Vec<char>,
  position: usize,
}

impl<'a> SelectorParser<'a> {
  fn new(text: &'a str) -> Self {
    let source = text.trim();
    Self {
      source,
      chars: source.chars().collect(),
      position: 0,
    }
  }

  fn error(&self, message: impl Into<String>) -> SelectorError {
    SelectorError {
      selector: self.source.to_string(),
      message: message.into(),
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.position).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek();
    self.position += 1;
    c
  }

  fn skip_whitespace(&mut self) -> bool {
    let start = self.position;
    while self.peek().is_some_and(char::is_whitespace) {
      self.position += 1;
    }
    self.position > start
  }

  fn parse(mut self) -> Result<Selector, SelectorError> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();

    loop {
      let had_whitespace = self.skip_whitespace();
      if self.peek().is_none() {
        break;
      }

      let combinator = match self.peek() {
        Some('>') => Some(Combinator::Child),
        Some('+') => Some(Combinator::NextSibling),
        Some('~') => Some(Combinator::SubsequentSibling),
        _ => None,
      };
      if combinator.is_some() {
        self.bump();
        self.skip_whitespace();
      }

      if compounds.is_empty() {
        if combinator.is_some() {
          return Err(self.error("selector starts with a combinator"));
        }
      } else if combinator.is_some() || had_whitespace {
        combinators.push(combinator.unwrap_or(Combinator::Descendant));
      } else {
        return Err(self.error(format!("unexpected `{}`", self.peek().unwrap_or(' '))));
      }

      let compound = self.parse_compound()?;
      if compound.simples.is_empty() {
        return Err(match self.peek() {
          Some(c) => self.error(format!("unexpected `{c}`")),
          None => self.error("expected a selector after the combinator"),
        });
      }
      compounds.push(compound);
    }

    if compounds.is_empty() {
      return Err(self.error("empty selector"));
    }

    Ok(Selector {
      source: self.source.to_string(),
      compounds,
      combinators,
    })
  }

  fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
    let mut simples = Vec::new();

    while let Some(c) = self.peek() {
      let simple = match c {
        '*' => {
          self.bump();
          SimpleSelector::Universal
        }
        '.' => {
          self.bump();
          SimpleSelector::Class(self.required_identifier("class name")?)
        }
        '#' => {
          self.bump();
          SimpleSelector::Id(self.required_identifier("id")?)
        }
        '[' => {
          self.bump();
          self.parse_attribute()?
        }
        ':' => {
          self.bump();
          self.parse_pseudo()?
        }
        '&' => return Err(self.error("nesting selector outside of a nested rule")),
        c if is_identifier_start(c) => {
          SimpleSelector::Type(self.identifier().to_ascii_lowercase())
        }
        _ => break,
      };
      simples.push(simple);
    }

    Ok(CompoundSelector { simples })
  }

  fn identifier(&mut self) -> String {
    let mut identifier = String::new();
    while let Some(c) = self.peek() {
      if c == '\\' {
        self.bump();
        if let Some(escaped) = self.bump() {
          identifier.push(escaped);
        }
      } else if is_identifier_char(c) {
        identifier.push(c);
        self.bump();
      } else {
        break;
      }
    }
    identifier
  }

  fn required_identifier(&mut self, what: &str) -> Result<String, SelectorError> {
    let identifier = self.identifier();
    if identifier.is_empty() {
      return Err(self.error(format!("expected {what}")));
    }
    Ok(identifier)
  }

  /// Everything up to the `closing` character matching the one just consumed.
  fn balanced(&mut self, opening: char, closing: char) -> Result<String, SelectorError> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut content = String::new();

    while let Some(c) = self.bump() {
      match (quote, c) {
        (_, '\\') => {
          content.push(c);
          if let Some(escaped) = self.bump() {
            content.push(escaped);
          }
          continue;
        }
        (Some(open), c) if c == open => quote = None,
        (Some(_), _) => {}
        (None, '"' | '\'') => quote = Some(c),
        (None, c) if c == opening => depth += 1,
        (None, c) if c == closing => {
          depth -= 1;
          if depth == 0 {
            return Ok(content);
          }
        }
        _ => {}
      }
      content.push(c);
    }

    Err(self.error(format!("missing `{closing}`")))
  }

  fn parse_attribute(&mut self) -> Result<SimpleSelector, SelectorError> {
    let content = self.balanced('[', ']')?;
    let operator_start = content.find(['=', '~', '|', '^', '$', '*']);

    let Some(start) = operator_start else {
      let name = content.trim();
      if name.is_empty() {
        return Err(self.error("empty attribute selector"));
      }
      return Ok(SimpleSelector::Attribute {
        name: name.to_string(),
        operator: None,
        value: None,
      });
    };

    let Some(equals) = content[start..].find('=').map(|offset| start + offset) else {
      return Err(self.error("invalid attribute selector"));
    };
    let mut value = content[equals + 1..].trim();
    // Case sensitivity flag, eg. `[type="a" i]`
    if let Some((head, flag)) = value.rsplit_once(char::is_whitespace) {
      if flag.eq_ignore_ascii_case("i") || flag.eq_ignore_ascii_case("s") {
        value = head.trim_end();
      }
    }
    let value = value
      .strip_prefix('"')
      .and_then(|value| value.strip_suffix('"'))
      .or_else(|| value.strip_prefix('\'').and_then(|value| value.strip_suffix('\'')))
      .unwrap_or(value);

    Ok(SimpleSelector::Attribute {
      name: content[..start].trim().to_string(),
      operator: Some(content[start..=equals].to_string()),
      value: Some(value.to_string()),
    })
  }

  fn parse_pseudo(&mut self) -> Result<SimpleSelector, SelectorError> {
    if self.peek() == Some(':') {
      self.bump();
      let name = self.required_identifier("pseudo-element")?;
      if self.peek() == Some('(') {
        self.bump();
        self.balanced('(', ')')?;
      }
      return Ok(SimpleSelector::PseudoElement(name.to_ascii_lowercase()));
    }

    let name = self.required_identifier("pseudo-class")?.to_ascii_lowercase();
    if matches!(
      name.as_str(),
      "before" | "after" | "first-line" | "first-letter"
    ) {
      return Ok(SimpleSelector::PseudoElement(name));
    }

    if self.peek() != Some('(') {
      return Ok(SimpleSelector::PseudoClass {
        name,
        argument: None,
      });
    }
    self.bump();
    let argument = self.balanced('(', ')')?;

    match name.as_str() {
      "is" | "where" | "not" | "has" | "matches" => {
        let arguments = split_top_level(&argument, ',')
          .into_iter()
          .map(|argument| {
            // `:has()` takes relative selectors
            let argument = argument.trim_start_matches(['>', '+', '~']);
            Selector::parse(argument)
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(SimpleSelector::Logical { name, arguments })
      }
      _ => Ok(SimpleSelector::PseudoClass {
        name,
        argument: Some(argument.trim().to_string()),
      }),
    }
  }
}

fn is_identifier_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_identifier_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn specificity(selector: &str) -> Specificity {
    Selector::parse(selector).unwrap().specificity()
  }

  fn toolbar_path() -> ElementPath {
    ElementPath::new(Element::new("body"))
      .child(Element::new("div").with_class("Toolbar-1").with_id("main"))
      .child(
        Element::new("button")
          .with_class("Button-1")
          .with_attribute("type", "submit")
          .with_state("hover"),
      )
  }

  fn matches(selector: &str) -> bool {
    Selector::parse(selector).unwrap().matches(&toolbar_path())
  }

  #[test]
  fn test_specificity() {
    assert_eq!(specificity("*"), Specificity(0, 0, 0));
    assert_eq!(specificity("button"), Specificity(0, 0, 1));
    assert_eq!(specificity(".Button-1"), Specificity(0, 1, 0));
    assert_eq!(specificity(".Toolbar-1 > .Button-1"), Specificity(0, 2, 0));
    assert_eq!(specificity("#main .a:hover::before"), Specificity(1, 2, 1));
    assert_eq!(specificity("a[href]"), Specificity(0, 1, 1));
    assert_eq!(specificity(":is(.a, #b) span"), Specificity(1, 0, 1));
    assert_eq!(specificity(":where(.a, #b) span"), Specificity(0, 0, 1));
    assert_eq!(specificity(":not(.a.b)"), Specificity(0, 2, 0));
    assert_eq!(specificity("li:nth-child(2n + 1)"), Specificity(0, 1, 1));
  }

  #[test]
  fn test_two_classes_outrank_one() {
    assert!(specificity(".Toolbar-1 > .Button-1") > specificity(".Button-1"));
    assert!(specificity("#x") > specificity(".a.b.c.d.e.f.g.h.i.j.k"));
  }

  #[test]
  fn test_matching() {
    assert!(matches(".Button-1"));
    assert!(matches("button.Button-1"));
    assert!(matches(".Toolbar-1 > .Button-1"));
    assert!(matches("body .Button-1"));
    assert!(matches("body > div > button"));
    assert!(matches("#main button[type=submit]"));
    assert!(matches("[type^='sub']:hover"));
    assert!(matches(":is(.Toolbar-1, .Other) > :not(.Disabled)"));
    assert!(matches(":root .Button-1"));

    assert!(!matches("body > .Button-1"));
    assert!(!matches(".Other .Button-1"));
    assert!(!matches(".Button-1:focus"));
    assert!(!matches(".Button-1::before"));
    assert!(!matches(".Toolbar-1 + .Button-1"));
    assert!(!matches(":root > .Button-1"));
  }

  #[test]
  fn test_selector_list() {
    let selectors = parse_selector_list(".a, .b > .c,:is(.d, .e)").unwrap();
    let sources: Vec<&str> = selectors
      .iter()
      .map(|selector| selector.source.as_str())
      .collect();
    assert_eq!(sources, vec![".a", ".b > .c", ":is(.d, .e)"]);
  }

  #[test]
  fn test_escaped_class() {
    let selector = Selector::parse(r".sm\:flex").unwrap();
    assert_eq!(
      selector.compounds[0].simples,
      vec![SimpleSelector::Class("sm:flex".into())]
    );
  }

  #[test]
  fn test_invalid_selectors() {
    assert!(Selector::parse("").is_err());
    assert!(Selector::parse("> .a").is_err());
    assert!(Selector::parse(".a >").is_err());
    assert!(Selector::parse("..a").is_err());
    assert!(Selector::parse("& .a").is_err());
    assert!(Selector::parse(".a:is(.b").is_err());
  }
}
