use crate::class_names::ClassRegistry;
use crate::errors::{ComposeError, ComposeErrorKind};
use crate::types::{ComposedRule, InterpolationSlot, ResolvedDeclaration, TemplatePart};

/// Expands resolved declarations into CSS rules rooted at their own class.
pub struct SelectorComposer<'a> {
  classes: &'a ClassRegistry,
}

impl<'a> SelectorComposer<'a> {
  pub fn new(classes: &'a ClassRegistry) -> Self {
    Self { classes }
  }

  pub fn compose(&self, declaration: &ResolvedDeclaration) -> Result<ComposedRule, ComposeError> {
    let error = |kind| ComposeError {
      id: declaration.id.clone(),
      location: declaration.location,
      kind,
    };

    let own = self
      .classes
      .get(&declaration.id)
      .ok_or_else(|| error(ComposeErrorKind::MissingClass(declaration.id.clone())))?;

    let mut body = String::new();
    for part in &declaration.template {
      match part {
        TemplatePart::Text(text) => body.push_str(text),
        TemplatePart::Slot(InterpolationSlot::LiteralValue(value)) => body.push_str(value),
        TemplatePart::Slot(InterpolationSlot::ComponentReference { target, .. }) => {
          let class = self
            .classes
            .get(target)
            .ok_or_else(|| error(ComposeErrorKind::MissingClass(target.clone())))?;
          body.push_str(&class.selector());
        }
        TemplatePart::Slot(InterpolationSlot::Unresolvable { source, .. }) => {
          return Err(error(ComposeErrorKind::UnresolvedSlot(source.clone())));
        }
      }
    }

    if !is_balanced(&body) {
      return Err(error(ComposeErrorKind::UnbalancedBlock));
    }

    Ok(ComposedRule {
      declaration_id: declaration.id.clone(),
      selector_text: own.selector(),
      property_block: normalize_block(&body),
      source_order: declaration.id.ordinal,
      location: declaration.location,
    })
  }

  /// Compose every declaration of a module, failing on the first error.
  pub fn compose_all(
    &self,
    declarations: &[ResolvedDeclaration],
  ) -> Result<Vec<ComposedRule>, ComposeError> {
    declarations
      .iter()
      .map(|declaration| self.compose(declaration))
      .collect()
  }
}

/// Whether `{` and `}` pair up outside of strings and comments.
fn is_balanced(css: &str) -> bool {
  let mut depth = 0usize;
  let mut chars = css.chars().peekable();
  let mut quote: Option<char> = None;

  while let Some(c) = chars.next() {
    if let Some(open) = quote {
      match c {
        '\\' => {
          chars.next();
        }
        c if c == open => quote = None,
        _ => {}
      }
      continue;
    }

    match c {
      '"' | '\'' => quote = Some(c),
      '/' if chars.peek() == Some(&'*') => {
        chars.next();
        let mut previous = '\0';
        for c in chars.by_ref() {
          if previous == '*' && c == '/' {
            break;
          }
          previous = c;
        }
      }
      '{' => depth += 1,
      '}' => {
        if depth == 0 {
          return false;
        }
        depth -= 1;
      }
      _ => {}
    }
  }

  depth == 0 && quote.is_none()
}

/// Strip the indentation shared by every line, drop blank leading and trailing lines and
/// indent the result by two spaces.
fn normalize_block(body: &str) -> String {
  let lines: Vec<&str> = body.lines().map(str::trim_end).collect();
  let Some(first) = lines.iter().position(|line| !line.is_empty()) else {
    return String::new();
  };
  let last = lines
    .iter()
    .rposition(|line| !line.is_empty())
    .unwrap_or(first);
  let lines = &lines[first..=last];

  let indent = lines
    .iter()
    .filter(|line| !line.is_empty())
    .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
    .min()
    .unwrap_or(0);

  lines
    .iter()
    .map(|line| {
      if line.is_empty() {
        String::new()
      } else {
        format!("  {}", line.chars().skip(indent).collect::<String>())
      }
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::types::{DeclarationId, GeneratedClass, SourceLocation};

  fn registry() -> ClassRegistry {
    [
      GeneratedClass {
        declaration_id: DeclarationId::new("src/Button.js", 0),
        name: "Button-1x8f2k".into(),
        location: SourceLocation::default(),
      },
      GeneratedClass {
        declaration_id: DeclarationId::new("src/ButtonToolbar.js", 0),
        name: "ButtonToolbar-9qz1a0".into(),
        location: SourceLocation::default(),
      },
    ]
    .into_iter()
    .collect()
  }

  fn declaration(
    module: &str,
    template: Vec<TemplatePart<InterpolationSlot>>,
  ) -> ResolvedDeclaration {
    ResolvedDeclaration {
      id: DeclarationId::new(module, 0),
      display_name: "Test".into(),
      template,
      location: SourceLocation::default(),
    }
  }

  #[test]
  fn test_composes_nested_reference() {
    let classes = registry();
    let rule = SelectorComposer::new(&classes)
      .compose(&declaration(
        "src/ButtonToolbar.js",
        vec![
          TemplatePart::Text("\n  margin: 20px;\n\n  & > ".into()),
          TemplatePart::Slot(InterpolationSlot::ComponentReference {
            binding: "Button".into(),
            target: DeclarationId::new("src/Button.js", 0),
          }),
          TemplatePart::Text(" {\n    margin-left: ".into()),
          TemplatePart::Slot(InterpolationSlot::LiteralValue("30".into())),
          TemplatePart::Text("px;\n  }\n".into()),
        ],
      ))
      .unwrap();

    assert_eq!(rule.selector_text, ".ButtonToolbar-9qz1a0");
    assert_eq!(rule.source_order, 0);
    assert_eq!(
      rule.to_css(),
      indoc! {"
        .ButtonToolbar-9qz1a0 {
          margin: 20px;

          & > .Button-1x8f2k {
            margin-left: 30px;
          }
        }
      "}
    );
  }

  #[test]
  fn test_empty_template() {
    let classes = registry();
    let rule = SelectorComposer::new(&classes)
      .compose(&declaration("src/Button.js", vec![]))
      .unwrap();
    assert_eq!(rule.to_css(), ".Button-1x8f2k {}\n");
  }

  #[test]
  fn test_missing_reference_class() {
    let classes = registry();
    let missing = DeclarationId::new("src/Other.js", 3);
    let error = SelectorComposer::new(&classes)
      .compose(&declaration(
        "src/Button.js",
        vec![
          TemplatePart::Slot(InterpolationSlot::ComponentReference {
            binding: "Other".into(),
            target: missing.clone(),
          }),
          TemplatePart::Text(" { color: red; }".into()),
        ],
      ))
      .unwrap_err();

    assert_eq!(error.id, DeclarationId::new("src/Button.js", 0));
    assert_eq!(error.kind, ComposeErrorKind::MissingClass(missing));
  }

  #[test]
  fn test_missing_own_class() {
    let classes = registry();
    let error = SelectorComposer::new(&classes)
      .compose(&declaration("src/Unknown.js", vec![]))
      .unwrap_err();
    assert_eq!(
      error.kind,
      ComposeErrorKind::MissingClass(DeclarationId::new("src/Unknown.js", 0))
    );
  }

  #[test]
  fn test_unbalanced_block() {
    let classes = registry();
    let error = SelectorComposer::new(&classes)
      .compose(&declaration(
        "src/Button.js",
        vec![TemplatePart::Text("&:hover { color: red;".into())],
      ))
      .unwrap_err();
    assert_eq!(error.kind, ComposeErrorKind::UnbalancedBlock);
  }

  #[test]
  fn test_is_balanced_ignores_strings_and_comments() {
    assert!(is_balanced("content: '}'; /* { */ &:hover { color: red; }"));
    assert!(is_balanced(r#"content: "\"{";"#));
    assert!(!is_balanced("} {"));
    assert!(!is_balanced("a { b {}"));
  }

  #[test]
  fn test_normalize_block() {
    assert_eq!(normalize_block("color: red;"), "  color: red;");
    assert_eq!(normalize_block("\n\n   \n"), "");
    assert_eq!(
      normalize_block("\n    a: 1;\n      b: 2;   \n\n    c: 3;\n  "),
      "  a: 1;\n    b: 2;\n\n  c: 3;"
    );
  }
}
