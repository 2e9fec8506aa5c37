use std::collections::{HashMap, HashSet};

use crate::config::ExtractConfig;
use crate::errors::{ComposeError, ComposeErrorKind};
use crate::types::{Declaration, DeclarationId, GeneratedClass};

/// Assigns class names to the declarations of a module.
///
/// The hashed part only depends on the module path and the ordinal of the declaration,
/// never on the CSS it contains, so editing a rule keeps its class (and every selector
/// other modules build from it) stable.
pub struct ClassNameGenerator<'a> {
  config: &'a ExtractConfig,
}

impl<'a> ClassNameGenerator<'a> {
  pub fn new(config: &'a ExtractConfig) -> Self {
    Self { config }
  }

  /// One class per declaration, in the same order. Names are unique within the module.
  pub fn generate(&self, declarations: &[Declaration]) -> Vec<GeneratedClass> {
    let mut taken = HashSet::with_capacity(declarations.len());

    declarations
      .iter()
      .map(|declaration| {
        let name = disambiguate(
          self.base_name(&declaration.id, &declaration.display_name),
          &mut taken,
        );
        tracing::debug!(declaration = %declaration.id, class = %name, "Assigned class");
        GeneratedClass {
          declaration_id: declaration.id.clone(),
          name,
          location: declaration.location,
        }
      })
      .collect()
  }

  fn base_name(&self, id: &DeclarationId, display_name: &str) -> String {
    let hash = turf_hash::hash(&format!("{}:{}", id.module, id.ordinal), self.config.hash_seed);
    let prefix = self.config.class_name_prefix.as_deref().unwrap_or_default();

    let name = if self.config.readable_class_names {
      format!("{prefix}{display_name}-{hash}")
    } else {
      format!("{prefix}_{hash}")
    };
    to_css_identifier(&name)
  }
}

/// Append `-1`, `-2`, ... until `name` is not taken, then take it.
fn disambiguate(name: String, taken: &mut HashSet<String>) -> String {
  let mut candidate = name.clone();
  let mut suffix = 0;
  while taken.contains(&candidate) {
    suffix += 1;
    candidate = format!("{name}-{suffix}");
  }
  taken.insert(candidate.clone());
  candidate
}

/// Replace characters that would need escaping in a class selector.
fn to_css_identifier(name: &str) -> String {
  let mut identifier: String = name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
        c
      } else {
        '_'
      }
    })
    .collect();

  let mut chars = identifier.chars();
  let needs_escape = match (chars.next(), chars.next()) {
    (None, _) => true,
    (Some(first), _) if first.is_ascii_digit() => true,
    (Some('-'), Some(second)) if second.is_ascii_digit() => true,
    (Some('-'), None) => true,
    _ => false,
  };
  if needs_escape {
    identifier.insert(0, '_');
  }
  identifier
}

/// Every class of a build, keyed by declaration. Built once, then only read.
#[derive(Debug, Default)]
pub struct ClassRegistry {
  by_declaration: HashMap<DeclarationId, GeneratedClass>,
  by_name: HashMap<String, DeclarationId>,
}

impl ClassRegistry {
  /// Register a class, rejecting a name already held by another declaration.
  pub fn insert(&mut self, class: GeneratedClass) -> Result<(), ComposeError> {
    if let Some(other) = self.by_name.get(&class.name) {
      if *other != class.declaration_id {
        return Err(ComposeError {
          id: class.declaration_id.clone(),
          location: class.location,
          kind: ComposeErrorKind::DuplicateClass {
            name: class.name.clone(),
            other: other.clone(),
          },
        });
      }
    }

    self
      .by_name
      .insert(class.name.clone(), class.declaration_id.clone());
    self
      .by_declaration
      .insert(class.declaration_id.clone(), class);
    Ok(())
  }

  pub fn get(&self, id: &DeclarationId) -> Option<&GeneratedClass> {
    self.by_declaration.get(id)
  }

  pub fn len(&self) -> usize {
    self.by_declaration.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_declaration.is_empty()
  }
}

impl FromIterator<GeneratedClass> for ClassRegistry {
  /// Collects classes that are known to be unique, eg. the output of one generator run.
  fn from_iter<T: IntoIterator<Item = GeneratedClass>>(iter: T) -> Self {
    let mut registry = ClassRegistry::default();
    for class in iter {
      registry
        .by_name
        .insert(class.name.clone(), class.declaration_id.clone());
      registry
        .by_declaration
        .insert(class.declaration_id.clone(), class);
    }
    registry
  }
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use turf_swc_runner::test_utils::parse_test_module;

  use super::*;
  use crate::scanner::scan_module;
  use crate::types::SourceLocation;

  fn classes(path: &str, code: &str, config: &ExtractConfig) -> Vec<String> {
    let source = parse_test_module(path, code);
    let scanned = scan_module(&source, config).unwrap();
    ClassNameGenerator::new(config)
      .generate(&scanned.declarations)
      .into_iter()
      .map(|class| class.name)
      .collect()
  }

  const TWO_DECLARATIONS: &str = indoc! {r#"
    import styled from 'astroturf';
    export const Title = styled.h1`font-size: 2em;`;
    export const Body = styled.p`font-size: 1em;`;
  "#};

  #[test]
  fn test_names_are_readable_and_unique() {
    let names = classes("src/Card.js", TWO_DECLARATIONS, &ExtractConfig::default());

    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(names[0].starts_with("Title-"));
    assert!(names[1].starts_with("Body-"));
    assert_eq!(
      names[0],
      format!("Title-{}", turf_hash::hash("src/Card.js:0", 0))
    );
  }

  #[test]
  fn test_names_are_deterministic() {
    let config = ExtractConfig::default();
    assert_eq!(
      classes("src/Card.js", TWO_DECLARATIONS, &config),
      classes("src/Card.js", TWO_DECLARATIONS, &config)
    );
  }

  #[test]
  fn test_names_ignore_style_content() {
    let config = ExtractConfig::default();
    let edited = TWO_DECLARATIONS.replace("2em", "3em").replace("1em", "0.5em");
    assert_eq!(
      classes("src/Card.js", TWO_DECLARATIONS, &config),
      classes("src/Card.js", &edited, &config)
    );
  }

  #[test]
  fn test_names_depend_on_module_path() {
    let config = ExtractConfig::default();
    assert_ne!(
      classes("src/Card.js", TWO_DECLARATIONS, &config),
      classes("src/other/Card.js", TWO_DECLARATIONS, &config)
    );
  }

  #[test]
  fn test_unrelated_code_does_not_rename() {
    let config = ExtractConfig::default();
    let with_code = TWO_DECLARATIONS.replace(
      "export const Title",
      "const unrelated = compute();\nfunction helper() { return 1; }\nexport const Title",
    );
    assert_eq!(
      classes("src/Card.js", TWO_DECLARATIONS, &config),
      classes("src/Card.js", &with_code, &config)
    );
  }

  #[test]
  fn test_appending_a_declaration_does_not_rename() {
    let config = ExtractConfig::default();
    let appended = format!("{TWO_DECLARATIONS}export const Footer = styled.footer``;\n");
    let before = classes("src/Card.js", TWO_DECLARATIONS, &config);
    let after = classes("src/Card.js", &appended, &config);
    assert_eq!(&after[..2], &before[..]);
    assert_eq!(after.len(), 3);
  }

  #[test]
  fn test_inserting_earlier_renumbers_following_declarations() {
    // Ordinals are source-order indices: a declaration inserted first takes ordinal 0
    // and every following declaration moves to the next ordinal's hash.
    let config = ExtractConfig {
      readable_class_names: false,
      ..ExtractConfig::default()
    };
    let inserted = TWO_DECLARATIONS.replace(
      "export const Title",
      "export const Banner = styled.div``;\nexport const Title",
    );
    let before = classes("src/Card.js", TWO_DECLARATIONS, &config);
    let after = classes("src/Card.js", &inserted, &config);

    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[1]);
    // `Title` moved from ordinal 0 to ordinal 1
    assert_ne!(after[1], before[0]);
    assert_eq!(after[2], format!("_{}", turf_hash::hash("src/Card.js:2", 0)));
    assert_eq!(after.iter().collect::<HashSet<_>>().len(), 3);
  }

  #[test]
  fn test_prefix_and_seed() {
    let config = ExtractConfig {
      class_name_prefix: Some("app-".into()),
      hash_seed: 3,
      ..ExtractConfig::default()
    };
    let names = classes("src/Card.js", TWO_DECLARATIONS, &config);
    assert_eq!(
      names[0],
      format!("app-Title-{}", turf_hash::hash("src/Card.js:0", 3))
    );
  }

  #[test]
  fn test_disambiguate() {
    let mut taken = HashSet::new();
    assert_eq!(disambiguate("a-1x".into(), &mut taken), "a-1x");
    assert_eq!(disambiguate("a-1x".into(), &mut taken), "a-1x-1");
    assert_eq!(disambiguate("a-1x".into(), &mut taken), "a-1x-2");
  }

  #[test]
  fn test_to_css_identifier() {
    assert_eq!(to_css_identifier("Button-abc"), "Button-abc");
    assert_eq!(to_css_identifier("$Button-abc"), "_Button-abc");
    assert_eq!(to_css_identifier("1abc"), "_1abc");
    assert_eq!(to_css_identifier("-1abc"), "_-1abc");
    assert_eq!(to_css_identifier("app.Title"), "app_Title");
  }

  #[test]
  fn test_registry_rejects_duplicate_names() {
    let mut registry = ClassRegistry::default();
    registry
      .insert(GeneratedClass {
        declaration_id: DeclarationId::new("src/a.js", 0),
        name: "Same-1".into(),
        location: SourceLocation::default(),
      })
      .unwrap();

    let error = registry
      .insert(GeneratedClass {
        declaration_id: DeclarationId::new("src/b.js", 0),
        name: "Same-1".into(),
        location: SourceLocation::default(),
      })
      .unwrap_err();

    assert_eq!(error.id, DeclarationId::new("src/b.js", 0));
    assert_eq!(
      error.kind,
      ComposeErrorKind::DuplicateClass {
        name: "Same-1".into(),
        other: DeclarationId::new("src/a.js", 0)
      }
    );
    assert_eq!(registry.len(), 1);
  }
}
