use std::fmt;

use crate::types::{DeclarationId, SourceLocation};

/// The tag of a styled template does not name a statically known element or component.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{}:{location} (declaration #{}): {kind}", .id.module, .id.ordinal)]
pub struct ScanError {
  pub id: DeclarationId,
  pub location: SourceLocation,
  pub kind: ScanErrorKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScanErrorKind {
  /// The element or component is computed, eg. `styled[tag]` or `styled(getTag())`
  DynamicTarget(String),
  /// `styled` is used as a tag without naming what to style
  MissingTarget,
}

impl fmt::Display for ScanErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScanErrorKind::DynamicTarget(source) => write!(
        f,
        "the styled target `{source}` cannot be determined at build time"
      ),
      ScanErrorKind::MissingTarget => {
        write!(f, "`styled` must be called with an element or component")
      }
    }
  }
}

/// An interpolation could not be reduced to a literal value or a component reference.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error(
  "{}:{location} (declaration #{}): cannot interpolate `{expression}`: {reason}",
  .id.module,
  .id.ordinal
)]
pub struct ResolutionError {
  pub id: DeclarationId,
  pub location: SourceLocation,
  pub expression: String,
  pub reason: UnresolvableReason,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnresolvableReason {
  /// Not a literal nor an identifier, eg. a call or a conditional
  DynamicValue,
  /// The identifier is not declared at module scope
  UnknownBinding(String),
  /// The binding exists but holds neither a styled component nor a static literal
  NotStyled(String),
  /// The import specifier does not resolve to a module of this build
  UnresolvedImport(String),
  /// The imported module does not export the name
  MissingExport { module: String, name: String },
  /// A chain of re-exports leads back to itself
  ReExportCycle { module: String, name: String },
}

impl fmt::Display for UnresolvableReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnresolvableReason::DynamicValue => {
        write!(f, "only literals and styled component references are static")
      }
      UnresolvableReason::UnknownBinding(name) => write!(f, "`{name}` is not declared"),
      UnresolvableReason::NotStyled(name) => {
        write!(f, "`{name}` is neither a styled component nor a static literal")
      }
      UnresolvableReason::UnresolvedImport(specifier) => {
        write!(f, "import `{specifier}` is not part of this build")
      }
      UnresolvableReason::MissingExport { module, name } => {
        write!(f, "`{module}` has no export named `{name}`")
      }
      UnresolvableReason::ReExportCycle { module, name } => {
        write!(f, "re-exports of `{name}` from `{module}` form a cycle")
      }
    }
  }
}

/// Internal invariant violations while turning resolved declarations into CSS.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{}:{location} (declaration #{}): {kind}", .id.module, .id.ordinal)]
pub struct ComposeError {
  pub id: DeclarationId,
  pub location: SourceLocation,
  pub kind: ComposeErrorKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ComposeErrorKind {
  /// A referenced declaration was never assigned a class
  MissingClass(DeclarationId),
  /// Two declarations of the build were assigned the same class
  DuplicateClass { name: String, other: DeclarationId },
  /// An interpolation reached composition without being resolved
  UnresolvedSlot(String),
  /// `{` and `}` of the template body do not pair up
  UnbalancedBlock,
  /// The emitted stylesheet was rejected by the CSS processor
  Css(String),
}

impl fmt::Display for ComposeErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ComposeErrorKind::MissingClass(target) => {
        write!(f, "referenced declaration {target} has no generated class")
      }
      ComposeErrorKind::DuplicateClass { name, other } => {
        write!(f, "class `{name}` is already assigned to {other}")
      }
      ComposeErrorKind::UnresolvedSlot(source) => {
        write!(f, "interpolation `{source}` was never resolved")
      }
      ComposeErrorKind::UnbalancedBlock => write!(f, "unbalanced braces in style block"),
      ComposeErrorKind::Css(message) => write!(f, "invalid css: {message}"),
    }
  }
}

/// Styled declarations of several modules reference each other in a loop.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{module}: circular styled component references between {}", .cycle.join(", "))]
pub struct CycleError {
  pub module: String,
  /// Every module of the cycle, sorted
  pub cycle: Vec<String>,
}

/// A declaration references a styled component of a module that failed to extract, so
/// the class it would target is never emitted.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error(
  "{}:{location} (declaration #{}): `{dependency}` failed to extract",
  .id.module,
  .id.ordinal
)]
pub struct DependencyError {
  pub id: DeclarationId,
  pub location: SourceLocation,
  pub dependency: String,
}

/// Reasons a module fails to extract. A failed module produces no output at all.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ExtractError {
  #[error(transparent)]
  Scan(#[from] ScanError),
  #[error(transparent)]
  Resolution(#[from] ResolutionError),
  #[error(transparent)]
  Compose(#[from] ComposeError),
  #[error(transparent)]
  Cycle(#[from] CycleError),
  #[error(transparent)]
  Dependency(#[from] DependencyError),
  #[error("{module}: failed to print rewritten module: {message}")]
  Codegen { module: String, message: String },
}

impl ExtractError {
  /// Module the error belongs to.
  pub fn module(&self) -> &str {
    match self {
      ExtractError::Scan(error) => &error.id.module,
      ExtractError::Resolution(error) => &error.id.module,
      ExtractError::Compose(error) => &error.id.module,
      ExtractError::Cycle(error) => &error.module,
      ExtractError::Dependency(error) => &error.id.module,
      ExtractError::Codegen { module, .. } => module,
    }
  }

  /// Offending declaration, when the failure is attributable to one.
  pub fn declaration(&self) -> Option<&DeclarationId> {
    match self {
      ExtractError::Scan(error) => Some(&error.id),
      ExtractError::Resolution(error) => Some(&error.id),
      ExtractError::Compose(error) => Some(&error.id),
      ExtractError::Dependency(error) => Some(&error.id),
      ExtractError::Cycle(_) | ExtractError::Codegen { .. } => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_errors_display_identity() {
    let error = ExtractError::from(ResolutionError {
      id: DeclarationId::new("src/Toolbar.js", 2),
      location: SourceLocation { line: 7, column: 14 },
      expression: "props.color".into(),
      reason: UnresolvableReason::DynamicValue,
    });

    assert_eq!(
      error.to_string(),
      "src/Toolbar.js:7:14 (declaration #2): cannot interpolate `props.color`: \
       only literals and styled component references are static"
    );
    assert_eq!(error.module(), "src/Toolbar.js");
    assert_eq!(error.declaration(), Some(&DeclarationId::new("src/Toolbar.js", 2)));
  }

  #[test]
  fn test_cycle_error_lists_modules() {
    let error = ExtractError::from(CycleError {
      module: "src/A.js".into(),
      cycle: vec!["src/A.js".into(), "src/B.js".into()],
    });

    assert_eq!(
      error.to_string(),
      "src/A.js: circular styled component references between src/A.js, src/B.js"
    );
    assert_eq!(error.declaration(), None);
  }

  #[test]
  fn test_compose_and_dependency_errors_display_location() {
    let location = SourceLocation { line: 3, column: 22 };
    let compose = ExtractError::from(ComposeError {
      id: DeclarationId::new("src/Card.js", 1),
      location,
      kind: ComposeErrorKind::UnbalancedBlock,
    });
    assert_eq!(
      compose.to_string(),
      "src/Card.js:3:22 (declaration #1): unbalanced braces in style block"
    );

    let dependency = ExtractError::from(DependencyError {
      id: DeclarationId::new("src/Toolbar.js", 0),
      location,
      dependency: "src/Button.js".into(),
    });
    assert_eq!(
      dependency.to_string(),
      "src/Toolbar.js:3:22 (declaration #0): `src/Button.js` failed to extract"
    );
    assert_eq!(dependency.module(), "src/Toolbar.js");
  }
}
