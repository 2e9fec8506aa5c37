use std::fmt;

use swc_core::common::Span;
use swc_core::ecma::ast::{Expr, Id, Ident};
use swc_core::ecma::atoms::Atom;

use crate::errors::UnresolvableReason;

/// Identity of one styled declaration: the module it lives in and its position in
/// that module's source order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId {
  pub module: String,
  pub ordinal: u32,
}

impl DeclarationId {
  pub fn new(module: impl Into<String>, ordinal: u32) -> Self {
    Self {
      module: module.into(),
      ordinal,
    }
  }
}

impl fmt::Display for DeclarationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.module, self.ordinal)
  }
}

/// One-based line and column in the original source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation {
  pub line: usize,
  pub column: usize,
}

impl fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

/// What a styled declaration renders. Only statically known targets are representable.
#[derive(Clone, Debug, PartialEq)]
pub enum StyledTarget {
  /// `styled('div')`, `styled.div`
  HostElement(Atom),
  /// `styled(Button)`
  Component(Ident),
}

/// Where the styled result is stored.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
  /// `const Name = styled...`
  Local(Id),
  /// `export default styled...`
  ExportDefault,
  /// Not assigned to anything referencable
  Anonymous,
}

/// Literal CSS text or an interpolation slot, in template order.
#[derive(Clone, Debug, PartialEq)]
pub enum TemplatePart<S> {
  Text(String),
  Slot(S),
}

/// An interpolated expression exactly as it appears in the template.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSlot {
  pub expr: Box<Expr>,
  /// Source text of the expression, for diagnostics
  pub source: String,
  pub location: SourceLocation,
}

/// A styled tagged template found by the scanner.
#[derive(Clone, Debug)]
pub struct Declaration {
  pub id: DeclarationId,
  pub binding: Binding,
  /// Human readable name used for class names and hoisted constants
  pub display_name: String,
  pub target: StyledTarget,
  /// The `styled` identifier used as the tag
  pub tag: Ident,
  pub template: Vec<TemplatePart<RawSlot>>,
  /// Span of the whole tagged template expression
  pub span: Span,
  pub location: SourceLocation,
}

/// Classification of one interpolation slot.
#[derive(Clone, Debug, PartialEq)]
pub enum InterpolationSlot {
  /// Static text substituted verbatim
  LiteralValue(String),
  /// Another styled declaration, substituted by its generated selector
  ComponentReference { binding: String, target: DeclarationId },
  /// Anything that can only be known at runtime
  Unresolvable {
    source: String,
    reason: UnresolvableReason,
  },
}

/// A declaration whose slots are all either literal values or component references.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedDeclaration {
  pub id: DeclarationId,
  pub display_name: String,
  pub template: Vec<TemplatePart<InterpolationSlot>>,
  pub location: SourceLocation,
}

impl ResolvedDeclaration {
  /// Every declaration this one references, in template order.
  pub fn references(&self) -> impl Iterator<Item = &DeclarationId> {
    self.template.iter().filter_map(|part| match part {
      TemplatePart::Slot(InterpolationSlot::ComponentReference { target, .. }) => Some(target),
      _ => None,
    })
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeneratedClass {
  pub declaration_id: DeclarationId,
  pub name: String,
  /// Where the declaration starts
  pub location: SourceLocation,
}

impl GeneratedClass {
  pub fn selector(&self) -> String {
    format!(".{}", self.name)
  }
}

/// The CSS produced for one declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedRule {
  pub declaration_id: DeclarationId,
  /// Always the declaration's own class selector
  pub selector_text: String,
  /// Normalized body, nested rules included, one level of indentation
  pub property_block: String,
  pub source_order: u32,
  pub location: SourceLocation,
}

impl ComposedRule {
  pub fn to_css(&self) -> String {
    if self.property_block.is_empty() {
      return format!("{} {{}}\n", self.selector_text);
    }

    format!("{} {{\n{}\n}}\n", self.selector_text, self.property_block)
  }
}

/// The static stylesheet extracted from one module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stylesheet {
  pub module: String,
  /// Rules in ascending source order
  pub rules: Vec<ComposedRule>,
  pub css: String,
  /// Content-addressed artifact name, `<stem>.<hash>.css`
  pub file_name: String,
}

impl Stylesheet {
  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}
