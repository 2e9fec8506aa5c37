use std::collections::HashSet;
use std::path::Path;

use swc_core::common::{SourceMapper, Span, Spanned};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{Visit, VisitWith};
use turf_swc_runner::SourceModule;

use crate::config::ExtractConfig;
use crate::errors::{ScanError, ScanErrorKind};
use crate::symbols::{unwrap_expr, ModuleSymbols};
use crate::types::{
  Binding, Declaration, DeclarationId, RawSlot, SourceLocation, StyledTarget, TemplatePart,
};

/// Declarations and symbols of a scanned module.
#[derive(Clone, Debug)]
pub struct ScannedModule {
  pub path: String,
  /// In source order, `declarations[i].id.ordinal == i`
  pub declarations: Vec<Declaration>,
  pub symbols: ModuleSymbols,
}

/// Find every styled tagged template of a module.
///
/// Ordinals are assigned in a single pre-order traversal, so a declaration is numbered
/// before any declaration nested in its interpolations, and identical source always
/// yields identical ordinals.
#[tracing::instrument(level = "debug", skip_all, fields(module = %source.path))]
pub fn scan_module(
  source: &SourceModule,
  config: &ExtractConfig,
) -> Result<ScannedModule, ScanError> {
  let mut symbols = ModuleSymbols::collect(&source.module, config);

  let mut scanner = DeclarationScanner {
    source,
    styled_tags: &symbols.styled_tags,
    stem: module_stem(&source.path),
    pending_binding: None,
    declarations: Vec::new(),
    error: None,
  };
  source.module.visit_with(&mut scanner);

  if let Some(error) = scanner.error {
    return Err(error);
  }

  let declarations = scanner.declarations;
  symbols.bind_declarations(&declarations);
  tracing::debug!(count = declarations.len(), "Scanned styled declarations");

  Ok(ScannedModule {
    path: source.path.clone(),
    declarations,
    symbols,
  })
}

struct DeclarationScanner<'a> {
  source: &'a SourceModule,
  styled_tags: &'a HashSet<Id>,
  stem: String,
  /// Binding the next styled template found will be assigned to
  pending_binding: Option<Binding>,
  declarations: Vec<Declaration>,
  error: Option<ScanError>,
}

impl DeclarationScanner<'_> {
  fn next_ordinal(&self) -> u32 {
    self.declarations.len() as u32
  }

  fn is_styled_tag(&self, expr: &Expr) -> Option<Ident> {
    match unwrap_expr(expr) {
      Expr::Ident(ident) if self.styled_tags.contains(&ident.to_id()) => Some(ident.clone()),
      _ => None,
    }
  }

  /// `None` when the tag is not `styled` at all.
  fn match_tag(&self, tag: &Expr) -> Option<Result<(Ident, StyledTarget), ScanErrorKind>> {
    match unwrap_expr(tag) {
      Expr::Ident(_) => self
        .is_styled_tag(tag)
        .map(|_| Err(ScanErrorKind::MissingTarget)),
      Expr::Member(member) => {
        let styled = self.is_styled_tag(&member.obj)?;
        let target = match &member.prop {
          MemberProp::Ident(name) => Ok(StyledTarget::HostElement(name.sym.clone())),
          MemberProp::Computed(computed) => match unwrap_expr(&computed.expr) {
            Expr::Lit(Lit::Str(name)) => Ok(StyledTarget::HostElement(name.value.clone())),
            other => Err(ScanErrorKind::DynamicTarget(self.snippet(other.span()))),
          },
          MemberProp::PrivateName(name) => {
            Err(ScanErrorKind::DynamicTarget(self.snippet(name.span)))
          }
        };
        Some(target.map(|target| (styled, target)))
      }
      Expr::Call(call) => {
        let Callee::Expr(callee) = &call.callee else {
          return None;
        };
        let styled = self.is_styled_tag(callee)?;
        let Some(argument) = call.args.first() else {
          return Some(Err(ScanErrorKind::MissingTarget));
        };
        if argument.spread.is_some() {
          return Some(Err(ScanErrorKind::DynamicTarget(
            self.snippet(argument.expr.span()),
          )));
        }
        let target = match unwrap_expr(&argument.expr) {
          Expr::Lit(Lit::Str(name)) => Ok(StyledTarget::HostElement(name.value.clone())),
          Expr::Tpl(tpl) if tpl.exprs.is_empty() => {
            let name = tpl
              .quasis
              .first()
              .map(|quasi| quasi.cooked.clone().unwrap_or_else(|| quasi.raw.clone()))
              .unwrap_or_else(|| "".into());
            Ok(StyledTarget::HostElement(name))
          }
          Expr::Ident(component) => Ok(StyledTarget::Component(component.clone())),
          other => Err(ScanErrorKind::DynamicTarget(self.snippet(other.span()))),
        };
        Some(target.map(|target| (styled, target)))
      }
      _ => None,
    }
  }

  fn display_name(&self, binding: &Binding, ordinal: u32) -> String {
    match binding {
      Binding::Local(id) => id.0.to_string(),
      Binding::ExportDefault => self.stem.clone(),
      Binding::Anonymous => format!("{}_{}", self.stem, ordinal),
    }
  }

  fn location(&self, span: Span) -> SourceLocation {
    let loc = self.source.source_map.lookup_char_pos(span.lo);
    SourceLocation {
      line: loc.line,
      column: loc.col.0 + 1,
    }
  }

  fn snippet(&self, span: Span) -> String {
    self
      .source
      .source_map
      .span_to_snippet(span)
      .unwrap_or_default()
  }

  fn template_parts(&self, tpl: &Tpl) -> Vec<TemplatePart<RawSlot>> {
    let mut parts = Vec::with_capacity(tpl.quasis.len() + tpl.exprs.len());
    for (index, quasi) in tpl.quasis.iter().enumerate() {
      if !quasi.raw.is_empty() {
        parts.push(TemplatePart::Text(quasi.raw.to_string()));
      }
      if let Some(expr) = tpl.exprs.get(index) {
        parts.push(TemplatePart::Slot(RawSlot {
          expr: expr.clone(),
          source: self.snippet(expr.span()),
          location: self.location(expr.span()),
        }));
      }
    }
    parts
  }
}

impl Visit for DeclarationScanner<'_> {
  fn visit_var_declarator(&mut self, node: &VarDeclarator) {
    let binding = match &node.name {
      Pat::Ident(binding) => Binding::Local(binding.id.to_id()),
      _ => Binding::Anonymous,
    };

    let previous = self.pending_binding.replace(binding);
    node.init.visit_with(self);
    self.pending_binding = previous;
  }

  fn visit_export_default_expr(&mut self, node: &ExportDefaultExpr) {
    let previous = self.pending_binding.replace(Binding::ExportDefault);
    node.expr.visit_with(self);
    self.pending_binding = previous;
  }

  // A template inside a function body is not the value of the enclosing binding
  fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
    let previous = self.pending_binding.take();
    node.visit_children_with(self);
    self.pending_binding = previous;
  }

  fn visit_function(&mut self, node: &Function) {
    let previous = self.pending_binding.take();
    node.visit_children_with(self);
    self.pending_binding = previous;
  }

  fn visit_class(&mut self, node: &Class) {
    let previous = self.pending_binding.take();
    node.visit_children_with(self);
    self.pending_binding = previous;
  }

  fn visit_tagged_tpl(&mut self, node: &TaggedTpl) {
    if self.error.is_some() {
      return;
    }

    let Some(matched) = self.match_tag(&node.tag) else {
      node.visit_children_with(self);
      return;
    };

    let id = DeclarationId::new(self.source.path.clone(), self.next_ordinal());
    let (tag, target) = match matched {
      Ok(matched) => matched,
      Err(kind) => {
        self.error = Some(ScanError {
          id,
          location: self.location(node.span),
          kind,
        });
        return;
      }
    };

    let binding = self.pending_binding.take().unwrap_or(Binding::Anonymous);
    let display_name = self.display_name(&binding, id.ordinal);
    tracing::debug!(declaration = %id, %display_name, "Found styled declaration");

    self.declarations.push(Declaration {
      id,
      binding,
      display_name,
      target,
      tag,
      template: self.template_parts(&node.tpl),
      span: node.span,
      location: self.location(node.span),
    });

    // Styled templates inside interpolations are numbered after their parent
    node.tpl.visit_with(self);
  }
}

/// File name without extension, or the directory name for `index` modules, made
/// usable as a JavaScript identifier.
pub(crate) fn module_stem(path: &str) -> String {
  let path = Path::new(path);
  let stem = path
    .file_stem()
    .and_then(|stem| stem.to_str())
    .unwrap_or("module");
  let stem = if stem == "index" {
    path
      .parent()
      .and_then(|parent| parent.file_name())
      .and_then(|name| name.to_str())
      .unwrap_or(stem)
  } else {
    stem
  };

  let mut identifier: String = stem
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
    .collect();
  if identifier.starts_with(|c: char| c.is_ascii_digit()) || identifier.is_empty() {
    identifier.insert(0, '_');
  }
  identifier
}
