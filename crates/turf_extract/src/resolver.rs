use std::collections::{BTreeSet, HashMap, HashSet};

use swc_core::ecma::ast::*;
use swc_core::ecma::atoms::Atom;

use crate::errors::{ResolutionError, UnresolvableReason};
use crate::imports::ImportResolver;
use crate::scanner::ScannedModule;
use crate::symbols::{static_literal, unwrap_expr, ExportTarget, Imported, LocalBinding};
use crate::types::{
  Declaration, DeclarationId, InterpolationSlot, RawSlot, ResolvedDeclaration, TemplatePart,
};

const MAX_ALIAS_DEPTH: usize = 32;

/// What a binding evaluates to at build time.
#[derive(Clone, Debug, PartialEq)]
pub enum StaticValue {
  Component(DeclarationId),
  Literal(String),
}

/// Read-only view over the exports and bindings of every scanned module of a build.
pub struct SymbolTable<'a> {
  modules: HashMap<&'a str, &'a ScannedModule>,
  imports: &'a dyn ImportResolver,
}

impl<'a> SymbolTable<'a> {
  pub fn new(
    modules: impl IntoIterator<Item = &'a ScannedModule>,
    imports: &'a dyn ImportResolver,
  ) -> Self {
    Self {
      modules: modules
        .into_iter()
        .map(|module| (module.path.as_str(), module))
        .collect(),
      imports,
    }
  }

  pub fn module(&self, path: &str) -> Option<&'a ScannedModule> {
    self.modules.get(path).copied()
  }

  /// Evaluate a module-scope identifier of `module`.
  pub fn resolve_local(
    &self,
    module: &ScannedModule,
    id: &Id,
  ) -> Result<StaticValue, UnresolvableReason> {
    let mut visited = HashSet::new();
    self.resolve_local_inner(module, id, &mut visited, 0)
  }

  /// Evaluate the export `name` of the module at `path`, following re-exports.
  pub fn resolve_export(&self, path: &str, name: &Atom) -> Result<StaticValue, UnresolvableReason> {
    let mut visited = HashSet::new();
    self.resolve_export_inner(path, name, &mut visited)
  }

  fn resolve_local_inner(
    &self,
    module: &ScannedModule,
    id: &Id,
    visited: &mut HashSet<(String, Atom)>,
    depth: usize,
  ) -> Result<StaticValue, UnresolvableReason> {
    let name = id.0.to_string();
    let Some(binding) = module.symbols.locals.get(id) else {
      return Err(UnresolvableReason::UnknownBinding(name));
    };

    match binding {
      LocalBinding::Styled(ordinal) => Ok(StaticValue::Component(DeclarationId::new(
        module.path.clone(),
        *ordinal,
      ))),
      LocalBinding::Literal(value) => Ok(StaticValue::Literal(value.clone())),
      LocalBinding::Alias(alias) if depth < MAX_ALIAS_DEPTH => {
        self.resolve_local_inner(module, alias, visited, depth + 1)
      }
      LocalBinding::Import {
        specifier,
        imported,
      } => {
        let imported_name: Atom = match imported {
          Imported::Default => "default".into(),
          Imported::Named(imported_name) => imported_name.clone(),
          Imported::Namespace => return Err(UnresolvableReason::NotStyled(name)),
        };
        self.resolve_import(&module.path, specifier, &imported_name, visited)
      }
      LocalBinding::Alias(_) | LocalBinding::Other => Err(UnresolvableReason::NotStyled(name)),
    }
  }

  fn resolve_import(
    &self,
    from: &str,
    specifier: &str,
    name: &Atom,
    visited: &mut HashSet<(String, Atom)>,
  ) -> Result<StaticValue, UnresolvableReason> {
    let Some(path) = self
      .imports
      .resolve(from, specifier)
      .filter(|path| self.modules.contains_key(path.as_str()))
    else {
      return Err(UnresolvableReason::UnresolvedImport(specifier.to_string()));
    };

    self.resolve_export_inner(&path, name, visited)
  }

  fn resolve_export_inner(
    &self,
    path: &str,
    name: &Atom,
    visited: &mut HashSet<(String, Atom)>,
  ) -> Result<StaticValue, UnresolvableReason> {
    let Some(module) = self.module(path) else {
      return Err(UnresolvableReason::UnresolvedImport(path.to_string()));
    };

    // `visited` holds the exports on the current chain only, so two star branches may
    // pass through the same module without being a cycle.
    let key = (path.to_string(), name.clone());
    if !visited.insert(key.clone()) {
      return Err(UnresolvableReason::ReExportCycle {
        module: path.to_string(),
        name: name.to_string(),
      });
    }
    let result = self.resolve_export_entry(module, name, visited);
    visited.remove(&key);
    result
  }

  fn resolve_export_entry(
    &self,
    module: &ScannedModule,
    name: &Atom,
    visited: &mut HashSet<(String, Atom)>,
  ) -> Result<StaticValue, UnresolvableReason> {
    let path = module.path.as_str();
    match module.symbols.exports.get(name) {
      Some(ExportTarget::Local(id)) => self.resolve_local_inner(module, id, visited, 0),
      Some(ExportTarget::Declaration(ordinal)) => Ok(StaticValue::Component(DeclarationId::new(
        path.to_string(),
        *ordinal,
      ))),
      Some(ExportTarget::ReExport {
        specifier,
        name: original,
      }) => self.resolve_import(path, specifier, original, visited),
      Some(ExportTarget::Opaque) => Err(UnresolvableReason::NotStyled(name.to_string())),
      None if &**name != "default" => {
        for specifier in &module.symbols.star_exports {
          match self.resolve_import(path, specifier, name, visited) {
            Err(
              UnresolvableReason::MissingExport { .. } | UnresolvableReason::ReExportCycle { .. },
            ) => continue,
            result => return result,
          }
        }
        Err(UnresolvableReason::MissingExport {
          module: path.to_string(),
          name: name.to_string(),
        })
      }
      None => Err(UnresolvableReason::MissingExport {
        module: path.to_string(),
        name: name.to_string(),
      }),
    }
  }
}

/// A module whose declarations all resolved.
#[derive(Clone, Debug)]
pub struct ResolvedModule {
  pub path: String,
  pub declarations: Vec<ResolvedDeclaration>,
  /// Other modules whose declarations are referenced
  pub dependencies: BTreeSet<String>,
}

/// Classifies every interpolation of a declaration as a literal value or a reference
/// to another styled declaration.
pub struct InterpolationResolver<'a> {
  table: &'a SymbolTable<'a>,
}

impl<'a> InterpolationResolver<'a> {
  pub fn new(table: &'a SymbolTable<'a>) -> Self {
    Self { table }
  }

  #[tracing::instrument(level = "debug", skip_all, fields(module = %module.path))]
  pub fn resolve_module(&self, module: &ScannedModule) -> Result<ResolvedModule, ResolutionError> {
    let declarations = module
      .declarations
      .iter()
      .map(|declaration| self.resolve(module, declaration))
      .collect::<Result<Vec<_>, _>>()?;

    let dependencies = declarations
      .iter()
      .flat_map(|declaration| declaration.references())
      .filter(|target| target.module != module.path)
      .map(|target| target.module.clone())
      .collect();

    Ok(ResolvedModule {
      path: module.path.clone(),
      declarations,
      dependencies,
    })
  }

  /// Resolve every slot; the first slot that cannot be resolved fails the declaration.
  pub fn resolve(
    &self,
    module: &ScannedModule,
    declaration: &Declaration,
  ) -> Result<ResolvedDeclaration, ResolutionError> {
    let mut template = Vec::with_capacity(declaration.template.len());

    for part in &declaration.template {
      match part {
        TemplatePart::Text(text) => template.push(TemplatePart::Text(text.clone())),
        TemplatePart::Slot(slot) => match self.classify(module, slot) {
          InterpolationSlot::Unresolvable { source, reason } => {
            return Err(ResolutionError {
              id: declaration.id.clone(),
              location: slot.location,
              expression: source,
              reason,
            });
          }
          resolved => {
            tracing::debug!(
              declaration = %declaration.id,
              slot = %slot.source,
              ?resolved,
              "Resolved slot"
            );
            template.push(TemplatePart::Slot(resolved));
          }
        },
      }
    }

    Ok(ResolvedDeclaration {
      id: declaration.id.clone(),
      display_name: declaration.display_name.clone(),
      template,
      location: declaration.location,
    })
  }

  fn classify(&self, module: &ScannedModule, slot: &RawSlot) -> InterpolationSlot {
    if let Some(literal) = static_literal(&slot.expr) {
      return InterpolationSlot::LiteralValue(literal);
    }

    let value = match unwrap_expr(&slot.expr) {
      Expr::Ident(ident) => self.table.resolve_local(module, &ident.to_id()),
      Expr::Member(member) => self.resolve_namespace_member(module, member),
      _ => Err(UnresolvableReason::DynamicValue),
    };

    match value {
      Ok(StaticValue::Literal(literal)) => InterpolationSlot::LiteralValue(literal),
      Ok(StaticValue::Component(target)) => InterpolationSlot::ComponentReference {
        binding: slot.source.clone(),
        target,
      },
      Err(reason) => InterpolationSlot::Unresolvable {
        source: slot.source.clone(),
        reason,
      },
    }
  }

  /// `${Components.Button}` where `Components` is a namespace import.
  fn resolve_namespace_member(
    &self,
    module: &ScannedModule,
    member: &MemberExpr,
  ) -> Result<StaticValue, UnresolvableReason> {
    let (Expr::Ident(object), MemberProp::Ident(property)) =
      (unwrap_expr(&member.obj), &member.prop)
    else {
      return Err(UnresolvableReason::DynamicValue);
    };

    match module.symbols.locals.get(&object.to_id()) {
      Some(LocalBinding::Import {
        specifier,
        imported: Imported::Namespace,
      }) => {
        let Some(path) = self
          .table
          .imports
          .resolve(&module.path, specifier)
          .filter(|path| self.table.module(path).is_some())
        else {
          return Err(UnresolvableReason::UnresolvedImport(specifier.clone()));
        };
        self.table.resolve_export(&path, &property.sym)
      }
      _ => Err(UnresolvableReason::DynamicValue),
    }
  }
}
