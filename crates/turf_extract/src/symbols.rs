use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use swc_core::ecma::ast::*;
use swc_core::ecma::atoms::Atom;

use crate::config::ExtractConfig;
use crate::types::{Binding, Declaration};

/// What an import specifier brings into scope.
#[derive(Clone, Debug, PartialEq)]
pub enum Imported {
  Default,
  Named(Atom),
  Namespace,
}

/// What a module-scope identifier is bound to, as far as static extraction cares.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalBinding {
  /// The result of the styled declaration with this ordinal
  Styled(u32),
  /// A `const` initialized with a static literal
  Literal(String),
  /// `const A = B`
  Alias(Id),
  Import { specifier: String, imported: Imported },
  /// Declared, but nothing we can evaluate
  Other,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExportTarget {
  Local(Id),
  /// `export default styled...` without an intermediate binding
  Declaration(u32),
  /// `export { name } from 'specifier'`
  ReExport { specifier: String, name: Atom },
  /// Exported, but nothing we can evaluate
  Opaque,
}

/// Module-scope bindings and exports of one module.
#[derive(Clone, Debug, Default)]
pub struct ModuleSymbols {
  pub locals: HashMap<Id, LocalBinding>,
  pub exports: IndexMap<Atom, ExportTarget>,
  /// Specifiers of `export * from '...'`
  pub star_exports: Vec<String>,
  /// Local identifiers bound to the styling tag
  pub styled_tags: HashSet<Id>,
}

impl ModuleSymbols {
  pub fn collect(module: &Module, config: &ExtractConfig) -> Self {
    let mut symbols = ModuleSymbols::default();

    for item in &module.body {
      match item {
        ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
          symbols.collect_import(import, config)
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
          for id in symbols.collect_decl(&export.decl) {
            symbols
              .exports
              .insert(id.0.clone(), ExportTarget::Local(id));
          }
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) => {
          symbols.collect_named_export(named)
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
          let target = match unwrap_expr(&export.expr) {
            Expr::Ident(ident) => ExportTarget::Local(ident.to_id()),
            // Replaced by `bind_declarations` when the expression is a styled template
            _ => ExportTarget::Opaque,
          };
          symbols.exports.insert("default".into(), target);
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
          let ident = match &export.decl {
            DefaultDecl::Class(class) => class.ident.as_ref(),
            DefaultDecl::Fn(function) => function.ident.as_ref(),
            DefaultDecl::TsInterfaceDecl(_) => None,
          };
          if let Some(ident) = ident {
            symbols.locals.insert(ident.to_id(), LocalBinding::Other);
          }
          symbols.exports.insert("default".into(), ExportTarget::Opaque);
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportAll(export)) => {
          if !export.type_only {
            symbols.star_exports.push(export.src.value.to_string());
          }
        }
        ModuleItem::Stmt(Stmt::Decl(decl)) => {
          symbols.collect_decl(decl);
        }
        _ => {}
      }
    }

    symbols
  }

  fn collect_import(&mut self, import: &ImportDecl, config: &ExtractConfig) {
    if import.type_only {
      return;
    }

    let specifier = import.src.value.to_string();
    let is_tag_source = config.is_import_source(&specifier);

    for import_specifier in &import.specifiers {
      let (local, imported) = match import_specifier {
        ImportSpecifier::Default(default) => (&default.local, Imported::Default),
        ImportSpecifier::Named(named) => {
          if named.is_type_only {
            continue;
          }
          let imported = named
            .imported
            .as_ref()
            .map(module_export_name)
            .unwrap_or_else(|| named.local.sym.clone());
          (&named.local, Imported::Named(imported))
        }
        ImportSpecifier::Namespace(namespace) => (&namespace.local, Imported::Namespace),
      };

      let is_tag = match &imported {
        Imported::Default => true,
        Imported::Named(name) => &**name == "styled" || &**name == "default",
        Imported::Namespace => false,
      };
      if is_tag_source && is_tag {
        self.styled_tags.insert(local.to_id());
      }

      self.locals.insert(
        local.to_id(),
        LocalBinding::Import {
          specifier: specifier.clone(),
          imported,
        },
      );
    }
  }

  fn collect_named_export(&mut self, named: &NamedExport) {
    if named.type_only {
      return;
    }

    for specifier in &named.specifiers {
      match (specifier, &named.src) {
        (ExportSpecifier::Named(export), Some(src)) => {
          let orig = module_export_name(&export.orig);
          let exported = export
            .exported
            .as_ref()
            .map(module_export_name)
            .unwrap_or_else(|| orig.clone());
          self.exports.insert(
            exported,
            ExportTarget::ReExport {
              specifier: src.value.to_string(),
              name: orig,
            },
          );
        }
        (ExportSpecifier::Named(export), None) => {
          let ModuleExportName::Ident(orig) = &export.orig else {
            continue;
          };
          let exported = export
            .exported
            .as_ref()
            .map(module_export_name)
            .unwrap_or_else(|| orig.sym.clone());
          self.exports.insert(exported, ExportTarget::Local(orig.to_id()));
        }
        (ExportSpecifier::Default(export), Some(src)) => {
          self.exports.insert(
            export.exported.sym.clone(),
            ExportTarget::ReExport {
              specifier: src.value.to_string(),
              name: "default".into(),
            },
          );
        }
        (ExportSpecifier::Namespace(export), _) => {
          self
            .exports
            .insert(module_export_name(&export.name), ExportTarget::Opaque);
        }
        (ExportSpecifier::Default(_), None) => {}
      }
    }
  }

  /// Record the bindings a declaration introduces and return their ids.
  fn collect_decl(&mut self, decl: &Decl) -> Vec<Id> {
    match decl {
      Decl::Var(var) => var
        .decls
        .iter()
        .filter_map(|declarator| {
          let Pat::Ident(binding) = &declarator.name else {
            return None;
          };
          let id = binding.id.to_id();
          let is_const = var.kind == VarDeclKind::Const;
          let local = match declarator.init.as_deref().map(unwrap_expr) {
            Some(Expr::Ident(alias)) if is_const => LocalBinding::Alias(alias.to_id()),
            Some(init) if is_const => static_literal(init)
              .map(LocalBinding::Literal)
              .unwrap_or(LocalBinding::Other),
            _ => LocalBinding::Other,
          };
          self.locals.insert(id.clone(), local);
          Some(id)
        })
        .collect(),
      Decl::Fn(function) => {
        let id = function.ident.to_id();
        self.locals.insert(id.clone(), LocalBinding::Other);
        vec![id]
      }
      Decl::Class(class) => {
        let id = class.ident.to_id();
        self.locals.insert(id.clone(), LocalBinding::Other);
        vec![id]
      }
      _ => Vec::new(),
    }
  }

  /// Point styled bindings (and a styled default export) at their declarations.
  pub fn bind_declarations(&mut self, declarations: &[Declaration]) {
    for declaration in declarations {
      match &declaration.binding {
        Binding::Local(id) => {
          self
            .locals
            .insert(id.clone(), LocalBinding::Styled(declaration.id.ordinal));
        }
        Binding::ExportDefault => {
          self.exports.insert(
            "default".into(),
            ExportTarget::Declaration(declaration.id.ordinal),
          );
        }
        Binding::Anonymous => {}
      }
    }
  }
}

fn module_export_name(name: &ModuleExportName) -> Atom {
  match name {
    ModuleExportName::Ident(ident) => ident.sym.clone(),
    ModuleExportName::Str(str) => str.value.clone(),
  }
}

/// Strip parentheses and TypeScript-only wrappers.
pub(crate) fn unwrap_expr(expr: &Expr) -> &Expr {
  match expr {
    Expr::Paren(paren) => unwrap_expr(&paren.expr),
    Expr::TsAs(ts_as) => unwrap_expr(&ts_as.expr),
    Expr::TsConstAssertion(assertion) => unwrap_expr(&assertion.expr),
    Expr::TsSatisfies(satisfies) => unwrap_expr(&satisfies.expr),
    _ => expr,
  }
}

/// The CSS text of an expression whose value is known without running any code.
pub(crate) fn static_literal(expr: &Expr) -> Option<String> {
  match unwrap_expr(expr) {
    Expr::Lit(Lit::Str(str)) => Some(str.value.to_string()),
    Expr::Lit(Lit::Num(number)) => Some(format_number(number.value)),
    Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
      .quasis
      .first()
      .map(|quasi| quasi.cooked.as_ref().unwrap_or(&quasi.raw).to_string()),
    Expr::Unary(unary) if unary.op == UnaryOp::Minus => match unwrap_expr(&unary.arg) {
      Expr::Lit(Lit::Num(number)) => Some(format_number(-number.value)),
      _ => None,
    },
    _ => None,
  }
}

/// Format a number the way JavaScript stringifies it in a template literal.
fn format_number(value: f64) -> String {
  if value == 0.0 {
    // Also covers `-0`
    "0".to_string()
  } else if value.abs() < 1e21 {
    format!("{value}")
  } else {
    // Same notation as JavaScript, eg. `1e+21`
    format!("{value:e}").replacen('e', "e+", 1)
  }
}
