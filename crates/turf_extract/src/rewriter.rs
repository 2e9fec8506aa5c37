use std::collections::{HashMap, HashSet};

use swc_core::common::{Span, SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::*;
use swc_core::ecma::atoms::Atom;
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};

use crate::class_names::ClassRegistry;
use crate::errors::{ComposeError, ComposeErrorKind};
use crate::types::{Declaration, StyledTarget};

/// Replaces every styled template of a module with a call that only carries the
/// generated class:
///
/// ```js
/// const _ButtonClass = "Button-1x8f2k";
/// export default styled("button", { displayName: "Button", className: _ButtonClass });
/// ```
///
/// The replaced expression is still a component, so the binding can be used wherever
/// the original one was.
pub struct ModuleRewriter<'a> {
  classes: &'a ClassRegistry,
  stylesheet_import: Option<String>,
}

impl<'a> ModuleRewriter<'a> {
  pub fn new(classes: &'a ClassRegistry) -> Self {
    Self {
      classes,
      stylesheet_import: None,
    }
  }

  /// Also add `import "<specifier>"` so the bundler picks up the extracted stylesheet.
  pub fn with_stylesheet_import(mut self, specifier: impl Into<String>) -> Self {
    self.stylesheet_import = Some(specifier.into());
    self
  }

  #[tracing::instrument(level = "debug", skip_all)]
  pub fn rewrite(
    &self,
    module: &mut Module,
    declarations: &[Declaration],
  ) -> Result<(), ComposeError> {
    let mut names = NameTracker::default();
    module.visit_with(&mut names);

    let mut hoisted = Vec::with_capacity(declarations.len() + 1);
    if let Some(specifier) = &self.stylesheet_import {
      hoisted.push(side_effect_import(specifier));
    }

    let mut replacements = HashMap::with_capacity(declarations.len());
    for declaration in declarations {
      let class = self.classes.get(&declaration.id).ok_or_else(|| ComposeError {
        id: declaration.id.clone(),
        location: declaration.location,
        kind: ComposeErrorKind::MissingClass(declaration.id.clone()),
      })?;

      let constant = names.fresh_ident(&format!("_{}Class", declaration.display_name));
      hoisted.push(const_item(&constant, &class.name));
      replacements.insert(span_key(declaration.span), styled_call(declaration, constant));
    }

    let mut replacer = TemplateReplacer { replacements };
    module.visit_mut_with(&mut replacer);

    // After the leading imports, ahead of any statement that could use a constant
    let insert_at = module
      .body
      .iter()
      .position(|item| !matches!(item, ModuleItem::ModuleDecl(ModuleDecl::Import(_))))
      .unwrap_or(module.body.len());
    module.body.splice(insert_at..insert_at, hoisted);

    Ok(())
  }
}

fn span_key(span: Span) -> (u32, u32) {
  (span.lo.0, span.hi.0)
}

/// Every identifier name used anywhere in the module.
#[derive(Default)]
struct NameTracker {
  used: HashSet<Atom>,
}

impl NameTracker {
  /// `base`, or `base2`, `base3`, ... when taken.
  fn fresh_ident(&mut self, base: &str) -> Ident {
    let mut candidate: Atom = base.into();
    let mut index = 2usize;
    while self.used.contains(&candidate) {
      candidate = format!("{base}{index}").into();
      index += 1;
    }
    self.used.insert(candidate.clone());
    Ident::new(candidate, DUMMY_SP, SyntaxContext::empty())
  }
}

impl Visit for NameTracker {
  fn visit_ident(&mut self, node: &Ident) {
    self.used.insert(node.sym.clone());
  }
}

struct TemplateReplacer {
  replacements: HashMap<(u32, u32), Expr>,
}

impl VisitMut for TemplateReplacer {
  fn visit_mut_expr(&mut self, node: &mut Expr) {
    if let Expr::TaggedTpl(tagged) = node {
      if let Some(replacement) = self.replacements.remove(&span_key(tagged.span)) {
        *node = replacement;
        return;
      }
    }

    node.visit_mut_children_with(self);
  }
}

fn str_expr(value: &str) -> Box<Expr> {
  Box::new(Expr::Lit(Lit::Str(Str {
    span: DUMMY_SP,
    value: value.into(),
    raw: None,
  })))
}

fn key_value(key: &str, value: Box<Expr>) -> PropOrSpread {
  PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
    key: PropName::Ident(IdentName::new(key.into(), DUMMY_SP)),
    value,
  })))
}

/// `styled(<target>, { displayName, className })`, spanning the template it replaces.
fn styled_call(declaration: &Declaration, constant: Ident) -> Expr {
  let target = match &declaration.target {
    StyledTarget::HostElement(name) => str_expr(name),
    StyledTarget::Component(component) => Box::new(Expr::Ident(component.clone())),
  };
  let options = Box::new(Expr::Object(ObjectLit {
    span: DUMMY_SP,
    props: vec![
      key_value("displayName", str_expr(&declaration.display_name)),
      key_value("className", Box::new(Expr::Ident(constant))),
    ],
  }));

  Expr::Call(CallExpr {
    span: declaration.span,
    ctxt: SyntaxContext::empty(),
    callee: Callee::Expr(Box::new(Expr::Ident(declaration.tag.clone()))),
    args: vec![
      ExprOrSpread {
        spread: None,
        expr: target,
      },
      ExprOrSpread {
        spread: None,
        expr: options,
      },
    ],
    type_args: None,
  })
}

fn const_item(ident: &Ident, value: &str) -> ModuleItem {
  let var_decl = VarDecl {
    span: DUMMY_SP,
    ctxt: SyntaxContext::empty(),
    kind: VarDeclKind::Const,
    declare: false,
    decls: vec![VarDeclarator {
      span: DUMMY_SP,
      name: Pat::Ident(BindingIdent {
        id: ident.clone(),
        type_ann: None,
      }),
      init: Some(str_expr(value)),
      definite: false,
    }],
  };
  ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(var_decl))))
}

fn side_effect_import(specifier: &str) -> ModuleItem {
  ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
    span: DUMMY_SP,
    specifiers: vec![],
    src: Box::new(Str {
      span: DUMMY_SP,
      value: specifier.into(),
      raw: None,
    }),
    type_only: false,
    with: None,
    phase: Default::default(),
  }))
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use turf_swc_runner::test_utils::{parse_test_module, print_test_module, run_test_visit_const};

  use super::*;
  use crate::class_names::ClassNameGenerator;
  use crate::config::ExtractConfig;
  use crate::scanner::scan_module;

  fn compact(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
  }

  fn rewrite(path: &str, code: &str, stylesheet: Option<&str>) -> (String, Vec<String>) {
    let config = ExtractConfig::default();
    let mut source = parse_test_module(path, code);
    let scanned = scan_module(&source, &config).unwrap();
    let classes = ClassNameGenerator::new(&config).generate(&scanned.declarations);
    let names = classes.iter().map(|class| class.name.clone()).collect();
    let registry: ClassRegistry = classes.into_iter().collect();

    let mut rewriter = ModuleRewriter::new(&registry);
    if let Some(stylesheet) = stylesheet {
      rewriter = rewriter.with_stylesheet_import(stylesheet);
    }
    rewriter
      .rewrite(&mut source.module, &scanned.declarations)
      .unwrap();
    (print_test_module(&source), names)
  }

  #[test]
  fn test_rewrites_default_export() {
    let (code, names) = rewrite(
      "src/Button.js",
      indoc! {r#"
        import styled from 'astroturf';

        export default styled('button')`
          color: blue;
        `;
      "#},
      Some("./Button.0123abcd.css"),
    );

    assert_eq!(
      compact(&code),
      compact(&format!(
        r#"
          import styled from 'astroturf';
          import "./Button.0123abcd.css";
          const _ButtonClass = "{}";
          export default styled("button", {{
            displayName: "Button",
            className: _ButtonClass
          }});
        "#,
        names[0]
      ))
    );
  }

  #[test]
  fn test_rewrites_bindings_and_components() {
    let (code, names) = rewrite(
      "src/Card.js",
      indoc! {r#"
        import styled from 'astroturf';
        import Icon from './Icon';

        const Title = styled.h1`font-size: 2em;`;
        export const FancyIcon = styled(Icon)`
          & > ${Title} { margin: 0; }
        `;
      "#},
      None,
    );
    let code = compact(&code);

    assert!(code.contains(&format!(r#"const_TitleClass="{}";"#, names[0])));
    assert!(code.contains(
      r#"constTitle=styled("h1",{displayName:"Title",className:_TitleClass});"#
    ));
    assert!(code.contains(
      r#"exportconstFancyIcon=styled(Icon,{displayName:"FancyIcon",className:_FancyIconClass});"#
    ));
    assert!(!code.contains(".css"));
    assert!(!code.contains('`'));
  }

  #[test]
  fn test_constants_precede_code_between_imports() {
    let (code, names) = rewrite(
      "src/Card.js",
      indoc! {r#"
        import styled from 'astroturf';
        const Title = styled.h1`font-size: 2em;`;
        import Icon from './Icon';
        export const FancyIcon = styled(Icon)``;
      "#},
      Some("./Card.0123abcd.css"),
    );
    let code = compact(&code);

    let import = code.find(r#"import"./Card.0123abcd.css";"#).unwrap();
    let constant = code.find(&format!(r#"const_TitleClass="{}";"#, names[0])).unwrap();
    let title = code.find("constTitle=styled(").unwrap();
    assert!(code.starts_with("importstyledfrom'astroturf';"));
    assert!(import < constant);
    assert!(constant < title);
    assert!(code.find("const_FancyIconClass=").unwrap() < title);
  }

  #[test]
  fn test_constant_names_avoid_collisions() {
    let (code, _) = rewrite(
      "src/Card.js",
      indoc! {r#"
        import styled from 'astroturf';
        const _TitleClass = 'taken';
        const Title = styled.h1``;
      "#},
      None,
    );

    assert!(compact(&code).contains("className:_TitleClass2"));
  }

  #[test]
  fn test_name_tracker_skips_used_names() {
    let mut names = run_test_visit_const(
      "src/a.js",
      "const _AClass = 1; function f(_AClass2) { return _AClass3; }",
      |_| NameTracker::default(),
    )
    .visitor;

    assert_eq!(&*names.fresh_ident("_AClass").sym, "_AClass4");
    assert_eq!(&*names.fresh_ident("_AClass").sym, "_AClass5");
    assert_eq!(&*names.fresh_ident("_BClass").sym, "_BClass");
  }

  #[test]
  fn test_module_without_declarations_is_untouched() {
    let source = "import styled from 'astroturf';\nconst value = 1;\n";
    let (code, names) = rewrite("src/util.js", source, None);
    assert!(names.is_empty());
    assert_eq!(compact(&code), compact(source));
  }
}
