use std::path::Path;
use std::string::FromUtf8Error;

use swc_core::common::input::StringInput;
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, Globals, Mark, SourceMap, GLOBALS};
use swc_core::ecma::ast::Module;
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::{EsSyntax, Parser, Syntax, TsSyntax};
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::{Visit, VisitMutWith, VisitWith};

/// A parsed module, after the SWC scope resolver has run over it.
///
/// Every identifier carries a `SyntaxContext`, so two identifiers refer to the same
/// binding iff their `Id`s are equal. Contexts are only comparable within one module.
#[derive(Clone)]
pub struct SourceModule {
  /// Build-wide path of the module, used for identity and import resolution
  pub path: String,
  pub module: Module,
  /// Source-map the module was parsed into, used for locations and codegen
  pub source_map: Lrc<SourceMap>,
}

impl std::fmt::Debug for SourceModule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SourceModule")
      .field("path", &self.path)
      .field("items", &self.module.body.len())
      .finish()
  }
}

/// What a visitor run by [`run_visit_const`] saw and produced.
pub struct RunVisitResult<V> {
  /// The module printed back after the visit
  pub output_code: String,
  pub visitor: V,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
  #[error("Failed to parse module {path}: {message}")]
  SwcParse { path: String, message: String },
  #[error("IO Error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Invalid utf-8 output: {0}")]
  InvalidUtf8Output(#[from] FromUtf8Error),
}

/// Pick the parser syntax from the file extension. Everything that is not
/// TypeScript is parsed as JavaScript with JSX enabled.
fn syntax_for_path(path: &str) -> Syntax {
  let extension = Path::new(path)
    .extension()
    .and_then(|extension| extension.to_str())
    .unwrap_or_default();

  match extension {
    "ts" | "mts" | "cts" => Syntax::Typescript(TsSyntax::default()),
    "tsx" => Syntax::Typescript(TsSyntax {
      tsx: true,
      ..Default::default()
    }),
    _ => Syntax::Es(EsSyntax {
      jsx: true,
      ..Default::default()
    }),
  }
}

fn parse_into(
  source_map: &Lrc<SourceMap>,
  path: &str,
  code: &str,
) -> Result<Module, RunnerError> {
  let source_file =
    source_map.new_source_file(Lrc::new(FileName::Custom(path.to_string())), code.into());

  let lexer = Lexer::new(
    syntax_for_path(path),
    Default::default(),
    StringInput::from(&*source_file),
    None,
  );

  let mut parser = Parser::new_from(lexer);
  parser
    .parse_module()
    .map_err(|error| RunnerError::SwcParse {
      path: path.to_string(),
      message: error.kind().msg().to_string(),
    })
}

/// Parse `code` as the module at `path` and run the SWC resolver over it.
pub fn parse_module(path: &str, code: &str) -> Result<SourceModule, RunnerError> {
  let source_map = Lrc::new(SourceMap::default());
  let mut module = parse_into(&source_map, path, code)?;

  GLOBALS.set(&Globals::new(), || {
    let global_mark = Mark::new();
    let unresolved_mark = Mark::new();
    let typescript = matches!(syntax_for_path(path), Syntax::Typescript(_));
    module.visit_mut_with(&mut resolver(unresolved_mark, global_mark, typescript));
  });

  Ok(SourceModule {
    path: path.to_string(),
    module,
    source_map,
  })
}

/// Print `module` back to JavaScript.
pub fn print_module(module: &Module, source_map: &Lrc<SourceMap>) -> Result<String, RunnerError> {
  let mut output_buffer = vec![];
  let writer = JsWriter::new(source_map.clone(), "\n", &mut output_buffer, None);
  let mut emitter = swc_core::ecma::codegen::Emitter {
    cfg: Default::default(),
    cm: source_map.clone(),
    comments: None,
    wr: writer,
  };
  emitter.emit_module(module)?;

  Ok(String::from_utf8(output_buffer)?)
}

/// Parse `code` as the module at `path`, run a read-only visitor over it, then print it
/// back. The visitor is returned so tests can inspect what it collected.
pub fn run_visit_const<V: Visit>(
  path: &str,
  code: &str,
  make_visit: impl FnOnce(&SourceModule) -> V,
) -> Result<RunVisitResult<V>, RunnerError> {
  let source = parse_module(path, code)?;
  let mut visitor = make_visit(&source);
  source.module.visit_with(&mut visitor);
  let output_code = print_module(&source.module, &source.source_map)?;

  Ok(RunVisitResult {
    output_code,
    visitor,
  })
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use swc_core::ecma::ast::Ident;

  use super::*;

  #[test]
  fn test_parse_module_resolves_scopes() {
    struct CollectIdents(Vec<Ident>);
    impl Visit for CollectIdents {
      fn visit_ident(&mut self, n: &Ident) {
        if &*n.sym == "Button" {
          self.0.push(n.clone());
        }
      }
    }

    let source = parse_module(
      "src/Toolbar.js",
      indoc! {r#"
        import Button from './Button';
        const Toolbar = () => <div><Button /></div>;
      "#},
    )
    .unwrap();

    let mut collector = CollectIdents(Vec::new());
    source.module.visit_with(&mut collector);

    assert_eq!(source.path, "src/Toolbar.js");
    assert_eq!(collector.0.len(), 2);
    assert_eq!(collector.0[0].to_id(), collector.0[1].to_id());
  }

  #[test]
  fn test_parse_module_typescript() {
    let source = parse_module(
      "src/Toolbar.tsx",
      "export const size: number = 4; export const el = <div />;",
    )
    .unwrap();
    assert_eq!(source.module.body.len(), 2);
  }

  #[test]
  fn test_parse_error_carries_path() {
    let error = parse_module("src/Broken.js", "const = ;").unwrap_err();
    assert!(matches!(error, RunnerError::SwcParse { ref path, .. } if path == "src/Broken.js"));
  }

  #[test]
  fn test_run_visit_const_returns_visitor() {
    struct CountStrings(usize);
    impl Visit for CountStrings {
      fn visit_str(&mut self, _: &swc_core::ecma::ast::Str) {
        self.0 += 1;
      }
    }

    let result = run_visit_const("src/a.js", "import a from 'a'; const b = 'b';", |_| {
      CountStrings(0)
    })
    .unwrap();
    assert_eq!(result.visitor.0, 2);
    assert_eq!(result.output_code, "import a from 'a';\nconst b = 'b';\n");
  }

  #[test]
  fn test_print_module_round_trips() {
    let source = parse_module("src/a.js", "export default 1").unwrap();
    let output = print_module(&source.module, &source.source_map).unwrap();
    assert_eq!(output, "export default 1;\n");
  }
}
