use regex::Regex;
use swc_core::ecma::visit::Visit;

pub use crate::runner::{RunVisitResult, SourceModule};
use crate::runner::{parse_module, print_module, run_visit_const};

/// Run a read-only visitor over `code` and return it with the printed module.
pub fn run_test_visit_const<V: Visit>(
  path: &str,
  code: &str,
  make_visit: impl FnOnce(&SourceModule) -> V,
) -> RunVisitResult<V> {
  run_visit_const(path, code, make_visit).unwrap()
}

/// Parse a fixture module, panicking on syntax errors
pub fn parse_test_module(path: &str, code: &str) -> SourceModule {
  parse_module(path, code).unwrap()
}

/// Print a module, panicking on codegen errors
pub fn print_test_module(source: &SourceModule) -> String {
  print_module(&source.module, &source.source_map).unwrap()
}

/// Remove whitespace from line starts and ends
pub fn remove_code_whitespace(code: &str) -> String {
  let re = Regex::new(r"\s*\n\s*").unwrap();
  re.replace_all(code, "\n").trim().to_string()
}
