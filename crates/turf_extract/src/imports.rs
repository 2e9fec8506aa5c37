use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Maps an import specifier, as written in a module, to the path of another module of
/// the build.
///
/// Module graph construction belongs to the bundler; the extractor only asks.
pub trait ImportResolver: Send + Sync {
  fn resolve(&self, from: &str, specifier: &str) -> Option<String>;
}

/// Import edges supplied explicitly by the caller.
#[derive(Debug, Default, Clone)]
pub struct ImportGraph {
  edges: HashMap<String, HashMap<String, String>>,
}

impl ImportGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_edge(
    &mut self,
    from: impl Into<String>,
    specifier: impl Into<String>,
    to: impl Into<String>,
  ) {
    self
      .edges
      .entry(from.into())
      .or_default()
      .insert(specifier.into(), to.into());
  }

  pub fn with_edge(
    mut self,
    from: impl Into<String>,
    specifier: impl Into<String>,
    to: impl Into<String>,
  ) -> Self {
    self.add_edge(from, specifier, to);
    self
  }
}

impl ImportResolver for ImportGraph {
  fn resolve(&self, from: &str, specifier: &str) -> Option<String> {
    self.edges.get(from)?.get(specifier).cloned()
  }
}

/// Resolves `./` and `../` specifiers against the paths of the modules being built,
/// trying each extension and then `index` files. Bare specifiers never resolve.
#[derive(Debug, Clone)]
pub struct RelativeImportResolver {
  modules: HashSet<String>,
  extensions: Vec<String>,
}

impl RelativeImportResolver {
  pub fn new(modules: impl IntoIterator<Item = String>, extensions: Vec<String>) -> Self {
    Self {
      modules: modules.into_iter().collect(),
      extensions,
    }
  }

  fn find(&self, candidate: &str) -> Option<String> {
    if self.modules.contains(candidate) {
      return Some(candidate.to_string());
    }

    let with_extension = self
      .extensions
      .iter()
      .map(|extension| format!("{candidate}{extension}"));
    let index = self
      .extensions
      .iter()
      .map(|extension| format!("{candidate}/index{extension}"));

    with_extension
      .chain(index)
      .find(|path| self.modules.contains(path))
  }
}

impl ImportResolver for RelativeImportResolver {
  fn resolve(&self, from: &str, specifier: &str) -> Option<String> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
      return None;
    }

    let directory = Path::new(from).parent().unwrap_or(Path::new(""));
    let joined = normalize(&directory.join(specifier))?;
    self.find(&joined)
  }
}

/// Lexically resolve `.` and `..`, keeping `/` separators. `None` when the path escapes
/// above its root.
fn normalize(path: &Path) -> Option<String> {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !normalized.pop() {
          return None;
        }
      }
      other => normalized.push(other.as_os_str()),
    }
  }

  let segments: Vec<String> = normalized
    .components()
    .map(|component| component.as_os_str().to_string_lossy().into_owned())
    .collect();
  let joined = segments.join("/");
  if path.has_root() {
    Some(format!("/{}", joined.trim_start_matches('/')))
  } else {
    Some(joined)
  }
}
