use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use turf_swc_runner::{print_module, SourceModule};

use crate::class_names::{ClassNameGenerator, ClassRegistry};
use crate::composer::SelectorComposer;
use crate::config::ExtractConfig;
use crate::emitter::StylesheetEmitter;
use crate::errors::{CycleError, DependencyError, ExtractError};
use crate::imports::{ImportResolver, RelativeImportResolver};
use crate::resolver::{InterpolationResolver, ResolvedModule, SymbolTable};
use crate::rewriter::ModuleRewriter;
use crate::scanner::{scan_module, ScannedModule};
use crate::types::{GeneratedClass, Stylesheet};

/// Everything extracted from one module.
#[derive(Clone, Debug)]
pub struct ExtractedModule {
  pub path: String,
  /// One class per styled declaration, in source order
  pub classes: Vec<GeneratedClass>,
  pub stylesheet: Stylesheet,
  /// The rewritten module
  pub module: SourceModule,
  /// `module` printed back to JavaScript
  pub code: String,
}

/// Per-module results of a build, in input order.
#[derive(Debug, Default)]
pub struct BuildOutput {
  pub modules: IndexMap<String, Result<ExtractedModule, ExtractError>>,
}

impl BuildOutput {
  pub fn get(&self, path: &str) -> Option<&Result<ExtractedModule, ExtractError>> {
    self.modules.get(path)
  }

  pub fn is_ok(&self) -> bool {
    self.modules.values().all(Result::is_ok)
  }

  pub fn errors(&self) -> impl Iterator<Item = &ExtractError> {
    self.modules.values().filter_map(|result| result.as_ref().err())
  }

  /// Stylesheets of every successful module, concatenated in input order. Rules of
  /// equal specificity from different modules cascade in that order.
  pub fn combined_stylesheet(&self) -> String {
    self
      .modules
      .values()
      .filter_map(|result| result.as_ref().ok())
      .filter(|extracted| !extracted.stylesheet.is_empty())
      .map(|extracted| extracted.stylesheet.css.as_str())
      .collect::<Vec<_>>()
      .join("\n")
  }
}

type Staged<T> = (String, Result<T, ExtractError>);
type Composed = (SourceModule, ScannedModule, ResolvedModule, Stylesheet);

/// Runs the whole extraction pipeline over a set of parsed modules.
pub struct Extractor {
  config: ExtractConfig,
  imports: Option<Arc<dyn ImportResolver>>,
}

impl Extractor {
  pub fn new(config: ExtractConfig) -> Self {
    Self {
      config,
      imports: None,
    }
  }

  /// Use `imports` instead of resolving relative specifiers against the input paths.
  pub fn with_import_resolver(mut self, imports: impl ImportResolver + 'static) -> Self {
    self.imports = Some(Arc::new(imports));
    self
  }

  pub fn config(&self) -> &ExtractConfig {
    &self.config
  }

  /// Extract every module. Modules only wait on each other for class names and symbols.
  /// A failing module also fails the modules referencing its styled components, every
  /// other module is extracted regardless.
  #[tracing::instrument(level = "debug", skip_all, fields(modules = sources.len()))]
  pub fn build(&self, sources: Vec<SourceModule>) -> BuildOutput {
    let imports = self.import_resolver(&sources);
    let generator = ClassNameGenerator::new(&self.config);

    let scanned: Vec<Staged<(SourceModule, ScannedModule, Vec<GeneratedClass>)>> = sources
      .into_par_iter()
      .map(|source| {
        let path = source.path.clone();
        let result = scan_module(&source, &self.config)
          .map(|scanned| {
            let classes = generator.generate(&scanned.declarations);
            (source, scanned, classes)
          })
          .map_err(ExtractError::from);
        (path, result)
      })
      .collect();

    let mut registry = ClassRegistry::default();
    let named: Vec<Staged<(SourceModule, ScannedModule)>> = scanned
      .into_iter()
      .map(|(path, result)| {
        let result = result.and_then(|(source, scanned, classes)| {
          classes
            .into_iter()
            .try_for_each(|class| registry.insert(class))?;
          Ok((source, scanned))
        });
        (path, result)
      })
      .collect();
    tracing::debug!(classes = registry.len(), "Generated class names");

    let resolved: Vec<Result<ResolvedModule, ExtractError>> = {
      let table = SymbolTable::new(
        named
          .iter()
          .filter_map(|(_, result)| result.as_ref().ok().map(|(_, scanned)| scanned)),
        imports.as_ref(),
      );
      let resolver = InterpolationResolver::new(&table);

      named
        .par_iter()
        .map(|(_, result)| match result {
          Ok((_, scanned)) => resolver
            .resolve_module(scanned)
            .map_err(ExtractError::from),
          Err(error) => Err(error.clone()),
        })
        .collect()
    };

    let cycles = find_cycles(resolved.iter().filter_map(|result| result.as_ref().ok()));

    let composed: Vec<Staged<Composed>> = named
      .into_par_iter()
      .zip(resolved)
      .map(|((path, staged), resolved)| {
        let result = match (staged, resolved) {
          (Err(error), _) | (_, Err(error)) => Err(error),
          (Ok((source, scanned)), Ok(resolved)) => match cycles.get(&path) {
            Some(cycle) => Err(ExtractError::from(CycleError {
              module: path.clone(),
              cycle: cycle.clone(),
            })),
            None => self
              .compose(&path, &resolved, &registry)
              .map(|stylesheet| (source, scanned, resolved, stylesheet)),
          },
        };
        (path, result)
      })
      .collect();

    // A module referencing a failed module would target a class nobody emits
    let mut dependency_errors = failed_dependents(composed.iter().map(|(path, result)| {
      let resolved = result.as_ref().ok().map(|(_, _, resolved, _)| resolved);
      (path.as_str(), resolved)
    }));

    let modules: Vec<Staged<ExtractedModule>> = composed
      .into_iter()
      .map(|(path, result)| {
        let result = result.and_then(|staged| match dependency_errors.remove(&path) {
          Some(error) => Err(ExtractError::from(error)),
          None => Ok(staged),
        });
        (path, result)
      })
      .collect::<Vec<_>>()
      .into_par_iter()
      .map(|(path, result)| {
        let result = result.and_then(|(source, scanned, _, stylesheet)| {
          self.rewrite(source, &scanned, stylesheet, &registry)
        });

        if let Err(error) = &result {
          tracing::warn!(module = %path, %error, "Failed to extract module");
        }
        (path, result)
      })
      .collect();

    BuildOutput {
      modules: modules.into_iter().collect(),
    }
  }

  /// Extract a single module on its own. Interpolations referencing other modules fail to
  /// resolve.
  #[tracing::instrument(level = "debug", skip_all, fields(module = %source.path))]
  pub fn extract_module(&self, source: SourceModule) -> Result<ExtractedModule, ExtractError> {
    let scanned = scan_module(&source, &self.config)?;
    let registry: ClassRegistry = ClassNameGenerator::new(&self.config)
      .generate(&scanned.declarations)
      .into_iter()
      .collect();

    let imports = self.import_resolver(std::slice::from_ref(&source));
    let table = SymbolTable::new([&scanned], imports.as_ref());
    let resolved = InterpolationResolver::new(&table).resolve_module(&scanned)?;

    let stylesheet = self.compose(&source.path, &resolved, &registry)?;
    self.rewrite(source, &scanned, stylesheet, &registry)
  }

  fn import_resolver(&self, sources: &[SourceModule]) -> Arc<dyn ImportResolver> {
    match &self.imports {
      Some(imports) => imports.clone(),
      None => Arc::new(RelativeImportResolver::new(
        sources.iter().map(|source| source.path.clone()),
        self.config.extensions.clone(),
      )),
    }
  }

  /// Compose and emit the stylesheet of one resolved module.
  fn compose(
    &self,
    path: &str,
    resolved: &ResolvedModule,
    registry: &ClassRegistry,
  ) -> Result<Stylesheet, ExtractError> {
    let rules = SelectorComposer::new(registry).compose_all(&resolved.declarations)?;
    Ok(StylesheetEmitter::new(&self.config).emit(path, rules)?)
  }

  /// Rewrite and print one module whose stylesheet was emitted.
  fn rewrite(
    &self,
    mut source: SourceModule,
    scanned: &ScannedModule,
    stylesheet: Stylesheet,
    registry: &ClassRegistry,
  ) -> Result<ExtractedModule, ExtractError> {
    let mut rewriter = ModuleRewriter::new(registry);
    if self.config.inject_stylesheet_import && !stylesheet.is_empty() {
      rewriter = rewriter.with_stylesheet_import(format!("./{}", stylesheet.file_name));
    }
    rewriter.rewrite(&mut source.module, &scanned.declarations)?;

    let code =
      print_module(&source.module, &source.source_map).map_err(|error| ExtractError::Codegen {
        module: source.path.clone(),
        message: error.to_string(),
      })?;

    let classes = scanned
      .declarations
      .iter()
      .filter_map(|declaration| registry.get(&declaration.id).cloned())
      .collect();

    Ok(ExtractedModule {
      path: source.path.clone(),
      classes,
      stylesheet,
      module: source,
      code,
    })
  }
}

/// Modules referencing a styled component of a failed module, directly or through
/// another such module, with their first offending declaration. `modules` yields every
/// module of the build and its resolution, `None` for failed ones.
fn failed_dependents<'a>(
  modules: impl Iterator<Item = (&'a str, Option<&'a ResolvedModule>)>,
) -> HashMap<String, DependencyError> {
  let modules: Vec<(&str, Option<&ResolvedModule>)> = modules.collect();
  let mut failed: HashSet<&str> = modules
    .iter()
    .filter(|(_, resolved)| resolved.is_none())
    .map(|(path, _)| *path)
    .collect();
  let mut errors = HashMap::new();

  loop {
    let mut changed = false;
    for (path, resolved) in &modules {
      let Some(resolved) = resolved else {
        continue;
      };
      if failed.contains(path) {
        continue;
      }

      let error = resolved.declarations.iter().find_map(|declaration| {
        declaration
          .references()
          .find(|target| failed.contains(target.module.as_str()))
          .map(|target| DependencyError {
            id: declaration.id.clone(),
            location: declaration.location,
            dependency: target.module.clone(),
          })
      });
      if let Some(error) = error {
        tracing::debug!(module = %path, dependency = %error.dependency, "Dependency failed");
        failed.insert(*path);
        errors.insert(path.to_string(), error);
        changed = true;
      }
    }

    if !changed {
      return errors;
    }
  }
}

/// Modules whose declarations reference each other in a loop, mapped to every module of
/// their loop, sorted.
fn find_cycles<'a>(
  modules: impl Iterator<Item = &'a ResolvedModule>,
) -> HashMap<String, Vec<String>> {
  let mut graph = DiGraph::<&str, ()>::new();
  let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
  let modules: Vec<&ResolvedModule> = modules.collect();

  for module in &modules {
    nodes.insert(module.path.as_str(), graph.add_node(module.path.as_str()));
  }
  for module in &modules {
    let Some(&from) = nodes.get(module.path.as_str()) else {
      continue;
    };
    for dependency in &module.dependencies {
      if let Some(&to) = nodes.get(dependency.as_str()) {
        graph.add_edge(from, to, ());
      }
    }
  }

  let mut cycles = HashMap::new();
  for scc in petgraph::algo::tarjan_scc(&graph) {
    if scc.len() == 1 {
      continue;
    }

    let mut cycle: Vec<String> = scc
      .iter()
      .filter_map(|node_index| graph.node_weight(*node_index))
      .map(|path| path.to_string())
      .collect();
    cycle.sort();
    tracing::debug!(?cycle, "Found circular styled references");

    for module in &cycle {
      cycles.insert(module.clone(), cycle.clone());
    }
  }
  cycles
}
