//! Build-time extraction of styled tagged templates into static CSS.
//!
//! Every `styled.x` / `styled(X)` template found in a module is turned into one rule of a
//! per-module stylesheet, and the template in the module is replaced by a reference to
//! the generated class. Templates may interpolate static literals and other styled
//! components, including ones imported from other modules of the build.
//!
//! ```ignore
//! let output = Extractor::new(ExtractConfig::default()).build(modules);
//! for (path, result) in &output.modules { /* ... */ }
//! ```

pub mod build;
pub mod cascade;
pub mod class_names;
pub mod composer;
pub mod config;
pub mod emitter;
pub mod errors;
pub mod imports;
pub mod resolver;
pub mod rewriter;
pub mod scanner;
pub mod specificity;
pub mod symbols;
pub mod types;

pub use build::{BuildOutput, ExtractedModule, Extractor};
pub use cascade::{computed_style, CascadeError, CascadedValue};
pub use config::ExtractConfig;
pub use errors::*;
pub use imports::{ImportGraph, ImportResolver, RelativeImportResolver};
pub use specificity::{Element, ElementPath, Specificity};
pub use turf_swc_runner::{parse_module, SourceModule};
pub use types::*;
