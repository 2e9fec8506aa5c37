use serde::Deserialize;

/// Options of the extractor.
///
/// Deserializes from the `camelCase` JSON a bundler integration passes through, every
/// field is optional.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractConfig {
  ///
  /// Module specifiers whose `styled` export is treated as the styling tag.
  ///
  /// Defaults to `["astroturf"]`
  ///
  pub import_sources: Vec<String>,
  ///
  /// Prefix prepended to every generated class name.
  ///
  /// Defaults to `None`
  ///
  pub class_name_prefix: Option<String>,
  ///
  /// Include the component's display name in generated class names.
  ///
  /// Defaults to `true`
  ///
  pub readable_class_names: bool,
  ///
  /// Seed of the class name hash. Changing it renames every class.
  ///
  /// Defaults to `0`
  ///
  pub hash_seed: u32,
  ///
  /// Add an `import "./<stylesheet>"` to rewritten modules that produced CSS.
  ///
  /// Defaults to `true`
  ///
  pub inject_stylesheet_import: bool,
  ///
  /// Browserslist queries the emitted CSS must support. When set, stylesheets are run
  /// through lightningcss and nested rules are lowered as needed.
  ///
  /// Defaults to `None`
  ///
  pub targets: Option<Vec<String>>,
  ///
  /// Minify emitted stylesheets.
  ///
  /// Defaults to `false`
  ///
  pub minify: bool,
  ///
  /// Extensions tried when resolving relative import specifiers.
  ///
  /// Defaults to `[".js", ".jsx", ".ts", ".tsx", ".mjs"]`
  ///
  pub extensions: Vec<String>,
}

impl Default for ExtractConfig {
  fn default() -> Self {
    Self {
      import_sources: vec!["astroturf".into()],
      class_name_prefix: None,
      readable_class_names: true,
      hash_seed: 0,
      inject_stylesheet_import: true,
      targets: None,
      minify: false,
      extensions: [".js", ".jsx", ".ts", ".tsx", ".mjs"]
        .into_iter()
        .map(String::from)
        .collect(),
    }
  }
}

impl ExtractConfig {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn is_import_source(&self, specifier: &str) -> bool {
    self.import_sources.iter().any(|source| source == specifier)
  }

  /// Whether stylesheets have to go through lightningcss before being written.
  pub fn needs_css_processing(&self) -> bool {
    self.minify || self.targets.is_some()
  }
}
