use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::config::ExtractConfig;
use crate::errors::{ComposeError, ComposeErrorKind};
use crate::scanner::module_stem;
use crate::types::{ComposedRule, DeclarationId, SourceLocation, Stylesheet};

/// Writes the composed rules of a module into one stylesheet.
pub struct StylesheetEmitter<'a> {
  config: &'a ExtractConfig,
}

impl<'a> StylesheetEmitter<'a> {
  pub fn new(config: &'a ExtractConfig) -> Self {
    Self { config }
  }

  /// Rules are written in ascending source order and nothing else, so rules of equal
  /// specificity cascade in the order they were declared.
  #[tracing::instrument(level = "debug", skip_all, fields(module = %module))]
  pub fn emit(
    &self,
    module: &str,
    mut rules: Vec<ComposedRule>,
  ) -> Result<Stylesheet, ComposeError> {
    rules.sort_by_key(|rule| rule.source_order);

    let mut css = String::new();
    // First line of each rule, used to attribute processing errors
    let mut rule_lines = Vec::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
      if index > 0 {
        css.push('\n');
      }
      rule_lines.push(css.lines().count());
      css.push_str(&rule.to_css());
    }

    if self.config.needs_css_processing() && !rules.is_empty() {
      css = self.process(module, &css).map_err(|(line, message)| {
        let index = line
          .map(|line| rule_lines.partition_point(|start| *start <= line))
          .unwrap_or(1)
          .saturating_sub(1);
        let (id, location) = rules
          .get(index)
          .map(|rule| (rule.declaration_id.clone(), rule.location))
          .unwrap_or_else(|| (DeclarationId::new(module, 0), SourceLocation::default()));
        ComposeError {
          id,
          location,
          kind: ComposeErrorKind::Css(message),
        }
      })?;
    }

    let file_name = format!(
      "{}.{}.css",
      module_stem(module),
      &turf_hash::hash_string(&css)[..8]
    );
    tracing::debug!(rules = rules.len(), %file_name, "Emitted stylesheet");

    Ok(Stylesheet {
      module: module.to_string(),
      rules,
      css,
      file_name,
    })
  }

  /// Lower nesting for the configured targets and minify when asked to. Errors carry
  /// the zero based line they were reported at.
  fn process(&self, module: &str, css: &str) -> Result<String, (Option<usize>, String)> {
    let mut stylesheet = StyleSheet::parse(
      css,
      ParserOptions {
        filename: module.to_string(),
        css_modules: None,
        source_index: 0,
        error_recovery: false,
        warnings: None,
        flags: ParserFlags::NESTING,
      },
    )
    .map_err(|error| (error.loc.as_ref().map(|loc| loc.line as usize), error.kind.to_string()))?;

    let browsers = match &self.config.targets {
      Some(queries) => {
        Browsers::from_browserslist(queries.clone()).map_err(|error| (None, error.to_string()))?
      }
      None => None,
    };
    let targets = Targets {
      browsers,
      ..Default::default()
    };

    if self.config.minify {
      stylesheet
        .minify(MinifyOptions {
          targets,
          ..Default::default()
        })
        .map_err(|error| {
          (
            error.loc.as_ref().map(|loc| loc.line as usize),
            error.kind.to_string(),
          )
        })?;
    }

    let result = stylesheet
      .to_css(PrinterOptions {
        minify: self.config.minify,
        targets,
        ..Default::default()
      })
      .map_err(|error| (error.loc.as_ref().map(|loc| loc.line as usize), error.kind.to_string()))?;

    Ok(result.code)
  }
}
