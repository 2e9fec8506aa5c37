use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use turf_extract::{
  computed_style, parse_module, Element, ElementPath, ExtractConfig, ExtractError, Extractor,
  SourceModule, UnresolvableReason,
};
use turf_swc_runner::test_utils::remove_code_whitespace;

const BUTTON: &str = indoc! {r#"
  import styled from 'astroturf';

  export const Button = styled.button`
    color: blue;
    border-radius: 2px;
  `;
"#};

const BUTTON_TOOLBAR: &str = indoc! {r#"
  import styled from 'astroturf';
  import { Button } from './Button';

  const ButtonToolbar = styled.div`
    margin: 20px;
    color: blue;

    & > ${Button} {
      margin-left: 30px;
      border-radius: 4px;
    }
  `;

  export default ButtonToolbar;
"#};

fn modules(sources: &[(&str, &str)]) -> Vec<SourceModule> {
  sources
    .iter()
    .map(|(path, code)| parse_module(path, code).unwrap())
    .collect()
}

fn toolbar_button() -> ElementPath {
  ElementPath::new(Element::new("body"))
    .child(Element::new("div").with_class("toolbar"))
    .child(Element::new("button").with_class("button"))
}

/// The element path of `toolbar_button` with the generated classes applied.
fn with_classes(toolbar: &str, button: &str) -> ElementPath {
  ElementPath::new(Element::new("body"))
    .child(Element::new("div").with_class(toolbar))
    .child(Element::new("button").with_class(button))
}

#[test]
fn nested_component_reference_wins_in_any_order() {
  let output = Extractor::new(ExtractConfig::default()).build(modules(&[
    ("src/Button.js", BUTTON),
    ("src/ButtonToolbar.js", BUTTON_TOOLBAR),
  ]));
  assert!(output.is_ok(), "{:?}", output.errors().collect::<Vec<_>>());

  let button = output.get("src/Button.js").unwrap().as_ref().unwrap();
  let toolbar = output.get("src/ButtonToolbar.js").unwrap().as_ref().unwrap();
  let button_class = &button.classes[0].name;
  let toolbar_class = &toolbar.classes[0].name;

  assert!(button_class.starts_with("Button-"));
  assert!(toolbar_class.starts_with("ButtonToolbar-"));
  assert_eq!(
    toolbar.stylesheet.css,
    formatdoc!(
      "
        .{toolbar} {{
          margin: 20px;
          color: blue;

          & > .{button} {{
            margin-left: 30px;
            border-radius: 4px;
          }}
        }}
      ",
      toolbar = toolbar_class,
      button = button_class,
    )
  );

  let path = with_classes(toolbar_class, button_class);
  for sheets in [
    [button.stylesheet.css.as_str(), toolbar.stylesheet.css.as_str()],
    [toolbar.stylesheet.css.as_str(), button.stylesheet.css.as_str()],
  ] {
    let style = computed_style(&sheets, &path).unwrap();
    assert_eq!(style["border-radius"].value, "4px");
    assert_eq!(style["color"].value, "blue");
    assert_eq!(style["margin-left"].value, "30px");
    assert!(!style.contains_key("margin"));
  }

  // Nothing matches elements that do not carry the generated classes
  let style = computed_style(&[output.combined_stylesheet().as_str()], &toolbar_button()).unwrap();
  assert!(style.is_empty());
}

#[test]
fn rewritten_modules_reference_generated_classes() {
  let output = Extractor::new(ExtractConfig::default()).build(modules(&[
    ("src/Button.js", BUTTON),
    ("src/ButtonToolbar.js", BUTTON_TOOLBAR),
  ]));
  let toolbar = output.get("src/ButtonToolbar.js").unwrap().as_ref().unwrap();

  let expected = formatdoc!(
    r#"
      import styled from 'astroturf';
      import {{ Button }} from './Button';
      import "./{file_name}";
      const _ButtonToolbarClass = "{class}";
      const ButtonToolbar = styled("div", {{
      displayName: "ButtonToolbar",
      className: _ButtonToolbarClass
      }});
      export default ButtonToolbar;
    "#,
    file_name = toolbar.stylesheet.file_name,
    class = toolbar.classes[0].name,
  );
  assert_eq!(
    remove_code_whitespace(&toolbar.code),
    remove_code_whitespace(&expected)
  );
}

#[test]
fn builds_are_deterministic() {
  let sources = [
    ("src/Button.js", BUTTON),
    ("src/ButtonToolbar.js", BUTTON_TOOLBAR),
  ];
  let extractor = Extractor::new(ExtractConfig::default());
  let first = extractor.build(modules(&sources));
  let second = extractor.build(modules(&sources));

  for (path, result) in &first.modules {
    let first = result.as_ref().unwrap();
    let second = second.get(path).unwrap().as_ref().unwrap();
    assert_eq!(first.classes, second.classes);
    assert_eq!(first.stylesheet, second.stylesheet);
    assert_eq!(first.code, second.code);
  }
  assert_eq!(first.combined_stylesheet(), second.combined_stylesheet());
}

#[test]
fn class_names_do_not_depend_on_css() {
  let extractor = Extractor::new(ExtractConfig::default());
  let blue = extractor
    .extract_module(parse_module("src/Button.js", BUTTON).unwrap())
    .unwrap();
  let red = extractor
    .extract_module(parse_module("src/Button.js", &BUTTON.replace("blue", "red")).unwrap())
    .unwrap();

  assert_eq!(blue.classes, red.classes);
  assert_ne!(blue.stylesheet.file_name, red.stylesheet.file_name);
}

#[test]
fn failing_module_does_not_affect_others() {
  let output = Extractor::new(ExtractConfig::default()).build(modules(&[
    ("src/Button.js", BUTTON),
    (
      "src/Themed.js",
      indoc! {r#"
        import styled from 'astroturf';
        import { accent } from './theme';

        export const Themed = styled.div`
          color: ${accent};
        `;
      "#},
    ),
  ]));

  assert!(output.get("src/Button.js").unwrap().is_ok());
  let Err(ExtractError::Resolution(error)) = output.get("src/Themed.js").unwrap() else {
    panic!("expected a resolution error");
  };
  assert_eq!(error.expression, "accent");
  assert_eq!(error.location.line, 5);
  assert_eq!(
    error.reason,
    UnresolvableReason::UnresolvedImport("./theme".into())
  );
  assert_eq!(output.errors().count(), 1);
  assert!(output
    .combined_stylesheet()
    .contains(&output.get("src/Button.js").unwrap().as_ref().unwrap().classes[0].name));
}

#[test]
fn mutual_references_are_cycles() {
  let output = Extractor::new(ExtractConfig::default()).build(modules(&[
    (
      "src/A.js",
      indoc! {r#"
        import styled from 'astroturf';
        import { B } from './B';
        export const A = styled.div`& ${B} { color: red; }`;
      "#},
    ),
    (
      "src/B.js",
      indoc! {r#"
        import styled from 'astroturf';
        import { A } from './A';
        export const B = styled.div`& ${A} { color: blue; }`;
      "#},
    ),
    ("src/Button.js", BUTTON),
  ]));

  for path in ["src/A.js", "src/B.js"] {
    let Err(ExtractError::Cycle(error)) = output.get(path).unwrap() else {
      panic!("expected a cycle error for {path}");
    };
    assert_eq!(error.module, path);
    assert_eq!(error.cycle, vec!["src/A.js".to_string(), "src/B.js".to_string()]);
  }
  assert!(output.get("src/Button.js").unwrap().is_ok());
}

#[test]
fn processed_output_for_targets() {
  let config = ExtractConfig::from_json(r#"{ "targets": ["chrome 80"], "minify": true }"#).unwrap();
  let output = Extractor::new(config).build(modules(&[
    ("src/Button.js", BUTTON),
    ("src/ButtonToolbar.js", BUTTON_TOOLBAR),
  ]));
  let button = output.get("src/Button.js").unwrap().as_ref().unwrap();
  let toolbar = output.get("src/ButtonToolbar.js").unwrap().as_ref().unwrap();

  assert!(!toolbar.stylesheet.css.contains('&'));
  assert!(toolbar.stylesheet.css.contains(&format!(
    ".{}>.{}",
    toolbar.classes[0].name, button.classes[0].name
  )));

  let path = with_classes(&toolbar.classes[0].name, &button.classes[0].name);
  let style = computed_style(
    &[toolbar.stylesheet.css.as_str(), button.stylesheet.css.as_str()],
    &path,
  )
  .unwrap();
  assert_eq!(style["border-radius"].value, "4px");
}
