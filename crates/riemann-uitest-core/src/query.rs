//! Element lookup against a dumped accessibility tree.
//!
//! Two kinds of lookup are supported:
//!
//! - [`Locator`]: a path of typed steps, each selecting one descendant of the
//!   previous match by index or by name. Displayed in the familiar
//!   `segmentedControls()[0].buttons()["x squared"]` notation.
//! - [`NamePredicate`]: a filter over every descendant, parsed from strings
//!   such as `name beginswith 'Rectangle'`.
//!
//! An element's name is its accessibility label, or its identifier when it
//! has no label (see [`UIElement::name`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::UIElement;

/// Accessibility element types the script addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Window,
    SegmentedControl,
    Button,
    TextField,
    StaticText,
    Stepper,
}

impl ElementKind {
    /// The `type` string reported in tree dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Window => "Window",
            ElementKind::SegmentedControl => "SegmentedControl",
            ElementKind::Button => "Button",
            ElementKind::TextField => "TextField",
            ElementKind::StaticText => "StaticText",
            ElementKind::Stepper => "Stepper",
        }
    }

    fn collection_name(&self) -> &'static str {
        match self {
            ElementKind::Window => "windows",
            ElementKind::SegmentedControl => "segmentedControls",
            ElementKind::Button => "buttons",
            ElementKind::TextField => "textFields",
            ElementKind::StaticText => "staticTexts",
            ElementKind::Stepper => "steppers",
        }
    }
}

/// How a locator step picks among the candidates of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Matcher {
    /// The n-th candidate in document order.
    Index(usize),
    /// The first candidate whose name equals the string.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStep {
    /// `None` matches elements of any type.
    pub kind: Option<ElementKind>,
    pub matcher: Matcher,
}

/// A path from the main window to one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    steps: Vec<LocatorStep>,
}

impl Locator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step selecting the `index`-th descendant of `kind`.
    pub fn nth(mut self, kind: Option<ElementKind>, index: usize) -> Self {
        self.steps.push(LocatorStep {
            kind,
            matcher: Matcher::Index(index),
        });
        self
    }

    /// Appends a step selecting the first descendant of `kind` named `name`.
    pub fn named(mut self, kind: Option<ElementKind>, name: impl Into<String>) -> Self {
        self.steps.push(LocatorStep {
            kind,
            matcher: Matcher::Name(name.into()),
        });
        self
    }

    /// `textFields()["<name>"]`
    pub fn text_field(name: impl Into<String>) -> Self {
        Self::new().named(Some(ElementKind::TextField), name)
    }

    /// `elements()["<name>"]`
    pub fn element(name: impl Into<String>) -> Self {
        Self::new().named(None, name)
    }

    /// `segmentedControls()[<control>].buttons()["<title>"]`
    pub fn segment(control: usize, title: impl Into<String>) -> Self {
        Self::new()
            .nth(Some(ElementKind::SegmentedControl), control)
            .named(Some(ElementKind::Button), title)
    }

    /// Resolves the locator below `root`. An empty locator resolves to `root`.
    pub fn resolve<'a>(&self, root: &'a UIElement) -> Option<&'a UIElement> {
        let mut current = root;
        for step in &self.steps {
            let mut candidates = Vec::new();
            collect_descendants(current, &mut candidates, &|el| {
                step.kind.map_or(true, |k| el.is_type(k.as_str()))
            });
            current = match &step.matcher {
                Matcher::Index(i) => candidates.get(*i).copied()?,
                Matcher::Name(name) => candidates
                    .into_iter()
                    .find(|el| el.name() == Some(name.as_str()))?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window")?;
        for step in &self.steps {
            let collection = step.kind.map_or("elements", |k| k.collection_name());
            match &step.matcher {
                Matcher::Index(i) => write!(f, ".{}()[{}]", collection, i)?,
                Matcher::Name(name) => write!(f, ".{}()[\"{}\"]", collection, name)?,
            }
        }
        Ok(())
    }
}

/// Depth-first, document-order collection of the descendants of `parent`
/// (excluding `parent` itself) that satisfy `keep`.
fn collect_descendants<'a>(
    parent: &'a UIElement,
    out: &mut Vec<&'a UIElement>,
    keep: &dyn Fn(&UIElement) -> bool,
) {
    for child in &parent.children {
        if keep(child) {
            out.push(child);
        }
        collect_descendants(child, out, keep);
    }
}

/// Errors from parsing a predicate string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty predicate")]
    Empty,

    #[error("unsupported attribute '{0}' (only 'name' is supported)")]
    UnsupportedAttribute(String),

    #[error("unknown comparison '{0}'")]
    UnknownComparison(String),

    #[error("expected a quoted string literal")]
    ExpectedLiteral,

    #[error("unterminated string literal")]
    UnterminatedLiteral,

    #[error("unexpected input after literal: '{0}'")]
    TrailingInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equals,
    BeginsWith,
    EndsWith,
    Contains,
}

/// A condition on an element's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePredicate {
    pub comparison: Comparison,
    pub operand: String,
}

impl NamePredicate {
    pub fn begins_with(prefix: impl Into<String>) -> Self {
        Self {
            comparison: Comparison::BeginsWith,
            operand: prefix.into(),
        }
    }

    /// Elements without a name never match.
    pub fn matches(&self, element: &UIElement) -> bool {
        let Some(name) = element.name() else {
            return false;
        };
        let operand = self.operand.as_str();
        match self.comparison {
            Comparison::Equals => name == operand,
            Comparison::BeginsWith => name.starts_with(operand),
            Comparison::EndsWith => name.ends_with(operand),
            Comparison::Contains => name.contains(operand),
        }
    }

    /// Every descendant of `root` (excluding `root`) that matches, in document order.
    pub fn query_all<'a>(&self, root: &'a UIElement) -> Vec<&'a UIElement> {
        let mut out = Vec::new();
        collect_descendants(root, &mut out, &|el| self.matches(el));
        out
    }
}

impl fmt::Display for NamePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.comparison {
            Comparison::Equals => "==",
            Comparison::BeginsWith => "beginswith",
            Comparison::EndsWith => "endswith",
            Comparison::Contains => "contains",
        };
        write!(f, "name {} '{}'", op, self.operand)
    }
}

/// Splits off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

impl FromStr for NamePredicate {
    type Err = QueryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(QueryError::Empty);
        }

        let (attribute, rest) = split_word(input);
        if !attribute.eq_ignore_ascii_case("name") {
            return Err(QueryError::UnsupportedAttribute(attribute.to_string()));
        }

        let (op, rest) = split_word(rest);
        let comparison = match op.to_ascii_lowercase().as_str() {
            "==" | "=" => Comparison::Equals,
            "beginswith" => Comparison::BeginsWith,
            "endswith" => Comparison::EndsWith,
            "contains" => Comparison::Contains,
            "" => return Err(QueryError::ExpectedLiteral),
            other => return Err(QueryError::UnknownComparison(other.to_string())),
        };

        let mut chars = rest.chars();
        let quote = match chars.next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(QueryError::ExpectedLiteral),
        };
        let body = chars.as_str();
        let end = body.find(quote).ok_or(QueryError::UnterminatedLiteral)?;
        let trailing = body[end + quote.len_utf8()..].trim();
        if !trailing.is_empty() {
            return Err(QueryError::TrailingInput(trailing.to_string()));
        }

        Ok(Self {
            comparison,
            operand: body[..end].to_string(),
        })
    }
}

/// Finds the main window in a tree dump: the first `Window` element in
/// document order, or the first root when the dump has no window element.
pub fn main_window(roots: &[UIElement]) -> Option<&UIElement> {
    fn find_window(elements: &[UIElement]) -> Option<&UIElement> {
        for el in elements {
            if el.is_type(ElementKind::Window.as_str()) {
                return Some(el);
            }
            if let Some(found) = find_window(&el.children) {
                return Some(found);
            }
        }
        None
    }
    find_window(roots).or_else(|| roots.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_window() -> UIElement {
        UIElement::new("Window").with_label("Riemann Sum").with_children(vec![
            UIElement::new("SegmentedControl")
                .with_label("Function")
                .with_children(vec![
                    UIElement::new("Button").with_label("x"),
                    UIElement::new("Button").with_label("x squared"),
                ]),
            UIElement::new("SegmentedControl")
                .with_label("Mode")
                .with_children(vec![UIElement::new("Button").with_label("x squared")]),
            UIElement::new("TextField").with_label("Minimum x value").with_value("0"),
            UIElement::new("TextField").with_label("Maximum x value").with_value("1"),
            UIElement::new("Other").with_label("Graph").with_children(vec![
                UIElement::new("Other").with_identifier("Rectangle 1"),
                UIElement::new("Other").with_identifier("Rectangle 2"),
                UIElement::new("StaticText").with_label("Area drawn"),
            ]),
        ])
    }

    #[test]
    fn segment_locator_picks_first_control() {
        let window = graph_window();
        let locator = Locator::segment(0, "x squared");
        let found = locator.resolve(&window).unwrap();
        assert_eq!(found.name(), Some("x squared"));
        // The same title in the second control must not be confused with it.
        let second = Locator::segment(1, "x squared").resolve(&window).unwrap();
        assert!(!std::ptr::eq(found, second));
        assert!(Locator::segment(1, "x").resolve(&window).is_none());
    }

    #[test]
    fn text_field_locator_by_name() {
        let window = graph_window();
        let found = Locator::text_field("Maximum x value").resolve(&window).unwrap();
        assert_eq!(found.value.as_deref(), Some("1"));
        assert!(Locator::text_field("Graph").resolve(&window).is_none());
    }

    #[test]
    fn element_locator_uses_identifier_when_unlabeled() {
        let window = graph_window();
        assert!(Locator::element("Rectangle 1").resolve(&window).is_some());
        assert!(Locator::element("Rectangle 3").resolve(&window).is_none());
    }

    #[test]
    fn empty_locator_resolves_to_root() {
        let window = graph_window();
        let found = Locator::new().resolve(&window).unwrap();
        assert!(std::ptr::eq(found, &window));
    }

    #[test]
    fn index_out_of_range_is_none() {
        let window = graph_window();
        assert!(Locator::segment(2, "x").resolve(&window).is_none());
    }

    #[test]
    fn locator_display_notation() {
        assert_eq!(
            Locator::segment(0, "x squared").to_string(),
            r#"window.segmentedControls()[0].buttons()["x squared"]"#
        );
        assert_eq!(
            Locator::element("Rectangle 1").to_string(),
            r#"window.elements()["Rectangle 1"]"#
        );
    }

    #[test]
    fn begins_with_counts_rectangles_only() {
        let window = graph_window();
        let predicate: NamePredicate = "name beginswith 'Rectangle'".parse().unwrap();
        let found = predicate.query_all(&window);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name(), Some("Rectangle 1"));
        assert_eq!(found[1].name(), Some("Rectangle 2"));
    }

    #[test]
    fn begins_with_is_case_sensitive() {
        let predicate = NamePredicate::begins_with("rectangle");
        assert!(predicate.query_all(&graph_window()).is_empty());
    }

    #[test]
    fn parse_comparisons() {
        let p: NamePredicate = "NAME == \"Graph\"".parse().unwrap();
        assert_eq!(p.comparison, Comparison::Equals);
        assert_eq!(p.operand, "Graph");

        let p: NamePredicate = "name CONTAINS 'x value'".parse().unwrap();
        assert_eq!(p.comparison, Comparison::Contains);
        assert_eq!(p.query_all(&graph_window()).len(), 2);

        let p: NamePredicate = "name endswith 'drawn'".parse().unwrap();
        assert_eq!(p.query_all(&graph_window()).len(), 1);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<NamePredicate>(), Err(QueryError::Empty));
        assert_eq!(
            "label beginswith 'x'".parse::<NamePredicate>(),
            Err(QueryError::UnsupportedAttribute("label".into()))
        );
        assert_eq!(
            "name like 'x'".parse::<NamePredicate>(),
            Err(QueryError::UnknownComparison("like".into()))
        );
        assert_eq!(
            "name beginswith Rectangle".parse::<NamePredicate>(),
            Err(QueryError::ExpectedLiteral)
        );
        assert_eq!(
            "name beginswith 'Rect".parse::<NamePredicate>(),
            Err(QueryError::UnterminatedLiteral)
        );
        assert_eq!(
            "name beginswith 'Rect' and".parse::<NamePredicate>(),
            Err(QueryError::TrailingInput("and".into()))
        );
    }

    #[test]
    fn predicate_display_parses_back() {
        let p = NamePredicate::begins_with("Rectangle");
        assert_eq!(p.to_string(), "name beginswith 'Rectangle'");
        assert_eq!(p.to_string().parse::<NamePredicate>().unwrap(), p);
    }

    #[test]
    fn main_window_prefers_window_type() {
        let roots = vec![UIElement::new("Application")
            .with_label("RiemannSum")
            .with_children(vec![graph_window()])];
        assert!(main_window(&roots).unwrap().is_type("Window"));

        let roots = vec![UIElement::new("Other").with_label("Root")];
        assert_eq!(main_window(&roots).unwrap().name(), Some("Root"));

        assert!(main_window(&[]).is_none());
    }

    #[test]
    fn prefix_match_includes_every_name_sharing_the_prefix() {
        let window = UIElement::new("Window").with_label("Riemann Sum").with_children(vec![
            UIElement::new("Other").with_label("Graph").with_children(vec![
                UIElement::new("Other").with_identifier("Rectangle 1"),
                UIElement::new("Other").with_identifier("Rectangle 2"),
            ]),
            UIElement::new("Stepper")
                .with_label("Rectangle count")
                .with_children(vec![UIElement::new("Button").with_label("Increment")]),
            UIElement::new("StaticText").with_label("Rectangles"),
            UIElement::new("StaticText").with_label("rectangle area"),
            UIElement::new("Other")
                .with_label("Area")
                .with_identifier("Rectangle 9"),
        ]);

        let names: Vec<&str> = NamePredicate::begins_with("Rectangle")
            .query_all(&window)
            .into_iter()
            .filter_map(UIElement::name)
            .collect();
        assert_eq!(
            names,
            vec!["Rectangle 1", "Rectangle 2", "Rectangle count", "Rectangles"]
        );
    }
}
