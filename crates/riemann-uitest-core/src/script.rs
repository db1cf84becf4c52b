//! The scripted test sequence as plain data.
//!
//! A script is an ordered `Vec<Step>`. Building it performs no I/O; the
//! [`ScriptRunner`](crate::runner::ScriptRunner) interprets it against a
//! driver and a logger.

use serde::{Deserialize, Serialize};

use crate::query::{Locator, NamePredicate};

pub const TEST_1_NAME: &str = "UI Test 1 - Valid graph with 1 rect: Rect 1 present";
pub const TEST_2_NAME: &str = "UI Test 2 - Valid graph with 1 rect: Only 1 rect present";

pub const FUNCTION_TITLE: &str = "x squared";
pub const MIN_FIELD: &str = "Minimum x value";
pub const MAX_FIELD: &str = "Maximum x value";
pub const MIN_INPUT: &str = "-2";
pub const MAX_INPUT: &str = "2";
pub const FIRST_RECTANGLE: &str = "Rectangle 1";
pub const RECTANGLE_PREFIX: &str = "Rectangle";

/// One scripted action or assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Dump the main window's element tree to the log.
    LogElementTree,
    /// Log the start of a named test.
    LogStart { name: String },
    /// Tap the located element. Fatal if it cannot be found.
    Tap { locator: Locator },
    /// Type into the focused element; `"\n"` confirms.
    TypeText { text: String },
    /// Pass if the located element is present in a fresh tree.
    AssertValid {
        locator: Locator,
        pass: String,
        fail: String,
    },
    /// Pass if exactly `expected` elements match the predicate. The failure
    /// message is `fail_prefix` followed by the actual count.
    AssertCount {
        predicate: NamePredicate,
        expected: usize,
        pass: String,
        fail_prefix: String,
    },
}

impl Step {
    /// Short static name for span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Step::LogElementTree => "log_element_tree",
            Step::LogStart { .. } => "log_start",
            Step::Tap { .. } => "tap",
            Step::TypeText { .. } => "type_text",
            Step::AssertValid { .. } => "assert_valid",
            Step::AssertCount { .. } => "assert_count",
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, Step::AssertValid { .. } | Step::AssertCount { .. })
    }
}

/// Selects "x squared", graphs it over [-2, 2], and checks that exactly one
/// rectangle named "Rectangle 1" is drawn.
pub fn riemann_sum_script() -> Vec<Step> {
    vec![
        Step::LogElementTree,
        Step::LogStart {
            name: TEST_1_NAME.to_string(),
        },
        Step::Tap {
            locator: Locator::segment(0, FUNCTION_TITLE),
        },
        Step::Tap {
            locator: Locator::text_field(MIN_FIELD),
        },
        Step::TypeText {
            text: format!("{MIN_INPUT}\n"),
        },
        Step::Tap {
            locator: Locator::text_field(MAX_FIELD),
        },
        Step::TypeText {
            text: format!("{MAX_INPUT}\n"),
        },
        Step::AssertValid {
            locator: Locator::element(FIRST_RECTANGLE),
            pass: format!("{FIRST_RECTANGLE} is present."),
            fail: format!("{FIRST_RECTANGLE} is NOT present."),
        },
        Step::LogStart {
            name: TEST_2_NAME.to_string(),
        },
        Step::AssertCount {
            predicate: NamePredicate::begins_with(RECTANGLE_PREFIX),
            expected: 1,
            pass: "Only 1 rectangle present.".to_string(),
            fail_prefix: "Incorrect number rectangles present: ".to_string(),
        },
        Step::LogElementTree,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_shape() {
        let script = riemann_sum_script();
        let names: Vec<&str> = script.iter().map(Step::name).collect();
        assert_eq!(
            names,
            vec![
                "log_element_tree",
                "log_start",
                "tap",
                "tap",
                "type_text",
                "tap",
                "type_text",
                "assert_valid",
                "log_start",
                "assert_count",
                "log_element_tree",
            ]
        );
        assert_eq!(script.iter().filter(|s| s.is_assertion()).count(), 2);
    }

    #[test]
    fn typed_values_end_with_return() {
        let typed: Vec<String> = riemann_sum_script()
            .into_iter()
            .filter_map(|s| match s {
                Step::TypeText { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(typed, vec!["-2\n".to_string(), "2\n".to_string()]);
    }

    #[test]
    fn count_assertion_uses_rectangle_prefix() {
        let script = riemann_sum_script();
        let Some(Step::AssertCount {
            predicate, expected, ..
        }) = script.iter().find(|s| matches!(s, Step::AssertCount { .. }))
        else {
            panic!("no count assertion");
        };
        assert_eq!(predicate.to_string(), "name beginswith 'Rectangle'");
        assert_eq!(*expected, 1);
    }

    #[test]
    fn steps_serialize_with_tag() {
        let json = serde_json::to_value(&riemann_sum_script()[1]).unwrap();
        assert_eq!(json["step"], "log_start");
        assert_eq!(json["name"], TEST_1_NAME);
    }
}
