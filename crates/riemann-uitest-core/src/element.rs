//! UI element types for the accessibility tree.
//!
//! These mirror the JSON the accessibility agent emits for a tree dump and are
//! shared by every driver backend, including the in-memory simulated app.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

/// A UI element from the accessibility hierarchy.
///
/// Elements form a tree via `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// The unique accessibility identifier for this element (AXUniqueId).
    #[serde(rename = "AXUniqueId", default)]
    pub identifier: Option<String>,

    /// The accessibility label (AXLabel), typically the user-visible text.
    #[serde(rename = "AXLabel", default)]
    pub label: Option<String>,

    /// The current value of the element (AXValue), e.g. text field contents.
    #[serde(rename = "AXValue", default)]
    pub value: Option<String>,

    /// The type of UI element (e.g. "Button", "TextField", "SegmentedControl").
    #[serde(rename = "type", default)]
    pub element_type: Option<String>,

    /// The element's frame in screen coordinates.
    #[serde(default)]
    pub frame: Option<ElementFrame>,

    /// Child elements nested within this element.
    #[serde(default)]
    pub children: Vec<UIElement>,

    /// The accessibility role of this element.
    #[serde(default)]
    pub role: Option<String>,

    /// Whether the element currently accepts touches.
    #[serde(default)]
    pub hittable: Option<bool>,
}

impl UIElement {
    /// Creates an element of the given type with no other attributes set.
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            identifier: None,
            label: None,
            value: None,
            element_type: Some(element_type.into()),
            frame: None,
            children: Vec::new(),
            role: None,
            hittable: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_frame(mut self, frame: ElementFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_children(mut self, children: Vec<UIElement>) -> Self {
        self.children = children;
        self
    }

    /// The element's accessibility name: its label, or its identifier when
    /// it has no label.
    pub fn name(&self) -> Option<&str> {
        self.label.as_deref().or(self.identifier.as_deref())
    }

    /// Returns true if the element is of the given type.
    pub fn is_type(&self, element_type: &str) -> bool {
        self.element_type.as_deref() == Some(element_type)
    }

    /// Total number of elements in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(UIElement::subtree_len).sum::<usize>()
    }

    /// Renders the subtree as an indented outline, one element per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), self);
        for child in &self.children {
            child.write_outline(out, depth + 1);
        }
    }
}

impl fmt::Display for UIElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_type.as_deref().unwrap_or("Element"))?;
        if let Some(name) = self.name() {
            write!(f, " name:\"{}\"", name)?;
        }
        if let Some(value) = &self.value {
            write!(f, " value:\"{}\"", value)?;
        }
        if let Some(frame) = &self.frame {
            write!(
                f,
                " rect:{{{{{}, {}}}, {{{}, {}}}}}",
                frame.x, frame.y, frame.width, frame.height
            )?;
        }
        Ok(())
    }
}

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen points, origin at the top-left of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementFrame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Centre point, rounded to whole screen points.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x + self.width / 2.0).round() as i32,
            (self.y + self.height / 2.0).round() as i32,
        )
    }

    /// Returns true if the point lies inside the frame (right/bottom edges exclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_prefers_label_over_identifier() {
        let el = UIElement::new("Button")
            .with_identifier("btn-1")
            .with_label("x squared");
        assert_eq!(el.name(), Some("x squared"));

        let el = UIElement::new("Other").with_identifier("Rectangle 1");
        assert_eq!(el.name(), Some("Rectangle 1"));

        assert_eq!(UIElement::new("View").name(), None);
    }

    #[test]
    fn deserializes_agent_json() {
        let json = r#"{
            "AXLabel": "Minimum x value",
            "AXValue": "0",
            "type": "TextField",
            "frame": {"x": 10.0, "y": 20.0, "width": 100.0, "height": 30.0},
            "hittable": true
        }"#;
        let el: UIElement = serde_json::from_str(json).unwrap();
        assert_eq!(el.label.as_deref(), Some("Minimum x value"));
        assert_eq!(el.value.as_deref(), Some("0"));
        assert!(el.is_type("TextField"));
        assert_eq!(el.hittable, Some(true));
        assert!(el.children.is_empty());
        assert!(el.identifier.is_none());
    }

    #[test]
    fn frame_center_and_contains() {
        let frame = ElementFrame::new(10.0, 20.0, 100.0, 30.0);
        assert_eq!(frame.center(), (60, 35));
        assert!(frame.contains(10.0, 20.0));
        assert!(frame.contains(109.9, 49.9));
        assert!(!frame.contains(110.0, 35.0));
        assert!(!frame.contains(60.0, 19.0));
    }

    #[test]
    fn outline_indents_children() {
        let tree = UIElement::new("Window")
            .with_label("Riemann Sum")
            .with_children(vec![UIElement::new("Button").with_label("x")]);
        let outline = tree.outline();
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Window name:\"Riemann Sum\"");
        assert_eq!(lines[1], "  Button name:\"x\"");
        assert_eq!(tree.subtree_len(), 2);
    }
}
