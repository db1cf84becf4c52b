//! In-memory model of the Riemann Sum graphing app.
//!
//! [`SimulatedGraphApp`] implements [`AutomationDriver`] without a device: it
//! keeps the app's control state, recomputes the left Riemann sum on every
//! committed change, and renders an accessibility tree with one element per
//! drawn rectangle. Taps are hit-tested against element frames exactly as a
//! real backend would.
//!
//! Screen layout (points, 320 x 568):
//!
//! ```text
//! Window "Riemann Sum"
//! ├── Other "Graph"                    y  20..320, holds "Rectangle 1".."Rectangle n"
//! ├── SegmentedControl "Function"      y 330..360, buttons "x" | "x squared" | "x cubed"
//! ├── TextField "Minimum x value"      y 370..400 (left half)
//! ├── TextField "Maximum x value"      y 370..400 (right half)
//! ├── Stepper "Interval count"         y 410..440, buttons "Decrement" | "Increment"
//! ├── StaticText "Riemann sum"         y 450..470
//! └── StaticText "Integrated value"    y 475..495
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::driver::{AutomationDriver, DriverError};
use crate::element::{ElementFrame, UIElement};

/// Bundle identifier the simulated app answers to.
pub const BUNDLE_ID: &str = "com.example.RiemannSum";

const SCREEN_WIDTH: f64 = 320.0;
const SCREEN_HEIGHT: f64 = 568.0;
const GRAPH_FRAME: ElementFrame = ElementFrame {
    x: 0.0,
    y: 20.0,
    width: SCREEN_WIDTH,
    height: 300.0,
};
const MAX_INTERVALS: u32 = 100;

const ID_MIN_FIELD: &str = "field:min";
const ID_MAX_FIELD: &str = "field:max";
const ID_INCREMENT: &str = "stepper:increment";
const ID_DECREMENT: &str = "stepper:decrement";
const SEGMENT_ID_PREFIX: &str = "segment:";

/// Functions offered by the segmented control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFunction {
    Linear,
    Square,
    Cube,
}

impl GraphFunction {
    pub const ALL: [GraphFunction; 3] = [GraphFunction::Linear, GraphFunction::Square, GraphFunction::Cube];

    /// Segment title.
    pub fn title(&self) -> &'static str {
        match self {
            GraphFunction::Linear => "x",
            GraphFunction::Square => "x squared",
            GraphFunction::Cube => "x cubed",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.title() == title)
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self {
            GraphFunction::Linear => x,
            GraphFunction::Square => x * x,
            GraphFunction::Cube => x * x * x,
        }
    }

    /// An antiderivative, for the exact integral.
    pub fn integrated(&self, x: f64) -> f64 {
        match self {
            GraphFunction::Linear => x * x / 2.0,
            GraphFunction::Square => x * x * x / 3.0,
            GraphFunction::Cube => x * x * x * x / 4.0,
        }
    }
}

/// Left Riemann sum over `[x_min, x_max]` with `interval_count` intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiemannModel {
    pub function: GraphFunction,
    pub x_min: f64,
    pub x_max: f64,
    pub interval_count: u32,
}

impl RiemannModel {
    /// True when the range is empty, inverted, or not finite.
    pub fn is_error(&self) -> bool {
        !self.x_min.is_finite()
            || !self.x_max.is_finite()
            || self.x_min >= self.x_max
            || self.interval_count == 0
    }

    pub fn delta_x(&self) -> f64 {
        (self.x_max - self.x_min) / f64::from(self.interval_count)
    }

    /// `(x, f(x))` at every interval boundary, `interval_count + 1` points.
    pub fn function_values(&self) -> Vec<(f64, f64)> {
        let dx = self.delta_x();
        (0..=self.interval_count)
            .map(|i| {
                let x = self.x_min + f64::from(i) * dx;
                (x, self.function.eval(x))
            })
            .collect()
    }

    pub fn sum(&self) -> f64 {
        let dx = self.delta_x();
        self.function_values()
            .iter()
            .take(self.interval_count as usize)
            .map(|(_, fx)| fx * dx)
            .sum()
    }

    pub fn integrated_value(&self) -> f64 {
        self.function.integrated(self.x_max) - self.function.integrated(self.x_min)
    }
}

/// Deliberate rendering faults, for exercising failing assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regression {
    /// Draws one additional element whose name starts with "Rectangle".
    ExtraRectangle,
    /// Draws no rectangles at all.
    NoRectangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Min,
    Max,
}

#[derive(Debug)]
struct AppState {
    function: GraphFunction,
    min_text: String,
    max_text: String,
    committed_min: String,
    committed_max: String,
    interval_count: u32,
    focused: Option<Field>,
    regression: Option<Regression>,
}

impl AppState {
    fn model(&self) -> Option<RiemannModel> {
        let x_min = self.committed_min.trim().parse::<f64>().ok()?;
        let x_max = self.committed_max.trim().parse::<f64>().ok()?;
        let model = RiemannModel {
            function: self.function,
            x_min,
            x_max,
            interval_count: self.interval_count,
        };
        (!model.is_error()).then_some(model)
    }

    fn field_text_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Min => &mut self.min_text,
            Field::Max => &mut self.max_text,
        }
    }

    fn commit(&mut self, field: Field) {
        match field {
            Field::Min => self.committed_min = self.min_text.clone(),
            Field::Max => self.committed_max = self.max_text.clone(),
        }
        self.focused = None;
        debug!(?field, model = ?self.model(), "committed field");
    }

    fn activate(&mut self, identifier: &str) -> Result<(), DriverError> {
        match identifier {
            ID_MIN_FIELD | ID_MAX_FIELD => {
                let field = if identifier == ID_MIN_FIELD { Field::Min } else { Field::Max };
                // Editing starts from an empty field.
                self.field_text_mut(field).clear();
                self.focused = Some(field);
            }
            ID_INCREMENT => self.interval_count = (self.interval_count + 1).min(MAX_INTERVALS),
            ID_DECREMENT => self.interval_count = self.interval_count.saturating_sub(1).max(1),
            id => {
                let title = id.strip_prefix(SEGMENT_ID_PREFIX).ok_or_else(|| {
                    DriverError::CommandFailed(format!("element '{id}' is not interactive"))
                })?;
                self.function = GraphFunction::from_title(title).ok_or_else(|| {
                    DriverError::CommandFailed(format!("unknown function segment '{title}'"))
                })?;
            }
        }
        Ok(())
    }

    fn render(&self) -> UIElement {
        let (controls_y, controls_h) = (330.0, 30.0);
        let (fields_y, fields_h) = (370.0, 30.0);
        let (stepper_y, stepper_h) = (410.0, 30.0);

        let segment_width = 300.0 / GraphFunction::ALL.len() as f64;
        let segments = GraphFunction::ALL
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let mut button = UIElement::new("Button")
                    .with_label(f.title())
                    .with_identifier(format!("{SEGMENT_ID_PREFIX}{}", f.title()))
                    .with_frame(ElementFrame::new(
                        10.0 + i as f64 * segment_width,
                        controls_y,
                        segment_width,
                        controls_h,
                    ));
                if *f == self.function {
                    button.value = Some("selected".to_string());
                }
                button
            })
            .collect();

        let model = self.model();
        let (sum_text, integral_text) = match &model {
            Some(m) => (format!("{:.2}", m.sum()), format!("{:.2}", m.integrated_value())),
            None => ("Error".to_string(), "Error".to_string()),
        };

        UIElement::new("Window")
            .with_label("Riemann Sum")
            .with_frame(ElementFrame::new(0.0, 0.0, SCREEN_WIDTH, SCREEN_HEIGHT))
            .with_children(vec![
                UIElement::new("Other")
                    .with_label("Graph")
                    .with_frame(GRAPH_FRAME)
                    .with_children(self.render_rectangles(model.as_ref())),
                UIElement::new("SegmentedControl")
                    .with_label("Function")
                    .with_frame(ElementFrame::new(10.0, controls_y, 300.0, controls_h))
                    .with_children(segments),
                text_field(
                    "Minimum x value",
                    ID_MIN_FIELD,
                    &self.min_text,
                    ElementFrame::new(10.0, fields_y, 145.0, fields_h),
                ),
                text_field(
                    "Maximum x value",
                    ID_MAX_FIELD,
                    &self.max_text,
                    ElementFrame::new(165.0, fields_y, 145.0, fields_h),
                ),
                UIElement::new("Stepper")
                    .with_label("Interval count")
                    .with_value(self.interval_count.to_string())
                    .with_frame(ElementFrame::new(10.0, stepper_y, 100.0, stepper_h))
                    .with_children(vec![
                        UIElement::new("Button")
                            .with_label("Decrement")
                            .with_identifier(ID_DECREMENT)
                            .with_frame(ElementFrame::new(10.0, stepper_y, 50.0, stepper_h)),
                        UIElement::new("Button")
                            .with_label("Increment")
                            .with_identifier(ID_INCREMENT)
                            .with_frame(ElementFrame::new(60.0, stepper_y, 50.0, stepper_h)),
                    ]),
                UIElement::new("StaticText")
                    .with_label("Riemann sum")
                    .with_value(sum_text)
                    .with_frame(ElementFrame::new(10.0, 450.0, 300.0, 20.0)),
                UIElement::new("StaticText")
                    .with_label("Integrated value")
                    .with_value(integral_text)
                    .with_frame(ElementFrame::new(10.0, 475.0, 300.0, 20.0)),
            ])
    }

    fn render_rectangles(&self, model: Option<&RiemannModel>) -> Vec<UIElement> {
        let Some(model) = model else {
            return Vec::new();
        };
        if self.regression == Some(Regression::NoRectangles) {
            return Vec::new();
        }

        let values = model.function_values();
        let (y_lo, y_hi) = values.iter().fold((0.0_f64, 0.0_f64), |(lo, hi), (_, fx)| {
            (lo.min(*fx), hi.max(*fx))
        });
        let y_span = if y_hi > y_lo { y_hi - y_lo } else { 1.0 };
        let x_span = model.x_max - model.x_min;
        let to_px = |x: f64| GRAPH_FRAME.x + (x - model.x_min) / x_span * GRAPH_FRAME.width;
        let to_py = |y: f64| GRAPH_FRAME.y + (y_hi - y) / y_span * GRAPH_FRAME.height;

        let mut rects: Vec<UIElement> = values
            .iter()
            .take(model.interval_count as usize)
            .enumerate()
            .map(|(i, (x, fx))| {
                let left = to_px(*x);
                let right = to_px(x + model.delta_x());
                let top = to_py(fx.max(0.0));
                let bottom = to_py(fx.min(0.0));
                UIElement::new("Other")
                    .with_label(format!("Rectangle {}", i + 1))
                    .with_value(format!("{:.2}", fx))
                    .with_frame(ElementFrame::new(left, top, right - left, bottom - top))
            })
            .collect();

        if self.regression == Some(Regression::ExtraRectangle) {
            rects.push(
                UIElement::new("Other")
                    .with_label(format!("Rectangle {}", rects.len() + 1))
                    .with_frame(ElementFrame::new(GRAPH_FRAME.x, GRAPH_FRAME.y, 1.0, 1.0)),
            );
        }
        rects
    }
}

fn text_field(label: &str, identifier: &str, text: &str, frame: ElementFrame) -> UIElement {
    let mut field = UIElement::new("TextField")
        .with_label(label)
        .with_identifier(identifier)
        .with_frame(frame);
    if !text.is_empty() {
        field.value = Some(text.to_string());
    }
    field
}

/// Finds the deepest element containing the point; later siblings are on top.
fn hit_test(element: &UIElement, x: f64, y: f64) -> Option<&UIElement> {
    if !element.frame.is_some_and(|f| f.contains(x, y)) {
        return None;
    }
    element
        .children
        .iter()
        .rev()
        .find_map(|child| hit_test(child, x, y))
        .or(Some(element))
}

fn find_element<'a>(
    element: &'a UIElement,
    matches: &dyn Fn(&UIElement) -> bool,
) -> Option<&'a UIElement> {
    if matches(element) {
        return Some(element);
    }
    element
        .children
        .iter()
        .find_map(|child| find_element(child, matches))
}

/// The Riemann Sum app, held in memory.
#[derive(Debug)]
pub struct SimulatedGraphApp {
    state: Mutex<AppState>,
    foreground: AtomicBool,
}

impl Default for SimulatedGraphApp {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGraphApp {
    /// A freshly launched app in the foreground: "x" over [0, 1], one rectangle.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState {
                function: GraphFunction::Linear,
                min_text: "0".to_string(),
                max_text: "1".to_string(),
                committed_min: "0".to_string(),
                committed_max: "1".to_string(),
                interval_count: 1,
                focused: None,
                regression: None,
            }),
            foreground: AtomicBool::new(true),
        }
    }

    /// Starts with the stepper at `count` (clamped to 1..=100).
    pub fn with_interval_count(self, count: u32) -> Self {
        self.lock().interval_count = count.clamp(1, MAX_INTERVALS);
        self
    }

    pub fn with_regression(self, regression: Regression) -> Self {
        self.lock().regression = Some(regression);
        self
    }

    /// The app is installed but not in the foreground until [`connect`](AutomationDriver::connect).
    pub fn in_background(self) -> Self {
        self.foreground.store(false, Ordering::SeqCst);
        self
    }

    /// The model behind the current graph, or `None` in the error state.
    pub fn model(&self) -> Option<RiemannModel> {
        self.lock().model()
    }

    pub fn selected_function(&self) -> GraphFunction {
        self.lock().function
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_foreground(&self) -> Result<(), DriverError> {
        if self.foreground.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    /// Activates the first element matching `matches`, by its identifier.
    fn activate_matching(
        &self,
        description: &str,
        matches: &dyn Fn(&UIElement) -> bool,
    ) -> Result<(), DriverError> {
        self.ensure_foreground()?;
        let mut state = self.lock();
        let tree = state.render();
        let identifier = find_element(&tree, matches)
            .ok_or_else(|| DriverError::CommandFailed(format!("element not found: {description}")))?
            .identifier
            .clone()
            .ok_or_else(|| {
                DriverError::CommandFailed(format!("element '{description}' is not interactive"))
            })?;
        state.activate(&identifier)
    }
}

#[async_trait]
impl AutomationDriver for SimulatedGraphApp {
    async fn connect(&mut self) -> Result<(), DriverError> {
        self.foreground.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    async fn tap_location(&self, x: i32, y: i32) -> Result<(), DriverError> {
        self.ensure_foreground()?;
        let mut state = self.lock();
        let tree = state.render();
        let hit = hit_test(&tree, f64::from(x), f64::from(y));
        trace!(x, y, hit = ?hit.map(ToString::to_string), "hit test");
        // Taps on static content are accepted and do nothing.
        match hit.and_then(|el| el.identifier.clone()) {
            Some(identifier) => state.activate(&identifier),
            None => Ok(()),
        }
    }

    async fn tap_element(&self, identifier: &str) -> Result<(), DriverError> {
        self.activate_matching(identifier, &|el: &UIElement| el.identifier.as_deref() == Some(identifier))
    }

    async fn tap_by_label(&self, label: &str) -> Result<(), DriverError> {
        self.activate_matching(label, &|el: &UIElement| el.label.as_deref() == Some(label))
    }

    async fn tap_with_type(
        &self,
        selector: &str,
        by_label: bool,
        element_type: &str,
    ) -> Result<(), DriverError> {
        self.activate_matching(selector, &|el: &UIElement| {
            let key = if by_label { &el.label } else { &el.identifier };
            el.is_type(element_type) && key.as_deref() == Some(selector)
        })
    }

    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        self.ensure_foreground()?;
        let mut state = self.lock();
        for ch in text.chars() {
            let field = state.focused.ok_or_else(|| {
                DriverError::CommandFailed("no element has keyboard focus".to_string())
            })?;
            if ch == '\n' {
                state.commit(field);
            } else {
                state.field_text_mut(field).push(ch);
            }
        }
        Ok(())
    }

    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        self.ensure_foreground()?;
        Ok(vec![self.lock().render()])
    }

    async fn set_target(&self, bundle_id: &str) -> Result<(), DriverError> {
        if bundle_id == BUNDLE_ID {
            self.foreground.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(DriverError::CommandFailed(format!(
                "application '{bundle_id}' is not installed"
            )))
        }
    }
}
