//! Sequential execution of a step script.
//!
//! [`ScriptRunner`] acquires the foreground application and its main window
//! once, then walks the [`Step`] list in order. Every step awaits its driver
//! call before the next begins. Assertions never abort the run: they are
//! logged and collected into the [`RunReport`]. Anything else that goes wrong
//! (driver error, missing window, tap target not found) aborts with a
//! [`RunnerError`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use riemann_uitest_core::logger::TracingLogger;
//! use riemann_uitest_core::runner::ScriptRunner;
//! use riemann_uitest_core::script::riemann_sum_script;
//! use riemann_uitest_core::simulated::SimulatedGraphApp;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ScriptRunner::new(Arc::new(SimulatedGraphApp::new()), TracingLogger::new());
//! let report = runner.run(&riemann_sum_script()).await?;
//! assert!(report.all_passed());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::driver::{AutomationDriver, DriverError};
use crate::element::UIElement;
use crate::logger::TestLogger;
use crate::query::{main_window, ElementKind};
use crate::script::Step;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("no application in the foreground: {0}")]
    NoForegroundApp(String),

    #[error("application has no main window")]
    NoMainWindow,

    #[error("step {step} ({action}): element not found: {locator}")]
    ElementNotFound {
        step: usize,
        action: &'static str,
        locator: String,
    },

    #[error("step {step} ({action}): {source}")]
    StepFailed {
        step: usize,
        action: &'static str,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl RunnerError {
    /// Process exit code: 2 for backend trouble, 3 for an application that
    /// is not in the expected state.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::NoForegroundApp(_)
            | RunnerError::StepFailed { .. }
            | RunnerError::Driver(_) => 2,
            RunnerError::NoMainWindow | RunnerError::ElementNotFound { .. } => 3,
        }
    }
}

/// Handle to the application under test, acquired once per run.
pub struct AppHandle {
    driver: Arc<dyn AutomationDriver>,
    bundle_id: Option<String>,
}

impl AppHandle {
    pub fn bundle_id(&self) -> Option<&str> {
        self.bundle_id.as_deref()
    }

    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        self.driver.dump_tree().await
    }
}

/// Handle to the main window, identified by the name it had at acquisition.
#[derive(Debug, Clone)]
pub struct WindowHandle {
    name: Option<String>,
}

impl WindowHandle {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Picks this window out of a fresh tree dump.
    fn find_in(&self, roots: &[UIElement]) -> Option<UIElement> {
        fn by_name<'a>(elements: &'a [UIElement], name: &str) -> Option<&'a UIElement> {
            elements.iter().find_map(|el| {
                if el.is_type(ElementKind::Window.as_str()) && el.name() == Some(name) {
                    Some(el)
                } else {
                    by_name(&el.children, name)
                }
            })
        }

        let found = match &self.name {
            Some(name) => by_name(roots, name),
            None => main_window(roots),
        };
        found.cloned()
    }

    /// Dumps the tree and returns the current state of this window.
    async fn snapshot(&self, app: &AppHandle) -> Result<UIElement, DriverError> {
        let roots = app.dump_tree().await?;
        self.find_in(&roots).ok_or_else(|| {
            DriverError::CommandFailed(format!(
                "main window {:?} disappeared from the tree",
                self.name().unwrap_or("<unnamed>")
            ))
        })
    }
}

/// Tuning for a run.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Pause after each typed string before the next step.
    pub settle_delay: Duration,
    /// Application to target instead of whatever is in the foreground.
    pub target_bundle_id: Option<String>,
}

/// Result of one assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    /// Name of the test that was started most recently.
    pub test: Option<String>,
    /// 1-based step index.
    pub step: usize,
    pub passed: bool,
    pub message: String,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<AssertionOutcome>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }
}

/// Executes a [`Step`] list against a driver, reporting through a logger.
pub struct ScriptRunner<L: TestLogger> {
    driver: Arc<dyn AutomationDriver>,
    logger: L,
    options: RunnerOptions,
}

impl<L: TestLogger> ScriptRunner<L> {
    pub fn new(driver: Arc<dyn AutomationDriver>, logger: L) -> Self {
        Self {
            driver,
            logger,
            options: RunnerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Acquires the foreground application, optionally retargeting first.
    pub async fn acquire_app(&self) -> Result<AppHandle, RunnerError> {
        if !self.driver.is_connected() {
            return Err(RunnerError::NoForegroundApp(
                "automation backend is not connected".to_string(),
            ));
        }
        if let Some(bundle_id) = &self.options.target_bundle_id {
            self.driver.set_target(bundle_id).await?;
        }
        Ok(AppHandle {
            driver: Arc::clone(&self.driver),
            bundle_id: self.options.target_bundle_id.clone(),
        })
    }

    /// Locates the main window of `app`.
    pub async fn main_window(&self, app: &AppHandle) -> Result<WindowHandle, RunnerError> {
        let roots = app.dump_tree().await?;
        let window = main_window(&roots).ok_or(RunnerError::NoMainWindow)?;
        Ok(WindowHandle {
            name: window.name().map(str::to_string),
        })
    }

    /// Runs `steps` to completion.
    pub async fn run(&self, steps: &[Step]) -> Result<RunReport, RunnerError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("script_run", %run_id, steps = steps.len());
        async {
            let started_at = Utc::now();
            let app = self.acquire_app().await?;
            let window = self.main_window(&app).await?;
            info!(
                app = app.bundle_id().unwrap_or("<foreground>"),
                window = window.name().unwrap_or("<unnamed>"),
                "acquired main window"
            );

            let mut state = RunState::default();
            for (i, step) in steps.iter().enumerate() {
                let index = i + 1;
                let span = info_span!("step", index, action = step.name());
                self.execute_step(&app, &window, index, step, &mut state)
                    .instrument(span)
                    .await?;
            }

            let report = RunReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                outcomes: state.outcomes,
            };
            info!(
                passed = report.passed_count(),
                failed = report.outcomes.len() - report.passed_count(),
                "run complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn execute_step(
        &self,
        app: &AppHandle,
        window: &WindowHandle,
        index: usize,
        step: &Step,
        state: &mut RunState,
    ) -> Result<(), RunnerError> {
        let action = step.name();
        let fail = |source: DriverError| RunnerError::StepFailed {
            step: index,
            action,
            source,
        };

        match step {
            Step::LogElementTree => {
                let snapshot = window.snapshot(app).await.map_err(fail)?;
                self.logger.log_element_tree(&snapshot);
            }
            Step::LogStart { name } => {
                state.current_test = Some(name.clone());
                self.logger.log_start(name);
            }
            Step::Tap { locator } => {
                let snapshot = window.snapshot(app).await.map_err(fail)?;
                let target = locator
                    .resolve(&snapshot)
                    .ok_or_else(|| RunnerError::ElementNotFound {
                        step: index,
                        action,
                        locator: locator.to_string(),
                    })?;
                debug!(%locator, "tapping");
                self.tap(target).await.map_err(fail)?;
            }
            Step::TypeText { text } => {
                self.driver.type_text(text).await.map_err(fail)?;
                if !self.options.settle_delay.is_zero() {
                    tokio::time::sleep(self.options.settle_delay).await;
                }
            }
            Step::AssertValid {
                locator,
                pass,
                fail: fail_message,
            } => {
                let snapshot = window.snapshot(app).await.map_err(fail)?;
                let present = locator.resolve(&snapshot).is_some();
                debug!(%locator, present, "validity check");
                self.record(state, index, present, if present { pass } else { fail_message });
            }
            Step::AssertCount {
                predicate,
                expected,
                pass,
                fail_prefix,
            } => {
                let snapshot = window.snapshot(app).await.map_err(fail)?;
                let count = predicate.query_all(&snapshot).len();
                debug!(%predicate, count, expected, "count check");
                if count == *expected {
                    self.record(state, index, true, pass);
                } else {
                    self.record(state, index, false, &format!("{fail_prefix}{count}"));
                }
            }
        }
        Ok(())
    }

    fn record(&self, state: &mut RunState, step: usize, passed: bool, message: &str) {
        if passed {
            self.logger.log_pass(message);
        } else {
            self.logger.log_fail(message);
        }
        state.outcomes.push(AssertionOutcome {
            test: state.current_test.clone(),
            step,
            passed,
            message: message.to_string(),
        });
    }

    /// Taps the centre of the element's frame, or addresses it by type and
    /// name when it has no frame.
    async fn tap(&self, element: &UIElement) -> Result<(), DriverError> {
        if let Some(frame) = element.frame {
            let (x, y) = frame.center();
            return self.driver.tap_location(x, y).await;
        }
        match (
            element.element_type.as_deref(),
            element.label.as_deref(),
            element.identifier.as_deref(),
        ) {
            (Some(typ), Some(label), _) => self.driver.tap_with_type(label, true, typ).await,
            (Some(typ), None, Some(id)) => self.driver.tap_with_type(id, false, typ).await,
            (None, Some(label), _) => self.driver.tap_by_label(label).await,
            (None, None, Some(id)) => self.driver.tap_element(id).await,
            _ => Err(DriverError::CommandFailed(format!(
                "cannot address element {element}"
            ))),
        }
    }
}

#[derive(Default)]
struct RunState {
    current_test: Option<String>,
    outcomes: Vec<AssertionOutcome>,
}
