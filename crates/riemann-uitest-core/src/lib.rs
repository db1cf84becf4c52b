//! # riemann-uitest-core
//!
//! Scripted UI acceptance tests for the Riemann Sum graphing app.
//!
//! The script selects a function, enters a range, and checks what the graph
//! view draws by querying the app's accessibility tree. It is plain data
//! ([`script::Step`]) interpreted by a [`runner::ScriptRunner`] against any
//! [`driver::AutomationDriver`].
//!
//! ## Modules
//!
//! - [`element`] - Accessibility tree model
//! - [`query`] - Locator chains and name predicates over the tree
//! - [`driver`] - Backend-agnostic automation trait
//! - [`protocol`] - Binary wire protocol spoken by the on-device agent
//! - [`agent_client`] - Framed TCP client for the agent
//! - [`agent_driver`] - [`driver::AutomationDriver`] over the agent client
//! - [`simulated`] - In-memory model of the app, for running without a device
//! - [`logger`] - Test-log sinks (terminal/tracing and in-memory/JSONL)
//! - [`script`] - The test script
//! - [`runner`] - Step execution and run reports
//! - [`config`] - Persistent settings in `~/.riemann-uitest/`
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use riemann_uitest_core::agent_driver::AgentDriver;
//! use riemann_uitest_core::driver::AutomationDriver;
//! use riemann_uitest_core::logger::TracingLogger;
//! use riemann_uitest_core::runner::ScriptRunner;
//! use riemann_uitest_core::script::riemann_sum_script;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut driver = AgentDriver::new("localhost", 9800);
//! driver.connect().await?;
//!
//! let runner = ScriptRunner::new(Arc::new(driver), TracingLogger::new());
//! let report = runner.run(&riemann_sum_script()).await?;
//! println!("{} of {} assertions passed", report.passed_count(), report.outcomes.len());
//! # Ok(())
//! # }
//! ```

pub mod agent_client;
pub mod agent_driver;
pub mod config;
pub mod driver;
pub mod element;
pub mod logger;
pub mod protocol;
pub mod query;
pub mod runner;
pub mod script;
pub mod simulated;
