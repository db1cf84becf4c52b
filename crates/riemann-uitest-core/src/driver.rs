//! Automation driver trait for backend-agnostic UI automation.
//!
//! [`AutomationDriver`] is the seam between the script runner and whatever
//! actually owns the application under test: a TCP connection to the
//! on-device accessibility agent ([`AgentDriver`](crate::agent_driver::AgentDriver))
//! or the in-memory [`SimulatedGraphApp`](crate::simulated::SimulatedGraphApp).
//!
//! # Backend Selection
//!
//! ```
//! use riemann_uitest_core::driver::DriverConfig;
//!
//! let live = DriverConfig::Agent { host: "localhost".to_string(), port: 9800 };
//! let offline = DriverConfig::Simulated;
//! # let _ = (live, offline);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::agent_driver::AgentDriver;
use crate::element::UIElement;
use crate::simulated::SimulatedGraphApp;

/// Errors raised by any driver backend.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A command was rejected or failed on the backend.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Not connected to automation backend")]
    NotConnected,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

/// Which backend to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverConfig {
    /// The accessibility agent reachable over TCP.
    Agent { host: String, port: u16 },
    /// The in-memory model of the graphing app.
    Simulated,
}

impl DriverConfig {
    /// Builds the backend and connects it.
    pub async fn connect(&self) -> Result<Arc<dyn AutomationDriver>, DriverError> {
        match self {
            DriverConfig::Agent { host, port } => {
                let mut driver = AgentDriver::new(host.clone(), *port);
                driver.connect().await?;
                Ok(Arc::new(driver))
            }
            DriverConfig::Simulated => {
                let mut app = SimulatedGraphApp::new();
                app.connect().await?;
                Ok(Arc::new(app))
            }
        }
    }
}

/// Backend-agnostic UI automation.
///
/// Every method that touches the application is async so TCP-backed and
/// in-memory backends share one interface.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Establishes the connection to the backend.
    async fn connect(&mut self) -> Result<(), DriverError>;

    fn is_connected(&self) -> bool;

    /// Taps at screen coordinates (points).
    async fn tap_location(&self, x: i32, y: i32) -> Result<(), DriverError>;

    /// Taps the element with the given accessibility identifier.
    async fn tap_element(&self, identifier: &str) -> Result<(), DriverError>;

    /// Taps the element with the given accessibility label.
    async fn tap_by_label(&self, label: &str) -> Result<(), DriverError>;

    /// Taps the first element of `element_type` whose label (`by_label`) or
    /// identifier matches `selector`.
    async fn tap_with_type(
        &self,
        selector: &str,
        by_label: bool,
        element_type: &str,
    ) -> Result<(), DriverError>;

    /// Types text into the focused element. A trailing `"\n"` acts as the
    /// keyboard's return key.
    async fn type_text(&self, text: &str) -> Result<(), DriverError>;

    /// Returns the root elements of the foreground application's accessibility tree.
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError>;

    /// Points subsequent queries at the application with `bundle_id`.
    ///
    /// Backends that always talk to the foreground application reject this.
    async fn set_target(&self, _bundle_id: &str) -> Result<(), DriverError> {
        Err(DriverError::CommandFailed(
            "set_target not supported by this backend".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display() {
        let err = DriverError::CommandFailed("tap failed".to_string());
        assert!(err.to_string().contains("tap failed"));

        assert!(DriverError::NotConnected.to_string().contains("Not connected"));
        assert!(DriverError::Timeout.to_string().contains("timed out"));

        let err = DriverError::ConnectionLost("reset by peer".to_string());
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn driver_config_variants() {
        let config = DriverConfig::Agent {
            host: "localhost".to_string(),
            port: 9800,
        };
        assert_eq!(config.clone(), config);
        assert_ne!(config, DriverConfig::Simulated);
    }

    #[tokio::test]
    async fn simulated_config_connects() {
        let driver = DriverConfig::Simulated.connect().await.unwrap();
        assert!(driver.is_connected());
        assert_eq!(driver.dump_tree().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn agent_config_without_agent_fails() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = DriverConfig::Agent {
            host: "127.0.0.1".to_string(),
            port,
        };
        assert!(config.connect().await.is_err());
    }
}
