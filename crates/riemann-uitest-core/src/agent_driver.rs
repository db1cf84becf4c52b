//! [`AutomationDriver`] backed by the on-device accessibility agent.
//!
//! # Example
//!
//! ```no_run
//! use riemann_uitest_core::agent_driver::AgentDriver;
//! use riemann_uitest_core::driver::AutomationDriver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut driver = AgentDriver::new("localhost", 9800);
//! driver.connect().await?;
//! let tree = driver.dump_tree().await?;
//! println!("{} root elements", tree.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::agent_client::{AgentClient, AgentClientError};
use crate::driver::{AutomationDriver, DriverError};
use crate::element::UIElement;
use crate::protocol::{Request, Response};

fn map_client_error(err: AgentClientError) -> DriverError {
    match err {
        AgentClientError::NotConnected => DriverError::NotConnected,
        AgentClientError::ConnectionFailed(msg) => DriverError::ConnectionLost(msg),
        AgentClientError::Io(e) => DriverError::Io(e),
        AgentClientError::Protocol(e) => DriverError::CommandFailed(e.to_string()),
        AgentClientError::AgentError(msg) => DriverError::CommandFailed(msg),
        AgentClientError::Timeout => DriverError::Timeout,
    }
}

fn expect_ok(response: Response) -> Result<(), DriverError> {
    match response {
        Response::Ok => Ok(()),
        other => Err(DriverError::CommandFailed(format!(
            "unexpected response: {other:?}"
        ))),
    }
}

/// Driver talking to the agent over direct TCP.
///
/// The client sits behind a [`tokio::sync::Mutex`] so the `&self` trait
/// methods can send requests.
pub struct AgentDriver {
    host: String,
    port: u16,
    client: Mutex<Option<AgentClient>>,
}

impl AgentDriver {
    /// Creates an unconnected driver for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the address, connects and verifies the agent with a heartbeat.
    async fn create_client(&self) -> Result<AgentClient, DriverError> {
        let host_port = format!("{}:{}", self.host, self.port);
        let addr = tokio::net::lookup_host(&host_port)
            .await
            .map_err(|e| DriverError::ConnectionLost(e.to_string()))?
            .next()
            .ok_or_else(|| DriverError::ConnectionLost(format!("could not resolve {host_port}")))?;

        let mut client = AgentClient::new(addr);
        client.connect().await.map_err(map_client_error)?;
        client.heartbeat().await.map_err(map_client_error)?;
        Ok(client)
    }

    async fn send(&self, request: &Request) -> Result<Response, DriverError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(DriverError::NotConnected)?;
        client.send(request).await.map_err(map_client_error)
    }
}

#[async_trait]
impl AutomationDriver for AgentDriver {
    #[instrument(skip(self), level = "debug")]
    async fn connect(&mut self) -> Result<(), DriverError> {
        let client = self.create_client().await?;
        *self.client.lock().await = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|g| g.as_ref().is_some_and(AgentClient::is_connected))
            .unwrap_or(false)
    }

    async fn tap_location(&self, x: i32, y: i32) -> Result<(), DriverError> {
        expect_ok(self.send(&Request::TapCoord { x, y }).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn tap_element(&self, identifier: &str) -> Result<(), DriverError> {
        expect_ok(
            self.send(&Request::TapElement {
                selector: identifier.to_string(),
            })
            .await?,
        )
    }

    #[instrument(skip(self), level = "debug")]
    async fn tap_by_label(&self, label: &str) -> Result<(), DriverError> {
        expect_ok(
            self.send(&Request::TapByLabel {
                label: label.to_string(),
            })
            .await?,
        )
    }

    #[instrument(skip(self), level = "debug")]
    async fn tap_with_type(
        &self,
        selector: &str,
        by_label: bool,
        element_type: &str,
    ) -> Result<(), DriverError> {
        expect_ok(
            self.send(&Request::TapWithType {
                selector: selector.to_string(),
                by_label,
                element_type: element_type.to_string(),
            })
            .await?,
        )
    }

    #[instrument(skip(self), level = "debug")]
    async fn type_text(&self, text: &str) -> Result<(), DriverError> {
        expect_ok(
            self.send(&Request::TypeText {
                text: text.to_string(),
            })
            .await?,
        )
    }

    #[instrument(skip(self), level = "debug")]
    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        match self.send(&Request::DumpTree).await? {
            Response::Tree { json } => {
                let elements: Vec<UIElement> = serde_json::from_str(&json)
                    .map_err(|e| DriverError::JsonParse(e.to_string()))?;
                debug!(element_count = elements.len(), "tree dumped");
                Ok(elements)
            }
            other => Err(DriverError::CommandFailed(format!(
                "unexpected response: {other:?}"
            ))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_target(&self, bundle_id: &str) -> Result<(), DriverError> {
        expect_ok(
            self.send(&Request::SetTarget {
                bundle_id: bundle_id.to_string(),
            })
            .await?,
        )
    }
}
