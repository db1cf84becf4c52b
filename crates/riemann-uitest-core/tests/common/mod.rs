//! Shared test helpers for riemann-uitest-core integration tests.
//!
//! Provides mock TCP agents speaking the binary protocol: one that replays
//! canned responses, and one that forwards every request to an in-memory
//! [`SimulatedGraphApp`] so the full agent path can be driven end to end.
//! [`StaticScreen`] serves a hand-built tree directly, for checks whose
//! expected values must not come from the in-memory app.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use riemann_uitest_core::agent_driver::AgentDriver;
use riemann_uitest_core::driver::{AutomationDriver, DriverError};
use riemann_uitest_core::element::UIElement;
use riemann_uitest_core::protocol::{
    decode_request, encode_response, read_frame_length, Request, Response,
};
use riemann_uitest_core::simulated::SimulatedGraphApp;

/// Reads one request frame; `None` once the peer hangs up.
async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let len = read_frame_length(&header) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.ok()?;
    decode_request(&payload).ok()
}

async fn write_response(stream: &mut TcpStream, response: &Response) {
    let _ = stream.write_all(&encode_response(response)).await;
    let _ = stream.flush().await;
}

/// Start a mock TCP agent that accepts one connection and answers each
/// request with the next canned response. The first response is consumed by
/// the heartbeat that `AgentDriver::connect()` sends.
pub async fn mock_agent(responses: Vec<Response>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for response in responses {
            if read_request(&mut stream).await.is_none() {
                return;
            }
            write_response(&mut stream, &response).await;
        }
    });

    addr
}

fn to_response(result: Result<(), DriverError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

/// Start a mock agent backed by `app`. Serves a single connection until the
/// client disconnects.
pub async fn simulated_agent(app: Arc<SimulatedGraphApp>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        while let Some(request) = read_request(&mut stream).await {
            let response = match request {
                Request::Heartbeat => Response::Ok,
                Request::TapCoord { x, y } => to_response(app.tap_location(x, y).await),
                Request::TapElement { selector } => to_response(app.tap_element(&selector).await),
                Request::TapByLabel { label } => to_response(app.tap_by_label(&label).await),
                Request::TapWithType {
                    selector,
                    by_label,
                    element_type,
                } => to_response(app.tap_with_type(&selector, by_label, &element_type).await),
                Request::TypeText { text } => to_response(app.type_text(&text).await),
                Request::SetTarget { bundle_id } => to_response(app.set_target(&bundle_id).await),
                Request::DumpTree => match app.dump_tree().await {
                    Ok(roots) => Response::Tree {
                        json: serde_json::to_string(&roots).unwrap(),
                    },
                    Err(e) => Response::Error {
                        message: e.to_string(),
                    },
                },
            };
            write_response(&mut stream, &response).await;
        }
    });

    addr
}

/// An `AgentDriver` already connected to `addr`.
pub async fn connected_driver(addr: SocketAddr) -> AgentDriver {
    let mut driver = AgentDriver::new(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();
    driver
}

/// A driver that always shows the same tree and accepts every action.
pub struct StaticScreen {
    roots: Vec<UIElement>,
}

impl StaticScreen {
    pub fn new(window: UIElement) -> Self {
        Self {
            roots: vec![window],
        }
    }
}

#[async_trait]
impl AutomationDriver for StaticScreen {
    async fn connect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn tap_location(&self, _x: i32, _y: i32) -> Result<(), DriverError> {
        Ok(())
    }

    async fn tap_element(&self, _identifier: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn tap_by_label(&self, _label: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn tap_with_type(
        &self,
        _selector: &str,
        _by_label: bool,
        _element_type: &str,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn type_text(&self, _text: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        Ok(self.roots.clone())
    }
}

/// A hand-built Riemann Sum screen after the script's edits, with the given
/// graph children and an extra control next to the stepper.
pub fn riemann_screen(graph: Vec<UIElement>, extra: Option<UIElement>) -> UIElement {
    let mut children = vec![
        UIElement::new("Other").with_label("Graph").with_children(graph),
        UIElement::new("SegmentedControl")
            .with_label("Function")
            .with_children(vec![
                UIElement::new("Button").with_label("x"),
                UIElement::new("Button").with_label("x squared").with_value("selected"),
                UIElement::new("Button").with_label("x cubed"),
            ]),
        UIElement::new("TextField")
            .with_label("Minimum x value")
            .with_value("-2"),
        UIElement::new("TextField")
            .with_label("Maximum x value")
            .with_value("2"),
        UIElement::new("Stepper")
            .with_label("Interval count")
            .with_value("1"),
    ];
    children.extend(extra);
    children.push(
        UIElement::new("StaticText")
            .with_label("Riemann sum")
            .with_value("16.00"),
    );
    UIElement::new("Window")
        .with_label("Riemann Sum")
        .with_children(children)
}
