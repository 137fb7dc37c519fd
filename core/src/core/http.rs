// orchid/src/core/http.rs

//! Minimal request/response primitives at the engine's interface boundary.
//!
//! The real transport (socket lifecycle, body parsing, header plumbing) is
//! an external collaborator; the engine only needs an immutable view of the
//! inbound request and a shared, send-once response handle whose `sent` flag
//! drives early-exit detection in the executor.

use crate::error::{OrchidError, OrchidResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{event, Level};

/// The fixed method set recognized by the directory convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl HttpMethod {
  pub const ALL: [HttpMethod; 5] = [
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Patch,
    HttpMethod::Delete,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Patch => "PATCH",
      HttpMethod::Delete => "DELETE",
    }
  }
}

impl FromStr for HttpMethod {
  type Err = OrchidError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "get" => Ok(HttpMethod::Get),
      "post" => Ok(HttpMethod::Post),
      "put" => Ok(HttpMethod::Put),
      "patch" => Ok(HttpMethod::Patch),
      "delete" => Ok(HttpMethod::Delete),
      other => Err(OrchidError::InvalidConvention {
        segment: other.to_string(),
        reason: "not one of get, post, put, patch, delete".to_string(),
      }),
    }
  }
}

impl std::fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Immutable inbound request. Route parameters are injected by whatever
/// router dispatched to the feature; the engine never parses paths itself.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: HttpMethod,
  pub path: String,
  pub params: HashMap<String, String>,
  pub headers: HashMap<String, String>,
  pub body: Option<Value>,
}

impl Request {
  pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      params: HashMap::new(),
      headers: HashMap::new(),
      body: None,
    }
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(name).map(String::as_str)
  }
}

/// Response body, kept structured so tests and the JSON backstops don't
/// round-trip through bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
  Empty,
  Text(String),
  Json(Value),
}

#[derive(Debug)]
struct ResponseState {
  status: u16,
  headers: HashMap<String, String>,
  body: Body,
  sent: bool,
}

/// Shared, cheaply cloned response handle.
///
/// A step short-circuits the remaining pipeline simply by sending and
/// returning; the executor checks `is_sent()` after every step. Sending is
/// final: a second send is ignored with a warning rather than clobbering
/// what the client already received.
pub struct Response(Arc<RwLock<ResponseState>>);

impl Response {
  pub fn new() -> Self {
    Response(Arc::new(RwLock::new(ResponseState {
      status: 200,
      headers: HashMap::new(),
      body: Body::Empty,
      sent: false,
    })))
  }

  pub fn is_sent(&self) -> bool {
    self.0.read().sent
  }

  pub fn status(&self) -> u16 {
    self.0.read().status
  }

  pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
    self.0.write().headers.insert(name.into(), value.into());
  }

  pub fn header(&self, name: &str) -> Option<String> {
    self.0.read().headers.get(name).cloned()
  }

  /// Sends a JSON body with the given status. Marks the response sent.
  pub fn send_json(&self, status: u16, body: Value) {
    self.send_inner(status, Body::Json(body));
  }

  /// Sends a plain-text body with the given status. Marks the response sent.
  pub fn send_text(&self, status: u16, body: impl Into<String>) {
    self.send_inner(status, Body::Text(body.into()));
  }

  /// Sends an empty body with the given status. Marks the response sent.
  pub fn send_status(&self, status: u16) {
    self.send_inner(status, Body::Empty);
  }

  fn send_inner(&self, status: u16, body: Body) {
    let mut guard = self.0.write();
    if guard.sent {
      event!(
        Level::WARN,
        previous_status = guard.status,
        attempted_status = status,
        "Response already sent; ignoring second send."
      );
      return;
    }
    guard.status = status;
    guard.body = body;
    guard.sent = true;
  }

  pub fn body(&self) -> Body {
    self.0.read().body.clone()
  }

  /// The JSON body, if one was sent.
  pub fn body_json(&self) -> Option<Value> {
    match &self.0.read().body {
      Body::Json(v) => Some(v.clone()),
      _ => None,
    }
  }

  /// The text body, if one was sent.
  pub fn body_text(&self) -> Option<String> {
    match &self.0.read().body {
      Body::Text(s) => Some(s.clone()),
      _ => None,
    }
  }
}

impl Clone for Response {
  fn clone(&self) -> Self {
    Response(Arc::clone(&self.0))
  }
}

impl Default for Response {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for Response {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let guard = self.0.read();
    f.debug_struct("Response")
      .field("status", &guard.status)
      .field("sent", &guard.sent)
      .finish()
  }
}

/// Parses a method name as used by the convention layer, reporting the full
/// marker segment on failure.
pub(crate) fn parse_method_name(name: &str, segment: &str) -> OrchidResult<HttpMethod> {
  HttpMethod::from_str(name).map_err(|_| OrchidError::InvalidConvention {
    segment: segment.to_string(),
    reason: format!("'{name}' is not one of get, post, put, patch, delete"),
  })
}
