//! HTTP request framing for an open TCP session.
//!
//! The modem needs the exact payload length before any payload byte is
//! written (`AT+CIPSEND=<n>`), so requests are rendered in full up front and
//! the announced length is taken from the rendered bytes.
//!
//! ```text
//! GET <path> HTTP/1.1\r\n
//! Host: <host>\r\n
//! \r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use log::trace;
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Maximum number of variables in one Ubidots POST body.
pub const MAX_UBIDOTS_VARIABLES: usize = 4;

/// Content type used for JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Method name as written on the request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// An HTTP/1.1 request ready to be written onto the TCP session.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    method: Method,
    path: String,
    host: String,
    /// Content type and body, present for requests that carry one.
    body: Option<(String, String)>,
}

impl HttpRequest {
    /// Build a `GET` request.
    pub fn get(path: &str, host: &str) -> Self {
        HttpRequest {
            method: Method::Get,
            path: path.to_string(),
            host: host.to_string(),
            body: None,
        }
    }

    /// Build a `POST` request with a body.
    pub fn post(path: &str, host: &str, content_type: &str, body: &str) -> Self {
        HttpRequest {
            method: Method::Post,
            path: path.to_string(),
            host: host.to_string(),
            body: Some((content_type.to_string(), body.to_string())),
        }
    }

    /// Render the full request.
    pub fn render(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64 + self.path.len() + self.host.len());
        buf.put_slice(self.method.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.path.as_bytes());
        buf.put_slice(b" HTTP/1.1\r\nHost: ");
        buf.put_slice(self.host.as_bytes());
        buf.put_slice(b"\r\n");

        if let Some((content_type, body)) = &self.body {
            buf.put_slice(b"Content-Type: ");
            buf.put_slice(content_type.as_bytes());
            buf.put_slice(b"\r\nContent-Length: ");
            buf.put_slice(body.len().to_string().as_bytes());
            buf.put_slice(b"\r\n\r\n");
            buf.put_slice(body.as_bytes());
        } else {
            buf.put_slice(b"\r\n");
        }

        buf.freeze()
    }

    /// Exact number of bytes [`render`](Self::render) produces, as announced
    /// with `AT+CIPSEND=<n>`.
    pub fn encoded_len(&self) -> usize {
        self.render().len()
    }
}

/// Path of the Ubidots device endpoint: `<url><device>/?token=<token>`.
pub fn ubidots_post_path(base_url: &str, device: &str, token: &str) -> String {
    format!("{}{}/?token={}", base_url, device, token)
}

/// Build the JSON body of a Ubidots POST: `{"<name>": <value>, ...}`.
///
/// Values that parse as JSON (numbers, booleans, objects) are embedded as-is;
/// anything else is embedded as a JSON string.
pub fn ubidots_body<N, V>(names: &[N], values: &[V]) -> ProtocolResult<String>
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    if names.len() != values.len() {
        return Err(ProtocolError::VariableCountMismatch {
            names: names.len(),
            values: values.len(),
        });
    }
    if names.len() > MAX_UBIDOTS_VARIABLES {
        return Err(ProtocolError::TooManyVariables {
            max: MAX_UBIDOTS_VARIABLES,
            actual: names.len(),
        });
    }

    let mut fields = Vec::with_capacity(names.len());
    for (name, value) in names.iter().zip(values) {
        let value = value.as_ref();
        let key = Value::String(name.as_ref().to_string());
        let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| {
            trace!("Embedding non-JSON value {:?} as a string", value);
            Value::String(value.to_string())
        });
        fields.push(format!("{}: {}", key, value));
    }

    Ok(format!("{{{}}}", fields.join(", ")))
}
