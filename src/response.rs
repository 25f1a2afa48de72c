use crate::error::NamelyError;
use crate::server::Protocol;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, STRICT_TRANSPORT_SECURITY,
};
use http::{HeaderValue, Request, Response, StatusCode};
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(feature = "trace")]
use tracing::instrument;

/// Serializes a payload into a JSON response. Every response carries the
/// wildcard CORS origin header so a frontend on another domain can read it.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub fn json_response<T: Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response<Vec<u8>>, NamelyError> {
    let body = serde_json::to_vec(payload)?;
    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(CONTENT_LENGTH, body.len())
        .body(body)?)
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub fn error_response(status: StatusCode, details: &str) -> Response<Vec<u8>> {
    let body = json!({ "error": details }).to_string().into_bytes();

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(CONTENT_LENGTH, body.len())
        .body(body)
        .unwrap()
}

/// CORS preflight answer for any path.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub fn preflight_response() -> Result<Response<Vec<u8>>, NamelyError> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "*")
        .header(CONTENT_LENGTH, 0)
        .body(Vec::new())?)
}

/// Connections are close-per-request; the header keeps HTTP/1.1 clients from
/// assuming keep-alive. TLS responses additionally advertise HSTS, as the
/// dual-protocol deployment expects.
fn connection_headers<T>(response: &mut Response<T>, protocol: Protocol) {
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    if protocol == Protocol::Https {
        response.headers_mut().insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000"),
        );
    }
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn send_response<S>(
    socket: &mut S,
    mut response: Response<Vec<u8>>,
    protocol: Protocol,
) -> Result<(), NamelyError>
where
    S: AsyncWriteExt + Unpin,
{
    connection_headers(&mut response, protocol);
    let (parts, body) = response.into_parts();

    // Estimate capacity to reduce reallocations
    let mut resp_bytes = Vec::with_capacity(128 + body.len());
    let mut itoa_buf = itoa::Buffer::new();
    resp_bytes.extend_from_slice(b"HTTP/1.1 ");
    resp_bytes.extend_from_slice(itoa_buf.format(parts.status.as_u16()).as_bytes());
    resp_bytes.extend_from_slice(b" ");
    resp_bytes.extend_from_slice(parts.status.canonical_reason().unwrap_or("").as_bytes());
    resp_bytes.extend_from_slice(b"\r\n");

    for (key, value) in parts.headers.iter() {
        resp_bytes.extend_from_slice(key.as_str().as_bytes());
        resp_bytes.extend_from_slice(b": ");
        resp_bytes.extend_from_slice(value.as_bytes());
        resp_bytes.extend_from_slice(b"\r\n");
    }

    resp_bytes.extend_from_slice(b"\r\n");
    resp_bytes.extend_from_slice(&body);

    socket.write_all(&resp_bytes).await?;
    socket.flush().await?;

    Ok(())
}

/// Streams a file body to the socket after the serialized head.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn send_response_file<S>(
    socket: &mut S,
    mut response: Response<impl AsyncReadExt + Unpin + Debug>,
    protocol: Protocol,
) -> Result<(), NamelyError>
where
    S: AsyncWriteExt + Unpin,
{
    connection_headers(&mut response, protocol);
    let (parts, mut body) = response.into_parts();

    // Write status line without allocation
    socket.write_all(b"HTTP/1.1 ").await?;
    let mut itoa_buf = itoa::Buffer::new();
    let status_str = itoa_buf.format(parts.status.as_u16());
    socket.write_all(status_str.as_bytes()).await?;
    socket.write_all(b" ").await?;
    socket
        .write_all(parts.status.canonical_reason().unwrap_or("").as_bytes())
        .await?;
    socket.write_all(b"\r\n").await?;

    // Write headers without allocation
    for (key, value) in parts.headers.iter() {
        socket.write_all(key.as_str().as_bytes()).await?;
        socket.write_all(b": ").await?;
        socket.write_all(value.as_bytes()).await?;
        socket.write_all(b"\r\n").await?;
    }

    socket.write_all(b"\r\n").await?;
    socket.flush().await?;

    tokio::io::copy(&mut body, socket).await?;
    socket.flush().await?;

    Ok(())
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub fn log_request_response(req: &Request<()>, status: StatusCode) {
    #[cfg(debug_assertions)]
    debug!("{:?}", req);
    if let Some(host_header) = req.headers().get("Host") {
        info!(
            "Request: {} {} {} {}",
            req.method(),
            req.uri(),
            host_header.to_str().unwrap_or(""),
            status.as_u16()
        );
    } else {
        info!(
            "Request: {} {} {}",
            req.method(),
            req.uri(),
            status.as_u16()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{error_response, json_response, preflight_response, send_response};
    use crate::server::Protocol;
    use http::header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN};
    use http::StatusCode;
    use serde::Serialize;
    use std::error::Error;

    #[derive(Serialize)]
    struct Payload {
        name: &'static str,
    }

    #[test]
    fn test_json_response_cors_and_body() -> Result<(), Box<dyn Error>> {
        let response = json_response(StatusCode::OK, &Payload { name: "Frank Koch" })?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(response.body(), br#"{"name":"Frank Koch"}"#);
        Ok(())
    }

    #[test]
    fn test_error_response_is_json() {
        let response = error_response(StatusCode::NOT_FOUND, "not found");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), br#"{"error":"not found"}"#);
    }

    #[test]
    fn test_preflight_headers() -> Result<(), Box<dyn Error>> {
        let response = preflight_response()?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_METHODS)
                .unwrap(),
            "GET, OPTIONS"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_send_response_wire_format() -> Result<(), Box<dyn Error>> {
        let response = json_response(StatusCode::OK, &Payload { name: "x" })?;
        let mut wire = std::io::Cursor::new(Vec::new());
        send_response(&mut wire, response, Protocol::Http).await?;
        let text = String::from_utf8(wire.into_inner())?;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("access-control-allow-origin: *\r\n"));
        assert!(text.contains("connection: close\r\n"));
        assert!(!text.contains("strict-transport-security"));
        assert!(text.ends_with("\r\n\r\n{\"name\":\"x\"}"));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_response_https_advertises_hsts() -> Result<(), Box<dyn Error>> {
        let response = json_response(StatusCode::OK, &Payload { name: "x" })?;
        let mut wire = std::io::Cursor::new(Vec::new());
        send_response(&mut wire, response, Protocol::Https).await?;
        let text = String::from_utf8(wire.into_inner())?;
        assert!(text.contains("strict-transport-security: max-age=31536000\r\n"));
        assert!(text.contains("connection: close\r\n"));
        Ok(())
    }
}
