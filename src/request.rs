use crate::error::NamelyError;
use bytes::BytesMut;
use http::{Request, StatusCode, Version};
use httparse::Status;
use tokio::io::AsyncReadExt;
#[cfg(feature = "trace")]
use tracing::instrument;

pub const BUF_SIZE: usize = 8192;
const MAX_HEADERS: usize = 32;

/// Reads from the socket until a complete request head is buffered.
/// The service is GET/OPTIONS only, so request bodies are ignored.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn socket_to_request<S>(
    socket: &mut S,
    buffer: &mut BytesMut,
) -> Result<Request<()>, NamelyError>
where
    S: AsyncReadExt + Unpin,
{
    loop {
        let n = socket.read_buf(buffer).await?;
        if n == 0 {
            return Err(NamelyError::RequestError {
                details: "connection closed before request head".to_string(),
                status_code: StatusCode::BAD_REQUEST,
            });
        }

        if let Some(request) = parse_request(buffer)? {
            return Ok(request);
        }

        if buffer.len() >= BUF_SIZE {
            return Err(NamelyError::RequestError {
                details: "request head too large".to_string(),
                status_code: StatusCode::BAD_REQUEST,
            });
        }
    }
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub fn parse_request(buf: &[u8]) -> Result<Option<Request<()>>, NamelyError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(Status::Complete(_)) => {
            let method = req.method.ok_or_else(bad_request)?;
            let path = req.path.ok_or_else(bad_request)?;
            let version = match req.version.ok_or_else(bad_request)? {
                0 => Version::HTTP_10,
                1 => Version::HTTP_11,
                _ => return Err(bad_request()),
            };

            let mut builder = Request::builder()
                .method(method)
                .uri(path)
                .version(version);

            for header in req.headers.iter() {
                let value = std::str::from_utf8(header.value).map_err(|_| bad_request())?;
                builder = builder.header(header.name, value);
            }

            Ok(Some(builder.body(())?))
        }
        Ok(Status::Partial) => Ok(None),
        Err(err) => Err(NamelyError::RequestError {
            details: err.to_string(),
            status_code: StatusCode::BAD_REQUEST,
        }),
    }
}

fn bad_request() -> NamelyError {
    NamelyError::RequestError {
        details: "malformed request head".to_string(),
        status_code: StatusCode::BAD_REQUEST,
    }
}
