use crate::error::NamelyError;
use crate::response::send_response_file;
use crate::server::Protocol;
use http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use http::{Request, Response, StatusCode};
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWrite;
#[cfg(feature = "trace")]
use tracing::instrument;

/// Serves a file from the configured static root. Directory paths fall back
/// to their `index.html`.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn file_directive<S>(
    root: &str,
    request: &Request<()>,
    socket: &mut S,
    protocol: Protocol,
) -> Result<StatusCode, NamelyError>
where
    S: AsyncWrite + Unpin,
{
    let requested = request.uri().path().trim_start_matches('/');
    let Some(mut file_path) = sanitize_path(Path::new(root), requested) else {
        return Err(NamelyError::ResponseError {
            details: "path escapes static root".to_string(),
            status_code: StatusCode::NOT_FOUND,
        });
    };

    if file_path.is_dir() {
        file_path.push("index.html");
    }

    match File::open(&file_path).await {
        Ok(file) => {
            let content_length = file_size(&file).await?;
            let response = file_response(&file_path, file, content_length)?;
            send_response_file(socket, response, protocol).await?;
            Ok(StatusCode::OK)
        }
        Err(err) => Err(NamelyError::ResponseError {
            details: err.to_string(),
            status_code: StatusCode::NOT_FOUND,
        }),
    }
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
async fn file_size(file: &File) -> Result<u64, NamelyError> {
    let metadata = file.metadata().await?;
    Ok(metadata.len())
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
fn file_response(
    path: &Path,
    file: File,
    content_length: u64,
) -> Result<Response<File>, NamelyError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", mime.essence_str())
        .header("Content-Length", content_length)
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(file)?)
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
fn sanitize_path(base_path: &Path, requested_path: &str) -> Option<PathBuf> {
    let mut full_path = base_path.to_path_buf();
    let requested_path = Path::new(requested_path);

    for component in requested_path.components() {
        match component {
            Component::Normal(segment) => full_path.push(segment),
            Component::RootDir | Component::Prefix(_) => return None,
            Component::ParentDir => {
                if !full_path.pop() {
                    return None;
                }
            }
            Component::CurDir => {}
        }
    }

    if full_path.starts_with(base_path) {
        Some(full_path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_path;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_plain_path() {
        let sanitized = sanitize_path(Path::new("/srv/frontend"), "css/site.css");
        assert_eq!(sanitized, Some(PathBuf::from("/srv/frontend/css/site.css")));
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(sanitize_path(Path::new("/srv/frontend"), "../../etc/passwd").is_none());
    }

    #[test]
    fn test_current_dir_segments_ignored() {
        let sanitized = sanitize_path(Path::new("/srv/frontend"), "./index.html");
        assert_eq!(sanitized, Some(PathBuf::from("/srv/frontend/index.html")));
    }
}
