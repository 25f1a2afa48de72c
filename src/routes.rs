use crate::error::NamelyError;
use crate::response::{
    error_response, log_request_response, preflight_response, send_response,
};
use crate::server::AppContext;
use crate::{file_server, handlers};
use http::{Method, Request, StatusCode};
use log::error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(feature = "trace")]
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Banner,
    Health,
    Name,
    ContainerId,
    Stats,
}

pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub endpoint: Endpoint,
}

/// The whole HTTP surface, as data. Dispatch is a lookup here instead of an
/// if/else chain per path.
pub const ROUTES: &[Route] = &[
    Route {
        method: Method::GET,
        path: "/",
        endpoint: Endpoint::Banner,
    },
    Route {
        method: Method::GET,
        path: "/health",
        endpoint: Endpoint::Health,
    },
    Route {
        method: Method::GET,
        path: "/api/name",
        endpoint: Endpoint::Name,
    },
    Route {
        method: Method::GET,
        path: "/api/container-id",
        endpoint: Endpoint::ContainerId,
    },
    Route {
        method: Method::GET,
        path: "/api/stats",
        endpoint: Endpoint::Stats,
    },
];

pub fn resolve(method: &Method, path: &str) -> Option<Endpoint> {
    ROUTES
        .iter()
        .find(|route| route.method == *method && route.path == path)
        .map(|route| route.endpoint)
}

/// Routes one parsed request to its handler and writes the response.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn dispatch<S>(
    request: &Request<()>,
    socket: &mut S,
    ctx: &AppContext,
) -> Result<(), NamelyError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    if request.method() == Method::OPTIONS {
        send_response(socket, preflight_response()?, ctx.protocol).await?;
        log_request_response(request, StatusCode::OK);
        return Ok(());
    }

    let path = request.uri().path();

    // With a static root configured, "/" belongs to the file server so the
    // frontend's index.html wins over the banner JSON.
    let endpoint = match resolve(request.method(), path) {
        Some(Endpoint::Banner) if ctx.config.static_root.is_some() => None,
        other => other,
    };

    match endpoint {
        Some(endpoint) => {
            let response = match handlers::handle(endpoint, ctx).await {
                Ok(response) => response,
                Err(err) => {
                    error!("handler failed: {}", err);
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
                }
            };
            let status = response.status();
            send_response(socket, response, ctx.protocol).await?;
            log_request_response(request, status);
            Ok(())
        }
        None => {
            if request.method() == Method::GET {
                if let Some(root) = ctx.config.static_root.as_deref() {
                    match file_server::file_directive(root, request, socket, ctx.protocol).await {
                        Ok(status) => {
                            log_request_response(request, status);
                            return Ok(());
                        }
                        Err(NamelyError::ResponseError {
                            details,
                            status_code,
                        }) => {
                            send_response(socket, error_response(status_code, &details), ctx.protocol)
                                .await?;
                            log_request_response(request, status_code);
                            return Ok(());
                        }
                        Err(err) => {
                            log_request_response(request, StatusCode::INTERNAL_SERVER_ERROR);
                            return Err(err);
                        }
                    }
                }
            }

            send_response(
                socket,
                error_response(StatusCode::NOT_FOUND, "not found"),
                ctx.protocol,
            )
            .await?;
            log_request_response(request, StatusCode::NOT_FOUND);
            Ok(())
        }
    }
}
