use crate::error::NamelyError;
use crate::response::json_response;
use crate::routes::Endpoint;
use crate::server::AppContext;
use http::{Response, StatusCode};
use log::error;
use serde::Serialize;
#[cfg(feature = "trace")]
use tracing::instrument;

#[derive(Serialize)]
struct Banner<'a> {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    container_id: &'a str,
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    store: &'static str,
    protocol: &'static str,
}

#[derive(Serialize)]
struct NamePayload {
    name: String,
}

#[derive(Serialize)]
struct ContainerIdPayload<'a> {
    container_id: &'a str,
}

#[derive(Serialize)]
struct StatsPayload<'a> {
    container_id: &'a str,
    database: &'a str,
    collection: &'a str,
    status: &'static str,
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn handle(
    endpoint: Endpoint,
    ctx: &AppContext,
) -> Result<Response<Vec<u8>>, NamelyError> {
    match endpoint {
        Endpoint::Banner => json_response(
            StatusCode::OK,
            &Banner {
                status: "ok",
                service: "namely",
                version: env!("CARGO_PKG_VERSION"),
                container_id: &ctx.container_id,
            },
        ),
        Endpoint::Health => {
            let (status, store) = match ctx.store.ping().await {
                Ok(()) => ("ok", "connected"),
                Err(err) => {
                    error!("health ping failed: {}", err);
                    ("error", "disconnected")
                }
            };
            // Always 200: degradation is reported in the body so the probe
            // itself never flaps on a store outage.
            json_response(
                StatusCode::OK,
                &HealthPayload {
                    status,
                    store,
                    protocol: ctx.protocol.as_str(),
                },
            )
        }
        Endpoint::Name => {
            let name = ctx.store.name_or_default().await;
            json_response(StatusCode::OK, &NamePayload { name })
        }
        Endpoint::ContainerId => json_response(
            StatusCode::OK,
            &ContainerIdPayload {
                container_id: &ctx.container_id,
            },
        ),
        Endpoint::Stats => json_response(
            StatusCode::OK,
            &StatsPayload {
                container_id: &ctx.container_id,
                database: &ctx.config.store.database,
                collection: &ctx.config.store.collection,
                status: "operational",
            },
        ),
    }
}
