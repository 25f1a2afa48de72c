use crate::config::AppConfig;
use crate::error::NamelyError;
use crate::request::{socket_to_request, BUF_SIZE};
use crate::response::{error_response, send_response};
use crate::routes::dispatch;
use crate::store::ProfileStore;
use bytes::BytesMut;
use http::StatusCode;
use log::info;
#[cfg(debug_assertions)]
use log::error;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_rustls::TlsAcceptor;
#[cfg(feature = "trace")]
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Shared per-listener state: configuration, the store handle, and the
/// hostname resolved once at startup. Cloning is cheap, everything heavy is
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<ProfileStore>,
    pub container_id: Arc<str>,
    pub protocol: Protocol,
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub fn tls_acceptor_builder(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, NamelyError> {
    let certs = CertificateDer::pem_file_iter(cert_path)?.collect::<Result<Vec<_>, _>>()?;
    let key = PrivateKeyDer::from_pem_file(key_path)?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Accept loop for one listener. The plaintext and TLS listeners each run
/// this independently; they only share the context.
#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn run_listener(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    ctx: AppContext,
    max_connections: usize,
) -> Result<(), NamelyError> {
    let semaphore = Arc::new(Semaphore::new(max_connections));
    info!(
        "{} listener on {}",
        ctx.protocol.as_str(),
        listener.local_addr()?
    );

    loop {
        let (mut stream, _) = listener.accept().await?;
        let permit = semaphore.clone().acquire_owned().await?;
        let ctx = ctx.clone();
        let acceptor = acceptor.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match acceptor {
                None => {
                    if let Err(_err) = handle_connection(&mut stream, &ctx).await {
                        #[cfg(debug_assertions)]
                        error!("Error: {}", _err);
                    }
                }
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(mut stream) => {
                        if let Err(_err) = handle_connection(&mut stream, &ctx).await {
                            #[cfg(debug_assertions)]
                            error!("Error: {}", _err);
                        }
                    }
                    Err(_err) => {
                        #[cfg(debug_assertions)]
                        error!("TLS Error: {}", _err);
                    }
                },
            }
        });
    }
}

#[cfg_attr(feature = "trace", instrument(level = "trace", skip_all))]
pub async fn handle_connection<S>(socket: &mut S, ctx: &AppContext) -> Result<(), NamelyError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUF_SIZE);
    match socket_to_request(socket, &mut buffer).await {
        Err(err) => {
            let status = match &err {
                NamelyError::RequestError { status_code, .. } => *status_code,
                _ => StatusCode::BAD_REQUEST,
            };
            let _ = send_response(socket, error_response(status, "bad request"), ctx.protocol).await;
            Err(err)
        }
        Ok(request) => dispatch(&request, socket, ctx).await,
    }
}
