use http::StatusCode;
use rustls::pki_types;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NamelyError {
    #[error("ParseRequestError: {details:?}")]
    RequestError {
        details: String,
        status_code: StatusCode,
    },
    #[error("ResponseError: {status_code:?} {details:?}")]
    ResponseError {
        details: String,
        status_code: StatusCode,
    },
    #[error("IOError: {source:?}")]
    IOError {
        #[from]
        source: std::io::Error,
    },
    // from AcquireError
    #[error("AcquireError: {source:?}")]
    AcquireError {
        #[from]
        source: tokio::sync::AcquireError,
    },
    // from rustls::Error
    #[error("RustlsError: {source:?}")]
    RustlsError {
        #[from]
        source: rustls::Error,
    },
    // from pki_types::pem::Error
    #[error("PemError: {source:?}")]
    PemError {
        #[from]
        source: pki_types::pem::Error,
    },
    // from http::Error
    #[error("HttpError: {source:?}")]
    HttpError {
        #[from]
        source: http::Error,
    },
    // from http::header::ToStrError
    #[error("ToStrError: {source:?}")]
    ToStrError {
        #[from]
        source: http::header::ToStrError,
    },
    // from serde_json::Error
    #[error("JsonError: {source:?}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
    // from mongodb::error::Error
    #[error("StoreError: {source:?}")]
    StoreError {
        #[from]
        source: mongodb::error::Error,
    },
    // from std::num::ParseIntError
    #[error("ParseIntError: {source:?}")]
    ParseIntError {
        #[from]
        source: std::num::ParseIntError,
    },

    #[error("ConfigError: {details:?}")]
    ConfigError { details: String },
}
