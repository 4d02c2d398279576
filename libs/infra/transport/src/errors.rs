use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("network fault reaching transport endpoint: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("decoding fault in transport response: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("transport endpoint rejected the request: {0}")]
    ServerRejection(String),

    #[error("transport credentials missing or invalid")]
    Unauthorized,
}
