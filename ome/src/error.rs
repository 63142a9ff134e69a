use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Scenario grammar error: {0}")]
    Grammar(#[from] regex::Error),

    #[error("TLS config error: {0}")]
    Tls(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("Manifest serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
