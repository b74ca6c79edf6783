use std::{io, net::SocketAddr};

use thiserror::Error;

/// Failures while bringing up or running the server's own plumbing.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migrate(#[source] sqlx::Error),
    #[error("http server failed: {0}")]
    Serve(#[source] io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn bind_failure_keeps_the_io_error() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().expect("addr");
        let err = InfraError::bind(addr, io::Error::from(io::ErrorKind::AddrInUse));

        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:5000: "));
        let source = err.source().expect("io source");
        assert_eq!(
            source.downcast_ref::<io::Error>().map(io::Error::kind),
            Some(io::ErrorKind::AddrInUse)
        );
    }

    #[test]
    fn database_failures_name_the_stage() {
        let connect = InfraError::Connect(sqlx::Error::PoolTimedOut);
        let migrate = InfraError::Migrate(sqlx::Error::RowNotFound);

        assert!(connect.to_string().starts_with("database connection failed: "));
        assert!(migrate.to_string().starts_with("database migration failed: "));
        assert!(connect.source().is_some());
    }
}
