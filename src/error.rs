//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de errores:
//! - **Protocolo**: no aparecen aquí, se convierten en un status code.
//! - **Transferencia**: abortan la conexión actual (`ClientClosed`,
//!   `ShortRead`, `HeaderTooLarge`, I/O).
//! - **Recursos**: archivos o sockets que no se pueden abrir (I/O).
//! - **Coordinación**: fallos del mutex/condvar, fatales solo para el
//!   reclamador (`QueueError`).

use thiserror::Error;

use crate::workers::QueueError;

/// Errores que terminan una unidad de trabajo (conexión, worker o servidor)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client closed connection")]
    ClientClosed,

    #[error("header exceeds {limit} bytes without delimiter")]
    HeaderTooLarge { limit: usize },

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: u64, got: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl ServerError {
    /// Indica si el error fue provocado por el peer y no por el servidor
    pub fn is_peer_failure(&self) -> bool {
        match self {
            ServerError::ClientClosed | ServerError::HeaderTooLarge { .. } => true,
            ServerError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

/// Resultado estándar del crate
pub type Result<T> = std::result::Result<T, ServerError>;
