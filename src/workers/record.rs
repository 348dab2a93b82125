//! # Registro de Worker
//! src/workers/record.rs
//!
//! Un `WorkerRecord` describe un worker que terminó de atender su conexión.
//! El worker es dueño del registro hasta encolarlo; a partir de ahí solo el
//! reclamador puede destruirlo.

use std::any::Any;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use thiserror::Error;

/// Fallos al esperar la unidad de ejecución de un registro
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReclaimError {
    /// El worker terminó en pánico
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// La señal de finalización se perdió sin completarse
    #[error("completion signal lost: {0}")]
    Lost(String),
}

/// Unidad de ejecución que el reclamador puede esperar
pub trait TaskHandle: Send {
    /// Identificador legible para los logs
    fn label(&self) -> String;

    /// Bloquea hasta que la unidad termine
    fn wait(self: Box<Self>) -> Result<(), ReclaimError>;
}

impl TaskHandle for JoinHandle<()> {
    fn label(&self) -> String {
        let thread = self.thread();
        match thread.name() {
            Some(name) => format!("{} ({:?})", name, thread.id()),
            None => format!("{:?}", thread.id()),
        }
    }

    fn wait(self: Box<Self>) -> Result<(), ReclaimError> {
        self.join().map_err(|payload| ReclaimError::Panicked(panic_message(&payload)))
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Tarea que termina cuando alguien llama `complete` sobre su `Completion`
///
/// Permite manejar el ciclo de vida de un registro sin threads reales.
pub struct SignalTask {
    label: String,
    done: Receiver<()>,
}

/// Lado que marca una `SignalTask` como terminada
pub struct Completion {
    done: Sender<()>,
}

impl Completion {
    pub fn complete(self) {
        let _ = self.done.send(());
    }
}

/// Crea una tarea controlada por señal y su lado de completado
pub fn signal_task(label: impl Into<String>) -> (Completion, SignalTask) {
    let (tx, rx) = mpsc::channel();
    (
        Completion { done: tx },
        SignalTask {
            label: label.into(),
            done: rx,
        },
    )
}

impl TaskHandle for SignalTask {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn wait(self: Box<Self>) -> Result<(), ReclaimError> {
        self.done.recv().map_err(|_| ReclaimError::Lost(self.label.clone()))
    }
}

/// Worker terminado, esperando ser reclamado
pub struct WorkerRecord {
    /// Unidad de ejecución a esperar
    pub task: Box<dyn TaskHandle>,

    /// Descriptor de la conexión atendida (ya cerrada al encolar)
    pub connection_fd: RawFd,

    /// Directorio raíz con el que se atendió el request
    pub server_root: PathBuf,

    /// Dirección del peer
    pub peer_identity: String,

    /// Username del servidor
    pub username: String,

    /// `true` si la conexión terminó con un error de transferencia
    pub errors_occurred: bool,
}

impl std::fmt::Debug for WorkerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRecord")
            .field("task", &self.task.label())
            .field("connection_fd", &self.connection_fd)
            .field("server_root", &self.server_root)
            .field("peer_identity", &self.peer_identity)
            .field("username", &self.username)
            .field("errors_occurred", &self.errors_occurred)
            .finish()
    }
}
