//! # Reclamador de Workers
//! src/workers/reclaimer.rs
//!
//! Un thread dedicado consume la cola de finalización: saca el registro más
//! antiguo, suelta el lock, espera a la unidad de ejecución de ese registro,
//! reporta el resultado y libera el registro. Con la cola vacía duerme en la
//! condvar.
//!
//! Un fallo del lock o de la condvar termina el reclamador (no se reinicia).
//! Un worker que terminó en pánico solo se reporta; el loop continúa.

use std::io;
use std::os::unix::io::RawFd;
use std::thread::{self, JoinHandle};

use serde::Serialize;

use super::queue::{CompletionQueue, QueueError};
use super::record::WorkerRecord;

/// Resultado de reclamar un registro
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub task: String,
    pub connection_fd: RawFd,
    pub server_root: String,
    pub peer_identity: String,
    pub username: String,
    pub errors_occurred: bool,

    /// Error al esperar la unidad de ejecución, si lo hubo
    pub join_error: Option<String>,
}

/// Consumidor de la cola de finalización
pub struct Reclaimer<F> {
    queue: CompletionQueue<WorkerRecord>,
    observer: F,
}

impl Reclaimer<fn(&ReclaimReport)> {
    /// Reclamador que reporta cada registro en el log
    pub fn logging(queue: CompletionQueue<WorkerRecord>) -> Self {
        Self::new(queue, log_report)
    }
}

impl<F: FnMut(&ReclaimReport)> Reclaimer<F> {
    pub fn new(queue: CompletionQueue<WorkerRecord>, observer: F) -> Self {
        Self { queue, observer }
    }

    /// Loop principal; retorna cuántos registros reclamó
    ///
    /// Termina con `Ok` cuando la cola se cierra y queda vacía, y con `Err`
    /// si falla la coordinación.
    pub fn run(mut self) -> Result<usize, QueueError> {
        let mut reclaimed = 0;

        loop {
            match self.queue.pop_wait() {
                Ok(Some(record)) => {
                    self.reclaim(record);
                    reclaimed += 1;
                }
                Ok(None) => {
                    log::info!("reclaimer: cola cerrada, {} workers reclamados", reclaimed);
                    return Ok(reclaimed);
                }
                Err(e) => {
                    log::error!("reclaimer: {}, terminando", e);
                    return Err(e);
                }
            }
        }
    }

    /// Espera la unidad del registro (fuera del lock) y lo libera
    fn reclaim(&mut self, record: WorkerRecord) {
        let WorkerRecord {
            task,
            connection_fd,
            server_root,
            peer_identity,
            username,
            errors_occurred,
        } = record;

        let label = task.label();
        let join_error = match task.wait() {
            Ok(()) => None,
            Err(e) => {
                log::error!("reclaimer: no se pudo esperar {}: {}", label, e);
                Some(e.to_string())
            }
        };

        let report = ReclaimReport {
            task: label,
            connection_fd,
            server_root: server_root.display().to_string(),
            peer_identity,
            username,
            errors_occurred,
            join_error,
        };

        (self.observer)(&report);
    }
}

/// Observador por defecto: una línea JSON por registro reclamado
pub fn log_report(report: &ReclaimReport) {
    match serde_json::to_string(report) {
        Ok(line) => log::info!("reclaimed {}", line),
        Err(e) => log::warn!("reclaimed {} (no serializable: {})", report.task, e),
    }
}

/// Lanza el reclamador en su propio thread
pub fn spawn(queue: CompletionQueue<WorkerRecord>) -> io::Result<JoinHandle<Result<usize, QueueError>>> {
    thread::Builder::new()
        .name("reclaimer".to_string())
        .spawn(move || Reclaimer::logging(queue).run())
}
