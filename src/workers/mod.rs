//! # Ciclo de Vida de Workers
//!
//! Productor/consumidor entre los workers que atienden conexiones y el
//! reclamador que los espera y libera:
//!
//! ```text
//! worker ──enqueue(record)──► CompletionQueue ──pop_wait──► Reclaimer
//!                                                          └─ task.wait() + log
//! ```

pub mod queue;
pub mod reclaimer;
pub mod record;

pub use queue::{CompletionQueue, QueueError};
pub use reclaimer::{ReclaimReport, Reclaimer};
pub use record::{signal_task, Completion, ReclaimError, SignalTask, TaskHandle, WorkerRecord};
