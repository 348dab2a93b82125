//! # Cola de Finalización
//! src/workers/queue.rs
//!
//! Cola FIFO thread-safe donde cada worker se publica al terminar.
//! El orden de salida es el orden de inserción, que refleja el orden en que
//! terminaron los workers y no el orden en que llegaron los requests.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use thiserror::Error;

/// Fallos de coordinación de la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Otro thread entró en pánico con el lock tomado
    #[error("queue lock poisoned")]
    Poisoned,

    /// La cola fue cerrada y no acepta más registros
    #[error("queue closed")]
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Cola de registros pendientes de reclamar
pub struct CompletionQueue<T> {
    /// Estado interno
    state: Arc<Mutex<QueueState<T>>>,

    /// Condvar para avisar que la cola tiene elementos (o se cerró)
    condvar: Arc<Condvar>,
}

impl<T> CompletionQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            })),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Encola un registro y despierta al consumidor
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.state.lock().map_err(|_| QueueError::Poisoned)?;

        if state.closed {
            return Err(QueueError::Closed);
        }

        state.items.push_back(item);
        self.condvar.notify_one();

        Ok(())
    }

    /// Desencola el registro más antiguo
    ///
    /// Bloquea mientras la cola esté vacía. Retorna `Ok(None)` cuando la cola
    /// está cerrada y ya no quedan registros. El lock se libera al retornar.
    pub fn pop_wait(&self) -> Result<Option<T>, QueueError> {
        let mut state = self.state.lock().map_err(|_| QueueError::Poisoned)?;

        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(Some(item));
            }
            if state.closed {
                return Ok(None);
            }

            state = self.condvar.wait(state).map_err(|_| QueueError::Poisoned)?;
        }
    }

    /// Intenta desencolar sin bloquear
    pub fn try_pop(&self) -> Result<Option<T>, QueueError> {
        let mut state = self.state.lock().map_err(|_| QueueError::Poisoned)?;
        Ok(state.items.pop_front())
    }

    /// Cierra la cola: no acepta más registros y despierta al consumidor
    pub fn close(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().map_err(|_| QueueError::Poisoned)?;
        state.closed = true;
        self.condvar.notify_all();
        Ok(())
    }

    /// Retorna el tamaño actual de la cola (0 si el lock está envenenado)
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}

impl<T> Default for CompletionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CompletionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            condvar: Arc::clone(&self.condvar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = CompletionQueue::new();
        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();
        queue.enqueue("c").unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().unwrap(), Some("a"));
        assert_eq!(queue.try_pop().unwrap(), Some("b"));
        assert_eq!(queue.try_pop().unwrap(), Some("c"));
        assert_eq!(queue.try_pop().unwrap(), None);
    }

    #[test]
    fn test_pop_wait_blocks_until_enqueue() {
        let queue = CompletionQueue::new();
        let producer = queue.clone();

        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.enqueue(7u32).unwrap();
        });

        assert_eq!(queue.pop_wait().unwrap(), Some(7));
        t.join().unwrap();
    }

    #[test]
    fn test_close_drains_then_ends() {
        let queue = CompletionQueue::new();
        queue.enqueue(1).unwrap();
        queue.close().unwrap();

        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(2), Err(QueueError::Closed));
        assert_eq!(queue.pop_wait().unwrap(), Some(1));
        assert_eq!(queue.pop_wait().unwrap(), None);
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let queue: CompletionQueue<u8> = CompletionQueue::new();
        let consumer = queue.clone();

        let t = thread::spawn(move || consumer.pop_wait());
        thread::sleep(Duration::from_millis(50));
        queue.close().unwrap();

        assert_eq!(t.join().unwrap(), Ok(None));
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let queue: CompletionQueue<u8> = CompletionQueue::new();
        let state = Arc::clone(&queue.state);

        let _ = thread::spawn(move || {
            let _guard = state.lock().unwrap();
            panic!("poison the queue lock");
        })
        .join();

        assert_eq!(queue.enqueue(1), Err(QueueError::Poisoned));
        assert_eq!(queue.pop_wait(), Err(QueueError::Poisoned));
    }
}
