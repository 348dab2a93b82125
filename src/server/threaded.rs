//! # Servidor Concurrente
//! src/server/threaded.rs
//!
//! El acceptor entrega cada conexión a un thread worker nuevo y vuelve de
//! inmediato a esperar. No hay pool ni límite: la concurrencia está acotada
//! solo por los recursos del sistema.
//!
//! Al terminar, el worker recibe su propio `JoinHandle`, arma su
//! `WorkerRecord` y lo encola; el reclamador hace el join.

use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::connection::{self, ServeContext};
use super::multiplexer::LoopEvent;
use super::ServerHandle;
use crate::error::Result;
use crate::transport;
use crate::workers::{CompletionQueue, WorkerRecord};

/// Loop de accept que lanza un worker por conexión
pub struct Acceptor {
    listener: TcpListener,
    ctx: Arc<ServeContext>,
    queue: CompletionQueue<WorkerRecord>,
    idle_tick: Duration,
    spawned: u64,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        ctx: ServeContext,
        queue: CompletionQueue<WorkerRecord>,
        idle_tick: Duration,
    ) -> Self {
        Self {
            listener,
            ctx: Arc::new(ctx),
            queue,
            idle_tick,
            spawned: 0,
        }
    }

    /// Workers lanzados desde el inicio
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    /// Una iteración: espera acotada sobre el listener y, si hay conexión,
    /// lanza su worker
    pub fn poll_once(&mut self) -> Result<LoopEvent> {
        let ready = transport::wait_readable(&[self.listener.as_raw_fd()], self.idle_tick)?;
        if ready.is_empty() {
            log::debug!("timer expired ({} workers lanzados)", self.spawned);
            return Ok(LoopEvent::IdleTick);
        }

        let (stream, peer) = match transport::accept(&self.listener) {
            Ok(accepted) => accepted,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::WouldBlock {
                    log::warn!("accept falló: {}", e);
                }
                return Ok(LoopEvent::AcceptRetry);
            }
        };

        log::info!("connection from {}", peer);

        match spawn_worker(stream, peer, Arc::clone(&self.ctx), self.queue.clone()) {
            Ok(()) => self.spawned += 1,
            Err(e) => log::error!("no se pudo lanzar worker para {}: {}", peer, e),
        }

        Ok(LoopEvent::Accepted(peer))
    }

    /// Corre hasta que se pida detener el servidor
    pub fn run(&mut self, handle: &ServerHandle) -> Result<()> {
        while handle.is_running() {
            self.poll_once()?;
        }
        Ok(())
    }
}

/// Lanza el worker que atiende `stream` de punta a punta
///
/// Si el thread no se puede crear, la conexión se cierra y el error vuelve
/// al acceptor.
pub fn spawn_worker(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServeContext>,
    queue: CompletionQueue<WorkerRecord>,
) -> std::io::Result<()> {
    let fd = stream.as_raw_fd();
    let (handle_tx, handle_rx) = mpsc::channel::<JoinHandle<()>>();

    let handle = thread::Builder::new()
        .name(format!("worker-{}", fd))
        .spawn(move || run_worker(stream, peer, ctx, queue, handle_rx))?;

    // El worker solo lo recibe al terminar; si ya no está escuchando, el
    // handle se descarta y el thread queda detached
    let _ = handle_tx.send(handle);
    Ok(())
}

fn run_worker(
    mut stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServeContext>,
    queue: CompletionQueue<WorkerRecord>,
    own_handle: mpsc::Receiver<JoinHandle<()>>,
) {
    let fd = stream.as_raw_fd();

    let errors_occurred = match connection::serve(&mut stream, &ctx) {
        Ok(exchange) => {
            log::info!(
                "{} {} {} -> {} ({} bytes)",
                peer,
                exchange.request.method.map(|m| m.as_str()).unwrap_or("-"),
                exchange.request.filename,
                exchange.status(),
                exchange.payload_bytes
            );
            false
        }
        Err(e) if e.is_peer_failure() => {
            log::warn!("conexión {} abortada por el cliente: {}", peer, e);
            true
        }
        Err(e) => {
            log::error!("conexión {} abortada: {}", peer, e);
            true
        }
    };

    let _ = stream.shutdown(Shutdown::Both);
    drop(stream);

    let Ok(task) = own_handle.recv() else {
        log::error!("worker {}: handle propio no disponible, no se encola", fd);
        return;
    };

    let record = WorkerRecord {
        task: Box::new(task),
        connection_fd: fd,
        server_root: ctx.store.root().to_path_buf(),
        peer_identity: peer.to_string(),
        username: ctx.username.clone(),
        errors_occurred,
    };

    if let Err(e) = queue.enqueue(record) {
        log::error!("worker {}: no se pudo encolar: {}", fd, e);
    }
}
