//! # Multiplexor Serial
//! src/server/multiplexer.rs
//!
//! Loop de readiness que atiende una conexión a la vez:
//!
//! ```text
//! Idle ─► Listening ─(timeout)─► idle tick ─► Listening
//!            │
//!            ├─(listener listo)─► Accepting ─► Idle (con conexión activa)
//!            │
//!            └─(conexión lista)─► ReadingHeader ─► TransferringPayload ─► Closing ─► Idle
//! ```
//!
//! La espera cubre siempre el listener y, si existe, la conexión activa.
//! La conexión activa tiene prioridad. Si solo el listener está listo, la
//! conexión activa no envió nada todavía: se cierra y se acepta la nueva,
//! así un cliente mudo no bloquea al resto.

use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use super::connection::{self, ServeContext};
use super::ServerHandle;
use crate::error::Result;
use crate::http::StatusCode;
use crate::transport;

/// Estados del loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Listening,
    Accepting,
    ReadingHeader,
    TransferringPayload,
    Closing,
}

/// Lo que pasó en una iteración del loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Timeout sin handles listos
    IdleTick,

    /// Se aceptó una conexión
    Accepted(SocketAddr),

    /// El listener estaba listo pero no había conexión que aceptar
    AcceptRetry,

    /// Intercambio completo, conexión cerrada
    Served { peer: SocketAddr, status: StatusCode },

    /// El cliente cortó o rompió el intercambio, conexión cerrada
    Failed { peer: SocketAddr, error: String },

    /// Falló el servidor (archivo, disco), conexión cerrada
    Aborted { peer: SocketAddr, error: String },
}

/// Loop serial: listener + a lo sumo una conexión activa
pub struct Multiplexer {
    listener: TcpListener,
    active: Option<(TcpStream, SocketAddr)>,
    ctx: ServeContext,
    idle_tick: Duration,
    state: State,
    highest_fd: RawFd,
}

impl Multiplexer {
    pub fn new(listener: TcpListener, ctx: ServeContext, idle_tick: Duration) -> Self {
        let highest_fd = listener.as_raw_fd();
        Self {
            listener,
            active: None,
            ctx,
            idle_tick,
            state: State::Idle,
            highest_fd,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Descriptor más alto visto hasta ahora
    pub fn highest_fd(&self) -> RawFd {
        self.highest_fd
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Una iteración: espera acotada y atención del handle listo
    ///
    /// Solo un error de la espera misma es fatal; los errores de accept o
    /// de la conexión se reportan como eventos.
    pub fn poll_once(&mut self) -> Result<LoopEvent> {
        self.state = State::Listening;

        let listener_fd = self.listener.as_raw_fd();
        let mut fds = vec![listener_fd];
        if let Some((stream, _)) = &self.active {
            fds.push(stream.as_raw_fd());
        }

        let ready = transport::wait_readable(&fds, self.idle_tick)?;
        if ready.is_empty() {
            log::debug!("timer expired (highest fd {})", self.highest_fd);
            self.state = State::Idle;
            return Ok(LoopEvent::IdleTick);
        }

        if self.active.is_some() && ready.iter().any(|&fd| fd != listener_fd) {
            return Ok(self.handle_active());
        }

        self.drop_stale();
        Ok(self.accept_one())
    }

    /// Corre hasta que se pida detener el servidor
    pub fn run(&mut self, handle: &ServerHandle) -> Result<()> {
        while handle.is_running() {
            match self.poll_once()? {
                LoopEvent::Failed { peer, error } => {
                    log::warn!("conexión {} abortada por el cliente: {}", peer, error);
                }
                LoopEvent::Aborted { peer, error } => {
                    log::error!("conexión {} abortada: {}", peer, error);
                }
                LoopEvent::Served { peer, status } => {
                    log::info!("{} atendido: {}", peer, status);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Cierra la conexión activa que no envió datos
    fn drop_stale(&mut self) {
        if let Some((stream, peer)) = self.active.take() {
            self.state = State::Closing;
            log::warn!("conexión {} sin datos, se reemplaza por una nueva", peer);
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn accept_one(&mut self) -> LoopEvent {
        self.state = State::Accepting;

        match transport::accept(&self.listener) {
            Ok((stream, peer)) => {
                log::info!("connection from {}", peer);
                self.highest_fd = self.highest_fd.max(stream.as_raw_fd());
                self.active = Some((stream, peer));
                self.state = State::Idle;
                LoopEvent::Accepted(peer)
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::WouldBlock {
                    log::warn!("accept falló: {}", e);
                }
                self.state = State::Idle;
                LoopEvent::AcceptRetry
            }
        }
    }

    fn handle_active(&mut self) -> LoopEvent {
        let Some((mut stream, peer)) = self.active.take() else {
            return LoopEvent::AcceptRetry;
        };

        self.state = State::ReadingHeader;
        let outcome = connection::read_request(&mut stream, &self.ctx).and_then(|pending| {
            if pending.has_payload() {
                self.state = State::TransferringPayload;
            }
            connection::transfer(&mut stream, &self.ctx, pending)
        });

        self.state = State::Closing;
        let _ = stream.shutdown(Shutdown::Both);
        drop(stream);
        log::debug!("closed connection {}", peer);
        self.state = State::Idle;

        match outcome {
            Ok(exchange) => LoopEvent::Served {
                peer,
                status: exchange.status(),
            },
            Err(e) if e.is_peer_failure() => LoopEvent::Failed {
                peer,
                error: e.to_string(),
            },
            Err(e) => LoopEvent::Aborted {
                peer,
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;
    use std::io::{Read, Write};

    fn multiplexer() -> (tempfile::TempDir, Multiplexer, SocketAddr) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        let listener = transport::listen("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr().unwrap();
        let ctx = ServeContext {
            store: FileStore::new(dir.path()),
            username: "srv".to_string(),
            recv_buffer: 8,
            max_header: 1024,
        };
        (dir, Multiplexer::new(listener, ctx, Duration::from_millis(100)), addr)
    }

    #[test]
    fn test_idle_tick_without_clients() {
        let (_dir, mut mux, _) = multiplexer();
        assert_eq!(mux.poll_once().unwrap(), LoopEvent::IdleTick);
        assert_eq!(mux.state(), State::Idle);
        assert!(!mux.has_active());
    }

    #[test]
    fn test_accept_then_serve() {
        let (_dir, mut mux, addr) = multiplexer();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET /a.txt HTTP/1.1\r\n\r\n").unwrap();

        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Accepted(_)));
        assert!(mux.has_active());
        assert!(mux.highest_fd() > 0);

        match mux.poll_once().unwrap() {
            LoopEvent::Served { status, .. } => assert_eq!(status, StatusCode::Ok),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!mux.has_active());
        assert_eq!(mux.state(), State::Idle);

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        assert!(buf.ends_with(b"\r\n\r\nabc"));
    }

    #[test]
    fn test_client_closing_early_is_not_fatal() {
        let (_dir, mut mux, addr) = multiplexer();
        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET /a.txt HTT").unwrap();

        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Accepted(_)));
        drop(client);

        match mux.poll_once().unwrap() {
            LoopEvent::Failed { error, .. } => assert_eq!(error, "client closed connection"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mux.poll_once().unwrap(), LoopEvent::IdleTick);
    }

    #[test]
    fn test_silent_client_does_not_block_others() {
        let (_dir, mut mux, addr) = multiplexer();
        let mut silent = TcpStream::connect(addr).unwrap();
        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Accepted(_)));

        // Sin datos de nadie: solo ticks, la conexión sigue activa
        assert_eq!(mux.poll_once().unwrap(), LoopEvent::IdleTick);
        assert!(mux.has_active());

        let mut second = TcpStream::connect(addr).unwrap();
        second.write_all(b"GET /a.txt HTTP/1.1\r\n\r\n").unwrap();

        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Accepted(_)));
        match mux.poll_once().unwrap() {
            LoopEvent::Served { status, .. } => assert_eq!(status, StatusCode::Ok),
            other => panic!("unexpected event: {:?}", other),
        }

        let mut buf = Vec::new();
        second.read_to_end(&mut buf).unwrap();
        assert!(buf.starts_with(b"HTTP/1.1 200 OK\r\n"));

        // El cliente reemplazado ve el cierre sin respuesta
        let mut stale = Vec::new();
        silent.read_to_end(&mut stale).unwrap();
        assert!(stale.is_empty());
    }

    #[test]
    fn test_active_connection_served_before_new_accept() {
        let (_dir, mut mux, addr) = multiplexer();
        let mut first = TcpStream::connect(addr).unwrap();
        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Accepted(_)));

        first.write_all(b"GET /a.txt HTTP/1.1\r\n\r\n").unwrap();
        let mut second = TcpStream::connect(addr).unwrap();
        second.write_all(b"GET /a.txt HTTP/1.1\r\n\r\n").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Served { .. }));
        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Accepted(_)));
        assert!(matches!(mux.poll_once().unwrap(), LoopEvent::Served { .. }));

        for stream in [&mut first, &mut second] {
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).unwrap();
            assert!(buf.ends_with(b"\r\n\r\nabc"));
        }
    }
}
