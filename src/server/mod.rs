//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Espera readiness con timeout (idle tick cada `idle_tick_ms`)
//! 3. Acepta conexiones y atiende un intercambio GET/PUT por conexión
//! 4. En modo concurrente, reclama los workers terminados en otro thread
//!
//! Hay dos variantes: `Mode::Serial` (una conexión a la vez dentro del
//! loop) y `Mode::Threaded` (un worker por conexión).

pub mod connection;
pub mod multiplexer;
pub mod threaded;

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{Config, Mode};
use crate::error::{Result, ServerError};
use crate::transport;
use crate::workers::{reclaimer, CompletionQueue, WorkerRecord};

pub use connection::{Exchange, ServeContext};
pub use multiplexer::{LoopEvent, Multiplexer, State};
pub use threaded::Acceptor;

/// Permite detener un servidor en ejecución desde otro thread
#[derive(Debug, Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Pide al loop que termine; se nota después de la espera en curso
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Servidor de archivos
pub struct Server {
    config: Config,
    listener: TcpListener,
    running: Arc<AtomicBool>,
}

impl Server {
    /// Valida la configuración y abre el listener
    pub fn bind(config: Config) -> Result<Self> {
        config.validate_with(true).map_err(ServerError::Config)?;

        log::info!("iniciando servidor en {}", config.address());
        let listener = transport::listen(&config.host, config.port)?;
        log::info!("servidor escuchando en {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Dirección real del listener (útil con puerto 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Corre el loop según el modo configurado, hasta `ServerHandle::stop`
    pub fn run(self) -> Result<()> {
        let ctx = ServeContext::from_config(&self.config);
        let idle_tick = self.config.idle_tick();
        let handle = self.handle();

        match self.config.mode {
            Mode::Serial => {
                log::info!("modo serial: una conexión a la vez");
                let mut mux = Multiplexer::new(self.listener, ctx, idle_tick);
                mux.run(&handle)
            }
            Mode::Threaded => {
                log::info!("modo concurrente: un thread por conexión");
                let queue: CompletionQueue<WorkerRecord> = CompletionQueue::new();
                let reclaimer = reclaimer::spawn(queue.clone())?;

                let mut acceptor = Acceptor::new(self.listener, ctx, queue.clone(), idle_tick);
                let result = acceptor.run(&handle);

                // Los workers todavía activos no podrán encolarse después de
                // cerrar; sus threads quedan detached
                queue.close()?;
                match reclaimer.join() {
                    Ok(Ok(count)) => log::info!("reclaimer terminó ({} workers)", count),
                    Ok(Err(e)) => log::error!("reclaimer terminó con error: {}", e),
                    Err(_) => log::error!("reclaimer terminó en pánico"),
                }
                result
            }
        }
    }
}
