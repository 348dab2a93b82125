//! # File Server
//! src/lib.rs
//!
//! Servidor de archivos sobre TCP con un protocolo tipo HTTP restringido a
//! GET y PUT. Cada request lleva un username opaco; el servidor lee o
//! escribe un único archivo bajo su directorio raíz.
//!
//! ## Arquitectura
//!
//! - `http`: framing del header, modelo de mensajes y status codes
//! - `storage`: fuente/destino de bytes bajo la raíz del servidor
//! - `transport`: listen/accept/connect/send/recv y espera de readiness
//! - `server`: loop serial, acceptor concurrente y atención de conexiones
//! - `workers`: cola de finalización y reclamador de workers
//! - `client`: rol cliente (GET/PUT) del mismo protocolo
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use file_server::config::Config;
//! use file_server::server::Server;
//!
//! let config = Config::for_root("./data", "alice");
//! let server = Server::bind(config).expect("bind");
//! server.run().expect("Error al correr el servidor");
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod storage;
pub mod transport;
pub mod workers;

pub use error::{Result, ServerError};
