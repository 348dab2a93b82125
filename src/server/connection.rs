//! # Atención de una Conexión
//! src/server/connection.rs
//!
//! Un intercambio completo sobre un stream: header → payload → response.
//!
//! - GET 200: se carga el archivo completo (exactamente `Content-Length`
//!   bytes) y se envían header y payload en dos writes seguidos.
//! - PUT 200/201: los bytes que llegaron detrás del header cuentan como
//!   payload; se sigue leyendo hasta `Content-Length`, escribiendo cada
//!   chunk al destino. El header de respuesta va al final.
//! - Cualquier otro status: solo el header, sin leer payload.

use std::io::{Read, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::http::{build_response_header, read_header, Message, Method, StatusCode};
use crate::storage::FileStore;
use crate::transport;

/// Lo que necesita un worker para atender conexiones
#[derive(Debug, Clone)]
pub struct ServeContext {
    pub store: FileStore,
    pub username: String,
    pub recv_buffer: usize,
    pub max_header: usize,
}

impl ServeContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store: FileStore::new(&config.root),
            username: config.username.clone(),
            recv_buffer: config.recv_buffer,
            max_header: config.max_header,
        }
    }
}

/// Header ya leído y evaluado, con el payload que llegó junto a él
#[derive(Debug)]
pub struct PendingExchange {
    pub request: Message,
    pub response: Message,
    leftover: Vec<u8>,
}

impl PendingExchange {
    /// Indica si el intercambio mueve payload (GET 200, PUT 200/201)
    pub fn has_payload(&self) -> bool {
        matches!(
            (self.request.method, self.response.status_or_default()),
            (Some(Method::GET), StatusCode::Ok)
                | (Some(Method::PUT), StatusCode::Ok | StatusCode::Created)
        )
    }
}

/// Intercambio terminado
#[derive(Debug)]
pub struct Exchange {
    pub request: Message,
    pub response: Message,

    /// Bytes de payload enviados (GET) o persistidos (PUT)
    pub payload_bytes: u64,
}

impl Exchange {
    pub fn status(&self) -> StatusCode {
        self.response.status_or_default()
    }
}

/// Lee el header del request y decide la respuesta
pub fn read_request<S: Read>(stream: &mut S, ctx: &ServeContext) -> Result<PendingExchange> {
    let head = read_header(stream, ctx.recv_buffer, ctx.max_header)?;

    let request = Message::parse_request_header(&head.header);
    request.dump();

    let response = build_response_header(&request, &ctx.store, &ctx.username);

    Ok(PendingExchange {
        request,
        response,
        leftover: head.leftover,
    })
}

/// Transfiere el payload (si corresponde) y envía la respuesta
pub fn transfer<S: Read + Write>(
    stream: &mut S,
    ctx: &ServeContext,
    pending: PendingExchange,
) -> Result<Exchange> {
    let PendingExchange {
        request,
        response,
        leftover,
    } = pending;

    let payload_bytes = match (request.method, response.status_or_default()) {
        (Some(Method::GET), StatusCode::Ok) => send_file(stream, ctx, &response)?,
        (Some(Method::PUT), StatusCode::Ok | StatusCode::Created) => {
            let stored = receive_file(stream, ctx, &request, &leftover)?;
            transport::send(stream, &response.raw_header)?;
            stored
        }
        _ => {
            transport::send(stream, &response.raw_header)?;
            0
        }
    };

    Ok(Exchange {
        request,
        response,
        payload_bytes,
    })
}

/// Intercambio completo sobre `stream`
pub fn serve<S: Read + Write>(stream: &mut S, ctx: &ServeContext) -> Result<Exchange> {
    let pending = read_request(stream, ctx)?;
    transfer(stream, ctx, pending)
}

fn resolved_path(ctx: &ServeContext, target: &str) -> Result<PathBuf> {
    ctx.store.resolve(target).ok_or_else(|| {
        ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("target {} no longer resolves", target),
        ))
    })
}

/// GET 200: header y luego exactamente `Content-Length` bytes
fn send_file<W: Write>(stream: &mut W, ctx: &ServeContext, response: &Message) -> Result<u64> {
    let expected = response.content_length.unwrap_or(0);
    let path = resolved_path(ctx, &response.filename)?;
    let payload = ctx.store.load_exact(&path, expected)?;
    log::debug!("{} bytes de {} cargados en memoria", payload.len(), path.display());

    transport::send(stream, &response.raw_header)?;
    transport::send(stream, &payload)?;
    Ok(expected)
}

/// PUT 200/201: persiste el payload chunk a chunk
fn receive_file<R: Read>(
    stream: &mut R,
    ctx: &ServeContext,
    request: &Message,
    leftover: &[u8],
) -> Result<u64> {
    let expected = request.content_length.unwrap_or(0);
    let path = resolved_path(ctx, &request.filename)?;
    let mut sink = ctx.store.open_sink(&path)?;

    // Lo que llegó junto al header ya es payload (nunca más de lo anunciado)
    let initial = (leftover.len() as u64).min(expected) as usize;
    sink.write_all(&leftover[..initial])?;
    let mut received = initial as u64;

    let mut chunk = vec![0u8; ctx.recv_buffer.max(1)];
    while received < expected {
        let want = (expected - received).min(chunk.len() as u64) as usize;
        let n = transport::recv(stream, &mut chunk[..want])?;
        if n == 0 {
            return Err(ServerError::ClientClosed);
        }
        sink.write_all(&chunk[..n])?;
        received += n as u64;
    }

    sink.flush()?;
    log::debug!("{} bytes escritos en {}", received, path.display());
    Ok(received)
}
