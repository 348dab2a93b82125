//! # Cliente
//! src/client.rs
//!
//! Rol cliente del protocolo: descarga (GET) y subida (PUT) de un archivo.
//! Usa el mismo framing que el servidor para separar header y payload.

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::{Result, ServerError};
use crate::http::{create_request_header, read_header, Message, Method, StatusCode};
use crate::transport;

const CHUNK_SIZE: usize = 1024;
const MAX_HEADER: usize = 64 * 1024;

/// Respuesta recibida por el cliente
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub header: Message,
    pub payload: Vec<u8>,
}

impl ClientResponse {
    pub fn status(&self) -> StatusCode {
        self.header.status_or_default()
    }
}

/// Cliente para un servidor en `host:service`
#[derive(Debug, Clone)]
pub struct Client {
    host: String,
    service: String,
    username: String,
}

impl Client {
    pub fn new(host: &str, service: &str, username: &str) -> Self {
        Self {
            host: host.to_string(),
            service: service.to_string(),
            username: username.to_string(),
        }
    }

    /// GET de `filename`; el payload solo se lee en un 200
    pub fn get(&self, filename: &str) -> Result<ClientResponse> {
        let mut stream = self.connect()?;
        let header = create_request_header(Method::GET, filename, &self.host, &self.username);
        transport::send(&mut stream, &header)?;
        read_response(&mut stream)
    }

    /// PUT de `payload` en `filename`
    pub fn put(&self, filename: &str, payload: &[u8]) -> Result<ClientResponse> {
        let mut stream = self.connect()?;
        let header = Message::request(Method::PUT, filename, &self.host, &self.username)
            .with_content_length(payload.len() as u64)
            .to_request_header();
        transport::send(&mut stream, header.as_bytes())?;
        transport::send(&mut stream, payload)?;
        read_response(&mut stream)
    }

    /// Envía un header arbitrario (métodos no soportados, headers rotos)
    pub fn raw(&self, header: &[u8]) -> Result<ClientResponse> {
        let mut stream = self.connect()?;
        transport::send(&mut stream, header)?;
        read_response(&mut stream)
    }

    fn connect(&self) -> Result<TcpStream> {
        Ok(transport::connect(&self.host, &self.service)?)
    }
}

/// Lee el header de respuesta y, en un 200 con largo, el payload completo
pub fn read_response<S: Read + Write>(stream: &mut S) -> Result<ClientResponse> {
    let head = read_header(stream, CHUNK_SIZE, MAX_HEADER)?;
    let header = Message::parse_response_header(&head.header).map_err(|e| {
        ServerError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let expected = match header.status {
        Some(StatusCode::Ok) => header.content_length.unwrap_or(0),
        _ => 0,
    };

    let mut payload = head.leftover;
    payload.truncate(expected as usize);

    let mut chunk = [0u8; CHUNK_SIZE];
    while (payload.len() as u64) < expected {
        let n = transport::recv(stream, &mut chunk)?;
        if n == 0 {
            return Err(ServerError::ShortRead {
                expected,
                got: payload.len() as u64,
            });
        }
        payload.extend_from_slice(&chunk[..n]);
    }
    payload.truncate(expected as usize);

    Ok(ClientResponse { header, payload })
}
