//! # Modelo de Mensajes
//! src/http/message.rs
//!
//! Un `Message` representa un header parseado o por construir, sea request o
//! response. El parser de requests es tolerante: nunca falla, deja que
//! `build_response_header` traduzca cualquier problema a un status code.
//!
//! ## Formato de Request
//!
//! ```text
//! PUT /notes.txt HTTP/1.1\r\n
//! Host: files.local\r\n
//! Iam: alice\r\n
//! Content-Length: 5\r\n
//! \r\n
//! hello
//! ```
//!
//! ## Formato de Response
//!
//! ```text
//! HTTP/1.1 201 Created\r\n
//! Content-Length: 0\r\n
//! Content-Type: application/octet-stream\r\n
//! Server: file_server (alice)\r\n
//! \r\n
//! ```

use thiserror::Error;

use super::StatusCode;
use crate::storage::{FileStore, ReadProbe, WriteProbe};

/// Protocolo que emitimos en request y status lines
pub const PROTOCOL: &str = "HTTP/1.1";

/// Content-Type fijo de todas las respuestas
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Nombre del servidor en el header `Server`
pub const SERVER_NAME: &str = "file_server";

/// Header que transporta el username del cliente
pub const USERNAME_HEADER: &str = "Iam";

/// Métodos del protocolo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    PUT,

    /// Cualquier otro token (DELETE, POST, vacío...)
    Unsupported,
}

impl Method {
    /// Parsea el token del método; lo desconocido es `Unsupported`
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "PUT" => Method::PUT,
            _ => Method::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::PUT => "PUT",
            Method::Unsupported => "UNSUPPORTED",
        }
    }
}

/// Errores al parsear el header de una response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty header")]
    Empty,

    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),
}

/// Header de un request o response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// `None` mientras no se haya evaluado
    pub method: Option<Method>,

    /// `None` hasta evaluar método y filesystem
    pub status: Option<StatusCode>,

    pub protocol: String,

    /// Target del request tal como llegó (ej: "/notes.txt")
    pub filename: String,

    /// `Some(0)` es un payload vacío válido; `None` significa ausente
    pub content_length: Option<u64>,

    pub username: String,
    pub host: String,
    pub content_type: String,
    pub server: String,

    /// Bytes exactos del header, delimitador incluido
    pub raw_header: Vec<u8>,
}

impl Message {
    /// Mensaje de request para el rol cliente
    pub fn request(method: Method, filename: &str, host: &str, username: &str) -> Self {
        Self {
            method: Some(method),
            protocol: PROTOCOL.to_string(),
            filename: filename.to_string(),
            host: host.to_string(),
            username: username.to_string(),
            ..Self::default()
        }
    }

    /// Fija el largo del payload (necesario para PUT)
    pub fn with_content_length(mut self, len: u64) -> Self {
        self.content_length = Some(len);
        self
    }

    /// Parsea el header de un request
    ///
    /// Primera línea: `METHOD /target PROTOCOL`. Después, líneas
    /// `Key: Value` hasta la línea vacía. Una línea sin `:` se ignora.
    ///
    /// # Ejemplo
    /// ```
    /// use file_server::http::{Message, Method};
    ///
    /// let msg = Message::parse_request_header(b"GET /a.txt HTTP/1.1\r\nIam: bob\r\n\r\n");
    /// assert_eq!(msg.method, Some(Method::GET));
    /// assert_eq!(msg.filename, "/a.txt");
    /// assert_eq!(msg.username, "bob");
    /// assert!(msg.status.is_none());
    /// ```
    pub fn parse_request_header(header: &[u8]) -> Self {
        let text = String::from_utf8_lossy(header);
        let mut lines = text.split("\r\n");

        let mut msg = Self {
            raw_header: header.to_vec(),
            ..Self::default()
        };

        let request_line = lines.next().unwrap_or("");
        let mut parts = request_line.split_whitespace();
        msg.method = Some(parts.next().map(Method::from_token).unwrap_or(Method::Unsupported));
        msg.filename = parts.next().unwrap_or("").to_string();
        msg.protocol = parts.next().unwrap_or("").to_string();

        for (name, value) in header_fields(lines) {
            if name.eq_ignore_ascii_case("Host") {
                msg.host = value.to_string();
            } else if name.eq_ignore_ascii_case(USERNAME_HEADER) {
                msg.username = value.to_string();
            } else if name.eq_ignore_ascii_case("Content-Length") {
                msg.content_length = value.parse().ok();
            } else if name.eq_ignore_ascii_case("Content-Type") {
                msg.content_type = value.to_string();
            }
        }

        msg
    }

    /// Parsea el header de una response
    ///
    /// Un código numérico desconocido se mapea a `Unsupported`; un código no
    /// numérico es un error.
    pub fn parse_response_header(header: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(header);
        let mut lines = text.split("\r\n");

        let status_line = lines.next().unwrap_or("");
        if status_line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut parts = status_line.splitn(3, ' ');
        let protocol = parts.next().unwrap_or("");
        let code = parts
            .next()
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| ParseError::InvalidStatusLine(status_line.to_string()))?;

        let mut msg = Self {
            status: Some(StatusCode::from_u16(code)),
            protocol: protocol.to_string(),
            raw_header: header.to_vec(),
            ..Self::default()
        };

        for (name, value) in header_fields(lines) {
            if name.eq_ignore_ascii_case("Content-Length") {
                msg.content_length = value.parse().ok();
            } else if name.eq_ignore_ascii_case("Content-Type") {
                msg.content_type = value.to_string();
            } else if name.eq_ignore_ascii_case("Server") {
                msg.server = value.to_string();
            }
        }

        Ok(msg)
    }

    /// Serializa como header de request
    pub fn to_request_header(&self) -> String {
        let method = self.method.unwrap_or(Method::Unsupported);
        let mut out = format!("{} {} {}\r\n", method.as_str(), self.filename, PROTOCOL);
        out.push_str(&format!("Host: {}\r\n", self.host));
        out.push_str(&format!("{}: {}\r\n", USERNAME_HEADER, self.username));
        if let Some(len) = self.content_length {
            out.push_str(&format!("Content-Length: {}\r\n", len));
        }
        out.push_str("\r\n");
        out
    }

    /// Serializa como header de response
    ///
    /// Un mensaje sin status se serializa como 501: nunca se envía un
    /// header sin código.
    pub fn to_response_header(&self) -> String {
        let status = self.status.unwrap_or(StatusCode::NotImplemented);
        let mut out = format!("{} {}\r\n", PROTOCOL, status);
        out.push_str(&format!("Content-Length: {}\r\n", self.content_length.unwrap_or(0)));
        out.push_str(&format!("Content-Type: {}\r\n", self.content_type));
        out.push_str(&format!("Server: {}\r\n", self.server));
        out.push_str("\r\n");
        out
    }

    /// Status evaluado, o 501 si todavía no se evaluó
    pub fn status_or_default(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::NotImplemented)
    }

    /// Imprime los campos en el log (nivel debug)
    pub fn dump(&self) {
        log::debug!(
            "message: method={:?} status={:?} filename={:?} content_length={:?} username={:?} host={:?}",
            self.method,
            self.status,
            self.filename,
            self.content_length,
            self.username,
            self.host
        );
    }
}

/// Itera los pares `Key: Value` hasta la línea vacía
fn header_fields<'a>(lines: impl Iterator<Item = &'a str>) -> impl Iterator<Item = (&'a str, &'a str)> {
    lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| match line.split_once(':') {
            Some((name, value)) => Some((name.trim(), value.trim())),
            None => {
                log::debug!("línea de header sin ':' ignorada: {:?}", line);
                None
            }
        })
}

/// Decide el status de un request y construye el header de respuesta
///
/// 1. Método no soportado → 501
/// 2. Target vacío o relativo, o PUT sin `Content-Length` → 400
/// 3. GET: inexistente → 404, no legible → 403, si no → 200 con el tamaño real
/// 4. PUT: directorio no escribible → 403, existe → 200, no existe → 201
pub fn build_response_header(request: &Message, store: &FileStore, username: &str) -> Message {
    let method = request.method.unwrap_or(Method::Unsupported);

    let (status, content_length) = match method {
        Method::Unsupported => (StatusCode::NotImplemented, 0),
        _ if !request.filename.starts_with('/') => (StatusCode::BadRequest, 0),
        Method::PUT if request.content_length.is_none() => (StatusCode::BadRequest, 0),
        Method::GET => match store.probe_read(&request.filename) {
            ReadProbe::Readable { size, .. } => (StatusCode::Ok, size),
            ReadProbe::Missing => (StatusCode::NotFound, 0),
            ReadProbe::Forbidden => (StatusCode::Forbidden, 0),
        },
        Method::PUT => match store.probe_write(&request.filename) {
            WriteProbe::Overwrite(_) => (StatusCode::Ok, 0),
            WriteProbe::Create(_) => (StatusCode::Created, 0),
            WriteProbe::Forbidden => (StatusCode::Forbidden, 0),
        },
    };

    let mut response = Message {
        method: Some(method),
        status: Some(status),
        protocol: PROTOCOL.to_string(),
        filename: request.filename.clone(),
        content_length: Some(content_length),
        username: username.to_string(),
        host: request.host.clone(),
        content_type: DEFAULT_CONTENT_TYPE.to_string(),
        server: format!("{} ({})", SERVER_NAME, username),
        raw_header: Vec::new(),
    };
    response.raw_header = response.to_response_header().into_bytes();
    response
}

/// Construye el header de un request del rol cliente
///
/// # Ejemplo
/// ```
/// use file_server::http::{create_request_header, Method};
///
/// let header = create_request_header(Method::GET, "/a.txt", "localhost", "alice");
/// assert_eq!(header, b"GET /a.txt HTTP/1.1\r\nHost: localhost\r\nIam: alice\r\n\r\n".to_vec());
/// ```
pub fn create_request_header(method: Method, filename: &str, host: &str, username: &str) -> Vec<u8> {
    Message::request(method, filename, host, username)
        .to_request_header()
        .into_bytes()
}
