//! # Framing del Header
//! src/http/framing.rs
//!
//! El header termina en `\r\n\r\n`. Como un `read` puede devolver el header
//! partido en cualquier punto (incluso en medio del delimitador), la búsqueda
//! se hace siempre sobre el buffer acumulado y no sobre cada chunk.
//!
//! ```text
//! read #1: "GET /f HTTP/1.1\r\nHost: h\r\n\r"
//! read #2: "\n"                      <- recién aquí aparece el delimitador
//! ```

use std::io::{ErrorKind, Read};

use crate::error::{Result, ServerError};

/// Secuencia que separa headers del payload
pub const DELIMITER: &[u8] = b"\r\n\r\n";

/// Busca el inicio del delimitador en `buf`
pub fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

/// Acumula bytes hasta encontrar el fin del header
#[derive(Debug)]
pub struct HeaderAccumulator {
    buffer: Vec<u8>,
    limit: usize,
    /// Bytes ya revisados sin encontrar el delimitador
    scanned: usize,
    header_end: Option<usize>,
}

impl HeaderAccumulator {
    /// Crea un acumulador que falla si el header supera `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
            scanned: 0,
            header_end: None,
        }
    }

    /// Agrega un chunk y retorna `true` cuando el header está completo
    ///
    /// `header_end` incluye el delimitador; lo que sigue es payload.
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool> {
        if self.header_end.is_some() {
            self.buffer.extend_from_slice(chunk);
            return Ok(true);
        }

        self.buffer.extend_from_slice(chunk);

        // Retroceder para encontrar delimitadores partidos entre chunks
        let start = self.scanned.saturating_sub(DELIMITER.len() - 1);
        if let Some(pos) = find_delimiter(&self.buffer[start..]) {
            let end = start + pos + DELIMITER.len();
            if end > self.limit {
                return Err(ServerError::HeaderTooLarge { limit: self.limit });
            }
            self.header_end = Some(end);
            return Ok(true);
        }

        self.scanned = self.buffer.len();
        if self.buffer.len() > self.limit {
            return Err(ServerError::HeaderTooLarge { limit: self.limit });
        }
        Ok(false)
    }

    /// Indica si ya se encontró el delimitador
    pub fn is_complete(&self) -> bool {
        self.header_end.is_some()
    }

    /// Separa el header (con delimitador) del payload ya recibido
    ///
    /// Retorna `None` si el header todavía no está completo.
    pub fn split(mut self) -> Option<HeaderRead> {
        let end = self.header_end?;
        let leftover = self.buffer.split_off(end);
        Some(HeaderRead {
            header: self.buffer,
            leftover,
        })
    }
}

/// Resultado de leer un header desde un stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRead {
    /// Bytes exactos consumidos hasta el delimitador inclusive
    pub header: Vec<u8>,

    /// Bytes que llegaron en el mismo read pero pertenecen al payload
    pub leftover: Vec<u8>,
}

/// Lee de `reader` en bloques de `chunk_size` hasta completar el header
///
/// # Errores
///
/// * `ClientClosed` - el peer cerró antes de enviar el delimitador
/// * `HeaderTooLarge` - se superó `limit` sin delimitador
/// * `Io` - cualquier otro error de lectura
pub fn read_header<R: Read>(reader: &mut R, chunk_size: usize, limit: usize) -> Result<HeaderRead> {
    let mut accumulator = HeaderAccumulator::new(limit);
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Err(ServerError::ClientClosed),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ServerError::Io(e)),
        };

        if accumulator.push(&chunk[..n])? {
            break;
        }
    }

    accumulator.split().ok_or(ServerError::ClientClosed)
}
