//! # Códigos de Estado
//! src/http/status.rs
//!
//! Códigos que el servidor puede emitir para GET/PUT. El texto de cada
//! código sale de una función pura (`reason_phrase`), sin tablas globales.
//!
//! - **2xx**: 200 OK (GET exitoso o PUT que sobrescribe), 201 Created (PUT nuevo)
//! - **4xx**: 400, 403, 404
//! - **5xx**: 501 (cualquier método distinto de GET/PUT)

/// Códigos de estado soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK - Archivo enviado o sobrescrito
    Ok,

    /// 201 Created - PUT creó un archivo nuevo
    Created,

    /// 400 Bad Request - Header sin target o PUT sin Content-Length
    BadRequest,

    /// 403 Forbidden - El recurso existe pero la política no permite acceder
    Forbidden,

    /// 404 Not Found - El archivo pedido no existe
    NotFound,

    /// 501 Not Implemented - Método distinto de GET/PUT
    NotImplemented,

    /// Código recibido que no reconocemos (solo al parsear responses)
    Unsupported,
}

impl StatusCode {
    /// Convierte el código a su valor numérico (0 para `Unsupported`)
    ///
    /// # Ejemplo
    /// ```
    /// use file_server::http::StatusCode;
    /// assert_eq!(StatusCode::Created.as_u16(), 201);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::NotImplemented => 501,
            StatusCode::Unsupported => 0,
        }
    }

    /// Mapea un valor numérico recibido en una status line
    pub fn from_u16(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            400 => StatusCode::BadRequest,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            501 => StatusCode::NotImplemented,
            _ => StatusCode::Unsupported,
        }
    }

    /// Texto de razón asociado al código
    ///
    /// # Ejemplo
    /// ```
    /// use file_server::http::StatusCode;
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::Unsupported => "Unsupported",
        }
    }

    /// Verifica si el código indica éxito (2xx)
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::Created)
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::Ok.as_u16(), 200);
        assert_eq!(StatusCode::Created.as_u16(), 201);
        assert_eq!(StatusCode::Forbidden.as_u16(), 403);
        assert_eq!(StatusCode::NotImplemented.as_u16(), 501);
    }

    #[test]
    fn test_from_u16() {
        assert_eq!(StatusCode::from_u16(404), StatusCode::NotFound);
        assert_eq!(StatusCode::from_u16(400), StatusCode::BadRequest);
        assert_eq!(StatusCode::from_u16(302), StatusCode::Unsupported);
        assert_eq!(StatusCode::from_u16(500), StatusCode::Unsupported);
    }

    #[test]
    fn test_is_success() {
        assert!(StatusCode::Ok.is_success());
        assert!(StatusCode::Created.is_success());
        assert!(!StatusCode::NotFound.is_success());
        assert!(!StatusCode::Unsupported.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::Created.to_string(), "201 Created");
        assert_eq!(StatusCode::NotImplemented.to_string(), "501 Not Implemented");
    }
}
