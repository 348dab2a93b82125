//! # Módulo HTTP
//!
//! Protocolo restringido tipo HTTP: solo GET y PUT, una transferencia por
//! conexión, sin keep-alive ni chunked. Incluye:
//!
//! - Framing del header (búsqueda del delimitador sobre el buffer acumulado)
//! - Parsing y construcción de headers de request y response
//! - Códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path PROTOCOL\r\n
//! Key: Value\r\n
//! \r\n
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! PROTOCOL 200 OK\r\n
//! Content-Length: N\r\n
//! Content-Type: application/octet-stream\r\n
//! Server: file_server (user)\r\n
//! \r\n
//! <N bytes de payload en un GET 200>
//! ```

pub mod framing;   // Acumulación de reads hasta el delimitador
pub mod message;   // Parsing/serialización de headers
pub mod status;    // Códigos de estado

pub use framing::{read_header, HeaderAccumulator, HeaderRead, DELIMITER};
pub use message::{build_response_header, create_request_header, Message, Method, ParseError};
pub use status::StatusCode;
