//! # Módulo HTTP
//!
//! Este módulo implementa HTTP/1.1 desde cero, sin usar librerías de alto
//! nivel. Incluye:
//!
//! - Parsing incremental de requests (tolera cualquier fragmentación)
//! - Headers case-insensitive con valores múltiples
//! - Escritura de respuestas de largo fijo y chunked, con trailers
//! - Códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! POST /submit HTTP/1.1\r\n
//! Host: localhost:42069\r\n
//! Content-Length: 5\r\n
//! \r\n
//! hello
//! ```
//!
//! Solo `GET` y `POST`, solo `HTTP/1.1`, una request por conexión.

pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod status;

// Re-exportamos los tipos principales para facilitar su uso
pub use error::{ConnectionError, ParseError, WriteError};
pub use headers::HeaderMap;
pub use request::{request_from_reader, Method, ParserState, Request, RequestLine, RequestParser};
pub use response::ResponseWriter;
pub use status::StatusCode;
