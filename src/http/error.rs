//! # Errores del protocolo
//! src/http/error.rs
//!
//! Todos los errores de este módulo tienen alcance de conexión: el thread
//! que atiende la conexión los registra y cierra el socket, el accept loop
//! sigue vivo.

use std::io;
use thiserror::Error;

/// Errores que pueden ocurrir durante el parsing de un request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// La request line no tiene exactamente 3 partes separadas por un espacio
    #[error("invalid request line")]
    InvalidRequestLine,

    /// Versión distinta de `HTTP/1.1`
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// Método en minúsculas o fuera de {GET, POST}
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// El target no empieza con `/`
    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    #[error("no colon in header line")]
    NoColonInHeader,

    /// Espacio antes de `:` o nombre que no es un token válido
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Llegaron más bytes de body que los declarados en `Content-Length`
    #[error("body exceeds declared content-length")]
    BadContentLength,

    #[error("body bytes present without content-length")]
    BodyWithoutContentLength,
}

/// Fallo al leer un request desde una conexión
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// EOF con un mensaje a medio recibir
    #[error("connection closed with an incomplete request ({buffered} bytes buffered)")]
    IncompleteRequest { buffered: usize },

    /// El peer cerró sin mandar nada
    #[error("connection closed before any data was received")]
    Closed,
}

/// Fallo al escribir una respuesta
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Llamada fuera del orden status line → headers → body → trailers
    #[error("{operation} is not allowed after {state}")]
    OutOfOrder {
        operation: &'static str,
        state: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        assert_eq!(
            ParseError::UnsupportedVersion("2.0".to_string()).to_string(),
            "unsupported HTTP version: 2.0"
        );
        assert_eq!(ParseError::NoColonInHeader.to_string(), "no colon in header line");
    }

    #[test]
    fn test_connection_error_from_parse() {
        let err: ConnectionError = ParseError::BadContentLength.into();
        assert!(matches!(err, ConnectionError::Parse(ParseError::BadContentLength)));
        assert!(err.to_string().contains("content-length"));
    }

    #[test]
    fn test_write_error_out_of_order() {
        let err = WriteError::OutOfOrder {
            operation: "write_body",
            state: "status line",
        };
        assert_eq!(err.to_string(), "write_body is not allowed after status line");
    }
}
