//! # Escritura de Respuestas HTTP
//! src/http/response.rs
//!
//! `ResponseWriter` serializa una respuesta directo sobre la conexión, en
//! este orden:
//!
//! ```text
//! status line → headers → (body | chunk* → último chunk) → [trailers]
//! ```
//!
//! ## Formato chunked con trailers
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Transfer-Encoding: chunked\r\n
//! Trailer: X-Content-Length\r\n
//! \r\n
//! 5\r\n
//! hello\r\n
//! 0\r\n
//! X-Content-Length: 5\r\n
//! \r\n
//! ```
//!
//! Las llamadas fuera de orden devuelven [`WriteError::OutOfOrder`] en vez
//! de escribir bytes que el cliente no podría interpretar.

use super::error::WriteError;
use super::headers::HeaderMap;
use super::StatusCode;
use std::io::Write;

const TRAILER: &str = "trailer";

/// Qué fue lo último que se escribió
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Start,
    StatusLine,
    Headers,
    Body,
    ChunkedBody,
    ChunkedBodyDone,
    Trailers,
}

impl WriterState {
    fn label(&self) -> &'static str {
        match self {
            WriterState::Start => "start",
            WriterState::StatusLine => "status line",
            WriterState::Headers => "headers",
            WriterState::Body => "body",
            WriterState::ChunkedBody => "chunked body",
            WriterState::ChunkedBodyDone => "chunked body done",
            WriterState::Trailers => "trailers",
        }
    }
}

/// Headers por defecto para una respuesta de largo fijo
///
/// ```
/// use http_from_tcp::http::response::default_headers;
///
/// let headers = default_headers(13);
/// assert_eq!(headers.get("Content-Length"), Some("13"));
/// assert_eq!(headers.get("Connection"), Some("close"));
/// ```
pub fn default_headers(content_len: usize) -> HeaderMap {
    HeaderMap::new()
        .with("Content-Length", &content_len.to_string())
        .with("Connection", "close")
        .with("Content-Type", "text/plain")
}

/// Serializador de respuestas ligado a un stream de salida
#[derive(Debug)]
pub struct ResponseWriter<W: Write> {
    out: W,
    state: WriterState,
    status: Option<StatusCode>,
    trailers_declared: bool,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: WriterState::Start,
            status: None,
            trailers_declared: false,
        }
    }

    /// Código escrito en la status line, si ya se escribió
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// true si ya se escribió algo sobre el stream
    pub fn has_started(&self) -> bool {
        self.state != WriterState::Start
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Escribe `HTTP/1.1 <code> <reason>\r\n`
    ///
    /// ```
    /// use http_from_tcp::http::{ResponseWriter, StatusCode};
    ///
    /// let mut writer = ResponseWriter::new(Vec::new());
    /// writer.write_status_line(StatusCode::OK).unwrap();
    /// assert_eq!(writer.get_ref().as_slice(), b"HTTP/1.1 200 OK\r\n");
    /// ```
    pub fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.write_status_line_with_reason(status, status.reason_phrase())
    }

    /// Como [`Self::write_status_line`] pero con una reason phrase propia
    ///
    /// CR y LF se eliminan de `reason` para no romper el framing.
    pub fn write_status_line_with_reason(
        &mut self,
        status: StatusCode,
        reason: &str,
    ) -> Result<(), WriteError> {
        self.check_order("write_status_line", &[WriterState::Start])?;

        let reason: String = reason.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        let line = format!("HTTP/1.1 {} {}\r\n", status.as_u16(), reason);
        self.out.write_all(line.as_bytes())?;

        self.status = Some(status);
        self.state = WriterState::StatusLine;
        Ok(())
    }

    /// Escribe cada header como `Name: value\r\n` y la línea vacía final
    ///
    /// Si hay un header `Trailer`, el cierre del body chunked queda abierto
    /// para los trailers.
    pub fn write_headers(&mut self, headers: &HeaderMap) -> Result<(), WriteError> {
        self.check_order("write_headers", &[WriterState::StatusLine])?;

        self.write_fields(headers)?;

        self.trailers_declared = headers.contains(TRAILER);
        self.state = WriterState::Headers;
        Ok(())
    }

    /// Escribe bytes del body tal cual (respuesta con `Content-Length`)
    pub fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.check_order("write_body", &[WriterState::Headers, WriterState::Body])?;

        self.out.write_all(body)?;
        self.state = WriterState::Body;
        Ok(body.len())
    }

    /// Escribe un chunk: `HEX(len)\r\n<bytes>\r\n`
    ///
    /// Retorna los bytes escritos en el stream (framing incluido). Un slice
    /// vacío no escribe nada: el chunk `0` es solo para el cierre.
    ///
    /// ```
    /// use http_from_tcp::http::{HeaderMap, ResponseWriter, StatusCode};
    ///
    /// let mut writer = ResponseWriter::new(Vec::new());
    /// writer.write_status_line(StatusCode::OK).unwrap();
    /// writer.write_headers(&HeaderMap::new()).unwrap();
    ///
    /// let written = writer.write_chunked_body(&[b'x'; 26]).unwrap();
    /// assert_eq!(written, 2 + 2 + 26 + 2);
    /// assert!(writer.get_ref().ends_with(b"1A\r\nxxxxxxxxxxxxxxxxxxxxxxxxxx\r\n"));
    /// ```
    pub fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.check_order(
            "write_chunked_body",
            &[WriterState::Headers, WriterState::ChunkedBody],
        )?;
        self.state = WriterState::ChunkedBody;

        if chunk.is_empty() {
            return Ok(0);
        }

        let size_line = format!("{:X}\r\n", chunk.len());
        self.out.write_all(size_line.as_bytes())?;
        self.out.write_all(chunk)?;
        self.out.write_all(b"\r\n")?;

        Ok(size_line.len() + chunk.len() + 2)
    }

    /// Escribe el último chunk
    ///
    /// Sin trailers declarados escribe `0\r\n\r\n`; con un header `Trailer`
    /// escribe solo `0\r\n` y la sección la cierra [`Self::write_trailers`]
    /// o [`Self::finish`].
    pub fn write_chunked_body_done(&mut self) -> Result<usize, WriteError> {
        self.check_order(
            "write_chunked_body_done",
            &[WriterState::Headers, WriterState::ChunkedBody],
        )?;

        let terminator: &[u8] = if self.trailers_declared {
            b"0\r\n"
        } else {
            b"0\r\n\r\n"
        };
        self.out.write_all(terminator)?;

        self.state = WriterState::ChunkedBodyDone;
        Ok(terminator.len())
    }

    /// Escribe los trailers y la línea vacía que cierra el mensaje
    pub fn write_trailers(&mut self, trailers: &HeaderMap) -> Result<(), WriteError> {
        self.check_order("write_trailers", &[WriterState::ChunkedBodyDone])?;
        if !self.trailers_declared {
            return Err(WriteError::OutOfOrder {
                operation: "write_trailers",
                state: "a response without a Trailer header",
            });
        }

        self.write_fields(trailers)?;
        self.state = WriterState::Trailers;
        Ok(())
    }

    /// Cierra lo que haya quedado abierto y hace flush
    ///
    /// Si se anunciaron trailers pero no se escribieron, agrega la línea
    /// vacía que termina el mensaje chunked.
    pub fn finish(&mut self) -> Result<(), WriteError> {
        if self.state == WriterState::ChunkedBodyDone && self.trailers_declared {
            self.out.write_all(b"\r\n")?;
            self.state = WriterState::Trailers;
        }
        self.out.flush()?;
        Ok(())
    }

    fn write_fields(&mut self, fields: &HeaderMap) -> Result<(), WriteError> {
        let mut section = String::new();
        for (name, value) in fields.iter() {
            section.push_str(name);
            section.push_str(": ");
            section.push_str(value);
            section.push_str("\r\n");
        }
        section.push_str("\r\n");

        self.out.write_all(section.as_bytes())?;
        Ok(())
    }

    fn check_order(
        &self,
        operation: &'static str,
        allowed: &[WriterState],
    ) -> Result<(), WriteError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WriteError::OutOfOrder {
                operation,
                state: self.state.label(),
            })
        }
    }
}
