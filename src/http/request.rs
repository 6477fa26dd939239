//! # Parsing incremental de Requests HTTP/1.1
//! src/http/request.rs
//!
//! El parser es una máquina de estados que se alimenta con lo que haya en
//! el buffer de lectura, sin importar cómo llegaron fragmentados los bytes:
//!
//! ```text
//! AwaitingRequestLine → ParsingHeaders → [ParsingBody] → Done
//! ```
//!
//! Cada llamada a [`RequestParser::parse`] retorna cuántos bytes consumió;
//! quien llama descarta ese prefijo y vuelve a llamar cuando llegan más
//! datos. Un retorno de 0 con el estado sin cambiar significa "faltan bytes".
//!
//! ## Formato aceptado
//!
//! ```text
//! GET /path HTTP/1.1\r\n
//! Host: localhost:42069\r\n
//! Content-Length: 4\r\n
//! \r\n
//! abcd
//! ```

use super::error::{ConnectionError, ParseError};
use super::headers::{find_crlf, HeaderMap, CRLF};
use std::fmt;
use std::io::{self, Read};
use tracing::debug;

/// Header que determina el largo del body
pub const CONTENT_LENGTH: &str = "content-length";

const HTTP_PREFIX: &str = "HTTP/";
const SUPPORTED_VERSION: &str = "1.1";

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// El método tiene que venir en mayúsculas: `get` no es `GET`
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            _ => Err(ParseError::InvalidMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primera línea del request: `METHOD TARGET HTTP/1.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    /// Sin el prefijo `HTTP/`; siempre `"1.1"`
    pub version: String,
}

impl RequestLine {
    /// Parsea la request line si ya hay un CRLF en `data`
    ///
    /// `Ok(None)` significa que faltan bytes.
    fn parse(data: &[u8]) -> Result<Option<(Self, usize)>, ParseError> {
        let Some(line_end) = find_crlf(data) else {
            return Ok(None);
        };

        let line =
            std::str::from_utf8(&data[..line_end]).map_err(|_| ParseError::InvalidRequestLine)?;
        let parts: Vec<&str> = line.split(' ').collect();
        let [method, target, version] = parts[..] else {
            return Err(ParseError::InvalidRequestLine);
        };

        if version.strip_prefix(HTTP_PREFIX) != Some(SUPPORTED_VERSION) {
            return Err(ParseError::UnsupportedVersion(version.to_string()));
        }

        let method = Method::parse(method)?;

        if !target.starts_with('/') {
            return Err(ParseError::InvalidTarget(target.to_string()));
        }

        let request_line = RequestLine {
            method,
            target: target.to_string(),
            version: SUPPORTED_VERSION.to_string(),
        };
        Ok(Some((request_line, line_end + CRLF.len())))
    }
}

/// Estado del parser; solo avanza, nunca retrocede
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParserState {
    AwaitingRequestLine,
    ParsingHeaders,
    ParsingBody,
    Done,
}

/// Máquina de estados que arma un [`Request`] a partir de bytes parciales
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParser {
    state: ParserState,
    request_line: Option<RequestLine>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingRequestLine,
            request_line: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn request_line(&self) -> Option<&RequestLine> {
        self.request_line.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume todo lo que pueda de `data` y retorna cuántos bytes usó
    ///
    /// Los headers se procesan en un loop dentro de la misma llamada mientras
    /// haya líneas completas. En `Done` no consume nada ni modifica el estado.
    ///
    /// ```
    /// use http_from_tcp::http::request::{ParserState, RequestParser};
    ///
    /// let mut parser = RequestParser::new();
    /// assert_eq!(parser.parse(b"GET / HT").unwrap(), 0);
    ///
    /// let raw = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";
    /// assert_eq!(parser.parse(raw).unwrap(), raw.len());
    /// assert_eq!(parser.state(), ParserState::Done);
    /// ```
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut read = 0;

        loop {
            match self.state {
                ParserState::Done => return Ok(read),

                ParserState::AwaitingRequestLine => {
                    let Some((request_line, consumed)) = RequestLine::parse(&data[read..])? else {
                        return Ok(read);
                    };
                    self.request_line = Some(request_line);
                    read += consumed;
                    self.transition(ParserState::ParsingHeaders);
                }

                ParserState::ParsingHeaders => {
                    let (consumed, done) = self.headers.parse(&data[read..])?;
                    read += consumed;

                    if done {
                        read += CRLF.len();
                        if self.content_length().is_some_and(|len| len > 0) {
                            self.transition(ParserState::ParsingBody);
                        } else {
                            self.transition(ParserState::Done);
                            return Ok(read);
                        }
                    } else if consumed == 0 {
                        return Ok(read);
                    }
                }

                ParserState::ParsingBody => {
                    let available = &data[read..];

                    let Some(content_length) = self.content_length() else {
                        if !available.is_empty() {
                            return Err(ParseError::BodyWithoutContentLength);
                        }
                        self.transition(ParserState::Done);
                        return Ok(read);
                    };

                    let remaining = content_length.saturating_sub(self.body.len());
                    if available.len() > remaining {
                        return Err(ParseError::BadContentLength);
                    }

                    self.body.extend_from_slice(available);
                    read += available.len();

                    if self.body.len() > content_length {
                        return Err(ParseError::BadContentLength);
                    }
                    if self.body.len() == content_length {
                        self.transition(ParserState::Done);
                    }
                    return Ok(read);
                }
            }
        }
    }

    /// Entrega el request terminado; `None` si el parser no llegó a `Done`
    pub fn finish(self) -> Option<Request> {
        match (self.state, self.request_line) {
            (ParserState::Done, Some(request_line)) => Some(Request {
                request_line,
                headers: self.headers,
                body: self.body,
            }),
            _ => None,
        }
    }

    fn content_length(&self) -> Option<usize> {
        self.headers
            .get_int(CONTENT_LENGTH)
            .and_then(|len| usize::try_from(len).ok())
    }

    fn transition(&mut self, next: ParserState) {
        debug_assert!(next > self.state, "parser state must advance");
        debug!(from = ?self.state, to = ?next, "parser state");
        self.state = next;
    }
}

/// Representa un request HTTP/1.1 ya parseado por completo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    request_line: RequestLine,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Parsea un request completo desde un buffer en memoria
    ///
    /// ```
    /// use http_from_tcp::http::{Method, Request};
    ///
    /// let raw = b"POST /submit HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi";
    /// let request = Request::from_bytes(raw).unwrap();
    ///
    /// assert_eq!(request.method(), Method::Post);
    /// assert_eq!(request.body(), b"hi");
    /// ```
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ConnectionError> {
        let mut reader = raw;
        request_from_reader(&mut reader, raw.len().max(1))
    }

    pub fn request_line(&self) -> &RequestLine {
        &self.request_line
    }

    pub fn method(&self) -> Method {
        self.request_line.method
    }

    /// Target completo, con query string si la hay
    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// Target sin la query string (`/a?b=1` → `/a`)
    pub fn path(&self) -> &str {
        let target = self.target();
        target.split_once('?').map_or(target, |(path, _)| path)
    }

    pub fn version(&self) -> &str {
        &self.request_line.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Valor de `Content-Length`, si está y es un entero no negativo
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get_int(CONTENT_LENGTH)
            .and_then(|len| usize::try_from(len).ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body como String, si es UTF-8 válido
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }
}

/// Lee de `reader` hasta completar un request
///
/// Lee de a `chunk_size` bytes, acumula en un buffer que crece según haga
/// falta y descarta el prefijo que el parser va consumiendo. Un EOF antes
/// de terminar es un error de esta conexión, nunca un panic.
pub fn request_from_reader<R: Read + ?Sized>(
    reader: &mut R,
    chunk_size: usize,
) -> Result<Request, ConnectionError> {
    let mut parser = RequestParser::new();
    let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size);
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut received = 0usize;

    while parser.state() != ParserState::Done {
        let bytes_read = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if bytes_read == 0 {
            return Err(if received == 0 {
                ConnectionError::Closed
            } else {
                ConnectionError::IncompleteRequest {
                    buffered: buffer.len(),
                }
            });
        }
        received += bytes_read;
        buffer.extend_from_slice(&chunk[..bytes_read]);

        let consumed = parser.parse(&buffer)?;
        buffer.drain(..consumed);
    }

    parser.finish().ok_or(ConnectionError::IncompleteRequest {
        buffered: buffer.len(),
    })
}
