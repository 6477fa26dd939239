//! # Respuestas Chunked
//! src/commands/stream.rs
//!
//! `/chunked` manda el body en chunks de 32 bytes y al final los trailers
//! `X-Content-SHA256` y `X-Content-Length` calculados sobre el body
//! completo. Con un POST con body se devuelve ese body; si no, un texto
//! generado.

use crate::http::{HeaderMap, Request, StatusCode};
use crate::server::{ConnWriter, HandlerError};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Bytes por chunk
pub const CHUNK_SIZE: usize = 32;

/// Genera el body por defecto: `count` líneas numeradas
pub fn sample_payload(count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| format!("line {:03} of the chunked stream\n", i))
        .collect::<String>()
        .into_bytes()
}

/// Handler para /chunked
pub fn chunked(writer: &mut ConnWriter<'_>, req: &Request) -> Result<(), HandlerError> {
    let payload = if req.body().is_empty() {
        sample_payload(16)
    } else {
        req.body().to_vec()
    };

    let mut headers = HeaderMap::new()
        .with("Transfer-Encoding", "chunked")
        .with("Connection", "close")
        .with("Content-Type", "text/plain");
    headers.append("Trailer", "X-Content-SHA256");
    headers.append("Trailer", "X-Content-Length");

    writer.write_status_line(StatusCode::OK)?;
    writer.write_headers(&headers)?;

    let mut hasher = Sha256::new();
    let mut sent = 0;
    for chunk in payload.chunks(CHUNK_SIZE) {
        let framed = writer.write_chunked_body(chunk)?;
        hasher.update(chunk);
        sent += chunk.len();
        debug!(chunk_len = chunk.len(), framed, "chunk enviado");
    }
    writer.write_chunked_body_done()?;

    let trailers = HeaderMap::new()
        .with("X-Content-SHA256", &format!("{:x}", hasher.finalize()))
        .with("X-Content-Length", &sent.to_string());
    writer.write_trailers(&trailers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Decodifica un body chunked y retorna (payload, sección de trailers)
    fn decode(mut rest: &str) -> (String, String) {
        let mut payload = String::new();
        loop {
            let (size_line, after) = rest.split_once("\r\n").unwrap();
            let size = usize::from_str_radix(size_line, 16).unwrap();
            if size == 0 {
                return (payload, after.to_string());
            }
            payload.push_str(&after[..size]);
            assert_eq!(&after[size..size + 2], "\r\n");
            rest = &after[size + 2..];
        }
    }

    fn call(raw: &[u8]) -> String {
        let request = Request::from_bytes(raw).unwrap();
        let mut out: Vec<u8> = Vec::new();
        {
            let sink: &mut dyn Write = &mut out;
            let mut writer = ConnWriter::new(sink);
            chunked(&mut writer, &request).unwrap();
            writer.finish().unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_sample_payload() {
        let payload = sample_payload(2);
        assert_eq!(payload, b"line 000 of the chunked stream\nline 001 of the chunked stream\n");
    }

    #[test]
    fn test_chunked_default_payload() {
        let response = call(b"GET /chunked HTTP/1.1\r\n\r\n");
        let (head, body) = response.split_once("\r\n\r\n").unwrap();

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Transfer-Encoding: chunked"));
        assert!(head.contains("Trailer: X-Content-SHA256, X-Content-Length"));
        assert!(!head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .any(|(name, _)| name.eq_ignore_ascii_case("content-length")));

        let expected = sample_payload(16);
        let (payload, trailers) = decode(body);
        assert_eq!(payload.as_bytes(), expected.as_slice());
        assert!(trailers.contains(&format!("X-Content-Length: {}\r\n", expected.len())));
        assert!(trailers.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_chunk_sizes() {
        let body = "a".repeat(70);
        let raw = format!("POST /chunked HTTP/1.1\r\nContent-Length: 70\r\n\r\n{}", body);
        let response = call(raw.as_bytes());
        let (_, chunks) = response.split_once("\r\n\r\n").unwrap();

        let full = "a".repeat(32);
        let expected = format!("20\r\n{full}\r\n20\r\n{full}\r\n6\r\naaaaaa\r\n0\r\n");
        assert!(chunks.starts_with(&expected));
    }

    #[test]
    fn test_echo_body_with_hash() {
        let response = call(b"POST /chunked HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        let (payload, trailers) = decode(body);

        assert_eq!(payload, "hello");
        assert!(trailers.contains(
            "X-Content-SHA256: 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\r\n"
        ));
        assert!(trailers.contains("X-Content-Length: 5\r\n"));
    }
}
