//! # Headers HTTP
//! src/http/headers.rs
//!
//! Contenedor de headers con búsqueda case-insensitive. La clave interna
//! siempre es el nombre en minúsculas; si un nombre aparece varias veces en
//! el mismo mensaje, los valores se concatenan con `", "` en orden de llegada.
//!
//! El mismo tipo se usa para parsear headers entrantes (línea por línea,
//! sobre un buffer que puede estar incompleto) y para armar los headers y
//! trailers de una respuesta.

use super::error::ParseError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Separador de líneas del protocolo
pub const CRLF: &[u8] = b"\r\n";

/// Un campo: el nombre tal como se escribió la primera vez y su valor
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    value: String,
}

/// Mapa de headers case-insensitive con semántica multi-valor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: HashMap<String, HeaderEntry>,
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9!#$%&'*+\-.^_`|~]+$").expect("token pattern is a valid regex")
    })
}

/// Verifica que `name` sea un token HTTP válido (no vacío)
///
/// ```
/// use http_from_tcp::http::headers::is_token;
///
/// assert!(is_token("X-Content-SHA256"));
/// assert!(!is_token("Bad Name"));
/// assert!(!is_token(""));
/// ```
pub fn is_token(name: &str) -> bool {
    token_regex().is_match(name)
}

/// Posición del primer CRLF en `data`
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|window| window == CRLF)
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsea como máximo una línea de header desde `data`
    ///
    /// Retorna `(consumidos, terminado)`:
    /// - `(0, false)`: no hay un CRLF todavía, hacen falta más bytes
    /// - `(0, true)`: línea vacía, fin de la sección de headers. El CRLF
    ///   del terminador NO se cuenta; lo suma quien llama.
    /// - `(n, false)`: se guardó un header y se consumieron `n` bytes
    ///
    /// ```
    /// use http_from_tcp::http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// let (n, done) = headers.parse(b"Host: localhost:42069\r\n\r\n").unwrap();
    /// assert_eq!(n, 23);
    /// assert!(!done);
    /// assert_eq!(headers.get("host"), Some("localhost:42069"));
    /// ```
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(line_end) = find_crlf(data) else {
            return Ok((0, false));
        };
        if line_end == 0 {
            return Ok((0, true));
        }

        let line = &data[..line_end];
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::NoColonInHeader)?;

        // "Host : x" no es válido
        if colon > 0 && line[colon - 1] == b' ' {
            return Err(malformed(line));
        }

        let name = std::str::from_utf8(&line[..colon])
            .map_err(|_| malformed(line))?
            .trim();
        if !is_token(name) {
            return Err(malformed(line));
        }

        let value = String::from_utf8_lossy(&line[colon + 1..]);
        self.append(name, value.trim());

        Ok((line_end + CRLF.len(), false))
    }

    /// Busca un header sin importar mayúsculas/minúsculas
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.value.as_str())
    }

    /// Valor del header interpretado como entero (None si falta o no es número)
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|value| value.parse().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Agrega un valor; si el nombre ya existe se concatena con `", "`
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .and_modify(|entry| {
                entry.value.push_str(", ");
                entry.value.push_str(value);
            })
            .or_insert_with(|| HeaderEntry {
                name: name.to_string(),
                value: value.to_string(),
            });
    }

    /// Reemplaza cualquier valor previo del header
    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries.insert(
            name.to_ascii_lowercase(),
            HeaderEntry {
                name: name.to_string(),
                value: value.to_string(),
            },
        );
    }

    /// Versión builder de [`HeaderMap::insert`]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Itera `(nombre, valor)` con el nombre tal como se escribió la primera vez.
    /// El orden no está definido.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), entry.value.as_str()))
    }
}

fn malformed(line: &[u8]) -> ParseError {
    ParseError::MalformedHeader(String::from_utf8_lossy(line).into_owned())
}
