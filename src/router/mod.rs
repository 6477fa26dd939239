//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea paths a handlers.
//!
//! ```text
//! Request → Router → Handler → ResponseWriter
//! ```
//!
//! La comparación es exacta sobre el path sin query string. Si ninguna
//! ruta coincide se usa el fallback (por defecto un 404).

use crate::http::response::default_headers;
use crate::http::{Request, StatusCode};
use crate::server::{ConnWriter, Handler, HandlerError};
use tracing::debug;

/// Router que mapea paths a handlers
pub struct Router {
    routes: Vec<(String, Box<dyn Handler>)>,
    fallback: Box<dyn Handler>,
}

impl Router {
    /// Crea un router vacío cuyo fallback responde 404
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: Box::new(not_found),
        }
    }

    /// Registra una ruta con su handler
    ///
    /// Si el path ya estaba registrado, gana el primero.
    ///
    /// ```
    /// use http_from_tcp::http::{Request, StatusCode};
    /// use http_from_tcp::router::Router;
    /// use http_from_tcp::server::{ConnWriter, HandlerError};
    ///
    /// fn hello(w: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
    ///     w.write_status_line(StatusCode::OK)?;
    ///     Ok(())
    /// }
    ///
    /// let router = Router::new().route("/hello", hello);
    /// assert!(router.has_route("/hello"));
    /// ```
    pub fn route(mut self, path: &str, handler: impl Handler) -> Self {
        self.routes.push((path.to_string(), Box::new(handler)));
        self
    }

    /// Reemplaza el handler usado cuando ninguna ruta coincide
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Box::new(handler);
        self
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.routes.iter().any(|(p, _)| p == path)
    }

    fn find(&self, path: &str) -> &dyn Handler {
        self.routes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, handler)| handler.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for Router {
    fn handle(&self, writer: &mut ConnWriter<'_>, request: &Request) -> Result<(), HandlerError> {
        let path = request.path();
        debug!(path, matched = self.has_route(path), "routing");
        self.find(path).handle(writer, request)
    }
}

/// Handler 404 por defecto
pub fn not_found(writer: &mut ConnWriter<'_>, request: &Request) -> Result<(), HandlerError> {
    let body = format!("Not Found: {}\n", request.path());
    writer.write_status_line(StatusCode::NOT_FOUND)?;
    writer.write_headers(&default_headers(body.len()))?;
    writer.write_body(body.as_bytes())?;
    Ok(())
}
