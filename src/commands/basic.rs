//! # Comandos Básicos
//! src/commands/basic.rs
//!
//! Páginas HTML de largo fijo y el endpoint de métricas.

use crate::http::{HeaderMap, Request, StatusCode};
use crate::metrics::MetricsCollector;
use crate::server::{ConnWriter, Handler, HandlerError};
use std::sync::Arc;

const BAD_REQUEST_PAGE: &str = "<html>
  <head><title>400 Bad Request</title></head>
  <body>
    <h1>Bad Request</h1>
    <p>The request could not be served.</p>
  </body>
</html>
";

const INTERNAL_ERROR_PAGE: &str = "<html>
  <head><title>500 Internal Server Error</title></head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Something went wrong on our side.</p>
  </body>
</html>
";

const OK_PAGE: &str = "<html>
  <head><title>200 OK</title></head>
  <body>
    <h1>Success!</h1>
    <p>The request was served.</p>
  </body>
</html>
";

fn fixed_headers(content_type: &str, content_len: usize) -> HeaderMap {
    HeaderMap::new()
        .with("Content-Length", &content_len.to_string())
        .with("Connection", "close")
        .with("Content-Type", content_type)
}

fn write_page(
    writer: &mut ConnWriter<'_>,
    status: StatusCode,
    page: &str,
) -> Result<(), HandlerError> {
    writer.write_status_line(status)?;
    writer.write_headers(&fixed_headers("text/html", page.len()))?;
    writer.write_body(page.as_bytes())?;
    Ok(())
}

/// Handler para /yourproblem
pub fn your_problem(writer: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
    write_page(writer, StatusCode::BAD_REQUEST, BAD_REQUEST_PAGE)
}

/// Handler para /myproblem
pub fn my_problem(writer: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
    write_page(writer, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_PAGE)
}

/// Página por defecto
pub fn ok_page(writer: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
    write_page(writer, StatusCode::OK, OK_PAGE)
}

/// Handler para /metrics
///
/// Retorna el snapshot del collector que comparte con el servidor.
///
/// # Ejemplo de response
/// ```json
/// {
///   "uptime_secs": 12,
///   "connections_accepted": 3,
///   "requests_handled": 2,
///   "status_codes": { "200": 2 },
///   ...
/// }
/// ```
pub struct MetricsPage {
    metrics: Arc<MetricsCollector>,
}

impl MetricsPage {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }
}

impl Handler for MetricsPage {
    fn handle(&self, writer: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
        let body = self
            .metrics
            .to_json()
            .map_err(|e| HandlerError::internal(format!("metrics serialization failed: {}", e)))?;

        writer.write_status_line(StatusCode::OK)?;
        writer.write_headers(&fixed_headers("application/json", body.len()))?;
        writer.write_body(body.as_bytes())?;
        Ok(())
    }
}
