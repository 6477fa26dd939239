//! # HTTP from TCP
//! src/lib.rs
//!
//! Servidor HTTP/1.1 implementado directamente sobre `std::net::TcpStream`,
//! sin librerías de HTTP: el parser de requests, los headers y el writer de
//! respuestas (largo fijo, chunked y trailers) están escritos desde cero.
//!
//! ## Arquitectura
//!
//! - `http`: parser incremental de requests, headers y writer de respuestas
//! - `server`: accept loop, un thread por conexión, trait `Handler`
//! - `router`: despacho por path exacto
//! - `commands`: handlers de demostración usados por el binario
//! - `metrics`: contadores de conexiones, requests y fallas
//! - `config`: configuración por CLI y variables de entorno
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use http_from_tcp::config::Config;
//! use http_from_tcp::http::{Request, StatusCode};
//! use http_from_tcp::http::response::default_headers;
//! use http_from_tcp::server::{ConnWriter, HandlerError, Server};
//!
//! fn hello(w: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
//!     w.write_status_line(StatusCode::OK)?;
//!     w.write_headers(&default_headers(5))?;
//!     w.write_body(b"hello")?;
//!     Ok(())
//! }
//!
//! let handle = Server::serve(Config::default(), hello)?;
//! println!("escuchando en {}", handle.local_addr());
//! handle.close()?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod commands;
pub mod config;
pub mod http;
pub mod metrics;
pub mod router;
pub mod server;
