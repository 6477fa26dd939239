//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes, cada una en su propio thread
//! 3. Lee y parsea un request HTTP/1.1
//! 4. Le pasa el request y un `ResponseWriter` al handler
//! 5. Cierra la conexión

pub mod tcp;

pub use tcp::{handle_stream, ConnWriter, Handler, HandlerError, Server, ServerHandle};
