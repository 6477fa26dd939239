//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración con soporte para argumentos CLI y variables de entorno.
//!
//! ### CLI
//! ```bash
//! ./http_from_tcp --port 42069 --read-chunk 1024 --read-timeout-ms 5000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=0.0.0.0 LOG_FILTER=debug ./http_from_tcp
//! ```

use clap::Parser;
use std::time::Duration;

/// Configuración del servidor HTTP/1.1
#[derive(Debug, Clone, Parser)]
#[command(name = "http_from_tcp")]
#[command(about = "Servidor HTTP/1.1 sobre TCP, con parser escrito desde cero")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor (0 = puerto efímero)
    #[arg(short, long, default_value = "42069", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Bytes pedidos al socket en cada lectura
    #[arg(long = "read-chunk", default_value = "1024", env = "READ_CHUNK_SIZE")]
    pub read_chunk_size: usize,

    /// Timeout de lectura por conexión en milisegundos (0 = sin timeout)
    #[arg(long = "read-timeout-ms", default_value = "0", env = "READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Timeout de escritura por conexión en milisegundos (0 = sin timeout)
    #[arg(long = "write-timeout-ms", default_value = "0", env = "WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: u64,

    /// Filtro de logs (sintaxis de tracing EnvFilter); RUST_LOG tiene prioridad
    #[arg(long = "log-filter", default_value = "info", env = "LOG_FILTER")]
    pub log_filter: String,
}

impl Config {
    /// Crea la configuración parseando argumentos CLI y variables de entorno
    pub fn from_args() -> Self {
        Config::parse()
    }

    /// Dirección completa para bind (host:port)
    ///
    /// ```rust
    /// use http_from_tcp::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:42069");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }
        if self.read_chunk_size == 0 {
            return Err("Read chunk size must be >= 1".to_string());
        }
        Ok(())
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 42069,
            host: "127.0.0.1".to_string(),
            read_chunk_size: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            log_filter: "info".to_string(),
        }
    }
}
