//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Un thread para el accept loop y un thread por cada conexión aceptada.
//! Cada conexión lee un request, llama al handler y se cierra. Cualquier
//! error (parsing, I/O, handler) queda en esa conexión: el accept loop
//! sigue aceptando.
//!
//! El único estado compartido es el flag `running`. Se revisa entre
//! accepts, así que apagar el servidor no interrumpe conexiones en curso.

use crate::config::Config;
use crate::http::{
    request_from_reader, ConnectionError, HeaderMap, Request, ResponseWriter, StatusCode,
    WriteError,
};
use crate::metrics::MetricsCollector;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Pausa después de un error de accept (ej: EMFILE) antes de reintentar
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Writer que recibe el handler, escribe directo sobre la conexión
pub type ConnWriter<'a> = ResponseWriter<&'a mut dyn Write>;

/// Falla reportada por un handler
///
/// Si el handler todavía no escribió nada, la conexión responde con
/// `HTTP/1.1 <status> <message>` y una sección de headers vacía.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler failed with {}: {message}", status.as_u16())]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Escribe la status line del error (sin body)
    pub fn write_to<W: Write>(&self, writer: &mut ResponseWriter<W>) -> Result<(), WriteError> {
        writer.write_status_line_with_reason(self.status, &self.message)?;
        writer.write_headers(&HeaderMap::new())
    }
}

impl From<WriteError> for HandlerError {
    fn from(err: WriteError) -> Self {
        HandlerError::internal(err.to_string())
    }
}

/// Código de aplicación que arma la respuesta de un request
///
/// Cualquier `fn(&mut ConnWriter, &Request) -> Result<(), HandlerError>`
/// es un handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, writer: &mut ConnWriter<'_>, request: &Request) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut ConnWriter<'_>, &Request) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, writer: &mut ConnWriter<'_>, request: &Request) -> Result<(), HandlerError> {
        self(writer, request)
    }
}

/// Servidor HTTP/1.1 concurrente, un thread por conexión
pub struct Server {
    config: Config,
    listener: TcpListener,
    handler: Arc<dyn Handler>,
    running: Arc<AtomicBool>,
    metrics: Arc<MetricsCollector>,
}

impl Server {
    /// Hace bind en `config.address()`
    pub fn bind(config: Config, handler: impl Handler) -> io::Result<Self> {
        let listener = TcpListener::bind(config.address())?;
        info!(address = %listener.local_addr()?, "servidor escuchando");

        Ok(Self {
            config,
            listener,
            handler: Arc::new(handler),
            running: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// Bind y accept loop en un thread propio (equivale a `bind` + `start`)
    pub fn serve(config: Config, handler: impl Handler) -> io::Result<ServerHandle> {
        Self::bind(config, handler)?.start()
    }

    /// Usa un collector de métricas compartido con otro código (ej: un handler)
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Corre el accept loop en el thread actual (bloquea)
    pub fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.accept_loop();
    }

    /// Mueve el accept loop a su propio thread y retorna un handle para apagarlo
    pub fn start(self) -> io::Result<ServerHandle> {
        let addr = self.local_addr()?;
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);

        // antes del spawn: un close() inmediato no puede perderse
        running.store(true, Ordering::SeqCst);
        let accept_thread = thread::Builder::new()
            .name("accept-loop".to_string())
            .spawn(move || self.accept_loop())?;

        Ok(ServerHandle {
            addr,
            running,
            metrics,
            accept_thread: Some(accept_thread),
        })
    }

    fn accept_loop(&self) {
        for stream in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                info!("accept loop detenido");
                break;
            }

            match stream {
                Ok(stream) => self.dispatch(stream),
                Err(e) => accept_failed(&e),
            }
        }
    }

    fn dispatch(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        info!(%peer, "nueva conexión");

        let handler = Arc::clone(&self.handler);
        let metrics = Arc::clone(&self.metrics);
        let config = self.config.clone();

        self.metrics.connection_opened();
        let spawned = thread::Builder::new()
            .name(format!("conn-{}", peer))
            .spawn(move || {
                serve_connection(stream, handler.as_ref(), &config, &metrics);
                metrics.connection_closed();
            });

        if let Err(e) = spawned {
            self.metrics.connection_closed();
            error!(%peer, error = %e, "no se pudo crear el thread de la conexión");
        }
    }
}

/// Handle de un servidor corriendo en segundo plano
///
/// Al hacer drop también apaga el servidor.
pub struct ServerHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    metrics: Arc<MetricsCollector>,
    accept_thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Deja de aceptar conexiones y espera a que termine el accept loop
    ///
    /// Las conexiones que ya están en curso terminan por su cuenta.
    pub fn close(mut self) -> io::Result<()> {
        self.stop()
    }

    /// Bloquea hasta que el accept loop termine
    pub fn join(mut self) -> io::Result<()> {
        let Some(accept_thread) = self.accept_thread.take() else {
            return Ok(());
        };
        let result = accept_thread
            .join()
            .map_err(|_| io::Error::other("accept loop panicked"));
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn stop(&mut self) -> io::Result<()> {
        if self.accept_thread.is_none() {
            return Ok(());
        }

        if self.running.swap(false, Ordering::SeqCst) {
            // el accept loop está bloqueado en accept(): una conexión lo despierta
            if let Err(e) = TcpStream::connect(wake_address(self.addr)) {
                // sin despertar no se puede hacer join; el loop sigue vivo
                self.running.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }

        match self.accept_thread.take() {
            Some(accept_thread) => accept_thread
                .join()
                .map_err(|_| io::Error::other("accept loop panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "error al apagar el servidor");
        }
    }
}

fn accept_failed(e: &io::Error) {
    error!(error = %e, "error al aceptar conexión");
    thread::sleep(ACCEPT_ERROR_BACKOFF);
}

/// Dirección a la que conectarse para despertar el accept loop
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip: IpAddr = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => Ipv4Addr::LOCALHOST.into(),
        IpAddr::V6(ip) if ip.is_unspecified() => Ipv6Addr::LOCALHOST.into(),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

/// Atiende una conexión de principio a fin y la cierra
fn serve_connection(
    mut stream: TcpStream,
    handler: &dyn Handler,
    config: &Config,
    metrics: &MetricsCollector,
) {
    let start = Instant::now();

    let result = configure_timeouts(&stream, config)
        .map_err(ConnectionError::from)
        .and_then(|()| handle_stream(&mut stream, handler, config.read_chunk_size, metrics));

    match result {
        Ok(status) => {
            let latency = start.elapsed();
            metrics.record_request(status.map(|s| s.as_u16()), latency);
            debug!(
                status = ?status.map(|s| s.as_u16()),
                latency_us = latency.as_micros() as u64,
                "respuesta enviada"
            );
        }
        Err(ConnectionError::Closed) => debug!("el peer cerró sin enviar un request"),
        Err(ConnectionError::Parse(e)) => {
            metrics.record_parse_failure();
            warn!(error = %e, "request inválido, cerrando conexión");
        }
        Err(e) => {
            metrics.record_io_failure();
            warn!(error = %e, "error de conexión");
        }
    }

    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!(error = %e, "shutdown del socket");
    }
}

fn configure_timeouts(stream: &TcpStream, config: &Config) -> io::Result<()> {
    stream.set_read_timeout(config.read_timeout())?;
    stream.set_write_timeout(config.write_timeout())
}

/// Lee un request de `stream`, invoca al handler y completa la respuesta
///
/// Retorna el código que quedó escrito en la status line, si hubo alguno.
pub fn handle_stream<S: Read + Write>(
    stream: &mut S,
    handler: &dyn Handler,
    read_chunk_size: usize,
    metrics: &MetricsCollector,
) -> Result<Option<StatusCode>, ConnectionError> {
    let request = request_from_reader(&mut *stream, read_chunk_size)?;
    info!(method = %request.method(), target = request.target(), "request recibido");

    let out: &mut dyn Write = stream;
    let mut writer = ResponseWriter::new(out);

    if let Err(handler_error) = handler.handle(&mut writer, &request) {
        metrics.record_handler_failure();
        warn!(
            status = handler_error.status.as_u16(),
            message = %handler_error.message,
            "el handler reportó un error"
        );

        if writer.has_started() {
            debug!("la respuesta ya había empezado, no se escribe la status line de error");
        } else {
            handler_error.write_to(&mut writer)?;
        }
    }

    writer.finish()?;
    Ok(writer.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::default_headers;
    use std::io::Cursor;
    use std::time::Duration;

    /// Conexión en memoria: lee de `input`, escribe en `output`
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn hello_handler(w: &mut ConnWriter<'_>, req: &Request) -> Result<(), HandlerError> {
        let body = format!("hello {}", req.target());
        w.write_status_line(StatusCode::OK)?;
        w.write_headers(&default_headers(body.len()))?;
        w.write_body(body.as_bytes())?;
        Ok(())
    }

    fn echo_handler(w: &mut ConnWriter<'_>, req: &Request) -> Result<(), HandlerError> {
        w.write_status_line(StatusCode::OK)?;
        w.write_headers(&default_headers(req.body().len()))?;
        w.write_body(req.body())?;
        Ok(())
    }

    fn failing_handler(_w: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
        Err(HandlerError::bad_request("nope"))
    }

    fn half_written_handler(w: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
        w.write_status_line(StatusCode::OK)?;
        Err(HandlerError::internal("gave up"))
    }

    fn trailer_handler(w: &mut ConnWriter<'_>, _req: &Request) -> Result<(), HandlerError> {
        w.write_status_line(StatusCode::OK)?;
        w.write_headers(
            &HeaderMap::new()
                .with("Transfer-Encoding", "chunked")
                .with("Trailer", "X-Never-Sent"),
        )?;
        w.write_chunked_body(b"data")?;
        w.write_chunked_body_done()?;
        Ok(())
    }

    fn slow_handler(w: &mut ConnWriter<'_>, req: &Request) -> Result<(), HandlerError> {
        if req.path() == "/slow" {
            thread::sleep(Duration::from_millis(300));
        }
        hello_handler(w, req)
    }

    #[test]
    fn test_handle_stream_ok() {
        let metrics = MetricsCollector::new();
        let mut stream = MockStream::new(b"GET /coffee HTTP/1.1\r\nHost: a\r\n\r\n");

        let status = handle_stream(&mut stream, &hello_handler, 4, &metrics).unwrap();

        assert_eq!(status, Some(StatusCode::OK));
        let output = stream.output();
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
        let expected_len = format!("Content-Length: {}\r\n", "hello /coffee".len());
        assert!(output.contains(&expected_len));
        assert!(output.ends_with("\r\n\r\nhello /coffee"));
    }

    #[test]
    fn test_handle_stream_post_body() {
        let metrics = MetricsCollector::new();
        let mut stream =
            MockStream::new(b"POST /echo HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world");

        handle_stream(&mut stream, &echo_handler, 3, &metrics).unwrap();

        assert!(stream.output().ends_with("\r\n\r\nhello world"));
    }

    #[test]
    fn test_parse_error_writes_nothing() {
        let metrics = MetricsCollector::new();
        let mut stream = MockStream::new(b"GET /x HTTP/2.0\r\n\r\n");

        let result = handle_stream(&mut stream, &hello_handler, 1024, &metrics);

        assert!(matches!(result, Err(ConnectionError::Parse(_))));
        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_handler_error_writes_status_line() {
        let metrics = MetricsCollector::new();
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n\r\n");

        let status = handle_stream(&mut stream, &failing_handler, 1024, &metrics).unwrap();

        assert_eq!(status, Some(StatusCode::BAD_REQUEST));
        assert_eq!(stream.output(), "HTTP/1.1 400 nope\r\n\r\n");
        assert_eq!(metrics.snapshot().handler_failures, 1);
    }

    #[test]
    fn test_handler_error_after_partial_response() {
        let metrics = MetricsCollector::new();
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n\r\n");

        let status = handle_stream(&mut stream, &half_written_handler, 1024, &metrics).unwrap();

        assert_eq!(status, Some(StatusCode::OK));
        assert_eq!(stream.output(), "HTTP/1.1 200 OK\r\n");
    }

    #[test]
    fn test_pending_trailer_section_is_closed() {
        let metrics = MetricsCollector::new();
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n\r\n");

        handle_stream(&mut stream, &trailer_handler, 1024, &metrics).unwrap();

        assert!(stream.output().ends_with("\r\n\r\n4\r\ndata\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_closed_connection() {
        let metrics = MetricsCollector::new();
        let mut stream = MockStream::new(b"");

        let result = handle_stream(&mut stream, &hello_handler, 1024, &metrics);
        assert!(matches!(result, Err(ConnectionError::Closed)));
    }

    #[test]
    fn test_handler_error_from_write_error() {
        let err: HandlerError = WriteError::OutOfOrder {
            operation: "write_body",
            state: "start",
        }
        .into();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("write_body"));
        assert_eq!(
            HandlerError::bad_request("x").to_string(),
            "handler failed with 400: x"
        );
    }

    #[test]
    fn test_accept_error_backs_off() {
        let start = Instant::now();
        accept_failed(&io::Error::from(io::ErrorKind::Other));
        assert!(start.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }

    #[test]
    fn test_failed_wake_keeps_accept_thread() {
        let mut server = Server::serve(ephemeral_config(), hello_handler).unwrap();
        let real_addr = server.local_addr();

        // un puerto donde nadie escucha
        let closed_addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        server.addr = closed_addr;

        assert!(server.stop().is_err());
        assert!(server.accept_thread.is_some());
        assert!(server.is_running());

        server.addr = real_addr;
        let response = send(real_addr, b"GET /still HTTP/1.1\r\n\r\n");
        assert!(response.ends_with("hello /still"));
        server.close().unwrap();
    }

    #[test]
    fn test_wake_address() {
        let any: SocketAddr = "0.0.0.0:4000".parse().unwrap();
        assert_eq!(wake_address(any), "127.0.0.1:4000".parse().unwrap());

        let any6: SocketAddr = "[::]:4000".parse().unwrap();
        assert_eq!(wake_address(any6), "[::1]:4000".parse().unwrap());

        let local: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(wake_address(local), local);
    }

    fn ephemeral_config() -> Config {
        Config {
            port: 0,
            ..Config::default()
        }
    }

    fn send(addr: SocketAddr, raw: &[u8]) -> String {
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(raw).unwrap();
        client.shutdown(Shutdown::Write).unwrap();

        let mut buf = Vec::new();
        let _ = client.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_server_serves_and_closes() {
        let server = Server::serve(ephemeral_config(), hello_handler).unwrap();
        let addr = server.local_addr();
        assert!(server.is_running());

        let response = send(addr, b"GET /tea HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("hello /tea"));

        let metrics = server.metrics();
        server.close().unwrap();
        assert_eq!(metrics.snapshot().requests_handled, 1);
    }

    #[test]
    fn test_bad_connection_does_not_stop_server() {
        let server = Server::serve(ephemeral_config(), hello_handler).unwrap();
        let addr = server.local_addr();

        assert_eq!(send(addr, b"GET /x HTTP/2.0\r\n\r\n"), "");
        assert_eq!(send(addr, b"garbage without crlf"), "");

        let response = send(addr, b"GET /after HTTP/1.1\r\n\r\n");
        assert!(response.ends_with("hello /after"));

        server.close().unwrap();
    }

    #[test]
    fn test_connections_are_independent() {
        let server = Server::serve(ephemeral_config(), slow_handler).unwrap();
        let addr = server.local_addr();

        // una conexión a medio enviar no bloquea a las demás
        let mut stalled = TcpStream::connect(addr).unwrap();
        stalled.write_all(b"GET /stalled HTTP/1.1\r\nHo").unwrap();

        let slow = thread::spawn(move || send(addr, b"GET /slow HTTP/1.1\r\n\r\n"));
        let fast = send(addr, b"GET /fast HTTP/1.1\r\n\r\n");
        assert!(fast.ends_with("hello /fast"));
        assert!(slow.join().unwrap().ends_with("hello /slow"));

        stalled.write_all(b"st: a\r\n\r\n").unwrap();
        let mut buf = String::new();
        stalled.read_to_string(&mut buf).unwrap();
        assert!(buf.ends_with("hello /stalled"));

        server.close().unwrap();
    }

    #[test]
    fn test_run_on_current_thread() {
        let server = Server::bind(ephemeral_config(), hello_handler).unwrap();
        let addr = server.local_addr().unwrap();
        let running = Arc::clone(&server.running);

        let accept_thread = thread::spawn(move || server.run());

        // run() pone el flag en true; se espera a que arranque
        while !running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(send(addr, b"GET /run HTTP/1.1\r\n\r\n").ends_with("hello /run"));

        running.store(false, Ordering::SeqCst);
        TcpStream::connect(addr).unwrap();
        accept_thread.join().unwrap();
    }
}
