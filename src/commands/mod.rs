//! # Comandos del Servidor
//! src/commands/mod.rs
//!
//! Handlers de demostración que usa el binario.
//!
//! | Ruta | Respuesta |
//! |---|---|
//! | `/yourproblem` | 400, página HTML |
//! | `/myproblem` | 500, página HTML |
//! | `/chunked` | 200, body chunked de 32 bytes por chunk con trailers |
//! | `/metrics` | 200, snapshot de métricas en JSON |
//! | cualquier otra | 200, página HTML |

pub mod basic;
pub mod stream;

pub use basic::{my_problem, ok_page, your_problem, MetricsPage};
pub use stream::{chunked, sample_payload};

use crate::metrics::MetricsCollector;
use crate::router::Router;
use std::sync::Arc;

/// Router con todas las rutas de demostración
pub fn demo_router(metrics: Arc<MetricsCollector>) -> Router {
    Router::new()
        .route("/yourproblem", your_problem)
        .route("/myproblem", my_problem)
        .route("/chunked", chunked)
        .route("/metrics", MetricsPage::new(metrics))
        .fallback(ok_page)
}
