/// HTTP handlers for the chat notification service
pub mod events;

use actix_web::web;

pub use events::register_routes as register_events;

/// Health, metrics and the event endpoint.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics));
    register_events(cfg);
}
