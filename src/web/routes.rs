use actix_web::{http::Method, web};
use crate::relay;
use crate::web::handlers;

/// Paths the relay answers on.
pub const CHAT_PATHS: [&str; 3] = ["/chat", "/api/chat", "/functions/v1/chat"];

pub fn configure(cfg: &mut web::ServiceConfig) {
    for path in CHAT_PATHS {
        cfg.service(
            web::resource(path)
                .app_data(relay::json_config(relay::MAX_REQUEST_BYTES))
                .route(web::post().to(handlers::chat))
                .route(web::method(Method::OPTIONS).to(handlers::preflight)),
        );
    }

    cfg.route("/widget.js", web::get().to(handlers::embed_script))
        .route("/widget/{website_id}", web::get().to(handlers::widget_page))
        .route("/api/session/{website_id}", web::post().to(handlers::session_start))
        .route("/api/snippet/{website_id}", web::get().to(handlers::snippet))
        .route("/health", web::get().to(handlers::health_check));
}
