use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use tera::Context;
use log::{info, error};

use crate::embed::{self, CLOSE_CONTROL_ATTR};
use crate::relay::{self, RelayFailure};
use crate::site::{bound_url, record_session_start};
use crate::web::models::{RelayRequest, SnippetResponse, DEFAULT_CONFIDENCE};
use crate::web::AppState;
use crate::widget::{greeting, FALLBACK_REPLY};

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// CORS pre-flight; the body is never read
pub async fn preflight() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

// Chat relay endpoint. Body errors are turned into `RelayFailure` by the
// route's `relay::json_config`.
pub async fn chat(
    data: web::Data<AppState>,
    request: web::Json<RelayRequest>,
) -> Result<HttpResponse, RelayFailure> {
    let reply = relay::relay_turn(data.model.model.as_ref(), &data.relay, &request).await?;
    Ok(HttpResponse::Ok().json(reply))
}

// Embed loader script
pub async fn embed_script(data: web::Data<AppState>) -> impl Responder {
    let mut context = Context::new();
    context.insert("base_url", data.source.base_url());
    context.insert("widget_path", embed::WIDGET_PATH);
    context.insert("website_id_attr", embed::WEBSITE_ID_ATTR);
    context.insert("close_attr", CLOSE_CONTROL_ATTR);
    context.insert("container_class", embed::CONTAINER_CLASS);
    context.insert("container_style", embed::CONTAINER_STYLE);
    context.insert("toggle_style", embed::TOGGLE_STYLE);
    context.insert("frame_style", embed::FRAME_STYLE);

    render(&data, "widget.js", &context, "application/javascript")
}

// Widget page shown inside the iframe
pub async fn widget_page(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let website_id = path.into_inner();
    let site_url = bound_url(data.sites.as_ref(), &website_id).await;

    let mut context = Context::new();
    context.insert("website_id", &website_id);
    context.insert("close_attr", CLOSE_CONTROL_ATTR);
    match &site_url {
        Some(url) => {
            info!("Serving widget for website {} bound to {}", website_id, url);
            context.insert("session_path", &format!("/api/session/{}", website_id));
            context.insert("site_url", url);
            context.insert("greeting", &greeting(url));
            context.insert("fallback_reply", FALLBACK_REPLY);
            context.insert("default_confidence", &DEFAULT_CONFIDENCE);
        }
        None => info!("No site configured for website {}", website_id),
    }

    render(&data, "widget.html", &context, "text/html")
}

// Sent by the widget page on its first accepted turn. Loading the page alone
// (the loader preloads the hidden iframe) is not a session.
pub async fn session_start(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let website_id = path.into_inner();
    if bound_url(data.sites.as_ref(), &website_id).await.is_none() {
        return HttpResponse::NotFound().json(json!({ "error": "No site configured" }));
    }
    record_session_start(data.usage.clone(), &website_id);
    HttpResponse::Accepted().finish()
}

// Paste-able embed snippet for a site
pub async fn snippet(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let website_id = path.into_inner();
    HttpResponse::Ok().json(SnippetResponse {
        snippet: data.source.snippet(&website_id),
        website_id,
    })
}

fn render(data: &AppState, template: &str, context: &Context, content_type: &str) -> HttpResponse {
    match data.tera.render(template, context) {
        Ok(body) => HttpResponse::Ok().content_type(content_type).body(body),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}
