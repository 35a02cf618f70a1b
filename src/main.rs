use std::sync::Arc;

use actix_files as fs;
use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};

use chatly::config::AppConfig;
use chatly::embed::WidgetSource;
use chatly::model::ModelManager;
use chatly::site::{LogUsageRecorder, StaticSiteDirectory};
use chatly::web::{self, routes, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting chat relay");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    let model = match ModelManager::new(&config.provider) {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to initialize chat provider client: {}", e);
            std::process::exit(1);
        }
    };

    let source = match WidgetSource::new(&config.public_base_url) {
        Ok(source) => source,
        Err(e) => {
            error!("Invalid PUBLIC_BASE_URL {}: {}", config.public_base_url, e);
            std::process::exit(1);
        }
    };

    let tera = match web::load_templates(&config.templates_dir) {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Widget served from {}", source.base_url());

    let app_state = Data::new(AppState {
        tera,
        model,
        relay: config.relay.clone(),
        source,
        sites: Arc::new(StaticSiteDirectory::new(config.sites.clone())),
        usage: Arc::new(LogUsageRecorder),
    });

    let static_dir = config.static_dir.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(web::cors_headers())
            .wrap(Logger::default())
            .configure(routes::configure)
            .service(fs::Files::new("/static", &static_dir))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
