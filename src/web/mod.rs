pub mod handlers;
pub mod models;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::middleware::DefaultHeaders;
use tera::{Tera, Value};

use crate::embed::WidgetSource;
use crate::model::ModelManager;
use crate::relay::RelayConfig;
use crate::site::{SiteDirectory, UsageRecorder};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

// App state structure
pub struct AppState {
    pub tera: Tera,
    pub model: ModelManager,
    pub relay: RelayConfig,
    pub source: WidgetSource,
    pub sites: Arc<dyn SiteDirectory>,
    pub usage: Arc<dyn UsageRecorder>,
}

/// CORS headers stamped on every response, pre-flight included.
pub fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", ALLOW_ORIGIN))
        .add(("Access-Control-Allow-Headers", ALLOW_HEADERS))
}

pub fn load_templates(dir: &str) -> Result<Tera, tera::Error> {
    let mut tera = Tera::new(&format!("{}/**/*", dir.trim_end_matches('/')))?;
    tera.autoescape_on(vec![".html"]);
    tera.register_filter("script_json", script_json);
    Ok(tera)
}

/// JSON literal that is safe to drop inside an inline `<script>`: markup
/// characters are written as unicode escapes so `</script>` cannot appear.
pub fn script_json(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let encoded = serde_json::to_string(value).map_err(|e| tera::Error::msg(e.to_string()))?;
    Ok(Value::String(
        encoded
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn script_json_cannot_close_the_script_block() {
        let out = script_json(&json!("https://x.test/</script><b>&"), &HashMap::new()).unwrap();
        let text = out.as_str().unwrap();
        assert!(!text.contains('<') && !text.contains('>'));
        assert_eq!(serde_json::from_str::<String>(text).unwrap(), "https://x.test/</script><b>&");
    }
}
