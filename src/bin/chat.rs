//! Terminal front end for the widget: same transcript state machine, talking
//! to a running relay.
//!
//! Usage: `chat <site-url>` with `RELAY_URL` (default
//! `http://127.0.0.1:8080/chat`) and optional `WEBSITE_ID`.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

use chatly::site::{record_session_start, LogUsageRecorder};
use chatly::widget::{ChatMessage, ChatSession, HttpRelayClient};

fn print_message(message: &ChatMessage) {
    let speaker = if message.is_from_assistant { "assistant" } else { "you" };
    match message.confidence {
        Some(confidence) => println!("{}: {} (confidence {:.1}%)", speaker, message.text, confidence * 100.0),
        None => println!("{}: {}", speaker, message.text),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let site_url = env::args()
        .nth(1)
        .or_else(|| env::var("WIDGET_SITE_URL").ok())
        .context("usage: chat <site-url>")?;
    let relay_url = env::var("RELAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8080/chat".to_string());
    let website_id = env::var("WEBSITE_ID").unwrap_or_else(|_| "local".to_string());

    let client = HttpRelayClient::new(relay_url)?;
    let mut session = ChatSession::new(site_url);
    let mut session_recorded = false;

    for message in session.messages() {
        print_message(message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        session.set_draft(line);
        let shown = session.messages().len();
        if !session.submit_draft(&client).await {
            continue;
        }
        if !session_recorded {
            record_session_start(Arc::new(LogUsageRecorder), &website_id);
            session_recorded = true;
        }
        for message in &session.messages()[shown + 1..] {
            print_message(message);
        }
        if let Some(error) = session.error() {
            eprintln!("error: {}", error);
        }
    }

    Ok(())
}
