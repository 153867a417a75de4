use std::path::PathBuf;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use raidsim_bot::protocol;
use raidsim_bot::session::Session;
use raidsim_bot::types::Outbound;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};

#[derive(Debug, Deserialize)]
struct WsQuery {
    name: Option<String>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(6565);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler));

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!("[botd] static file root: {}", static_dir.to_string_lossy());
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[botd] static file root not found, serving API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[botd] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    let candidates = [PathBuf::from("public"), PathBuf::from("../public")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ws_handler(ws: WebSocketUpgrade, Query(query): Query<WsQuery>) -> impl IntoResponse {
    let name = query.name.unwrap_or_else(random_actor_name);
    ws.on_upgrade(move |socket| run_session(socket, name))
}

/// One socket hosts one actor: the relay streams the simulation's event
/// feed down to us and carries our emissions back up. Each session gets a
/// private registry and clock; nothing is shared across sockets.
async fn run_session(socket: WebSocket, name: String) {
    println!(
        "[botd] {} actor {name} connected",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(256);

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let payload = protocol::encode_outbound(&outbound);
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(&name, tx);
    while let Some(Ok(message)) = ws_receiver.next().await {
        let Message::Text(raw) = message else {
            continue;
        };
        let Some(event) = protocol::parse_server_message(&raw) else {
            continue;
        };
        if !session.apply(event).await {
            break;
        }
    }

    session.shutdown();
    writer.abort();
    println!(
        "[botd] {} actor {name} disconnected",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
}

fn random_actor_name() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("bot-{}", suffix.to_lowercase())
}
