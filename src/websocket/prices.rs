use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::{
    api::AppState,
    constants::MAX_BATCH_SYMBOLS,
    models::{PriceQuery, PriceRow, PriceSource},
    services::price_guard::normalize_symbol,
};

fn connected_payload() -> String {
    serde_json::json!({
        "type": "connected",
        "message": "Connected to price stream"
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct SubscribeMessage {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    tokens: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceUpdate {
    #[serde(rename = "type")]
    msg_type: &'static str,
    token: String,
    price: f64,
    source: PriceSource,
    /// Percent move since the previous push on this connection.
    change_pct: f64,
    timestamp: i64,
}

/// Applies a subscribe/unsubscribe frame; returns false for anything else.
fn apply_subscription(tokens: &mut Vec<String>, text: &str) -> bool {
    let Ok(msg) = serde_json::from_str::<SubscribeMessage>(text) else {
        return false;
    };

    match msg.msg_type.as_str() {
        "subscribe" => {
            for token in msg.tokens.iter().map(|t| normalize_symbol(t)) {
                if token.is_empty() || tokens.contains(&token) {
                    continue;
                }
                if tokens.len() >= MAX_BATCH_SYMBOLS {
                    tracing::warn!("Price stream subscription limit reached, ignoring {}", token);
                    continue;
                }
                tokens.push(token);
            }
            true
        }
        "unsubscribe" => {
            let removed: Vec<String> = msg.tokens.iter().map(|t| normalize_symbol(t)).collect();
            tokens.retain(|token| !removed.contains(token));
            true
        }
        _ => false,
    }
}

fn build_updates(rows: Vec<PriceRow>, previous: &mut HashMap<String, f64>) -> Vec<PriceUpdate> {
    rows.into_iter()
        .map(|row| {
            let change_pct = match previous.insert(row.symbol.clone(), row.price) {
                Some(prev) if prev > 0.0 => ((row.price - prev) / prev) * 100.0,
                _ => 0.0,
            };
            PriceUpdate {
                msg_type: "price_update",
                token: row.symbol,
                price: row.price,
                source: row.source,
                change_pct,
                timestamp: row.timestamp,
            }
        })
        .collect()
}

/// WebSocket handler for real-time price updates
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let subscribed_tokens: Arc<RwLock<Vec<String>>> = Arc::new(RwLock::new(Vec::new()));
    let subscribed_clone = subscribed_tokens.clone();

    if sender.send(Message::Text(connected_payload().into())).await.is_err() {
        return;
    }

    let interval = Duration::from_secs(state.config.price_stream_interval_secs.max(1));
    let prices = state.prices.clone();
    let mut send_task = tokio::spawn(async move {
        let mut previous = HashMap::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let queries: Vec<PriceQuery> = subscribed_clone
                .read()
                .await
                .iter()
                .map(|token| PriceQuery::new(token, None))
                .collect();
            if queries.is_empty() {
                continue;
            }

            let rows = prices.get_prices(&queries).await;
            for update in build_updates(rows, &mut previous) {
                let json = match serde_json::to_string(&update) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!("Failed to encode price update: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    return;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let mut tokens = subscribed_tokens.write().await;
                    if apply_subscription(&mut tokens, &text) {
                        tracing::info!("Price stream tokens: {:?}", tokens);
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Price stream client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!("Price WebSocket connection closed");
}
