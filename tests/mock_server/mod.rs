//! In-process Deriv server for integration tests.
//!
//! Speaks enough of the v3 protocol to exercise the SDK: it echoes `req_id`,
//! records every request, and streams ticks until they are forgotten.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

pub const VALID_TOKEN: &str = "a1-valid-token";
pub const INVALID_SYMBOL: &str = "R_999";

const TICK_INTERVAL: Duration = Duration::from_millis(20);
const BASE_EPOCH: i64 = 1_700_000_000;

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<Value>>,
    uris: Mutex<Vec<String>>,
    next_subscription: AtomicU64,
}

pub struct MockDerivServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    kick_tx: watch::Sender<u64>,
    task: tokio::task::JoinHandle<()>,
}

impl MockDerivServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let shared = Arc::new(Shared::default());
        let (kick_tx, kick_rx) = watch::channel(0u64);

        let accept_shared = shared.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    stream,
                    accept_shared.clone(),
                    kick_rx.clone(),
                ));
            }
        });

        Self {
            addr,
            shared,
            kick_tx,
            task,
        }
    }

    /// Endpoint without `app_id`
    pub fn endpoint(&self) -> String {
        format!("ws://{}/websockets/v3", self.addr)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.shared.requests.lock().unwrap().clone()
    }

    /// Recorded requests carrying `field`, e.g. `forget`
    pub fn requests_with(&self, field: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.get(field).is_some())
            .collect()
    }

    /// Request URIs seen during the handshake
    pub fn uris(&self) -> Vec<String> {
        self.shared.uris.lock().unwrap().clone()
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        self.kick_tx.send_modify(|n| *n += 1);
    }
}

impl Drop for MockDerivServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(stream: TcpStream, shared: Arc<Shared>, mut kick_rx: watch::Receiver<u64>) {
    let recorder = shared.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        recorder.uris.lock().unwrap().push(req.uri().to_string());
        Ok(resp)
    };

    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let _ = kick_rx.borrow_and_update();

    let mut conn = Connection {
        shared,
        out_tx,
        authorized: false,
        streams: Vec::new(),
        forgotten: Arc::new(Mutex::new(HashSet::new())),
    };

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let text: &str = text.as_ref();
                    if let Ok(request) = serde_json::from_str::<Value>(text) {
                        conn.handle(request);
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            Some(out) = out_rx.recv() => {
                if sink.send(Message::Text(out.to_string().into())).await.is_err() {
                    break;
                }
            }
            changed = kick_rx.changed() => {
                if changed.is_ok() {
                    let _ = sink.send(Message::Close(None)).await;
                }
                break;
            }
        }
    }

    // Stop tick tasks of this connection
    conn.forgotten.lock().unwrap().extend(conn.streams.iter().cloned());
}

struct Connection {
    shared: Arc<Shared>,
    out_tx: mpsc::UnboundedSender<Value>,
    authorized: bool,
    streams: Vec<String>,
    forgotten: Arc<Mutex<HashSet<String>>>,
}

impl Connection {
    fn handle(&mut self, request: Value) {
        self.shared.requests.lock().unwrap().push(request.clone());

        let reply = if request.get("ping").is_some() {
            envelope(&request, "ping", json!({ "ping": "pong" }))
        } else if request.get("time").is_some() {
            envelope(&request, "time", json!({ "time": BASE_EPOCH }))
        } else if let Some(token) = request.get("authorize").and_then(Value::as_str) {
            self.authorize(&request, token)
        } else if request.get("active_symbols").is_some() {
            envelope(&request, "active_symbols", active_symbols())
        } else if let Some(symbol) = request.get("contracts_for").and_then(Value::as_str) {
            contracts_for(&request, symbol)
        } else if request.get("proposal").is_some() {
            proposal(&request)
        } else if request.get("buy").is_some() {
            self.buy(&request)
        } else if request.get("ticks").is_some() {
            self.start_ticks(&request)
        } else if let Some(id) = request.get("forget").and_then(Value::as_str) {
            self.forget(&request, id)
        } else if request.get("forget_all").is_some() {
            self.forget_all(&request)
        } else {
            error(&request, "error", "UnrecognisedRequest", "Unrecognised request.")
        };

        let _ = self.out_tx.send(reply);
    }

    fn authorize(&mut self, request: &Value, token: &str) -> Value {
        if token != VALID_TOKEN {
            return error(request, "authorize", "InvalidToken", "The token is invalid.");
        }
        self.authorized = true;
        envelope(
            request,
            "authorize",
            json!({
                "authorize": {
                    "balance": 10000.0,
                    "currency": "USD",
                    "email": "trader@example.com",
                    "fullname": "Test Trader",
                    "is_virtual": 1,
                    "landing_company_name": "virtual",
                    "loginid": "VRTC1000001",
                    "scopes": ["read", "trade"]
                }
            }),
        )
    }

    fn buy(&self, request: &Value) -> Value {
        if !self.authorized {
            return error(
                request,
                "buy",
                "AuthorizationRequired",
                "Please log in.",
            );
        }
        let price = request.get("price").and_then(Value::as_f64).unwrap_or_default();
        envelope(
            request,
            "buy",
            json!({
                "buy": {
                    "balance_after": 10000.0 - price,
                    "buy_price": price,
                    "contract_id": 424242,
                    "longcode": "Win payout if Volatility 100 Index after 5 ticks is strictly higher than entry spot.",
                    "payout": 19.5,
                    "purchase_time": BASE_EPOCH,
                    "shortcode": "CALL_R_100_19.50_1700000000_5T_S0P_0",
                    "start_time": BASE_EPOCH,
                    "transaction_id": 848484
                }
            }),
        )
    }

    fn start_ticks(&mut self, request: &Value) -> Value {
        let symbol = request
            .get("ticks")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if symbol == INVALID_SYMBOL {
            return error(request, "tick", "InvalidSymbol", "Symbol R_999 is invalid.");
        }

        let id = format!(
            "sub-{}",
            self.shared.next_subscription.fetch_add(1, Ordering::SeqCst) + 1
        );
        self.streams.push(id.clone());

        let tx = self.out_tx.clone();
        let forgotten = self.forgotten.clone();
        let echo = request.clone();
        let stream_id = id.clone();
        let stream_symbol = symbol.clone();
        tokio::spawn(async move {
            for n in 1u32.. {
                tokio::time::sleep(TICK_INTERVAL).await;
                if forgotten.lock().unwrap().contains(&stream_id) {
                    break;
                }
                if tx.send(tick(&echo, &stream_symbol, &stream_id, n)).is_err() {
                    break;
                }
            }
        });

        tick(request, &symbol, &id, 0)
    }

    fn forget(&self, request: &Value, id: &str) -> Value {
        let removed = self.streams.iter().any(|s| s == id) && self.forgotten.lock().unwrap().insert(id.to_string());
        envelope(request, "forget", json!({ "forget": u8::from(removed) }))
    }

    fn forget_all(&self, request: &Value) -> Value {
        let mut forgotten = self.forgotten.lock().unwrap();
        let removed: Vec<String> = self
            .streams
            .iter()
            .filter(|id| forgotten.insert((*id).clone()))
            .cloned()
            .collect();
        envelope(request, "forget_all", json!({ "forget_all": removed }))
    }
}

fn envelope(request: &Value, msg_type: &str, body: Value) -> Value {
    let mut message = Map::new();
    message.insert("echo_req".into(), request.clone());
    message.insert("msg_type".into(), msg_type.into());
    if let Some(req_id) = request.get("req_id") {
        message.insert("req_id".into(), req_id.clone());
    }
    if let Value::Object(fields) = body {
        message.extend(fields);
    }
    Value::Object(message)
}

fn error(request: &Value, msg_type: &str, code: &str, text: &str) -> Value {
    envelope(
        request,
        msg_type,
        json!({ "error": { "code": code, "message": text } }),
    )
}

fn tick(request: &Value, symbol: &str, id: &str, n: u32) -> Value {
    envelope(
        request,
        "tick",
        json!({
            "subscription": { "id": id },
            "tick": {
                "ask": 1000.5 + f64::from(n),
                "bid": 999.5 + f64::from(n),
                "epoch": BASE_EPOCH + i64::from(n),
                "id": id,
                "pip_size": 2,
                "quote": 1000.0 + f64::from(n),
                "symbol": symbol
            }
        }),
    )
}

fn active_symbols() -> Value {
    json!({
        "active_symbols": [
            {
                "allow_forward_starting": 0,
                "display_name": "Volatility 100 Index",
                "display_order": 1,
                "exchange_is_open": 1,
                "is_trading_suspended": 0,
                "market": "synthetic_index",
                "market_display_name": "Derived",
                "pip": 0.01,
                "submarket": "random_index",
                "submarket_display_name": "Continuous Indices",
                "symbol": "R_100",
                "symbol_type": "stockindex"
            },
            {
                "allow_forward_starting": 1,
                "display_name": "EUR/USD",
                "display_order": 2,
                "exchange_is_open": 0,
                "is_trading_suspended": 0,
                "market": "forex",
                "market_display_name": "Forex",
                "pip": 0.00001,
                "submarket": "major_pairs",
                "submarket_display_name": "Major Pairs",
                "symbol": "frxEURUSD",
                "symbol_type": "forex"
            }
        ]
    })
}

fn contracts_for(request: &Value, symbol: &str) -> Value {
    if symbol == INVALID_SYMBOL {
        return error(
            request,
            "contracts_for",
            "InvalidSymbol",
            "The provided symbol is invalid.",
        );
    }
    let contract = |contract_type: &str, sentiment: &str| {
        json!({
            "barrier_category": "euro_atm",
            "barriers": 0,
            "contract_category": "callput",
            "contract_category_display": "Up/Down",
            "contract_display": "Higher",
            "contract_type": contract_type,
            "exchange_name": "RANDOM",
            "expiry_type": "tick",
            "market": "synthetic_index",
            "max_contract_duration": "10t",
            "min_contract_duration": "1t",
            "sentiment": sentiment,
            "start_type": "spot",
            "submarket": "random_index",
            "underlying_symbol": symbol
        })
    };
    envelope(
        request,
        "contracts_for",
        json!({
            "contracts_for": {
                "available": [contract("CALL", "up"), contract("PUT", "down")],
                "close": BASE_EPOCH + 86_399,
                "hit_count": 2,
                "open": BASE_EPOCH,
                "spot": 1000.0
            }
        }),
    )
}

fn proposal(request: &Value) -> Value {
    let amount = request.get("amount").and_then(Value::as_f64).unwrap_or_default();
    envelope(
        request,
        "proposal",
        json!({
            "proposal": {
                "ask_price": amount,
                "date_expiry": BASE_EPOCH + 10,
                "date_start": BASE_EPOCH,
                "display_value": format!("{:.2}", amount),
                "id": "prop-1",
                "longcode": "Win payout if Volatility 100 Index after 5 ticks is strictly higher than entry spot.",
                "payout": amount * 1.95,
                "spot": 1000.0,
                "spot_time": BASE_EPOCH
            }
        }),
    )
}
