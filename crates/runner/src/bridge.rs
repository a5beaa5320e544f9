//! JSON-lines client for the world bridge.
//!
//! Control connection: one request line `{"op": "...", ...}` answered by one response line
//! `{"ok": true, ...}` or `{"ok": false, "error": "..."}`. Event connection: a stream of
//! `WorldEvent` lines.

use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{tcp::OwnedReadHalf, tcp::OwnedWriteHalf, TcpStream};
use tokio::sync::{mpsc, Mutex};

use altes_bot_core::agent::game_api::ApiFuture;
use altes_bot_core::agent::{ChatSink, ControlInput, GameApi, SessionControl};
use altes_bot_core::world::{
    BlockInfo, BlockQuery, EntityId, EntityInfo, EquipSlot, ItemStack, NavGoal, PlayerInfo,
    Telemetry, Vec3, WorldEvent,
};

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ControlConn {
    async fn open(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect control port {addr}"))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
        })
    }

    async fn roundtrip(&mut self, line: &str) -> anyhow::Result<Value> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("control write")?;
        self.writer.flush().await.context("control flush")?;

        let mut resp_line = String::new();
        let n = self
            .reader
            .read_line(&mut resp_line)
            .await
            .context("control read")?;
        if n == 0 {
            anyhow::bail!("control connection closed");
        }
        serde_json::from_str(resp_line.trim()).context("invalid control json response")
    }
}

/// Gateway, chat sink and session control backed by the bridge's control port.
pub struct RemoteGameApi {
    addr: String,
    conn: Mutex<Option<ControlConn>>,
}

/// Builds `{"op": op, ..args}`.
pub fn op_request(op: &str, args: Value) -> Value {
    let mut req = json!({ "op": op });
    if let (Some(obj), Value::Object(extra)) = (req.as_object_mut(), args) {
        obj.extend(extra);
    }
    req
}

fn check_ok(op: &str, resp: &Value) -> anyhow::Result<()> {
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(());
    }
    let reason = resp
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| resp.to_string());
    anyhow::bail!("{op}: {reason}")
}

/// Decodes `field` out of a successful response. A missing or null field decodes as JSON null,
/// so `Option<T>` fields come back as `None`.
pub fn decode_field<T: DeserializeOwned>(op: &str, resp: &Value, field: &str) -> anyhow::Result<T> {
    check_ok(op, resp)?;
    let value = resp.get(field).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).with_context(|| format!("decode {field} in {op} response"))
}

impl RemoteGameApi {
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let conn = ControlConn::open(addr).await?;
        Ok(Self {
            addr: addr.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    async fn request_json(&self, req: Value) -> anyhow::Result<Value> {
        let line = format!("{req}\n");
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(ControlConn::open(&self.addr).await?);
        }
        let Some(conn) = guard.as_mut() else {
            anyhow::bail!("control connection unavailable");
        };
        match conn.roundtrip(&line).await {
            Ok(v) => Ok(v),
            Err(err) => {
                // Reopen on the next call.
                *guard = None;
                Err(err)
            }
        }
    }

    async fn call(&self, op: &str, args: Value) -> anyhow::Result<Value> {
        tracing::trace!(op, "bridge.call");
        let resp = self.request_json(op_request(op, args)).await?;
        check_ok(op, &resp)?;
        Ok(resp)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        op: &str,
        args: Value,
        field: &str,
    ) -> anyhow::Result<T> {
        let resp = self.request_json(op_request(op, args)).await?;
        decode_field(op, &resp, field)
    }
}

impl GameApi for RemoteGameApi {
    fn telemetry(&self) -> ApiFuture<'_, Telemetry> {
        Box::pin(async move { self.query("telemetry", json!({}), "telemetry").await })
    }

    fn entities(&self) -> ApiFuture<'_, Vec<EntityInfo>> {
        Box::pin(async move { self.query("entities", json!({}), "entities").await })
    }

    fn entity(&self, id: EntityId) -> ApiFuture<'_, Option<EntityInfo>> {
        Box::pin(async move { self.query("entity", json!({ "id": id }), "entity").await })
    }

    fn players(&self) -> ApiFuture<'_, Vec<PlayerInfo>> {
        Box::pin(async move { self.query("players", json!({}), "players").await })
    }

    fn find_block(&self, query: BlockQuery) -> ApiFuture<'_, Option<BlockInfo>> {
        Box::pin(async move {
            self.query("find_block", json!({ "query": query }), "block")
                .await
        })
    }

    fn inventory(&self) -> ApiFuture<'_, Vec<ItemStack>> {
        Box::pin(async move { self.query("inventory", json!({}), "items").await })
    }

    fn set_goal(&self, goal: NavGoal) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("set_goal", json!({ "goal": goal })).await?;
            Ok(())
        })
    }

    fn cancel_goal(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("cancel_goal", json!({})).await?;
            Ok(())
        })
    }

    fn look_at(&self, point: Vec3) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("look_at", json!({ "point": point })).await?;
            Ok(())
        })
    }

    fn attack(&self, entity: EntityId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("attack", json!({ "entity": entity })).await?;
            Ok(())
        })
    }

    fn dig(&self, block: Vec3) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("dig", json!({ "position": block })).await?;
            Ok(())
        })
    }

    fn equip(&self, item: String, slot: EquipSlot) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("equip", json!({ "item": item, "slot": slot }))
                .await?;
            Ok(())
        })
    }

    fn consume(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("consume", json!({})).await?;
            Ok(())
        })
    }

    fn toss(&self, item: String, count: u32) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("toss", json!({ "item": item, "count": count }))
                .await?;
            Ok(())
        })
    }

    fn sleep_in(&self, bed: Vec3) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("sleep", json!({ "bed": bed })).await?;
            Ok(())
        })
    }
}

impl ChatSink for RemoteGameApi {
    fn say(&self, text: String) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("chat", json!({ "text": text })).await?;
            Ok(())
        })
    }
}

impl SessionControl for RemoteGameApi {
    fn reconnect(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.call("reconnect", json!({})).await?;
            Ok(())
        })
    }
}

/// Parses one event line. Blank lines yield `None`.
pub fn parse_event_line(line: &str) -> anyhow::Result<Option<WorldEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(line).context("invalid world event json")?;
    Ok(Some(event))
}

/// Streams world events into the controller until the receiver goes away. A dropped event
/// connection is reported as a session end and reopened after `retry`.
pub async fn pump_events(
    addr: String,
    tx: mpsc::Sender<ControlInput>,
    retry: Duration,
) -> anyhow::Result<()> {
    loop {
        let reason = match TcpStream::connect(&addr).await {
            Ok(stream) => {
                tracing::info!(addr = %addr, "bridge.events.connected");
                match read_events(stream, &tx).await {
                    Ok(()) => "event stream closed".to_string(),
                    Err(err) => format!("{err:#}"),
                }
            }
            Err(err) => {
                tracing::warn!(addr = %addr, error = %err, "bridge.events.connect_failed");
                tokio::time::sleep(retry).await;
                continue;
            }
        };
        if tx.is_closed() {
            return Ok(());
        }

        tracing::warn!(reason = %reason, "bridge.events.lost");
        let ended = ControlInput::World(WorldEvent::SessionEnded {
            reason: Some(reason),
        });
        if tx.send(ended).await.is_err() {
            return Ok(());
        }
        tokio::time::sleep(retry).await;
    }
}

async fn read_events(stream: TcpStream, tx: &mpsc::Sender<ControlInput>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await.context("event read")? {
        let event = match parse_event_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), line = %line, "bridge.events.bad_line");
                continue;
            }
        };
        if tx.send(ControlInput::World(event)).await.is_err() {
            break;
        }
    }
    Ok(())
}
