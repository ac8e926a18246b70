// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines transport: one call object per input line, one reply object per
// output line.
//
// Calls run concurrently, so a call parked on the provider does not hold up
// the ones behind it. Replies are written in completion order and echo the
// caller's optional `id`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use visit_sdk_bridge::MethodChannel;
use visit_sdk_core::error::Result;
use visit_sdk_core::types::{MethodCall, MethodResponse};

/// Error code for input lines that are not a call object.
pub const MALFORMED_CALL: &str = "MALFORMED_CALL";

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    #[serde(flatten)]
    call: MethodCall,
}

#[derive(Debug, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(flatten)]
    pub response: MethodResponse,
}

/// Totals for one [`serve`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub received: usize,
    pub answered: usize,
    pub unanswered: usize,
}

/// Serve `reader` until end of input, then wait up to `grace` for calls still
/// in flight. Calls that are still waiting after that are dropped unanswered.
pub async fn serve<R, W>(
    channel: MethodChannel,
    reader: R,
    mut writer: W,
    grace: Duration,
) -> Result<ServeStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();
    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();
    let mut stats = ServeStats::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                stats.received += 1;
                match serde_json::from_str::<Request>(&line) {
                    Ok(request) => {
                        let channel = channel.clone();
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            let reply = answer(&channel, request).await;
                            let _ = tx.send(reply);
                        });
                    }
                    Err(err) => {
                        debug!(error = %err, "malformed input line");
                        let reply = Reply {
                            id: None,
                            method: String::new(),
                            response: MethodResponse::error(MALFORMED_CALL, err.to_string()),
                        };
                        write_reply(&mut writer, &reply).await?;
                        stats.answered += 1;
                    }
                }
            }
            Some(reply) = rx.recv() => {
                write_reply(&mut writer, &reply).await?;
                stats.answered += 1;
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    drop(tx);
    let drained = tokio::time::timeout(grace, async {
        while let Some(reply) = rx.recv().await {
            write_reply(&mut writer, &reply).await?;
            stats.answered += 1;
        }
        Ok::<_, visit_sdk_core::error::BridgeError>(())
    })
    .await;
    match drained {
        Ok(result) => result?,
        Err(_) => {
            stats.unanswered = stats.received - stats.answered;
            warn!(unanswered = stats.unanswered, "input closed with calls still waiting");
            in_flight.abort_all();
        }
    }

    writer.flush().await?;
    Ok(stats)
}

async fn answer(channel: &MethodChannel, request: Request) -> Reply {
    let method = request.call.method.clone();
    let response = match channel.invoke(request.call).await {
        Ok(response) => response,
        Err(err) => {
            debug!(%method, error = %err, "call ended without a provider reply");
            MethodResponse::from_error(&err)
        }
    };
    Reply {
        id: request.id,
        method,
        response,
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> Result<()> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use visit_sdk_bridge::VisitSdkPlugin;
    use visit_sdk_bridge::simulated::{SimulatedPlatform, UserResponse};
    use visit_sdk_bridge::traits::DeviceInfo;
    use visit_sdk_core::config::BridgeConfig;
    use visit_sdk_core::types::ConnectionState;

    struct Pixel;

    impl DeviceInfo for Pixel {
        fn os_release(&self) -> Result<String> {
            Ok("15".into())
        }

        fn battery_level(&self) -> Result<i32> {
            Ok(64)
        }
    }

    async fn run(state: ConnectionState, input: &str) -> (Vec<Value>, ServeStats) {
        let platform = SimulatedPlatform::new(state);
        platform.surface.set_response(UserResponse::GrantAll);
        let mut plugin =
            VisitSdkPlugin::attach_to_engine(BridgeConfig::default(), Arc::new(Pixel), platform.factory());
        plugin
            .on_attached_to_surface(Some(platform.surface_handle()))
            .unwrap();

        let mut output = Vec::new();
        let stats = serve(
            plugin.channel().clone(),
            tokio::io::BufReader::new(input.as_bytes()),
            &mut output,
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        plugin.detach_from_engine().await;

        let replies = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (replies, stats)
    }

    fn by_id(replies: &[Value], id: i64) -> &Value {
        replies
            .iter()
            .find(|r| r["id"] == serde_json::json!(id))
            .unwrap_or_else(|| panic!("no reply with id {id}"))
    }

    #[tokio::test]
    async fn answers_each_line() {
        let input = concat!(
            r#"{"id":1,"method":"getPlatformVersion"}"#,
            "\n",
            r#"{"id":2,"method":"getBatteryLevel"}"#,
            "\n\n",
            r#"{"id":3,"method":"getStepCount"}"#,
            "\n",
        );
        let (replies, stats) = run(ConnectionState::Connected, input).await;
        assert_eq!(stats, ServeStats { received: 3, answered: 3, unanswered: 0 });

        let version = by_id(&replies, 1);
        assert_eq!(version["status"], "success");
        assert_eq!(version["value"], "Android 15");
        assert_eq!(version["method"], "getPlatformVersion");

        assert_eq!(by_id(&replies, 2)["value"], 64);
        assert_eq!(by_id(&replies, 3)["status"], "not_implemented");
    }

    #[tokio::test]
    async fn malformed_line_gets_error_reply() {
        let input = "this is not json\n{\"id\":7,\"method\":\"getHealthConnectStatus\"}\n";
        let (replies, stats) = run(ConnectionState::Installed, input).await;
        assert_eq!(stats.answered, 2);

        let malformed = replies.iter().find(|r| r.get("id").is_none()).unwrap();
        assert_eq!(malformed["status"], "error");
        assert_eq!(malformed["code"], MALFORMED_CALL);
        assert_eq!(by_id(&replies, 7)["value"], "INSTALLED");
    }

    #[tokio::test]
    async fn permission_flow_over_lines() {
        let input = concat!(
            r#"{"id":1,"method":"askForFitnessPermission"}"#,
            "\n",
        );
        let (replies, _) = run(ConnectionState::Installed, input).await;
        assert_eq!(by_id(&replies, 1)["value"], "GRANTED");
    }

    #[tokio::test]
    async fn parked_call_does_not_block_others() {
        let input = concat!(
            r#"{"id":1,"method":"requestDailyFitnessData"}"#,
            "\n",
            r#"{"id":2,"method":"getPlatformVersion"}"#,
            "\n",
        );
        let (replies, stats) = run(ConnectionState::Installed, input).await;

        // Daily data never answers while disconnected.
        assert_eq!(by_id(&replies, 2)["value"], "Android 15");
        assert!(replies.iter().all(|r| r["id"] != serde_json::json!(1)));
        assert_eq!(stats, ServeStats { received: 2, answered: 1, unanswered: 1 });
    }
}
