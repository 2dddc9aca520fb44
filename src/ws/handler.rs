//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::simulation::{SimulationError, StartRequest};
use crate::util::rate_limit::ClientRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::subscriptions::ClientId;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let client_id = Uuid::new_v4();
    debug!(client_id = %client_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, client_id: ClientId, state: AppState) {
    info!(client_id = %client_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let outbound_rx = state.broadcaster.connect(client_id);

    run_session(client_id, &state, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    state.broadcaster.disconnect(client_id);

    info!(client_id = %client_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    client_id: ClientId,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    let rate_limiter = ClientRateLimiter::new();

    // Spawn writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(client_id = %client_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> dispatch
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(client_id = %client_id, "Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let reply = dispatch(state, client_id, msg).await;
                        state.broadcaster.send_to(client_id, reply);
                    }
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "Failed to parse client message");
                        state.broadcaster.send_to(
                            client_id,
                            ServerMsg::Error {
                                code: "invalid_message".to_string(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(client_id = %client_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(client_id = %client_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Apply one inbound request and build its acknowledgement
pub async fn dispatch(state: &AppState, client_id: ClientId, msg: ClientMsg) -> ServerMsg {
    let action = msg.action();
    match msg {
        ClientMsg::SubscribeToMatch { match_id } => {
            state.subscriptions.subscribe(client_id, match_id);
            let live = state.simulations.is_active(match_id);
            info!(client_id = %client_id, match_id, live, "Client subscribed to match");
            let message = if live {
                format!("Subscribed to match {}", match_id)
            } else {
                format!("Subscribed to match {} (not running yet)", match_id)
            };
            ServerMsg::response(action, true, message)
        }
        ClientMsg::UnsubscribeFromMatch { match_id } => {
            state.subscriptions.unsubscribe(client_id, match_id);
            info!(client_id = %client_id, match_id, "Client unsubscribed from match");
            ServerMsg::response(action, true, format!("Unsubscribed from match {}", match_id))
        }
        ClientMsg::StartMatch {
            match_id,
            home_team,
            away_team,
        } => {
            let request = StartRequest {
                match_id,
                home_team,
                away_team,
            };
            match state.simulations.start(request).await {
                Ok(_) => ServerMsg::response(action, true, format!("Match {} started", match_id)),
                Err(e @ SimulationError::AlreadyRunning(_)) => {
                    warn!(client_id = %client_id, match_id, "Rejected duplicate match start");
                    ServerMsg::response(action, false, e.to_string())
                }
                Err(e) => {
                    error!(client_id = %client_id, match_id, error = %e, "Failed to start match");
                    ServerMsg::response(action, false, e.to_string())
                }
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ws::protocol::{Player, Position, TeamInfo};

    fn start_msg(match_id: i64) -> ClientMsg {
        ClientMsg::StartMatch {
            match_id,
            home_team: TeamInfo {
                id: 1,
                name: "Home".to_string(),
                roster: Some(vec![Player {
                    id: 10,
                    name: "Striker".to_string(),
                    position: Position::Forward,
                    jersey_number: None,
                }]),
            },
            away_team: TeamInfo {
                id: 2,
                name: "Away".to_string(),
                roster: None,
            },
        }
    }

    fn success(msg: &ServerMsg) -> bool {
        match msg {
            ServerMsg::Response { success, .. } => *success,
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_receives_kickoff_and_duplicate_start_fails() {
        let state = AppState::new(Config::for_tests());
        let client = Uuid::new_v4();
        let mut rx = state.broadcaster.connect(client);

        match dispatch(&state, client, ClientMsg::SubscribeToMatch { match_id: 42 }).await {
            ServerMsg::Response { success, message, .. } => {
                assert!(success);
                assert!(message.contains("not running yet"));
            }
            other => panic!("expected response, got {:?}", other),
        }
        assert!(success(&dispatch(&state, client, start_msg(42)).await));
        assert!(!success(&dispatch(&state, client, start_msg(42)).await));

        match rx.recv().await {
            Some(ServerMsg::MatchEvent { event }) => assert_eq!(event.match_id, 42),
            other => panic!("expected kickoff, got {:?}", other),
        }

        assert!(success(&dispatch(&state, client, ClientMsg::UnsubscribeFromMatch { match_id: 42 }).await));
        assert!(state.subscriptions.subscribers(42).is_empty());
        state.simulations.shutdown().await;
    }
}
