use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tavern_collab::{CollabConnection, CollabEvent, ConnectionId, Identity};

use crate::{
    auth::Session,
    protocol::{ClientEvent, RawRequest},
    serialized::{
        Ack, ServerFrame, Success, ToSerialized, UserList, VoiceUserList,
    },
    ServerContext, ServerError, ServerResult,
};

type Outgoing = SplitSink<WebSocket, Message>;

/// Upgrades an authenticated request into a gateway connection
async fn gateway(session: Session, State(context): State<ServerContext>, ws: WebSocketUpgrade) -> Response {
    let identity = session.into_identity();
    ws.on_upgrade(move |socket| handle_socket(socket, context, identity))
}

async fn handle_socket(socket: WebSocket, context: ServerContext, identity: Identity) {
    let CollabConnection {
        id,
        identity,
        mut events,
    } = context.collab.connect(identity);

    info!("Gateway connection {} opened for {}", id, identity.username);

    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };

                let superseded = event == CollabEvent::SessionSuperseded;
                let frame = ServerFrame::Event(event.to_serialized());

                if send_frame(&mut outgoing, &frame).await.is_err() {
                    break;
                }

                if superseded {
                    outgoing.send(Message::Close(None)).await.ok();
                    break;
                }
            }
            message = incoming.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let Some(ack) = handle_text(&context, &identity, id, &text).await else {
                            continue;
                        };

                        if send_frame(&mut outgoing, &ServerFrame::Ack(ack)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!("Gateway connection {} errored: {}", id, err);
                        break;
                    }
                }
            }
        }
    }

    context.collab.disconnect(identity.id, Some(id));
    info!("Gateway connection {} closed", id);
}

/// Handles one request. Returns the acknowledgement to send back, if the request asked for one.
///
/// Requests from a connection that has since been superseded are refused.
async fn handle_text(
    context: &ServerContext,
    identity: &Identity,
    connection_id: ConnectionId,
    text: &str,
) -> Option<Ack> {
    let request = match RawRequest::parse(text) {
        Ok(request) => request,
        Err(err) => {
            warn!("Dropped message from {}: {}", identity.username, err);
            return None;
        }
    };

    let result = if !context.collab.is_current(identity.id, connection_id) {
        Err(ServerError::Superseded)
    } else {
        match ClientEvent::parse(&request.event, request.data) {
            Ok(event) => dispatch(context, identity, event).await,
            Err(err) => Err(err),
        }
    };

    match (request.id, result) {
        (Some(id), Ok(data)) => Some(Ack::ok(id, data)),
        (Some(id), Err(err)) => Some(Ack::error(id, err.to_string())),
        (None, Ok(_)) => None,
        (None, Err(err)) => {
            warn!("{} from {} failed: {}", request.event, identity.username, err);
            None
        }
    }
}

async fn dispatch(
    context: &ServerContext,
    identity: &Identity,
    event: ClientEvent,
) -> ServerResult<Value> {
    let collab = &context.collab;
    let user_id = identity.id;

    match event {
        ClientEvent::JoinRoom(body) => {
            let joined = collab.join_room(user_id, body.room_id)?;
            ack_data(joined.to_serialized())
        }
        ClientEvent::LeaveRoom => {
            collab.leave_room(user_id);
            ack_data(Success::new())
        }
        ClientEvent::RoomUsers(body) => ack_data(UserList::new(&collab.room_users(body.room_id))),
        ClientEvent::OnlineUsers => ack_data(UserList::new(&collab.online_users())),
        ClientEvent::VoiceJoin(body) => {
            let existing = collab.voice_join(user_id, body.room_id)?;
            ack_data(VoiceUserList::new(&existing))
        }
        ClientEvent::VoiceLeave(body) => {
            collab.voice_leave(user_id, body.room_id);
            ack_data(Success::new())
        }
        ClientEvent::VoiceSignal(kind, body) => {
            collab.relay_signal(user_id, body.target_user_id, kind, body.payload)?;
            ack_data(Success::new())
        }
        ClientEvent::VoiceStateUpdate(body) => {
            collab.voice_set_muted(user_id, body.room_id, body.is_muted)?;
            ack_data(Success::new())
        }
        ClientEvent::VoiceSpeaking(body) => {
            collab.voice_set_speaking(user_id, body.room_id, body.is_speaking)?;
            ack_data(Success::new())
        }
        ClientEvent::MusicPlay(body) => {
            let update = collab.music_play(user_id, body.target()).await?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicPause(body) => {
            let update = collab.music_pause(user_id, body.target()).await?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicSkip(body) => {
            let update = collab.music_skip(user_id, body.target()).await?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicAdd(body) => {
            let added = collab
                .music_add(user_id, body.scope.target(), &body.source_url)
                .await?;
            ack_data(added.to_serialized())
        }
        ClientEvent::MusicRemove(body) => {
            let update = collab.music_remove(user_id, body.scope.target(), body.track_id())?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicSeek(body) => {
            let update = collab
                .music_seek(user_id, body.scope.target(), body.seconds)
                .await?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicVolume(body) => {
            let update = collab
                .music_volume(user_id, body.scope.target(), body.volume)
                .await?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicGetState(body) => {
            let update = collab.music_get_state(user_id, body.room_id).await?;
            ack_data(update.to_serialized())
        }
        ClientEvent::MusicSync(body) => {
            let report = collab.music_sync(user_id, body.target())?;
            ack_data(report.to_serialized())
        }
        ClientEvent::ChatMessage(body) => {
            let message = collab.send_chat(user_id, body.content)?;
            ack_data(message.to_serialized())
        }
        ClientEvent::DirectMessage(body) => {
            let message = collab.send_direct_message(user_id, body.to_user_id, body.content)?;
            ack_data(message.to_serialized())
        }
    }
}

fn ack_data(data: impl Serialize) -> ServerResult<Value> {
    serde_json::to_value(data).map_err(|e| ServerError::Unknown(e.to_string()))
}

async fn send_frame(outgoing: &mut Outgoing, frame: &ServerFrame) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(err) => {
            // Not worth dropping the connection over
            error!("Failed to serialize frame: {}", err);
            return Ok(());
        }
    };

    outgoing.send(Message::Text(text)).await
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/gateway", get(gateway))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;
    use tavern_collab::{Collab, DefaultInputs, Role, StaticAuthenticator};
    use tavern_core::{Config, ManualClock};

    use super::*;

    fn context() -> ServerContext {
        let collab = Collab::new(
            Config::default(),
            ManualClock::starting_now(),
            Arc::new(DefaultInputs),
        );

        ServerContext {
            collab: Arc::new(collab),
            auth: Arc::new(StaticAuthenticator::default()),
        }
    }

    fn user(id: i32, role: Role) -> Identity {
        Identity {
            id,
            username: format!("user{}", id),
            role,
        }
    }

    #[tokio::test]
    async fn acknowledges_requests_with_ids() {
        let context = context();
        let a = user(1, Role::Participant);
        let conn = context.collab.connect(a.clone());

        let ack = handle_text(&context, &a, conn.id, r#"{"id": 1, "event": "join_room", "data": {"roomId": 100}}"#).await;
        let value = ack.and_then(|a| serde_json::to_value(ServerFrame::Ack(a)).ok());

        assert_eq!(
            value,
            Some(json!({
                "type": "ack",
                "id": 1,
                "ok": true,
                "data": {
                    "success": true,
                    "users": [{"id": 1, "username": "user1", "role": "participant"}]
                }
            }))
        );

        let ack = handle_text(&context, &a, conn.id, r#"{"event": "leave_room"}"#).await;
        assert!(ack.is_none());
        assert_eq!(context.collab.room_of(1), None);
    }

    #[tokio::test]
    async fn errors_become_failed_acks() {
        let context = context();
        let a = user(1, Role::Participant);
        let conn = context.collab.connect(a.clone());

        let ack = handle_text(&context, &a, conn.id, r#"{"id": 2, "event": "music_play"}"#).await;
        let value = ack.and_then(|a| serde_json::to_value(ServerFrame::Ack(a)).ok());

        assert_eq!(
            value,
            Some(json!({
                "type": "ack",
                "id": 2,
                "ok": false,
                "error": "Only the director can control music"
            }))
        );

        let ack = handle_text(&context, &a, conn.id, r#"{"id": 3, "event": "voice_join", "data": {"roomId": 9}}"#).await;
        let value = ack.and_then(|a| serde_json::to_value(ServerFrame::Ack(a)).ok());
        assert_eq!(
            value.map(|v| v["error"].clone()),
            Some(json!("Must be in the room to join its voice channel"))
        );

        let ack = handle_text(&context, &a, conn.id, r#"{"id": 4, "event": "dance"}"#).await;
        assert!(ack.is_some_and(|a| serde_json::to_value(ServerFrame::Ack(a))
            .is_ok_and(|v| v["ok"] == json!(false))));
    }

    #[tokio::test]
    async fn superseded_connections_are_refused() {
        let context = context();
        let a = user(1, Role::Participant);
        let old = context.collab.connect(a.clone());
        let new = context.collab.connect(a.clone());

        let ack = handle_text(&context, &a, old.id, r#"{"id": 6, "event": "join_room", "data": {"roomId": 100}}"#).await;
        let value = ack.and_then(|a| serde_json::to_value(ServerFrame::Ack(a)).ok());

        assert_eq!(
            value.map(|v| v["error"].clone()),
            Some(json!("This connection was replaced by a newer one"))
        );
        assert_eq!(context.collab.room_of(1), None);

        let ack = handle_text(&context, &a, new.id, r#"{"id": 7, "event": "join_room", "data": {"roomId": 100}}"#).await;
        assert!(ack.is_some_and(|a| serde_json::to_value(ServerFrame::Ack(a))
            .is_ok_and(|v| v["ok"] == json!(true))));
        assert_eq!(context.collab.room_of(1), Some(100));
    }

    #[tokio::test]
    async fn music_sync_reports_the_global_scope() {
        let context = context();
        let a = user(1, Role::Participant);
        let conn = context.collab.connect(a.clone());

        let ack = handle_text(&context, &a, conn.id, r#"{"id": 5, "event": "music_sync"}"#).await;
        let value = ack.and_then(|a| serde_json::to_value(ServerFrame::Ack(a)).ok());

        assert_eq!(
            value.map(|v| v["data"].clone()),
            Some(json!({
                "scope": "global",
                "roomId": null,
                "isPlaying": false,
                "startedAt": null,
                "pausedAt": null,
                "currentPosition": 0.0,
                "tolerance": 3.0
            }))
        );
    }
}
