use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rabscuttle_discord::types::MessagePayload;
use rabscuttle_discord::{DiscordClient, DiscordConfig, GatewayIntent, ReadyState};

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut ServerSocket) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client hung up")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn client_config(gateway_url: String, api_url: String) -> DiscordConfig {
    let mut config = DiscordConfig::new("Bot gateway-token");
    config.gateway_url = gateway_url;
    config.api_url = api_url;
    config.intents = vec![GatewayIntent::Guilds, GatewayIntent::GuildMessages];
    config.heartbeat_jitter_ms = 10;
    config
}

fn hello() -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": 45000}})
}

#[tokio::test]
async fn hello_leads_to_identify_then_heartbeat() {
    let (listener, url) = listen().await;
    let client = DiscordClient::new(client_config(url, "http://127.0.0.1:9".into())).unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, hello()).await;

        let identify = next_json(&mut ws).await;
        let beat = next_json(&mut ws).await;
        send_json(&mut ws, json!({"op": 11})).await;
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
        (identify, beat)
    });

    client.start().await.unwrap();
    let (identify, beat) = timeout(WAIT, server).await.unwrap().unwrap();

    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], "gateway-token");
    // guilds | guild messages | message content
    assert_eq!(identify["d"]["intents"], (1 << 0) | (1 << 9) | (1 << 15));
    assert_eq!(identify["d"]["properties"]["browser"], "rabscuttle");
    assert_eq!(beat, json!({"op": 1, "d": 0}));

    timeout(WAIT, client.closed()).await.unwrap();
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert_eq!(client.connection().handshake_state, "hello received");
}

#[tokio::test]
async fn ready_and_interactions_reach_subscribers() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interactions/int-1/tok-1/callback"))
        .and(body_json(json!({"type": 4, "data": {"content": "pong"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&api)
        .await;

    let (listener, url) = listen().await;
    let client = DiscordClient::new(client_config(url, api.uri())).unwrap();
    let mut ready = client.events().subscribe_ready();
    let mut commands = client.interactions().subscribe_commands();
    let mut messages = client.events().subscribe_message_create();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, hello()).await;
        let _identify = next_json(&mut ws).await;

        send_json(
            &mut ws,
            json!({
                "op": 0, "s": 1, "t": "READY",
                "d": {
                    "v": 10,
                    "user": {"id": "bot-1", "username": "rabscuttle", "bot": true},
                    "session_id": "sess-1",
                    "application": {"id": "app-1", "flags": 0},
                    "guilds": [{"id": "g-1", "unavailable": true}]
                }
            }),
        )
        .await;
        send_json(
            &mut ws,
            json!({
                "op": 0, "s": 2, "t": "MESSAGE_CREATE",
                "d": {"id": "m-1", "channel_id": "c-1", "content": "hi"}
            }),
        )
        .await;
        send_json(
            &mut ws,
            json!({
                "op": 0, "s": 3, "t": "INTERACTION_CREATE",
                "d": {
                    "id": "int-1",
                    "application_id": "app-1",
                    "type": 2,
                    "token": "tok-1",
                    "version": 1,
                    "data": {"id": "cmd-1", "name": "ping", "type": 1}
                }
            }),
        )
        .await;
        ws
    });

    client.start().await.unwrap();

    let ready = timeout(WAIT, ready.recv()).await.unwrap().unwrap();
    assert_eq!(ready.session_id, "sess-1");
    assert_eq!(ready.guilds.len(), 1);
    assert_eq!(client.application_id().as_deref(), Some("app-1"));

    let message = timeout(WAIT, messages.recv()).await.unwrap().unwrap();
    assert_eq!(message.content, "hi");

    let command = timeout(WAIT, commands.recv()).await.unwrap().unwrap();
    assert_eq!(command.name(), "ping");
    assert!(
        command
            .reply(&MessagePayload::text("pong"))
            .await
            .unwrap()
            .is_success()
    );

    let snapshot = client.connection();
    assert_eq!(snapshot.last_sequence, Some(3));
    assert_eq!(snapshot.last_event.as_deref(), Some("INTERACTION_CREATE"));
    assert_eq!(snapshot.session_id.as_deref(), Some("sess-1"));
    assert_eq!(snapshot.handshake_state, "identified & ready");

    client.close();
    let mut ws = timeout(WAIT, server).await.unwrap().unwrap();
    while let Some(Ok(msg)) = ws.next().await {
        if msg.is_close() {
            break;
        }
    }
    let _ = ws.flush().await;
    // The server ends the TCP connection once the closing handshake is done.
    drop(ws);
    timeout(WAIT, client.closed()).await.unwrap();
    assert_eq!(client.ready_state(), ReadyState::Closed);
}

#[tokio::test]
async fn close_sends_normal_closure() {
    let (listener, url) = listen().await;
    let client = DiscordClient::new(client_config(url, "http://127.0.0.1:9".into())).unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        loop {
            match timeout(WAIT, ws.next()).await.unwrap() {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| f.code),
                Some(Ok(_)) => {}
                other => panic!("unexpected end of stream: {other:?}"),
            }
        }
    });

    client.start().await.unwrap();
    assert_eq!(client.ready_state(), ReadyState::Open);
    client.close();

    let code = timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(code, Some(CloseCode::Normal));
    timeout(WAIT, client.closed()).await.unwrap();
    assert_eq!(client.ready_state(), ReadyState::Closed);
}

#[tokio::test]
async fn invalid_session_closes_the_socket() {
    let (listener, url) = listen().await;
    let client = DiscordClient::new(client_config(url, "http://127.0.0.1:9".into())).unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 9, "d": false})).await;
        loop {
            match timeout(WAIT, ws.next()).await.unwrap() {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| f.code),
                Some(Ok(_)) => {}
                other => panic!("unexpected end of stream: {other:?}"),
            }
        }
    });

    client.start().await.unwrap();
    let code = timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(code, Some(CloseCode::Normal));
    timeout(WAIT, client.closed()).await.unwrap();
}
