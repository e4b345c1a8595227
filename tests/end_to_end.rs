//! End-to-end tests against a real server on a loopback port.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use chatwire::client::{Backoff, ConnectionStatus, RetryPolicy, Supervisor, SupervisorConfig};
use chatwire::config::RelayConfig;
use chatwire::server::{serve_on, AppState, BroadcastHub, HubConfig};
use chatwire::transport::WsConnector;
use chatwire::Message;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    hub: Arc<BroadcastHub>,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::start_on(listener).await
    }

    async fn start_on(listener: TcpListener) -> Self {
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(HubConfig::default(), RelayConfig::default());
        let hub = Arc::clone(&state.hub);
        let shutdown = CancellationToken::new();

        tokio::spawn(serve_on(listener, state, shutdown.clone().cancelled_owned()));

        Self {
            addr,
            hub,
            shutdown,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    async fn connect(&self, client_id: &str) -> WsStream {
        let (ws, _) = connect_async(self.url(&format!("/ws/{}?token=test_token", client_id)))
            .await
            .unwrap();
        ws
    }

    async fn wait_for_connections(&self, expected: usize) {
        for _ in 0..200 {
            if self.hub.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} connections", expected);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn next_message(ws: &mut WsStream) -> Message {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
            .expect("websocket error");
        if let WsMessage::Text(text) = frame {
            return Message::decode(text.as_bytes()).unwrap();
        }
    }
}

async fn send_chat(ws: &mut WsStream, sender: &str, text: &str) {
    ws.send(WsMessage::Text(Message::new(sender, text).to_json()))
        .await
        .unwrap();
}

fn fast_supervisor(url: String) -> SupervisorConfig {
    SupervisorConfig {
        retry: RetryPolicy {
            backoff: Backoff::Constant(Duration::from_millis(50)),
            ..Default::default()
        },
        ..SupervisorConfig::new(url)
    }
}

#[tokio::test]
async fn test_broadcast_and_private_reply() {
    let server = TestServer::start().await;
    let mut a = server.connect("A").await;
    let mut b = server.connect("B").await;
    server.wait_for_connections(2).await;

    send_chat(&mut a, "A", "hi").await;

    let first = next_message(&mut a).await;
    assert_eq!(first.text, "#A:hi");
    assert_eq!(first.sender, "System");

    let reply = next_message(&mut a).await;
    assert_eq!(reply.sender, "Bot");
    assert_eq!(reply.text, "reply: hi");

    let to_b = next_message(&mut b).await;
    assert_eq!(to_b.text, "#A:hi");

    // B must not see A's reply: the next thing B gets is its own traffic.
    send_chat(&mut b, "B", "yo").await;
    assert_eq!(next_message(&mut b).await.text, "#B:yo");
    assert_eq!(next_message(&mut b).await.text, "reply: yo");
}

#[tokio::test]
async fn test_departure_notice() {
    let server = TestServer::start().await;
    let mut a = server.connect("A").await;
    let mut b = server.connect("B").await;
    server.wait_for_connections(2).await;

    b.close(None).await.unwrap();

    let notice = next_message(&mut a).await;
    assert_eq!(notice.text, "#B left the chat");
    server.wait_for_connections(1).await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let server = TestServer::start().await;
    let mut a = server.connect("A").await;
    server.wait_for_connections(1).await;

    a.send(WsMessage::Text("not json".to_string())).await.unwrap();
    a.send(WsMessage::Text("[1, 2]".to_string())).await.unwrap();
    send_chat(&mut a, "A", "still here").await;

    assert_eq!(next_message(&mut a).await.text, "#A:still here");
    assert_eq!(next_message(&mut a).await.text, "reply: still here");
}

#[tokio::test]
async fn test_echo_relay() {
    let server = TestServer::start().await;
    let (mut ws, _) = connect_async(server.url("/relay/bob")).await.unwrap();

    send_chat(&mut ws, "bob", "one").await;
    send_chat(&mut ws, "bob", "two").await;

    assert_eq!(next_message(&mut ws).await.text, "reply: one");
    assert_eq!(next_message(&mut ws).await.text, "reply: two");
    assert_eq!(server.hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_supervised_client_round_trip() {
    let server = TestServer::start().await;
    let config = fast_supervisor(server.url("/ws/bob?token=test_token"));
    let (supervisor, mut client) = Supervisor::new(config, Arc::new(WsConnector));
    let worker = tokio::spawn(supervisor.run());

    client.asend(Message::new("bob", "hello")).await.unwrap();
    client.asend(Message::new("bob", "again")).await.unwrap();

    let mut texts = Vec::new();
    for _ in 0..4 {
        let message = timeout(Duration::from_secs(5), client.arecv())
            .await
            .unwrap()
            .unwrap();
        texts.push(message.text);
    }
    assert_eq!(texts, ["#bob:hello", "reply: hello", "#bob:again", "reply: again"]);
    assert_eq!(client.status(), ConnectionStatus::Online);

    client.stop();
    worker.await.unwrap().unwrap();
    assert_eq!(client.status(), ConnectionStatus::Offline);
}

#[tokio::test]
async fn test_supervised_client_buffers_until_server_starts() {
    // Reserve a port, then free it so the first attempts are refused.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let config = fast_supervisor(format!("ws://{}/ws/carol?token=test_token", addr));
    let (supervisor, mut client) = Supervisor::new(config, Arc::new(WsConnector));
    let worker = tokio::spawn(supervisor.run());

    client.asend(Message::new("carol", "early")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_ne!(client.status(), ConnectionStatus::Online);

    let _server = TestServer::start_on(TcpListener::bind(addr).await.unwrap()).await;

    let message = timeout(Duration::from_secs(5), client.arecv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.text, "#carol:early");

    client.stop();
    worker.await.unwrap().unwrap();
}
