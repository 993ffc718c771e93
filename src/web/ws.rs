//! WebSocket endpoint agents connect to.

use std::net::SocketAddr;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    response::IntoResponse,
};

use super::AppState;
use crate::transport::websocket;

/// Upgrade and hand the socket to the matrix.
pub async fn ws_agent(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.to_string());
    tracing::debug!("Incoming agent connection from {:?}", peer);

    ws.on_upgrade(move |socket| async move {
        let connection = websocket::connection(socket, peer);
        state.matrix.serve_connection(connection).await;
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

    use super::*;
    use crate::core::{AgentProxy, Registry};
    use crate::matrix::{Matrix, MatrixConfig};
    use crate::protocol::{Codec, Envelope, JsonCodec, MATRIX_ID};
    use crate::web::router::{create_app_router, AGENT_WS_PATH};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(agents: &[&str]) -> (SocketAddr, Arc<Matrix>) {
        crate::logging::init_test();
        let registry = Arc::new(Registry::with_agents(agents.iter().copied()).unwrap());
        let matrix = Arc::new(Matrix::new(registry, MatrixConfig::default()));
        let app = create_app_router(AppState::new(matrix.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        (addr, matrix)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let url = format!("ws://{}{}", addr, AGENT_WS_PATH);
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    async fn next_message(client: &mut Client) -> Option<Message> {
        tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .map(|message| message.unwrap())
    }

    async fn wait_for(proxy: &AgentProxy, connected: bool) {
        for _ in 0..200 {
            if proxy.is_connected() == connected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never reached connected={}", proxy.agent_id(), connected);
    }

    #[tokio::test]
    async fn test_agent_session_over_websocket() {
        let (addr, matrix) = serve(&["a1"]).await;
        let proxy = matrix.registry().lookup("a1").unwrap();
        let mut client = connect(addr).await;

        let hello = JsonCodec.encode(&Envelope::connect("a1")).unwrap();
        client.send(Message::Binary(hello)).await.unwrap();
        wait_for(&proxy, true).await;

        let ping = Envelope::new(MATRIX_ID, "a1", "ping");
        proxy.send(ping.clone());
        match next_message(&mut client).await {
            Some(Message::Binary(frame)) => assert_eq!(JsonCodec.decode(&frame).unwrap(), ping),
            other => panic!("expected a binary frame, got {:?}", other),
        }

        // Ping frames are answered by the socket and never reach the queue.
        client.send(Message::Ping(b"keepalive".to_vec())).await.unwrap();

        let pong = Envelope::new("a1", MATRIX_ID, "pong");
        let text = String::from_utf8(JsonCodec.encode(&pong).unwrap()).unwrap();
        client.send(Message::Text(text)).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), proxy.recv())
            .await
            .unwrap();
        assert_eq!(got, pong);
        assert!(proxy.inbound().is_empty());

        client.close(None).await.unwrap();
        wait_for(&proxy, false).await;
        assert!(proxy.outbound().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent_gets_close_frame() {
        let (addr, matrix) = serve(&["a1"]).await;
        let mut client = connect(addr).await;

        let hello = JsonCodec.encode(&Envelope::connect("ghost")).unwrap();
        client.send(Message::Binary(hello)).await.unwrap();

        let reply = next_message(&mut client).await;
        assert!(matches!(reply, Some(Message::Close(_))), "got {:?}", reply);
        assert_eq!(matrix.registry().agent_ids(), vec!["a1".to_string()]);
        assert!(!matrix.registry().lookup("a1").unwrap().is_connected());
    }
}
