//! Integration tests for the WebSocket transport.
//!
//! Each test binds to an OS-assigned port and drives a real
//! `tokio-tungstenite` client against it.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;

    use dropfour_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn pair() -> (WebSocketConnection, Client) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        (server.await.expect("accept task"), client)
    }

    #[tokio::test]
    async fn test_send_json_arrives_as_text_frame() {
        let (conn, mut client) = pair().await;
        assert!(conn.id().into_inner() > 0);

        conn.send(br#"{"type":"queued","position":1}"#).await.unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "expected a text frame, got {msg:?}");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":"queued","position":1}"#);
    }

    #[tokio::test]
    async fn test_send_non_utf8_falls_back_to_binary() {
        let (conn, mut client) = pair().await;
        conn.send(&[0xff, 0x00, 0xfe]).await.unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0x00, 0xfe]);
    }

    #[tokio::test]
    async fn test_recv_accepts_text_and_binary() {
        let (conn, mut client) = pair().await;

        client.send(Message::text(r#"{"type":"forfeit"}"#)).await.unwrap();
        client
            .send(Message::Binary(b"raw".to_vec().into()))
            .await
            .unwrap();

        assert_eq!(conn.recv().await.unwrap().unwrap(), br#"{"type":"forfeit"}"#);
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"raw");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (conn, mut client) = pair().await;
        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_send_while_recv_is_pending() {
        let (conn, mut client) = pair().await;
        let conn = Arc::new(conn);

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        // The reader holds the read half; writing must still go through.
        conn.send(b"ping-from-server").await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping-from-server");

        client.send(Message::text("reply")).await.unwrap();
        let got = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(got, b"reply");
    }
}
