//! Shared WebSocket connection helpers

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use crate::adapters::errors::ExchangeError;

/// Type alias for the WebSocket stream with TLS
pub type TlsWebSocketStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
pub type WsWriter = SplitSink<TlsWebSocketStream, Message>;
pub type WsReader = SplitStream<TlsWebSocketStream>;

/// Connect to a WebSocket endpoint with TLS (TLSv1.2 minimum)
///
/// `ws://` URLs connect in plain mode; the TLS connector is only used for `wss://`.
pub async fn connect_tls(url: &str) -> Result<TlsWebSocketStream, ExchangeError> {
    let tls = native_tls::TlsConnector::builder()
        .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
        .build()
        .map_err(|e| ExchangeError::ConnectionFailed(format!("TLS error: {}", e)))?;

    let (ws_stream, _response) =
        connect_async_tls_with_config(url, None, false, Some(Connector::NativeTls(tls)))
            .await
            .map_err(|e| ExchangeError::WebSocket(Box::new(e)))?;

    Ok(ws_stream)
}

/// Connect and split into writer/reader halves
pub async fn connect_split(url: &str) -> Result<(WsWriter, WsReader), ExchangeError> {
    let stream = connect_tls(url).await?;
    Ok(stream.split())
}
