use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use cuegraph_core::{RemoteArg, RemoteMessage, RemoteReply, Transport, TransportError};
use log::{debug, trace, warn};
use rosc::{OscMessage, OscPacket, OscType};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use crate::slip::{self, SlipDecoder};

const READ_BUFFER: usize = 4096;

/// OSC messages over a SLIP framed byte stream, normally a TCP connection to QLab.
pub struct OscTransport<S = TcpStream> {
    stream: S,
    decoder: SlipDecoder,
    pending: VecDeque<Vec<u8>>,
}

impl OscTransport<TcpStream> {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}:{}", host, port);
        Ok(Self::new(stream))
    }
}

impl<S> OscTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: SlipDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Takes buffered packets until one is a reply. Anything else, such as update
    /// notifications or unreadable replies, is dropped.
    fn next_reply(&mut self) -> Option<RemoteReply> {
        while let Some(packet) = self.pending.pop_front() {
            if let Some(reply) = decode_reply(&packet) {
                return Some(reply);
            }
        }
        None
    }
}

#[async_trait]
impl<S> Transport for OscTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &RemoteMessage) -> Result<(), TransportError> {
        let bytes = encode_message(message)?;
        self.stream.write_all(&slip::encode(&bytes)).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Option<RemoteReply>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; READ_BUFFER];

        loop {
            if let Some(reply) = self.next_reply() {
                return Ok(Some(reply));
            }

            let read = match timeout_at(deadline, self.stream.read(&mut buffer)).await {
                Ok(read) => read?,
                Err(_) => return Ok(None),
            };
            if read == 0 {
                return Err(TransportError::Closed);
            }
            self.pending.extend(self.decoder.push(&buffer[..read]));
        }
    }
}

fn encode_message(message: &RemoteMessage) -> Result<Vec<u8>, TransportError> {
    let args = message
        .args
        .iter()
        .map(|arg| match arg {
            RemoteArg::Float(value) => OscType::Float(*value),
            RemoteArg::Int(value) => OscType::Int(*value),
            RemoteArg::Str(value) => OscType::String(value.clone()),
        })
        .collect();
    let packet = OscPacket::Message(OscMessage {
        addr: message.address.clone(),
        args,
    });
    rosc::encoder::encode(&packet).map_err(|e| TransportError::Encode {
        address: message.address.clone(),
        detail: format!("{:?}", e),
    })
}

/// Reads a reply from a packet. QLab replies on `/reply/<request address>` with a single JSON
/// string argument; other packets yield `None`. Unreadable replies are logged and dropped, which
/// leaves the request unacknowledged for the caller to poll again.
fn decode_reply(packet: &[u8]) -> Option<RemoteReply> {
    let packet = match rosc::decoder::decode_udp(packet) {
        Ok((_, packet)) => packet,
        Err(e) => {
            warn!("Dropping undecodable packet: {:?}", e);
            return None;
        }
    };

    let message = match packet {
        OscPacket::Message(message) => message,
        OscPacket::Bundle(_) => return None,
    };
    if !message.addr.starts_with("/reply") {
        trace!("Skipping {}", message.addr);
        return None;
    }

    let Some(OscType::String(body)) = message.args.first() else {
        warn!("Reply {} has no JSON body", message.addr);
        return None;
    };
    match serde_json::from_str(body) {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!("Reply {} is not valid JSON: {}", message.addr, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, DuplexStream};

    use super::*;

    fn reply_packet(address: &str, body: &str) -> Vec<u8> {
        let packet = OscPacket::Message(OscMessage {
            addr: format!("/reply{}", address),
            args: vec![OscType::String(body.to_string())],
        });
        slip::encode(&rosc::encoder::encode(&packet).unwrap())
    }

    fn update_packet() -> Vec<u8> {
        let packet = OscPacket::Message(OscMessage {
            addr: "/update/workspace/WS/cue_id/1".to_string(),
            args: vec![],
        });
        slip::encode(&rosc::encoder::encode(&packet).unwrap())
    }

    fn pair() -> (OscTransport<DuplexStream>, DuplexStream) {
        let (client, server) = duplex(READ_BUFFER);
        (OscTransport::new(client), server)
    }

    #[tokio::test]
    async fn test_send_frames_an_osc_message() {
        let (mut transport, mut server) = pair();
        let message = RemoteMessage::new("/cue_id/1/name").arg("Red");

        transport.send(&message).await.unwrap();

        let mut buffer = [0u8; 256];
        let read = server.read(&mut buffer).await.unwrap();
        let packets = SlipDecoder::new().push(&buffer[..read]);
        assert_eq!(packets.len(), 1);
        let (_, packet) = rosc::decoder::decode_udp(&packets[0]).unwrap();
        assert_eq!(
            packet,
            OscPacket::Message(OscMessage {
                addr: "/cue_id/1/name".to_string(),
                args: vec![OscType::String("Red".to_string())],
            })
        );
    }

    #[tokio::test]
    async fn test_recv_skips_updates_and_parses_reply() {
        let (mut transport, mut server) = pair();
        let mut bytes = update_packet();
        bytes.extend(reply_packet(
            "/cue_id/1/name",
            r#"{"workspace_id":"WS","address":"/cue_id/1/name","status":"ok","data":"Red"}"#,
        ));
        server.write_all(&bytes).await.unwrap();

        let reply = transport
            .recv(Duration::from_millis(500))
            .await
            .unwrap()
            .unwrap();

        assert!(reply.is_ok());
        assert!(reply.acknowledges("/cue_id/1/name"));
        assert_eq!(reply.data, serde_json::json!("Red"));
    }

    #[tokio::test]
    async fn test_recv_times_out_without_reply() {
        let (mut transport, _server) = pair();

        let reply = transport.recv(Duration::from_millis(20)).await.unwrap();

        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_recv_reports_closed_connection() {
        let (mut transport, server) = pair();
        drop(server);

        let err = transport.recv(Duration::from_millis(500)).await.unwrap_err();

        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_malformed_replies_are_dropped() {
        let (mut transport, mut server) = pair();
        let packet = OscPacket::Message(OscMessage {
            addr: "/reply/alwaysReply".to_string(),
            args: vec![OscType::Int(1)],
        });
        let mut bytes = slip::encode(&rosc::encoder::encode(&packet).unwrap());
        bytes.extend(reply_packet("/cue_id/1/name", "{not json"));
        bytes.extend(slip::encode(b"garbage"));
        server.write_all(&bytes).await.unwrap();

        let reply = transport.recv(Duration::from_millis(20)).await.unwrap();
        assert!(reply.is_none());

        server
            .write_all(&reply_packet(
                "/cue_id/1/name",
                r#"{"workspace_id":"WS","address":"/cue_id/1/name","status":"ok","data":"Red"}"#,
            ))
            .await
            .unwrap();

        let reply = transport
            .recv(Duration::from_millis(500))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.acknowledges("/cue_id/1/name"));
    }
}
