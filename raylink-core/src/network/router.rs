//! Per-message-type handler table.
//!
//! A handler is registered for one [`WireMessage`] type. Routing decodes
//! the packet as that type; success invokes the handler, failure is
//! logged and the packet dropped. Nothing here closes the connection.

use std::collections::HashMap;
use std::future::Future;

use futures::future::BoxFuture;
use tracing::{debug, trace, warn};

use crate::flags::PacketFlags;
use crate::message::MessageType;
use crate::network::{ConnectionId, PeerSender};
use crate::packet::Packet;
use crate::protocol::WireMessage;

/// A decoded message plus the connection it arrived on.
#[derive(Debug, Clone)]
pub struct Envelope<M> {
    pub message: M,
    pub flags: PacketFlags,
    /// Send half of the delivering connection, for point-to-point replies.
    pub reply: PeerSender,
}

impl<M> Envelope<M> {
    pub fn from(&self) -> ConnectionId {
        self.reply.id()
    }
}

/// What happened to a routed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled(MessageType),
    /// Decoded but nobody registered for this type.
    Unhandled(MessageType),
    /// Unknown type tag or malformed payload.
    Dropped,
}

type Handler = Box<dyn Fn(Packet, PeerSender) -> Option<BoxFuture<'static, ()>> + Send + Sync>;

#[derive(Default)]
pub struct Router {
    handlers: HashMap<MessageType, Handler>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for messages of type `M`, replacing any
    /// previous handler for that type.
    pub fn register<M, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        M: WireMessage + Send + 'static,
        F: Fn(Envelope<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Handler = Box::new(move |packet: Packet, reply: PeerSender| {
            match M::from_packet(&packet) {
                Ok(message) => {
                    let envelope = Envelope {
                        message,
                        flags: packet.flags(),
                        reply,
                    };
                    Some(Box::pin(handler(envelope)) as BoxFuture<'static, ()>)
                }
                Err(e) => {
                    warn!(connection = %reply.id(), "dropping {}: {e}", M::MESSAGE_TYPE);
                    None
                }
            }
        });
        self.handlers.insert(M::MESSAGE_TYPE, boxed);
        self
    }

    pub fn is_registered(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Decode `packet` and run the matching handler to completion.
    pub async fn route(&self, packet: Packet, reply: &PeerSender) -> RouteOutcome {
        let message_type = match packet.message_type() {
            Ok(ty) => ty,
            Err(e) => {
                warn!(connection = %reply.id(), "dropping packet: {e}");
                return RouteOutcome::Dropped;
            }
        };

        if message_type.is_session_level() {
            trace!(connection = %reply.id(), "session-level {message_type}");
            return RouteOutcome::Unhandled(message_type);
        }

        let Some(handler) = self.handlers.get(&message_type) else {
            debug!(connection = %reply.id(), "no handler for {message_type}");
            return RouteOutcome::Unhandled(message_type);
        };

        match handler(packet, reply.clone()) {
            Some(fut) => {
                fut.await;
                RouteOutcome::Handled(message_type)
            }
            None => RouteOutcome::Dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use glam::Vec3;
    use tokio::sync::mpsc;

    use crate::protocol::DisplayMessage;

    fn reply_half() -> (PeerSender, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(8);
        (PeerSender::new(ConnectionId::from_raw(1), tx), rx)
    }

    fn counting_router() -> (Router, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        let seen = Arc::clone(&count);
        router.register::<DisplayMessage, _, _>(move |env| {
            let seen = Arc::clone(&seen);
            async move {
                assert_eq!(env.from(), ConnectionId::from_raw(1));
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        (router, count)
    }

    #[tokio::test]
    async fn routes_decoded_messages() {
        let (router, count) = counting_router();
        let (reply, _rx) = reply_half();
        let packet = DisplayMessage::nothing_hit(1).to_packet().unwrap();

        assert_eq!(
            router.route(packet, &reply).await,
            RouteOutcome::Handled(MessageType::Display)
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped() {
        let (router, count) = counting_router();
        let (reply, _rx) = reply_half();
        let packet = Packet::new(
            MessageType::Display,
            PacketFlags::empty(),
            Bytes::from_static(b"junk"),
        );

        assert_eq!(router.route(packet, &reply).await, RouteOutcome::Dropped);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_type_tag_is_dropped() {
        let (router, _) = counting_router();
        let (reply, _rx) = reply_half();
        let header = crate::header::PacketHeader::new(
            crate::packet::checksum(&[]),
            0x7F,
            PacketFlags::empty(),
            0,
        );
        let packet = Packet::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(router.route(packet, &reply).await, RouteOutcome::Dropped);
    }

    #[tokio::test]
    async fn unregistered_type_is_unhandled() {
        let (router, count) = counting_router();
        let (reply, _rx) = reply_half();
        let capture = crate::protocol::CaptureMessage {
            request_id: 1,
            target_id: "t".into(),
            origin_pose: Vec3::ZERO,
            ray_direction: crate::geometry::UnitDirection::new(Vec3::Z).unwrap(),
        };
        assert_eq!(
            router.route(capture.to_packet().unwrap(), &reply).await,
            RouteOutcome::Unhandled(MessageType::Capture)
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!router.is_registered(MessageType::Capture));
    }

    #[tokio::test]
    async fn session_level_messages_skip_handlers() {
        let mut router = Router::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        router.register::<crate::protocol::Hello, _, _>(move |_| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        let (reply, _rx) = reply_half();
        let hello = crate::protocol::Hello {
            role: crate::state::SessionRole::Display,
            node_name: "late".into(),
        };

        assert_eq!(
            router.route(hello.to_packet().unwrap(), &reply).await,
            RouteOutcome::Unhandled(MessageType::Hello)
        );
        assert_eq!(
            router.route(Packet::heartbeat(), &reply).await,
            RouteOutcome::Unhandled(MessageType::Heartbeat)
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
