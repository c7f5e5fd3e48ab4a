/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-process replicated transport.
//!
//! Every subscription on a channel receives every message offered to that
//! channel after it was opened, in offer order. Each subscription has a
//! bounded buffer; an offer that would overflow any subscriber fails with
//! `BackPressured` and is delivered to none of them.

use crate::transport::{FragmentSource, Publication, ReplicationTransport, StreamChannel};
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use fixgate_core::error::TransportError;
use fixgate_core::types::SessionId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Default per-subscription buffer in messages.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Fragment {
    session_id: SessionId,
    payload: Bytes,
}

#[derive(Debug)]
struct Subscriber {
    tx: Sender<Fragment>,
    attached: Arc<AtomicBool>,
}

impl Subscriber {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct ChannelState {
    channel: StreamChannel,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChannelState {
    fn new(channel: StreamChannel) -> Self {
        Self {
            channel,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn publish(&self, session_id: SessionId, payload: &[u8]) -> Result<(), TransportError> {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(Subscriber::is_attached);
        if subscribers.iter().any(|s| s.tx.is_full()) {
            return Err(TransportError::BackPressured {
                channel: self.channel.name(),
            });
        }
        let payload = Bytes::copy_from_slice(payload);
        for subscriber in subscribers.iter() {
            let fragment = Fragment {
                session_id,
                payload: payload.clone(),
            };
            if subscriber.tx.try_send(fragment).is_err() {
                debug!(channel = %self.channel, "subscriber went away during offer");
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Shared {
    data: ChannelState,
    control: ChannelState,
    capacity: usize,
    closed: AtomicBool,
}

impl Shared {
    fn state(&self, channel: StreamChannel) -> &ChannelState {
        match channel {
            StreamChannel::Data => &self.data,
            StreamChannel::Control => &self.control,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Ordered in-process multicast transport.
#[derive(Debug, Clone)]
pub struct InProcessTransport {
    shared: Arc<Shared>,
}

impl InProcessTransport {
    /// Creates a transport whose subscriptions buffer `capacity` messages.
    ///
    /// # Errors
    /// Returns `TransportError::Construction` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, TransportError> {
        if capacity == 0 {
            return Err(TransportError::Construction(
                "stream capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                data: ChannelState::new(StreamChannel::Data),
                control: ChannelState::new(StreamChannel::Control),
                capacity,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns true once [`ReplicationTransport::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl ReplicationTransport for InProcessTransport {
    fn open_publication(
        &self,
        channel: StreamChannel,
    ) -> Result<Arc<dyn Publication>, TransportError> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed {
                channel: channel.name(),
            });
        }
        Ok(Arc::new(InProcessPublication {
            shared: Arc::clone(&self.shared),
            channel,
            closed: AtomicBool::new(false),
        }))
    }

    fn open_subscription(
        &self,
        channel: StreamChannel,
    ) -> Result<Box<dyn FragmentSource>, TransportError> {
        if self.shared.is_closed() {
            return Err(TransportError::Closed {
                channel: channel.name(),
            });
        }
        let (tx, rx) = bounded(self.shared.capacity);
        let attached = Arc::new(AtomicBool::new(true));
        self.shared.state(channel).subscribers.lock().push(Subscriber {
            tx,
            attached: Arc::clone(&attached),
        });
        Ok(Box::new(InProcessSource {
            channel,
            rx: Some(rx),
            attached,
        }))
    }

    fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.shared.data.subscribers.lock().clear();
            self.shared.control.subscribers.lock().clear();
            info!("in-process transport closed");
        }
    }
}

#[derive(Debug)]
struct InProcessPublication {
    shared: Arc<Shared>,
    channel: StreamChannel,
    closed: AtomicBool,
}

impl Publication for InProcessPublication {
    fn offer(&self, session_id: SessionId, payload: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed {
                channel: self.channel.name(),
            });
        }
        self.shared.state(self.channel).publish(session_id, payload)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.shared.is_closed()
    }

    fn channel(&self) -> StreamChannel {
        self.channel
    }
}

#[derive(Debug)]
struct InProcessSource {
    channel: StreamChannel,
    rx: Option<Receiver<Fragment>>,
    attached: Arc<AtomicBool>,
}

impl FragmentSource for InProcessSource {
    fn poll(
        &mut self,
        handler: &mut dyn FnMut(SessionId, &[u8]),
        fragment_limit: usize,
    ) -> usize {
        let Some(rx) = &self.rx else {
            return 0;
        };
        let mut delivered = 0;
        let mut disconnected = false;
        while delivered < fragment_limit {
            match rx.try_recv() {
                Ok(fragment) => {
                    handler(fragment.session_id, &fragment.payload);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            debug!(channel = %self.channel, "subscription source disconnected");
            self.rx = None;
        }
        delivered
    }

    fn close(&mut self) {
        self.attached.store(false, Ordering::Release);
        self.rx = None;
    }
}

impl Drop for InProcessSource {
    fn drop(&mut self) {
        self.attached.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(source: &mut Box<dyn FragmentSource>) -> Vec<(SessionId, Vec<u8>)> {
        let mut out = Vec::new();
        source.poll(
            &mut |id: SessionId, bytes: &[u8]| out.push((id, bytes.to_vec())),
            usize::MAX,
        );
        out
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            InProcessTransport::new(0),
            Err(TransportError::Construction(_))
        ));
    }

    #[test]
    fn test_multicast_preserves_order_and_boundaries() {
        let transport = InProcessTransport::new(16).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        let mut first = transport.open_subscription(StreamChannel::Data).unwrap();
        let mut second = transport.open_subscription(StreamChannel::Data).unwrap();

        publication.offer(SessionId::new(1), b"one").unwrap();
        publication.offer(SessionId::new(2), b"two").unwrap();

        let expected = vec![
            (SessionId::new(1), b"one".to_vec()),
            (SessionId::new(2), b"two".to_vec()),
        ];
        assert_eq!(collect(&mut first), expected);
        assert_eq!(collect(&mut second), expected);
    }

    #[test]
    fn test_channels_are_isolated() {
        let transport = InProcessTransport::new(16).unwrap();
        let control = transport.open_publication(StreamChannel::Control).unwrap();
        let mut data = transport.open_subscription(StreamChannel::Data).unwrap();

        control.offer(SessionId::new(1), b"ctl").unwrap();
        assert!(collect(&mut data).is_empty());
    }

    #[test]
    fn test_back_pressure_delivers_to_nobody() {
        let transport = InProcessTransport::new(1).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        let mut slow = transport.open_subscription(StreamChannel::Data).unwrap();

        publication.offer(SessionId::new(1), b"a").unwrap();
        let err = publication.offer(SessionId::new(1), b"b").unwrap_err();
        assert!(err.is_back_pressure());

        assert_eq!(collect(&mut slow).len(), 1);
        publication.offer(SessionId::new(1), b"c").unwrap();
        assert_eq!(collect(&mut slow), vec![(SessionId::new(1), b"c".to_vec())]);
    }

    #[test]
    fn test_fragment_limit() {
        let transport = InProcessTransport::new(16).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        let mut source = transport.open_subscription(StreamChannel::Data).unwrap();
        for i in 0..5u8 {
            publication.offer(SessionId::new(1), &[i]).unwrap();
        }
        let mut count = 0;
        assert_eq!(source.poll(&mut |_: SessionId, _: &[u8]| count += 1, 3), 3);
        assert_eq!(source.poll(&mut |_: SessionId, _: &[u8]| count += 1, 3), 2);
        assert_eq!(count, 5);
    }

    #[test]
    fn test_closed_publication_and_transport() {
        let transport = InProcessTransport::new(4).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        publication.close();
        assert!(publication.is_closed());
        assert!(matches!(
            publication.offer(SessionId::new(1), b"x"),
            Err(TransportError::Closed { channel: "data" })
        ));

        let other = transport.open_publication(StreamChannel::Control).unwrap();
        let mut source = transport.open_subscription(StreamChannel::Control).unwrap();
        transport.close();
        assert!(transport.is_closed());
        assert!(other.is_closed());
        assert_eq!(source.poll(&mut |_: SessionId, _: &[u8]| {}, 10), 0);
        assert!(transport.open_subscription(StreamChannel::Data).is_err());
    }

    #[test]
    fn test_offer_without_subscribers_succeeds() {
        let transport = InProcessTransport::new(4).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        assert!(publication.offer(SessionId::new(1), b"x").is_ok());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let transport = InProcessTransport::new(1).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        let source = transport.open_subscription(StreamChannel::Data).unwrap();
        drop(source);
        publication.offer(SessionId::new(1), b"a").unwrap();
        publication.offer(SessionId::new(1), b"b").unwrap();
    }

    #[test]
    fn test_offer_retry_gives_up() {
        let transport = InProcessTransport::new(1).unwrap();
        let publication = transport.open_publication(StreamChannel::Data).unwrap();
        let _source = transport.open_subscription(StreamChannel::Data).unwrap();
        publication.offer(SessionId::new(1), b"a").unwrap();
        let err = publication.offer_retry(SessionId::new(1), b"b", 3).unwrap_err();
        assert!(err.is_back_pressure());
    }
}
