//! In-memory broker for driving the relay loops. Keeps a single
//! queue, hands out deliveries with fresh tags and follows the
//! broker's rules for unacked deliveries when a connection closes.
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use lapin_producer::transport::{
    BrokerChannel, BrokerConnection, BrokerConsumer, Delivery, ShutdownListener, Transport,
    TransportError, TransportResult,
};
use lapin_producer::{ChannelManager, DeliveryTag, EndpointConfig};

/// Queue and bookkeeping shared by every connection
#[derive(Default)]
pub(crate) struct Broker {
    /// Every operation attempted, in order
    pub(crate) calls: Vec<&'static str>,
    /// Payloads waiting for the consumer, and whether each was
    /// delivered before
    ready: VecDeque<(Vec<u8>, bool)>,
    /// Delivered on the current connection and not yet resolved
    unacked: Vec<Delivery>,
    /// Last tag handed out
    next_tag: DeliveryTag,
    /// The consumer subscribed to a named queue
    named_queue: bool,
    /// The channel reports itself open
    channel_open: bool,
    /// Payloads published to the exchange
    pub(crate) published: Vec<Vec<u8>>,
    /// Payloads acknowledged
    pub(crate) acked: Vec<Vec<u8>>,
    /// Payloads rejected with requeue
    pub(crate) requeued: Vec<Vec<u8>>,
    /// Payloads rejected without requeue
    pub(crate) dead_lettered: Vec<Vec<u8>>,
    /// Payloads delivered with the redelivered flag set
    pub(crate) redelivered: Vec<Vec<u8>>,
    /// Operations that shut the channel down the next time they run
    shutdown_once: HashSet<&'static str>,
    /// Operations that always fail
    failing: HashSet<&'static str>,
    /// Operations that succeed this many more times, then fail
    fail_after: HashMap<&'static str, usize>,
}

impl Broker {
    /// Record `op` and fail it if asked to
    fn call(&mut self, op: &'static str) -> TransportResult<()> {
        self.calls.push(op);
        if self.shutdown_once.remove(op) {
            self.channel_open = false;
            return Err(TransportError::shutdown(format!("{op}: channel closed by broker")));
        }
        if self.failing.contains(op) {
            return Err(TransportError::client(format!("{op} failed")));
        }
        if let Some(left) = self.fail_after.get_mut(op) {
            if *left == 0 {
                return Err(TransportError::client(format!("{op} refused")));
            }
            *left -= 1;
        }
        Ok(())
    }

    /// The connection went away. A named queue gets its unacked
    /// deliveries back, a private queue is deleted with them.
    fn disconnect(&mut self) {
        self.channel_open = false;
        let unacked = std::mem::take(&mut self.unacked);
        if self.named_queue {
            for delivery in unacked.into_iter().rev() {
                self.ready.push_front((delivery.payload, true));
            }
        } else {
            self.ready.clear();
        }
    }

    /// Remove the unacked delivery `delivery_tag`
    fn take_unacked(&mut self, delivery_tag: DeliveryTag) -> TransportResult<Vec<u8>> {
        let index = self
            .unacked
            .iter()
            .position(|d| d.delivery_tag == delivery_tag)
            .ok_or_else(|| TransportError::client(format!("unknown delivery tag {delivery_tag}")))?;
        Ok(self.unacked.remove(index).payload)
    }
}

/// Transport whose connections all share one [`Broker`]
#[derive(Clone, Default)]
pub(crate) struct TestBroker {
    /// The shared state
    broker: Arc<Mutex<Broker>>,
}

impl TestBroker {
    /// A broker with `messages` already waiting in the queue
    pub(crate) fn with_messages(messages: &[&str]) -> Self {
        let broker = Self::default();
        broker
            .lock()
            .ready
            .extend(messages.iter().map(|m| (m.as_bytes().to_vec(), false)));
        broker
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Broker> {
        self.broker.lock().unwrap()
    }

    /// The next `op` shuts the channel down
    pub(crate) fn shutdown_once(&self, op: &'static str) {
        self.lock().shutdown_once.insert(op);
    }

    /// Every `op` fails without shutting anything down
    pub(crate) fn fail(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    /// `op` succeeds `times` more times, then fails
    pub(crate) fn fail_after(&self, op: &'static str, times: usize) {
        self.lock().fail_after.insert(op, times);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Number of times `op` was attempted
    pub(crate) fn count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// A closed manager connecting to this broker
    pub(crate) fn manager(&self, config: EndpointConfig) -> ChannelManager<TestBroker> {
        ChannelManager::new(config, self.clone())
    }
}

/// Handle to the shared broker, one per connection, channel or
/// consumer
pub(crate) struct Handle {
    /// The shared state
    broker: Arc<Mutex<Broker>>,
}

impl Handle {
    fn lock(&self) -> MutexGuard<'_, Broker> {
        self.broker.lock().unwrap()
    }
}

impl Transport for TestBroker {
    type Connection = Handle;

    fn connect(&self, _listener: Arc<dyn ShutdownListener>) -> TransportResult<Handle> {
        self.lock().call("connect")?;
        Ok(Handle {
            broker: self.broker.clone(),
        })
    }
}

impl BrokerConnection for Handle {
    type Channel = Handle;

    fn create_channel(&self) -> TransportResult<Handle> {
        let mut broker = self.lock();
        broker.call("create_channel")?;
        broker.channel_open = true;
        Ok(Handle {
            broker: self.broker.clone(),
        })
    }

    fn close(&self) -> TransportResult<()> {
        let mut broker = self.lock();
        broker.disconnect();
        broker.call("close_connection")
    }
}

impl BrokerChannel for Handle {
    type Consumer = Handle;

    fn is_open(&self) -> bool {
        self.lock().channel_open
    }

    fn set_prefetch(&self, _prefetch_count: u16) -> TransportResult<()> {
        self.lock().call("qos")
    }

    fn declare_fanout(&self, _exchange: &str, _durable: bool) -> TransportResult<()> {
        self.lock().call("declare")
    }

    fn publish(&self, _exchange: &str, _routing_key: &str, payload: &[u8]) -> TransportResult<()> {
        let mut broker = self.lock();
        broker.call("publish")?;
        broker.published.push(payload.to_vec());
        Ok(())
    }

    fn ack(&self, delivery_tag: DeliveryTag) -> TransportResult<()> {
        let mut broker = self.lock();
        broker.call("ack")?;
        let payload = broker.take_unacked(delivery_tag)?;
        broker.acked.push(payload);
        Ok(())
    }

    fn reject(&self, delivery_tag: DeliveryTag, requeue: bool) -> TransportResult<()> {
        let mut broker = self.lock();
        broker.call("reject")?;
        let payload = broker.take_unacked(delivery_tag)?;
        if requeue {
            broker.requeued.push(payload.clone());
            broker.ready.push_back((payload, true));
        } else {
            broker.dead_lettered.push(payload);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        queue: Option<&str>,
        _exchange: &str,
        _routing_key: &str,
        _consumer_tag: &str,
    ) -> TransportResult<Handle> {
        let mut broker = self.lock();
        broker.call("subscribe")?;
        broker.named_queue = queue.is_some();
        Ok(Handle {
            broker: self.broker.clone(),
        })
    }

    fn cancel_consumer(&self, _consumer_tag: &str) -> TransportResult<()> {
        self.lock().call("cancel")
    }

    fn close(&self) -> TransportResult<()> {
        let mut broker = self.lock();
        broker.channel_open = false;
        broker.call("close_channel")
    }
}

impl BrokerConsumer for Handle {
    fn tag(&self) -> String {
        "relay-test".to_string()
    }

    /// Cancels the consumer once the queue is empty
    fn next_delivery(&mut self) -> TransportResult<Option<Delivery>> {
        let mut broker = self.lock();
        broker.call("next_delivery")?;
        let Some((payload, redelivered)) = broker.ready.pop_front() else {
            return Ok(None);
        };
        broker.next_tag += 1;
        let delivery = Delivery {
            delivery_tag: broker.next_tag,
            payload,
            redelivered,
        };
        if redelivered {
            broker.redelivered.push(delivery.payload.clone());
        }
        broker.unacked.push(delivery.clone());
        Ok(Some(delivery))
    }
}
