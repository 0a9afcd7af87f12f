//! In-process topic broker with durable queues and manual acknowledgement.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use crate::error::{ChannelError, Result};
use crate::publisher::EventPublisher;
use crate::topic;

/// A message handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    /// Set when the message was handed out before and not acknowledged.
    pub redelivered: bool,
}

impl Delivery {
    /// Decodes the JSON body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A record of one publish, kept for inspection.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub published_at: DateTime<Utc>,
}

impl PublishedMessage {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug)]
struct Binding {
    exchange: String,
    pattern: String,
    queue: String,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Delivery>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Queue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Queue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_back(&self, delivery: Delivery) {
        self.lock().ready.push_back(delivery);
        self.notify.notify_waiters();
    }

    fn push_front(&self, delivery: Delivery) {
        self.lock().ready.push_front(delivery);
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Default)]
struct Topology {
    exchanges: HashSet<String>,
    bindings: Vec<Binding>,
    queues: HashMap<String, Arc<Queue>>,
    /// Most recent publishes, oldest first, at most `publish_log_capacity`.
    published: VecDeque<PublishedMessage>,
}

#[derive(Debug, Default)]
struct BrokerInner {
    topology: Mutex<Topology>,
    publish_log_capacity: usize,
    next_tag: AtomicU64,
    fail_on_publish: AtomicBool,
    closed: AtomicBool,
}

/// In-process topic broker.
///
/// Queues are durable for the life of the broker: messages published while
/// no consumer is attached wait in the queue. Cloning shares the broker.
///
/// The broker keeps a bounded log of recent publishes for inspection; a
/// capacity of zero keeps none.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes kept for inspection by [`InMemoryBroker::new`].
pub const DEFAULT_PUBLISH_LOG_CAPACITY: usize = 256;

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_publish_log(DEFAULT_PUBLISH_LOG_CAPACITY)
    }

    /// Creates a broker that remembers at most `capacity` recent publishes.
    pub fn with_publish_log(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                publish_log_capacity: capacity,
                ..BrokerInner::default()
            }),
        }
    }

    fn topology(&self) -> MutexGuard<'_, Topology> {
        self.inner
            .topology
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Declares a topic exchange. Declaring twice is a no-op.
    pub fn declare_exchange(&self, name: &str) {
        self.topology().exchanges.insert(name.to_string());
    }

    /// Declares a durable queue. Declaring twice keeps the existing queue.
    pub fn declare_queue(&self, name: &str) {
        self.topology()
            .queues
            .entry(name.to_string())
            .or_default();
    }

    /// Binds a queue to an exchange with a routing-key pattern.
    pub fn bind(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()> {
        let mut topology = self.topology();
        if !topology.exchanges.contains(exchange) {
            return Err(ChannelError::UnknownExchange(exchange.to_string()));
        }
        if !topology.queues.contains_key(queue) {
            return Err(ChannelError::UnknownQueue(queue.to_string()));
        }

        let exists = topology
            .bindings
            .iter()
            .any(|b| b.exchange == exchange && b.pattern == pattern && b.queue == queue);
        if !exists {
            topology.bindings.push(Binding {
                exchange: exchange.to_string(),
                pattern: pattern.to_string(),
                queue: queue.to_string(),
            });
        }
        Ok(())
    }

    /// Attaches a consumer to a queue.
    pub fn consume(&self, queue: &str) -> Result<Consumer> {
        let queue_ref = self
            .topology()
            .queues
            .get(queue)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownQueue(queue.to_string()))?;

        Ok(Consumer {
            queue_name: queue.to_string(),
            queue: queue_ref,
            unacked: Mutex::new(HashMap::new()),
        })
    }

    /// Makes every subsequent publish fail until reset.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.inner.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns the recent publishes still in the log, in publish order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.topology().published.iter().cloned().collect()
    }

    /// Returns the messages published with the given routing key.
    pub fn published_with_key(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.topology()
            .published
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Number of messages waiting in a queue, excluding unacknowledged ones.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.topology()
            .queues
            .get(queue)
            .map(|q| q.lock().ready.len())
            .unwrap_or(0)
    }

    /// Closes every queue; consumers drain what is ready and then stop.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        for queue in self.topology().queues.values() {
            queue.lock().closed = true;
            queue.notify.notify_waiters();
        }
    }

    fn route(&self, exchange: &str, routing_key: &str, body: Vec<u8>) -> Result<usize> {
        let mut topology = self.topology();
        if !topology.exchanges.contains(exchange) {
            return Err(ChannelError::UnknownExchange(exchange.to_string()));
        }

        let mut targets: Vec<&str> = topology
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && topic::matches(&b.pattern, routing_key))
            .map(|b| b.queue.as_str())
            .collect();
        targets.sort_unstable();
        targets.dedup();

        let queues: Vec<Arc<Queue>> = targets
            .iter()
            .filter_map(|name| topology.queues.get(*name).cloned())
            .collect();

        for queue in &queues {
            queue.push_back(Delivery {
                delivery_tag: self.inner.next_tag.fetch_add(1, Ordering::SeqCst) + 1,
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                body: body.clone(),
                redelivered: false,
            });
        }

        let capacity = self.inner.publish_log_capacity;
        if capacity > 0 {
            if topology.published.len() == capacity {
                topology.published.pop_front();
            }
            topology.published.push_back(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                body,
                published_at: Utc::now(),
            });
        }

        Ok(queues.len())
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish_bytes(&self, exchange: &str, routing_key: &str, body: Vec<u8>) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        if self.inner.fail_on_publish.load(Ordering::SeqCst) {
            return Err(ChannelError::PublishFailed {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        let routed = self.route(exchange, routing_key, body)?;
        if routed == 0 {
            tracing::debug!(exchange, routing_key, "Message matched no binding");
        }

        metrics::counter!("channel_messages_published_total", "exchange" => exchange.to_string())
            .increment(1);
        Ok(())
    }
}

/// A consumer attached to one queue.
///
/// Deliveries stay owned by the consumer until acknowledged. Dropping the
/// consumer returns unacknowledged deliveries to the queue.
#[derive(Debug)]
pub struct Consumer {
    queue_name: String,
    queue: Arc<Queue>,
    unacked: Mutex<HashMap<u64, Delivery>>,
}

impl Consumer {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn unacked(&self) -> MutexGuard<'_, HashMap<u64, Delivery>> {
        self.unacked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for the next delivery. Returns None once the queue is closed
    /// and drained.
    pub async fn recv(&self) -> Option<Delivery> {
        loop {
            let notified = self.queue.notify.notified();
            {
                let mut state = self.queue.lock();
                if let Some(delivery) = state.ready.pop_front() {
                    drop(state);
                    self.unacked()
                        .insert(delivery.delivery_tag, delivery.clone());
                    return Some(delivery);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Takes the next delivery if one is ready.
    pub fn try_recv(&self) -> Option<Delivery> {
        let delivery = self.queue.lock().ready.pop_front()?;
        self.unacked()
            .insert(delivery.delivery_tag, delivery.clone());
        Some(delivery)
    }

    /// Acknowledges a delivery; it will not be handed out again.
    pub fn ack(&self, delivery_tag: u64) -> Result<()> {
        self.unacked()
            .remove(&delivery_tag)
            .map(|_| ())
            .ok_or(ChannelError::UnknownDelivery(delivery_tag))
    }

    /// Rejects a delivery, optionally returning it to the front of the queue.
    pub fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let delivery = self
            .unacked()
            .remove(&delivery_tag)
            .ok_or(ChannelError::UnknownDelivery(delivery_tag))?;

        if requeue {
            self.requeue(delivery);
        } else {
            tracing::warn!(
                queue = %self.queue_name,
                routing_key = %delivery.routing_key,
                "Delivery rejected without requeue"
            );
        }
        Ok(())
    }

    /// Number of deliveries held but not yet acknowledged.
    pub fn unacked_count(&self) -> usize {
        self.unacked().len()
    }

    fn requeue(&self, mut delivery: Delivery) {
        delivery.redelivered = true;
        metrics::counter!("channel_messages_redelivered_total", "queue" => self.queue_name.clone())
            .increment(1);
        self.queue.push_front(delivery);
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let mut pending: Vec<Delivery> = self.unacked().drain().map(|(_, d)| d).collect();
        // Front-pushed in reverse so the oldest ends up first.
        pending.sort_by_key(|d| std::cmp::Reverse(d.delivery_tag));
        for delivery in pending {
            self.requeue(delivery);
        }
    }
}
