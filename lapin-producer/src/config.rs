//! Where and how a [`crate::ChannelManager`] publishes

/// Fixed description of the exchange a manager publishes to and
/// resolves deliveries from. It can't be changed once the manager is
/// constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Broker address, possibly including credentials
    url: String,
    /// Fan-out exchange to declare and publish to
    exchange: String,
    /// Routing key attached to every publish
    routing_key: String,
    /// `basic.qos` prefetch count, 0 for no limit
    prefetch_count: u16,
    /// Failed deliveries are requeued instead of dead-lettered
    requeue_on_fail: bool,
    /// Named queue to consume from. A private server-named queue is
    /// used if absent.
    queue: Option<String>,
}

impl EndpointConfig {
    /// New configuration with no prefetch limit that dead-letters
    /// failed messages
    pub fn new(url: &str, exchange: &str, routing_key: &str) -> Self {
        Self {
            url: url.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            prefetch_count: 0,
            requeue_on_fail: false,
            queue: None,
        }
    }

    /// Attach `routing_key` to each publish instead
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: &str) -> Self {
        self.routing_key = routing_key.to_string();
        self
    }

    /// Limit the number of unacknowledged deliveries. 0 disables
    /// the limit.
    #[must_use]
    pub fn with_prefetch_count(mut self, prefetch_count: u16) -> Self {
        self.prefetch_count = prefetch_count;
        self
    }

    /// Requeue failed deliveries for redelivery instead of
    /// dead-lettering them
    #[must_use]
    pub fn with_requeue_on_fail(mut self, requeue_on_fail: bool) -> Self {
        self.requeue_on_fail = requeue_on_fail;
        self
    }

    /// Consume from the named queue instead of a private one. The
    /// queue is declared non-exclusive and is not auto-deleted, so
    /// deliveries left unresolved when a connection dies are
    /// redelivered after [`crate::ChannelManager::reinitialize_if_necessary`].
    #[must_use]
    pub fn with_queue(mut self, queue: &str) -> Self {
        self.queue = Some(queue.to_string());
        self
    }

    /// Broker address as given. Only used in log records: a manager
    /// connects wherever its transport points, so when calling
    /// [`crate::ChannelManager::new`] by hand keep the two in step.
    /// [`crate::EndpointBuilder`] derives both from the same URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Broker address with any password masked, for logging
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    // Only fails for URLs that can't have credentials
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<unparsable url>".to_string(),
        }
    }

    /// Exchange name
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Routing key used on publish
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Prefetch count, 0 for unlimited
    pub fn prefetch_count(&self) -> u16 {
        self.prefetch_count
    }

    /// Whether failed deliveries are requeued
    pub fn requeue_on_fail(&self) -> bool {
        self.requeue_on_fail
    }

    /// Named queue to consume from, if any
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }
}

impl std::fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} exchange={} routing_key={}",
            self.redacted_url(),
            self.exchange,
            self.routing_key
        )
    }
}
