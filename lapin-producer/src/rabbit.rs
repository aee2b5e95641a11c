//! [`lapin`] implementation of the [`crate::transport`] traits. Each
//! call drives lapin's future to completion on the calling thread;
//! lapin's own executor and reactor do the IO.
use std::sync::Arc;

use futures::{executor::block_on, StreamExt};
use lapin::{
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
        BasicQosOptions, BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, ChannelState, ConnectionState, ExchangeKind,
};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

use crate::connection::Opener;
use crate::error::DeliveryTag;
use crate::transport::{
    BrokerChannel, BrokerConnection, BrokerConsumer, Delivery, ShutdownListener, Transport,
    TransportError, TransportResult,
};

/// Reply code sent with a normal channel or connection close
const REPLY_SUCCESS: u16 = 200;

impl From<lapin::Error> for TransportError {
    fn from(err: lapin::Error) -> Self {
        let shutdown = match &err {
            lapin::Error::ProtocolError(_) | lapin::Error::MissingHeartbeatError => true,
            lapin::Error::InvalidChannelState(state) => matches!(
                state,
                ChannelState::Closing | ChannelState::Closed | ChannelState::Error
            ),
            lapin::Error::InvalidConnectionState(state) => matches!(
                state,
                ConnectionState::Closing | ConnectionState::Closed | ConnectionState::Error
            ),
            _ => false,
        };
        if shutdown {
            TransportError::shutdown(err)
        } else {
            TransportError::client(err)
        }
    }
}

impl Transport for Opener {
    type Connection = lapin::Connection;

    fn connect(&self, listener: Arc<dyn ShutdownListener>) -> TransportResult<lapin::Connection> {
        let connection = block_on(self.get_connection())?;
        connection.on_error(move |err| listener.on_shutdown(&err.into()));
        Ok(connection)
    }
}

impl BrokerConnection for lapin::Connection {
    type Channel = lapin::Channel;

    fn create_channel(&self) -> TransportResult<lapin::Channel> {
        Ok(block_on(lapin::Connection::create_channel(self))?)
    }

    fn close(&self) -> TransportResult<()> {
        Ok(block_on(lapin::Connection::close(
            self,
            REPLY_SUCCESS,
            "closing connection",
        ))?)
    }
}

impl BrokerChannel for lapin::Channel {
    type Consumer = lapin::Consumer;

    fn is_open(&self) -> bool {
        self.status().connected()
    }

    fn set_prefetch(&self, prefetch_count: u16) -> TransportResult<()> {
        Ok(block_on(self.basic_qos(
            prefetch_count,
            BasicQosOptions::default(),
        ))?)
    }

    fn declare_fanout(&self, exchange: &str, durable: bool) -> TransportResult<()> {
        Ok(block_on(self.exchange_declare(
            exchange,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        ))?)
    }

    fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> TransportResult<()> {
        // Confirms aren't enabled on the channel, so the returned
        // confirm resolves immediately and carries nothing
        let _confirm = block_on(self.basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default(),
        ))?;
        trace!(exchange, routing_key, size = payload.len(), "Published");
        Ok(())
    }

    fn ack(&self, delivery_tag: DeliveryTag) -> TransportResult<()> {
        Ok(block_on(self.basic_ack(
            delivery_tag,
            BasicAckOptions { multiple: false },
        ))?)
    }

    fn reject(&self, delivery_tag: DeliveryTag, requeue: bool) -> TransportResult<()> {
        Ok(block_on(
            self.basic_reject(delivery_tag, BasicRejectOptions { requeue }),
        )?)
    }

    fn subscribe(
        &self,
        queue: Option<&str>,
        exchange: &str,
        routing_key: &str,
        consumer_tag: &str,
    ) -> TransportResult<lapin::Consumer> {
        let options = match queue {
            Some(_) => QueueDeclareOptions::default(),
            None => QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..QueueDeclareOptions::default()
            },
        };
        let queue = block_on(self.queue_declare(
            queue.unwrap_or_default(),
            options,
            FieldTable::default(),
        ))?;
        let queue_name = queue.name().as_str();
        block_on(self.queue_bind(
            queue_name,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        ))?;
        debug!(queue = queue_name, exchange, "Bound consumer queue");
        Ok(block_on(self.basic_consume(
            queue_name,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        ))?)
    }

    fn cancel_consumer(&self, consumer_tag: &str) -> TransportResult<()> {
        Ok(block_on(
            self.basic_cancel(consumer_tag, BasicCancelOptions::default()),
        )?)
    }

    fn close(&self) -> TransportResult<()> {
        Ok(block_on(lapin::Channel::close(
            self,
            REPLY_SUCCESS,
            "closing channel",
        ))?)
    }
}

impl BrokerConsumer for lapin::Consumer {
    fn tag(&self) -> String {
        lapin::Consumer::tag(self).as_str().to_string()
    }

    fn next_delivery(&mut self) -> TransportResult<Option<Delivery>> {
        match block_on(self.next()) {
            None => Ok(None),
            Some(delivery) => {
                let delivery = delivery?;
                Ok(Some(Delivery {
                    delivery_tag: delivery.delivery_tag,
                    payload: delivery.data,
                    redelivered: delivery.redelivered,
                }))
            }
        }
    }
}
