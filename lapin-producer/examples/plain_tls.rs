//! Consume over TLS with PLAIN authentication, dead-lettering empty
//! messages
use lapin_producer::{EndpointBuilder, Error};
use miette::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Enable logging based on the RUST_LOG environment variable
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut manager = EndpointBuilder::new("amqps://127.0.0.1:5671/%2f", "logs")
        .prefetch_count(10)
        .with_ca_pem("tls-gen/basic/result/ca_certificate.pem")
        .plain_auth("rabbit")
        .with_password("rabbitpw")
        .build()?;
    manager.open()?;
    manager.consume()?;

    while let Some(delivery) = manager.next_delivery()? {
        tracing::info!(delivery_tag = delivery.delivery_tag, "Got delivery");
        let resolved = if delivery.payload.is_empty() {
            manager.dead_letter(delivery.delivery_tag)
        } else {
            manager.acknowledge(delivery.delivery_tag)
        };
        match resolved {
            Ok(()) => {}
            // The broker closed the channel, so reconnect and keep going
            Err(Error::Ack(ack)) if ack.is_shutdown() => {
                if manager.reinitialize_if_necessary()? {
                    manager.consume()?;
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    manager.close();
    Ok(())
}
