use std::path::PathBuf;

use crate::{builder::auth, connection::Opener, error::Result, ChannelManager, EndpointBuilder};

/// Type of authenticationn to use (plain or external)
#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum AuthKind {
    /// PLAIN authentication using username/password
    Plain,
    /// EXTERNAL authentication using certificates
    External,
}

/// Options controlling TLS connections and certificate based
/// authentication
#[derive(Clone, Debug, clap::Args)]
struct TlsArgs {
    /// P12 formatted key
    #[arg(long)]
    key: Option<PathBuf>,

    /// PEM formatted CA certificate chain
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Password for key, if encrypted
    #[arg(long)]
    key_password: Option<String>,
}

/// Username/password data for AMQP PLAIN auth method
#[derive(Clone, Debug, clap::Args)]
struct PlainAuthArgs {
    /// Password for RabbitMQ server. Required if --amqp-auth is set to 'plain'
    #[arg(long)]
    amqp_password: Option<String>,

    /// Plain text file containing the password. A single trailing newline will be removed
    #[arg(long, conflicts_with = "amqp_password")]
    amqp_password_file: Option<PathBuf>,

    /// Username for RabbitMQ server. Required if --amqp-auth is set to 'plain'
    #[arg(long, default_value = "guest")]
    amqp_user: String,
}

/// Clap derive command-line arguments describing the exchange to
/// publish to and how to connect to its server.
///
/// Add this struct to a `clap::Parser` struct with
/// `#[command(flatten)]`, then call
/// [`EndpointArgs::channel_manager`].
///
/// ```rust
/// # fn main() -> miette::Result<()> {
/// use clap::Parser;
///
/// #[derive(Debug, clap::Parser)]
/// struct Args {
///     #[command(flatten)]
///     endpoint: lapin_producer::EndpointArgs,
/// }
///
/// let args = Args::parse_from(["example", "--exchange", "logs", "--prefetch-count", "10"]);
/// let manager = args.endpoint.channel_manager()?;
/// assert_eq!(manager.config().prefetch_count(), 10);
/// # Ok(()) }
/// ```
#[derive(Clone, Debug, clap::Args)]
pub struct EndpointArgs {
    /// URL of the rabbitmq server
    #[arg(long, default_value_t = String::from("amqp://127.0.0.1:5672/%2f"))]
    rabbit_addr: String,

    /// Fan-out exchange to declare and publish to
    #[arg(short, long)]
    exchange: String,

    /// Routing key attached to published messages
    #[arg(long, default_value_t = String::new())]
    routing_key: String,

    /// Maximum number of unacknowledged deliveries. 0 for no limit
    #[arg(long, default_value_t = 0)]
    prefetch_count: u16,

    /// Requeue failed deliveries instead of dead-lettering them
    #[arg(long)]
    requeue_on_fail: bool,

    /// Named queue to consume from. It outlives the connection, so
    /// deliveries in flight when the channel dies are redelivered.
    /// A private queue that is deleted with the connection is used
    /// if not given
    #[arg(long)]
    queue: Option<String>,

    #[command(flatten)]
    /// Options to control TLS connections
    tls_options: TlsArgs,

    /// Authentication method for RabbitMQ server. If not given, the
    /// method will be taken from the URL parameters
    #[arg(long)]
    amqp_auth: Option<AuthKind>,

    #[command(flatten)]
    /// Username password for plain authentication
    plain_auth: PlainAuthArgs,
}

impl EndpointArgs {
    /// Return an [`EndpointBuilder`] with the endpoint and TLS
    /// options applied, but no authentication. Use this to set other
    /// options, like connection properties, then finish with
    /// [`EndpointArgs::apply_auth`].
    pub fn builder_no_auth(&self) -> EndpointBuilder<auth::None> {
        let builder = EndpointBuilder::new(&self.rabbit_addr, &self.exchange)
            .routing_key(&self.routing_key)
            .prefetch_count(self.prefetch_count)
            .requeue_on_fail(self.requeue_on_fail);
        let builder = match self.queue {
            Some(ref queue) => builder.queue(queue),
            None => builder,
        };
        let builder = match self.tls_options.ca_cert {
            Some(ref pem) => builder.with_ca_pem(pem),
            None => builder,
        };
        match self.tls_options.key {
            Some(ref p12) => {
                let builder = builder.with_p12(p12);
                match self.tls_options.key_password {
                    Some(ref passwd) => builder.key_password(passwd),
                    None => builder.password_prompt(),
                }
            }
            None => builder,
        }
    }

    /// Apply the configured authentication to `builder` and return
    /// the resulting closed [`ChannelManager`]
    pub fn apply_auth(&self, builder: EndpointBuilder<auth::None>) -> Result<ChannelManager<Opener>> {
        match self.amqp_auth {
            Some(AuthKind::Plain) => {
                let builder = builder.plain_auth(&self.plain_auth.amqp_user);
                let builder = match (&self.plain_auth.amqp_password_file, &self.plain_auth.amqp_password) {
                    (Some(file), _) => builder.with_password_file(file),
                    (None, Some(password)) => builder.with_password(password),
                    (None, None) => builder.with_password("guest"),
                };
                builder.build()
            }
            Some(AuthKind::External) => builder.external_auth().build(),
            None => builder.build(),
        }
    }

    /// Convert the arguments into a closed [`ChannelManager`] using
    /// default [`lapin::ConnectionProperties`]
    pub fn channel_manager(&self) -> Result<ChannelManager<Opener>> {
        self.apply_auth(self.builder_no_auth())
    }
}
