//! Builder for a [`ChannelManager`] publishing over [`lapin`] with
//! TLS and PLAIN or EXTERNAL authentication

use std::marker::PhantomData;
use std::path::Path;

use crate::config::EndpointConfig;
use crate::connection::Opener;
use crate::error::Result;
use crate::options::{AuthMethod, PlainAuth, TlsOptions};
use crate::ChannelManager;

/// Builder to make an [`Opener`] and [`EndpointConfig`], or the
/// [`ChannelManager`] combining them
pub struct EndpointBuilder<Auth: AuthType> {
    #[doc(hidden)]
    config: EndpointConfig,
    #[doc(hidden)]
    auth: Option<AuthMethod>,
    #[doc(hidden)]
    tls: Option<TlsOptions>,
    #[doc(hidden)]
    properties: lapin::ConnectionProperties,
    #[doc(hidden)]
    _marker: PhantomData<Auth>,
}

/// Marker trait for [`EndpointBuilder`] typestate. You can't make
/// this yourself
#[doc(hidden)]
pub trait AuthType: private::Sealed {}

impl AuthType for auth::Plain {}
impl AuthType for auth::External {}
impl AuthType for auth::None {}

#[doc(hidden)]
mod private {
    pub trait Sealed {}
}

impl private::Sealed for auth::None {}
impl private::Sealed for auth::Plain {}
impl private::Sealed for auth::External {}

#[doc(hidden)]
pub mod auth {
    pub struct None;
    pub struct Plain;
    pub struct External;
}

impl EndpointBuilder<auth::None> {
    /// Start building a manager that publishes to `exchange` on the
    /// server at `url`. Connection parameters can be given as a
    /// query string in the URL, but parameters given in the builder
    /// will override those.
    pub fn new(url: &str, exchange: &str) -> Self {
        Self {
            config: EndpointConfig::new(url, exchange, ""),
            auth: None,
            tls: None,
            properties: lapin::ConnectionProperties::default(),
            _marker: PhantomData,
        }
    }
}

impl<Auth: AuthType> EndpointBuilder<Auth> {
    /// Routing key attached to each publish. Fan-out exchanges ignore
    /// it, but it is also used to bind the consumer queue.
    pub fn routing_key(mut self, routing_key: &str) -> Self {
        self.config = self.config.with_routing_key(routing_key);
        self
    }

    /// Maximum unacknowledged deliveries on the channel. 0, the
    /// default, means no limit.
    pub fn prefetch_count(mut self, prefetch_count: u16) -> Self {
        self.config = self.config.with_prefetch_count(prefetch_count);
        self
    }

    /// Consume from a named queue that survives reconnects instead
    /// of a private one
    pub fn queue(mut self, queue: &str) -> Self {
        self.config = self.config.with_queue(queue);
        self
    }

    /// Requeue failed deliveries instead of dead-lettering them
    pub fn requeue_on_fail(mut self, requeue_on_fail: bool) -> Self {
        self.config = self.config.with_requeue_on_fail(requeue_on_fail);
        self
    }

    /// Use a TLS connection. This is implied by [`EndpointBuilder::with_ca_pem`]
    pub fn tls(mut self) -> Self {
        self.tls.get_or_insert_with(TlsOptions::default);
        self
    }

    /// Use the given [`lapin::ConnectionProperties`]
    pub fn with_properties(mut self, properties: lapin::ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Verify the connection using the given CA certificate file, in
    /// PEM format. Implies [`EndpointBuilder::tls`].
    pub fn with_ca_pem(mut self, ca_cert: impl AsRef<Path>) -> Self {
        let tls = self.tls.get_or_insert_with(TlsOptions::default);
        tls.ca_cert = Some(ca_cert.as_ref().to_owned());
        self
    }

    /// Use the p12 formatted key/cert file to authorize yourself to
    /// the server. Implies [`EndpointBuilder::tls`].
    pub fn with_p12(mut self, key: impl AsRef<Path>) -> Self {
        let tls = self.tls.get_or_insert_with(TlsOptions::default);
        tls.key = Some(key.as_ref().to_owned());
        self
    }

    /// Prompt for missing passwords if the P12 key file is encrypted.
    /// If this is not given, the password needs to be set using
    /// [`Self::key_password`] or building will return
    /// [`crate::Error::Tls`]
    pub fn password_prompt(mut self) -> Self {
        self.tls.get_or_insert_with(TlsOptions::default).prompt = true;
        self
    }

    /// Password to decrypt the key give in [`Self::with_p12`]
    pub fn key_password(mut self, password: &str) -> Self {
        self.tls.get_or_insert_with(TlsOptions::default).password = Some(password.to_string());
        self
    }

    /// The endpoint configuration built so far
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Return the configured [`Opener`]
    pub fn opener(&self) -> Result<Opener> {
        Opener::from_options(
            self.config.url(),
            self.auth.as_ref(),
            self.tls.as_ref(),
            self.properties.clone(),
        )
    }

    /// Return a closed [`ChannelManager`] for the configured endpoint
    pub fn build(self) -> Result<ChannelManager<Opener>> {
        let opener = self.opener()?;
        Ok(ChannelManager::new(self.config, opener))
    }

    /// Move to a new auth typestate
    fn with_auth<New: AuthType>(self, auth: AuthMethod) -> EndpointBuilder<New> {
        EndpointBuilder {
            config: self.config,
            auth: Some(auth),
            tls: self.tls,
            properties: self.properties,
            _marker: PhantomData,
        }
    }
}

impl EndpointBuilder<auth::None> {
    /// Use EXTERNAL auth. If you call this, you essentially have to
    /// call [`EndpointBuilder::with_p12`]
    pub fn external_auth(self) -> EndpointBuilder<auth::External> {
        self.with_auth(AuthMethod::External)
    }

    /// Use PLAIN (username/password) authentication
    pub fn plain_auth(self, user: &str) -> EndpointBuilder<auth::Plain> {
        self.with_auth(AuthMethod::Plain(PlainAuth {
            user: user.to_string(),
            ..Default::default()
        }))
    }
}

impl EndpointBuilder<auth::Plain> {
    /// The PLAIN credentials, which this typestate always has
    fn plain(&mut self) -> &mut PlainAuth {
        match self.auth {
            Some(AuthMethod::Plain(ref mut plain)) => plain,
            _ => unreachable!("plain typestate without plain auth"),
        }
    }

    /// Give the password as a plain text string
    pub fn with_password(mut self, password: &str) -> Self {
        self.plain().password = Some(password.to_string());
        self
    }

    /// Read the password from the given file
    pub fn with_password_file(mut self, password_file: impl AsRef<Path>) -> Self {
        self.plain().password_file = Some(password_file.as_ref().to_owned());
        self
    }
}
