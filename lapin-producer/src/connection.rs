//! Functions for opening TLS rabbit connections
use std::path::Path;
use std::sync::Arc;

use lapin::{tcp::AMQPUriTcpExt, uri::AMQPUri, Connection, ConnectionProperties};
use native_tls::TlsConnector;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::options::{AuthMethod, PlainAuth, TlsOptions};

/// Factory to open `RabbitMQ` connections to the given URL
pub struct Opener {
    /// URL (including host, vhost, port and query) to open connections to
    uri: AMQPUri,
    /// Properties of the opened connections
    properties: ConnectionProperties,
    #[doc(hidden)]
    /// TLS connection wrapper
    connector: Option<Arc<TlsConnector>>,
}

impl std::fmt::Debug for Opener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opener")
            .field("host", &self.uri.authority.host)
            .field("port", &self.uri.authority.port)
            .field("vhost", &self.uri.vhost)
            .field("tls", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

impl Opener {
    /// Create a new opener to the given server
    pub fn new(
        uri: AMQPUri,
        connector: Option<Arc<TlsConnector>>,
        properties: ConnectionProperties,
    ) -> Self {
        Self {
            uri,
            properties,
            connector,
        }
    }

    /// Create an opener for `addr`. `auth` overrides whatever
    /// mechanism the URL's query string asks for. A TLS connector is
    /// only built if `tls` is given.
    pub fn from_options(
        addr: &str,
        auth: Option<&AuthMethod>,
        tls: Option<&TlsOptions>,
        properties: ConnectionProperties,
    ) -> Result<Self> {
        let mut uri: AMQPUri = addr.parse().map_err(|s| {
            error!(url = addr, "Unable to parse server URL");
            Error::Parse(s)
        })?;
        if let Some(method) = auth {
            uri.query.auth_mechanism = method.into();
        }

        if let Some(AuthMethod::Plain(plain)) = auth {
            uri.authority.userinfo = user_info(plain)?;
        }

        let connector = match tls {
            Some(tls) => Some(Arc::new(tls_connector(tls)?)),
            None => None,
        };

        Ok(Self::new(uri, connector, properties))
    }

    /// The server URI connections are opened to
    pub fn uri(&self) -> &AMQPUri {
        &self.uri
    }

    /// Get a new AMQP connection. If there is a TLS connector given,
    /// that will be used to establish the connection, otherwise it
    /// will be unencrypted.
    pub async fn get_connection(&self) -> lapin::Result<Connection> {
        if let Some(connector) = self.connector.clone() {
            let connect = move |uri: &AMQPUri| {
                info!(host = uri.authority.host, "Connecting with TLS");
                uri.clone().connect().and_then(|stream| {
                    stream.into_native_tls(&connector, &uri.authority.host)
                })
            };

            Connection::connector(self.uri.clone(), Box::new(connect), self.properties.clone())
                .await
        } else {
            Connection::connect_uri(self.uri.clone(), self.properties.clone()).await
        }
    }
}

/// Credentials to place in the URI for PLAIN auth
fn user_info(plain: &PlainAuth) -> Result<lapin::uri::AMQPUserInfo> {
    Ok(lapin::uri::AMQPUserInfo {
        username: plain.user.clone(),
        // Exactly one of password or password file is normally set
        password: plain.password()?.unwrap_or_else(|| "guest".to_string()),
    })
}

/// Build the TLS connector from the key and CA files
fn tls_connector(tls: &TlsOptions) -> Result<TlsConnector> {
    let mut tls_builder = native_tls::TlsConnector::builder();
    if let Some(key) = &tls.key {
        tls_builder.identity(identity_from_file(key, tls.password.as_deref(), tls.prompt)?);
    }
    if let Some(cert) = &tls.ca_cert {
        tls_builder.add_root_certificate(ca_chain_from_file(cert)?);
        tls_builder.danger_accept_invalid_hostnames(true);
    }
    Ok(tls_builder.build()?)
}

/// Read a whole key or certificate file
fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::ReadFile {
        path: path.to_owned(),
        source,
    })
}

/// Load a TLS identity from p12 formatted file path
fn identity_from_file(
    p12_file: &Path,
    password: Option<&str>,
    prompt: bool,
) -> Result<native_tls::Identity> {
    let key_cert = read_file(p12_file)?;
    match native_tls::Identity::from_pkcs12(&key_cert, password.unwrap_or_default()) {
        Ok(ident) => Ok(ident),
        Err(e) if prompt => {
            warn!(error=?e, p12_file=%p12_file.display(), "Failed to open key with password");
            let password = rpassword::prompt_password("Key password: ").map_err(Error::Password)?;
            Ok(native_tls::Identity::from_pkcs12(&key_cert, &password)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load a certificate authority from a PEM formatted file path
fn ca_chain_from_file(pem_file: &Path) -> Result<native_tls::Certificate> {
    let ca_chain = read_file(pem_file)?;
    Ok(native_tls::Certificate::from_pem(&ca_chain)?)
}

impl From<&AuthMethod> for Option<lapin::auth::SASLMechanism> {
    fn from(val: &AuthMethod) -> Option<lapin::auth::SASLMechanism> {
        Some(match val {
            AuthMethod::Plain(_) => lapin::auth::SASLMechanism::Plain,
            AuthMethod::External => lapin::auth::SASLMechanism::External,
        })
    }
}
