use std::path::PathBuf;

use crate::error::{Error, Result};

/// Options controlling TLS connections and certificate based
/// authentication
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// P12 formatted key
    pub key: Option<PathBuf>,

    /// PEM formatted CA certificate chain
    pub ca_cert: Option<PathBuf>,

    /// Password for key, if encrypted
    pub password: Option<String>,

    /// Ask on the terminal for the key password if the key can't be
    /// opened with [`TlsOptions::password`]
    pub prompt: bool,
}

/// Server authentication method
#[derive(Clone, Debug)]
pub enum AuthMethod {
    /// Plain username/password authentication
    Plain(PlainAuth),
    /// External certificate based authentication
    External,
}

/// Username/password data for AMQP PLAIN auth method
#[derive(Clone, Debug)]
pub struct PlainAuth {
    /// Username for the RabbitMQ server
    pub user: String,

    /// Password for the RabbitMQ server
    pub password: Option<String>,

    /// Plain text file containing the password. A single trailing
    /// newline will be removed
    pub password_file: Option<PathBuf>,
}

impl Default for PlainAuth {
    fn default() -> Self {
        Self {
            user: "guest".to_string(),
            password: None,
            password_file: None,
        }
    }
}

impl PlainAuth {
    /// Return the password for PLAIN auth, or None if no password is
    /// given. The password file wins over the plain text password.
    pub fn password(&self) -> Result<Option<String>> {
        let Some(pfile) = &self.password_file else {
            return Ok(self.password.clone());
        };
        let p = std::fs::read_to_string(pfile).map_err(|source| Error::ReadFile {
            path: pfile.clone(),
            source,
        })?;
        Ok(Some(p.strip_suffix('\n').unwrap_or(&p).to_string()))
    }
}
