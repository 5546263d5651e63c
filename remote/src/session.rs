use std::sync::Arc;

use anyhow::{Context, anyhow};
use common::ConfigError;
use russh::client;
use tracing::instrument;

use crate::sftp::SftpFs;

pub const DEFAULT_PORT: u16 = 22;

/// How to prove the user's identity to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
    KeyPair {
        private_key: std::path::PathBuf,
        /// When given, must be the public half of `private_key`.
        public_key: Option<std::path::PathBuf>,
        passphrase: Option<String>,
    },
}

impl AuthMethod {
    fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::KeyPair { .. } => "public key",
        }
    }
}

// secrets stay out of logs
impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AuthMethod::Password(_) => write!(f, "Password(..)"),
            AuthMethod::KeyPair {
                private_key,
                public_key,
                passphrase,
            } => f
                .debug_struct("KeyPair")
                .field("private_key", private_key)
                .field("public_key", public_key)
                .field("passphrase", &passphrase.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthMethod,
    pub conn_timeout: std::time::Duration,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Empty("host"));
        }
        if self.user.is_empty() {
            return Err(ConfigError::Empty("user"));
        }
        match &self.auth {
            AuthMethod::Password(password) if password.is_empty() => {
                Err(ConfigError::Missing("password", "password"))
            }
            AuthMethod::KeyPair { private_key, .. } if private_key.as_os_str().is_empty() => {
                Err(ConfigError::Missing("private key", "public key"))
            }
            _ => Ok(()),
        }
    }
}

struct ClientHandler {
    host: String,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "accepting {} host key of {} without verification",
            server_public_key.algorithm(),
            &self.host
        );
        Ok(true)
    }
}

fn load_private_key(
    private_key: &std::path::Path,
    public_key: Option<&std::path::Path>,
    passphrase: Option<&str>,
) -> anyhow::Result<russh::keys::PrivateKey> {
    let key = russh::keys::load_secret_key(private_key, passphrase)
        .with_context(|| format!("cannot load private key {private_key:?}"))?;
    if let Some(public_key) = public_key {
        let public = russh::keys::load_public_key(public_key)
            .with_context(|| format!("cannot load public key {public_key:?}"))?;
        if public.key_data() != key.public_key().key_data() {
            return Err(anyhow!(
                "public key {:?} does not belong to private key {:?}",
                public_key,
                private_key
            ));
        }
    }
    Ok(key)
}

/// An authenticated SSH connection with an open SFTP channel.
pub struct Session {
    handle: client::Handle<ClientHandler>,
    fs: SftpFs,
}

impl Session {
    /// Remote endpoint served by this session.
    pub fn fs(&self) -> &SftpFs {
        &self.fs
    }

    /// Shuts down the SFTP channel and disconnects.
    #[instrument(skip(self))]
    pub async fn close(self) -> anyhow::Result<()> {
        if let Err(error) = self.fs.close().await {
            tracing::warn!("failed to close SFTP session cleanly: {:#}", &error);
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .context("failed to disconnect from the server")?;
        tracing::info!("disconnected");
        Ok(())
    }
}

/// Connects to the server, authenticates and opens the SFTP subsystem.
///
/// Key files are loaded before any network traffic so a bad key fails fast.
#[instrument]
pub async fn connect(config: &SessionConfig) -> anyhow::Result<Session> {
    config.validate()?;
    let key = match &config.auth {
        AuthMethod::KeyPair {
            private_key,
            public_key,
            passphrase,
        } => Some(load_private_key(
            private_key,
            public_key.as_deref(),
            passphrase.as_deref(),
        )?),
        AuthMethod::Password(_) => None,
    };
    let address = format!("{}:{}", config.host, config.port);
    tracing::info!("connecting to {}", &address);
    let handler = ClientHandler {
        host: config.host.clone(),
    };
    let ssh_config = Arc::new(client::Config::default());
    let mut handle = tokio::time::timeout(
        config.conn_timeout,
        client::connect(ssh_config, (config.host.as_str(), config.port), handler),
    )
    .await
    .map_err(|_| {
        anyhow!(
            "timed out connecting to {} after {:?}",
            &address,
            config.conn_timeout
        )
    })?
    .with_context(|| format!("failed to connect to {address}"))?;
    tracing::debug!("SSH handshake with {} complete", &address);
    let result = match (&config.auth, key) {
        (AuthMethod::Password(password), _) => handle
            .authenticate_password(config.user.as_str(), password.as_str())
            .await
            .context("password authentication failed")?,
        (AuthMethod::KeyPair { .. }, Some(key)) => {
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .context("failed to negotiate the signature algorithm")?
                .flatten();
            handle
                .authenticate_publickey(
                    config.user.as_str(),
                    russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await
                .context("public key authentication failed")?
        }
        (AuthMethod::KeyPair { .. }, None) => {
            return Err(anyhow!("private key was not loaded"));
        }
    };
    if let client::AuthResult::Failure {
        remaining_methods, ..
    } = result
    {
        return Err(anyhow!(
            "{} authentication as {:?} rejected by {}, the server accepts: {:?}",
            config.auth.name(),
            &config.user,
            &address,
            remaining_methods
        ));
    }
    tracing::info!(
        "authenticated as {:?} using {}",
        &config.user,
        config.auth.name()
    );
    let channel = handle
        .channel_open_session()
        .await
        .context("failed to open an SSH channel")?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .context("failed to request the SFTP subsystem")?;
    let sftp = russh_sftp::client::SftpSession::new(channel.into_stream())
        .await
        .context("failed to start the SFTP session")?;
    tracing::info!("SFTP session with {} established", &address);
    Ok(Session {
        handle,
        fs: SftpFs::new(sftp),
    })
}
