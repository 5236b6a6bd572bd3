#![deny(unsafe_code)]

//! # murmur-net
//!
//! Authenticated, confidential channels over TCP, built on the
//! [`murmur-handshake`](murmur_handshake) Noise core.
//!
//! A [`Config`] selects one of the fifteen supported handshake patterns and
//! carries the key material and identity hooks the pattern demands. The
//! [`listen`]/[`dial`] entry points validate the config before any I/O,
//! then hand out [`Conn`]s that handshake lazily and exchange
//! length-prefixed AEAD records.
//!
//! Identity is bound with long-lived Ed25519 root keys: see
//! [`create_static_public_key_proof`], [`create_public_key_verifier`], and
//! the [`keys`] module for the on-disk formats.
//!
//! ```no_run
//! use murmur_net::{Config, HandshakePattern, KeyPair, dial};
//! use rand_core::OsRng;
//!
//! let mut config = Config::new(HandshakePattern::NK);
//! let server_pair = KeyPair::generate(&mut OsRng);
//! config.remote_static = Some(server_pair.public);
//!
//! let conn = dial("127.0.0.1:7000", config).unwrap();
//! conn.write(b"hello").unwrap();
//! ```

mod auth;
mod config;
mod conn;
mod error;
pub mod keys;
mod record;

pub use auth::{create_public_key_verifier, create_static_public_key_proof};
pub use config::{Config, VerifierFn};
pub use conn::Conn;
pub use error::Error;
pub use record::{MAX_MESSAGE_LEN, MAX_PLAINTEXT_LEN};

// Core types callers need to fill in a `Config`.
pub use murmur_handshake::{
    HandshakePattern, KeyPair, PROOF_LEN, PublicKey, Role, StaticSecret,
};

use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::debug;

/// A listener producing [`Conn`]s that act as handshake responders.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    config: Config,
}

impl Listener {
    /// Bind `addr` and serve connections under `config`.
    ///
    /// The config is validated for the responder role up front; a config
    /// error prevents any I/O.
    pub fn bind(addr: impl ToSocketAddrs, config: Config) -> Result<Listener, Error> {
        config.validate(Role::Responder)?;
        let inner = TcpListener::bind(addr).map_err(error::from_io)?;
        debug!(pattern = config.pattern.name(), "listening");
        Ok(Listener { inner, config })
    }

    /// Wait for the next incoming connection.
    ///
    /// The returned [`Conn`] has not handshaken yet; the handshake runs on
    /// its first read or write.
    pub fn accept(&self) -> Result<Conn, Error> {
        let (stream, peer) = self.inner.accept().map_err(error::from_io)?;
        debug!(peer = %peer, "accepted connection");
        Conn::server(stream, self.config.clone())
    }

    /// An iterator over incoming connections.
    pub fn incoming(&self) -> impl Iterator<Item = Result<Conn, Error>> + '_ {
        std::iter::from_fn(move || Some(self.accept()))
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// Bind `addr` and serve connections under `config`.
pub fn listen(addr: impl ToSocketAddrs, config: Config) -> Result<Listener, Error> {
    Listener::bind(addr, config)
}

/// Connect to `addr`, run the handshake as initiator, and return the
/// established connection.
pub fn dial(addr: impl ToSocketAddrs, config: Config) -> Result<Conn, Error> {
    config.validate(Role::Initiator)?;
    let stream = TcpStream::connect(addr).map_err(error::from_io)?;
    let conn = Conn::client(stream, config)?;
    conn.handshake()?;
    debug!("dialed connection established");
    Ok(conn)
}

/// Like [`dial`], with one deadline budget covering both the TCP connect
/// and the handshake.
pub fn dial_timeout(
    addr: &SocketAddr,
    timeout: Duration,
    config: Config,
) -> Result<Conn, Error> {
    config.validate(Role::Initiator)?;
    let start = Instant::now();
    let stream = TcpStream::connect_timeout(addr, timeout).map_err(error::from_io)?;

    let remaining = timeout
        .checked_sub(start.elapsed())
        .filter(|budget| !budget.is_zero())
        .ok_or(Error::Timeout)?;
    stream
        .set_read_timeout(Some(remaining))
        .and_then(|()| stream.set_write_timeout(Some(remaining)))
        .map_err(error::from_io)?;

    let conn = Conn::client(stream, config)?;
    conn.handshake()?;
    conn.set_timeout(None)?;
    debug!("dialed connection established");
    Ok(conn)
}
