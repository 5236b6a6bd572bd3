//! The secure connection object.
//!
//! A [`Conn`] wraps a `TcpStream`, runs the configured handshake lazily on
//! first use, and then reads and writes length-prefixed AEAD records. The
//! send and receive directions live behind separate locks, so one reader
//! thread and one writer thread may operate concurrently; half-duplex mode
//! collapses this to strict alternation.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use murmur_handshake::{
    CipherState, HandshakeAction, HandshakeKeys, HandshakeState, PROOF_LEN, Role, Verifier,
};
use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::config::Config;
use crate::error::{self, Error};
use crate::record::{self, MAX_PLAINTEXT_LEN, Record};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Phase {
    Pending(Config),
    Established {
        hash: [u8; 32],
        remote_static: Option<[u8; 32]>,
    },
}

struct ReadHalf {
    recv: Option<CipherState>,
    /// Plaintext of the last record not yet handed to the caller.
    leftover: Vec<u8>,
    consumed: usize,
}

impl ReadHalf {
    fn clear(&mut self) {
        self.leftover.zeroize();
        self.leftover.clear();
        self.consumed = 0;
    }
}

struct WriteHalf {
    send: Option<CipherState>,
}

/// One end of an authenticated, confidential channel over TCP.
///
/// The handshake runs exactly once per connection, triggered by the first
/// `read`, `write`, or an explicit [`handshake`](Conn::handshake) call. Any
/// cryptographic failure poisons the connection: both cipher states are
/// zeroized, the socket is shut down, and every subsequent operation
/// returns the error that killed it.
pub struct Conn {
    stream: TcpStream,
    role: Role,
    half_duplex: bool,
    phase: Mutex<Phase>,
    read_half: Mutex<ReadHalf>,
    write_half: Mutex<WriteHalf>,
    /// Half-duplex floor: whether this side may send right now.
    may_send: AtomicBool,
    poison: Mutex<Option<Error>>,
}

impl Conn {
    /// Wrap an already-connected stream as the handshake initiator.
    pub fn client(stream: TcpStream, config: Config) -> Result<Conn, Error> {
        config.validate(Role::Initiator)?;
        Ok(Self::new(stream, config, Role::Initiator))
    }

    /// Wrap an already-connected stream as the handshake responder.
    pub fn server(stream: TcpStream, config: Config) -> Result<Conn, Error> {
        config.validate(Role::Responder)?;
        Ok(Self::new(stream, config, Role::Responder))
    }

    fn new(stream: TcpStream, config: Config, role: Role) -> Conn {
        Conn {
            stream,
            role,
            half_duplex: config.half_duplex,
            may_send: AtomicBool::new(role == Role::Initiator),
            phase: Mutex::new(Phase::Pending(config)),
            read_half: Mutex::new(ReadHalf {
                recv: None,
                leftover: Vec::new(),
                consumed: 0,
            }),
            write_half: Mutex::new(WriteHalf { send: None }),
            poison: Mutex::new(None),
        }
    }

    /// Run the handshake now if it has not run yet.
    ///
    /// Concurrent callers serialize here; whoever arrives after completion
    /// returns immediately.
    pub fn handshake(&self) -> Result<(), Error> {
        self.check_poison()?;
        let mut phase = lock(&self.phase);
        let config = match &*phase {
            Phase::Established { .. } => return Ok(()),
            Phase::Pending(config) => config.clone(),
        };
        match self.run_handshake(&config) {
            Ok((hash, remote_static)) => {
                *phase = Phase::Established {
                    hash,
                    remote_static,
                };
                debug!(
                    pattern = config.pattern.name(),
                    role = ?self.role,
                    "handshake complete"
                );
                Ok(())
            }
            Err(err) => {
                drop(phase);
                self.poison(err);
                Err(err)
            }
        }
    }

    fn run_handshake(&self, config: &Config) -> Result<([u8; 32], Option<[u8; 32]>), Error> {
        config.validate(self.role)?;

        let verifier = config.public_key_verifier.clone().map(|callback| {
            Box::new(move |public: &[u8; 32], proof: &[u8; PROOF_LEN]| callback(public, proof))
                as Verifier
        });
        let keys = HandshakeKeys {
            local_static: config.local_static.clone(),
            remote_static: config.remote_static,
            proof: config.static_public_key_proof.clone(),
            verifier,
            ..Default::default()
        };
        let mut handshake =
            HandshakeState::new(config.pattern, self.role, &config.prologue, keys)?;

        let mut stream = &self.stream;
        loop {
            match handshake.next_action() {
                HandshakeAction::WriteMessage => {
                    // Handshake messages carry no early data.
                    let message = handshake.write_message(&[])?;
                    trace!(len = message.len(), "handshake message out");
                    record::write_record(&mut stream, &message).map_err(error::from_io)?;
                }
                HandshakeAction::ReadMessage => {
                    let body = match record::read_record(&mut stream) {
                        Ok(Record::Complete(body)) => body,
                        Ok(Record::Eof) => return Err(Error::TransportClosed),
                        Err(err) => return Err(error::from_record_io(err, true)),
                    };
                    trace!(len = body.len(), "handshake message in");
                    handshake.read_message(&body)?;
                }
                HandshakeAction::Complete => break,
            }
        }

        let remote_static = handshake.remote_static();
        let transport = handshake.into_transport()?;
        let (hash, send, recv) = transport.into_split();
        lock(&self.write_half).send = Some(send);
        lock(&self.read_half).recv = Some(recv);
        Ok((hash, remote_static))
    }

    /// Read decrypted application data into `buf`.
    ///
    /// Serves leftover plaintext from a partially consumed record first;
    /// otherwise reads and decrypts exactly one record. Returns `Ok(0)` on
    /// clean end of stream at a record boundary.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.handshake()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut half = lock(&self.read_half);
        self.check_poison()?;

        while half.consumed == half.leftover.len() {
            half.clear();
            let body = match record::read_record(&mut &self.stream) {
                Ok(Record::Complete(body)) => body,
                Ok(Record::Eof) => return Ok(0),
                Err(err) => {
                    let err = error::from_record_io(err, false);
                    if err == Error::Timeout {
                        return Err(err);
                    }
                    drop(half);
                    self.poison(err);
                    return Err(err);
                }
            };
            let recv = half.recv.as_mut().ok_or(Error::TransportClosed)?;
            match recv.decrypt_with_ad(&[], &body) {
                Ok(plaintext) => {
                    half.leftover = plaintext;
                    half.consumed = 0;
                }
                Err(err) => {
                    let err = Error::from(err);
                    drop(half);
                    self.poison(err);
                    return Err(err);
                }
            }
        }

        let available = &half.leftover[half.consumed..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        half.consumed += n;
        if half.consumed == half.leftover.len() {
            half.clear();
        }
        drop(half);

        if self.half_duplex {
            self.may_send.store(true, Ordering::Release);
        }
        Ok(n)
    }

    /// Encrypt and send `buf`, fragmenting into records of at most
    /// [`MAX_PLAINTEXT_LEN`](crate::MAX_PLAINTEXT_LEN) plaintext bytes.
    ///
    /// In half-duplex mode, fails with [`Error::HalfDuplexViolation`] —
    /// without touching the stream — when the peer owns the floor.
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        self.handshake()?;
        if self.half_duplex && !self.may_send.load(Ordering::Acquire) {
            return Err(Error::HalfDuplexViolation);
        }
        let mut half = lock(&self.write_half);
        self.check_poison()?;

        let mut written = 0;
        for chunk in buf.chunks(MAX_PLAINTEXT_LEN) {
            let send = half.send.as_mut().ok_or(Error::TransportClosed)?;
            let ciphertext = match send.encrypt_with_ad(&[], chunk) {
                Ok(ciphertext) => ciphertext,
                Err(err) => {
                    let err = Error::from(err);
                    drop(half);
                    self.poison(err);
                    return Err(err);
                }
            };
            if let Err(err) = record::write_record(&mut &self.stream, &ciphertext) {
                let err = error::from_io(err);
                if err != Error::Timeout {
                    drop(half);
                    self.poison(err);
                }
                return Err(err);
            }
            written += chunk.len();
        }
        drop(half);

        if self.half_duplex {
            self.may_send.store(false, Ordering::Release);
        }
        Ok(written)
    }

    /// Shut the connection down.
    pub fn close(&self) -> Result<(), Error> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(error::from_io(err)),
        }
    }

    /// Set both the read and write timeout on the underlying stream.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), Error> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    /// Set the read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), Error> {
        self.stream.set_read_timeout(timeout).map_err(error::from_io)
    }

    /// Set the write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), Error> {
        self.stream
            .set_write_timeout(timeout)
            .map_err(error::from_io)
    }

    /// The local address of the underlying stream.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// The peer address of the underlying stream.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Whether the handshake has completed successfully.
    pub fn handshake_complete(&self) -> bool {
        matches!(*lock(&self.phase), Phase::Established { .. })
    }

    /// The final handshake hash, a channel-binding value both peers share.
    pub fn handshake_hash(&self) -> Option<[u8; 32]> {
        match *lock(&self.phase) {
            Phase::Established { hash, .. } => Some(hash),
            Phase::Pending(_) => None,
        }
    }

    /// The peer's Noise static public key, when the pattern revealed one.
    pub fn remote_static(&self) -> Option<[u8; 32]> {
        match *lock(&self.phase) {
            Phase::Established { remote_static, .. } => remote_static,
            Phase::Pending(_) => None,
        }
    }

    /// Rekey the send direction (Noise spec Section 11.3). Both peers must
    /// rekey the matching directions in lockstep.
    pub fn rekey_send(&self) -> Result<(), Error> {
        let mut half = lock(&self.write_half);
        let send = half.send.as_mut().ok_or(Error::HandshakeProtocol)?;
        send.rekey().map_err(Error::from)
    }

    /// Rekey the receive direction (Noise spec Section 11.3).
    pub fn rekey_recv(&self) -> Result<(), Error> {
        let mut half = lock(&self.read_half);
        let recv = half.recv.as_mut().ok_or(Error::HandshakeProtocol)?;
        recv.rekey().map_err(Error::from)
    }

    fn poison(&self, err: Error) {
        debug!(error = %err, "connection poisoned");
        {
            let mut slot = lock(&self.poison);
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        {
            let mut half = lock(&self.read_half);
            half.recv = None;
            half.clear();
        }
        lock(&self.write_half).send = None;
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn check_poison(&self) -> Result<(), Error> {
        match *lock(&self.poison) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("role", &self.role)
            .field("half_duplex", &self.half_duplex)
            .field("handshake_complete", &self.handshake_complete())
            .finish()
    }
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Conn::read(self, buf).map_err(io::Error::from)
    }
}

impl Read for &Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Conn::read(*self, buf).map_err(io::Error::from)
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Conn::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&self.stream).flush()
    }
}

impl Write for &Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Conn::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&self.stream).flush()
    }
}
