//! Length-prefixed record framing.
//!
//! Every message on the wire — handshake or transport — is
//! `u16 BE length || body`. Handshake message boundaries are exactly the
//! pattern's message boundaries; transport bodies are `ciphertext || tag`.

use std::io::{self, Read, Write};

use murmur_handshake::crypto::aead::TAG_LEN;

/// Maximum body length of a single record (65535 minus the 2-byte header).
pub const MAX_MESSAGE_LEN: usize = 65535 - 2;
/// Maximum plaintext carried by one transport record.
pub const MAX_PLAINTEXT_LEN: usize = MAX_MESSAGE_LEN - TAG_LEN;

/// Outcome of reading one record off the wire.
pub(crate) enum Record {
    /// A complete record body.
    Complete(Vec<u8>),
    /// The stream closed cleanly before any header byte arrived.
    Eof,
}

/// Read one length-prefixed record.
///
/// A close at a record boundary yields [`Record::Eof`]; a close mid-record
/// is `UnexpectedEof`, and an over-limit length header is `InvalidData`.
pub(crate) fn read_record(reader: &mut impl Read) -> io::Result<Record> {
    let mut header = [0u8; 2];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(Record::Eof);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed mid record header",
            ));
        }
        filled += n;
    }

    let length = u16::from_be_bytes(header) as usize;
    if length > MAX_MESSAGE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "record length exceeds protocol maximum",
        ));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;
    Ok(Record::Complete(body))
}

/// Write one length-prefixed record.
pub(crate) fn write_record(writer: &mut impl Write, body: &[u8]) -> io::Result<()> {
    debug_assert!(body.len() <= MAX_MESSAGE_LEN);
    let header = (body.len() as u16).to_be_bytes();
    writer.write_all(&header)?;
    writer.write_all(body)?;
    writer.flush()
}
