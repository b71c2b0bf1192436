use std::io::Read;
use bytes::{BufMut, Buf, BytesMut};
use tokio_util::codec::{Encoder, Decoder};
use crate::ID;
use super::{PeerError, Result};

// Protocol name length and the reserved bytes, all as ASCII text.
pub const PREFIX: [u8; PREFIX_LEN] = *b"19BitTorrent protocol00000000";

const PREFIX_LEN: usize = 29;

// <"19BitTorrent protocol00000000"><info hash><peer id>
pub const HANDSHAKE_LEN: usize = PREFIX_LEN + 20 + 20;

#[derive(Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash:  ID,
    pub peer_id:    ID,
}

// Compares one field of a received handshake with the value we expect.
fn expect(field: &'static str, want: &[u8], got: &[u8]) -> Result<()> {
    if want != got {
        tracing::debug!("handshake {} mismatch", field);
        return Err(PeerError::Handshake {
            field,
            expected: hex::encode(want),
            found: hex::encode(got),
        });
    }
    Ok(())
}

impl Handshake {
    pub fn new(info_hash: ID, peer_id: ID) -> Self {
        Self { info_hash, peer_id }
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut out = [0; HANDSHAKE_LEN];
        out[..PREFIX_LEN].copy_from_slice(&PREFIX);
        out[PREFIX_LEN..PREFIX_LEN + 20].copy_from_slice(&self.info_hash);
        out[PREFIX_LEN + 20..].copy_from_slice(&self.peer_id);
        out
    }

    // Checks a complete received handshake field by field, in wire order.
    fn check(raw: &[u8], info_hash: &ID, peer_id: &ID) -> Result<Handshake> {
        expect("protocol", &PREFIX, &raw[..PREFIX_LEN])?;
        expect("info hash", info_hash, &raw[PREFIX_LEN..PREFIX_LEN + 20])?;
        expect("peer id", peer_id, &raw[PREFIX_LEN + 20..HANDSHAKE_LEN])?;
        Ok(Handshake::new(*info_hash, *peer_id))
    }
}

/// Reads a handshake from `r` and checks it against what we expect from this
/// peer: the fixed protocol prefix, then `info_hash`, then `peer_id`.
///
/// Each part is read and compared before the next is read, so a peer that
/// sends the wrong prefix is rejected without waiting for the rest. A short
/// read surfaces as `PeerError::Io`.
pub fn verify_handshake<R: Read>(r: &mut R, info_hash: &ID, peer_id: &ID) -> Result<Handshake> {
    let mut prefix_buf = [0; PREFIX_LEN];
    r.read_exact(&mut prefix_buf)?;
    expect("protocol", &PREFIX, &prefix_buf)?;

    let mut hash_buf = [0; 20];
    r.read_exact(&mut hash_buf)?;
    expect("info hash", info_hash, &hash_buf)?;

    let mut id_buf = [0; 20];
    r.read_exact(&mut id_buf)?;
    expect("peer id", peer_id, &id_buf)?;

    Ok(Handshake::new(hash_buf, id_buf))
}

// Streaming form of `verify_handshake`, yields once all 69 bytes are buffered.
pub struct HandshakeCodec {
    info_hash: ID,
    peer_id: ID,
}

impl HandshakeCodec {
    pub fn new(info_hash: ID, peer_id: ID) -> Self {
        Self { info_hash, peer_id }
    }
}

impl Encoder<Handshake> for HandshakeCodec {

    type Error = PeerError;

    fn encode(&mut self, item: Handshake, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&item.to_bytes());
        Ok(())
    }
}

impl Decoder for HandshakeCodec {

    type Item = Handshake;
    type Error = PeerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HANDSHAKE_LEN {
            // Fail early on a bad prefix rather than waiting for the whole handshake.
            let seen = src.len().min(PREFIX_LEN);
            expect("protocol", &PREFIX[..seen], &src[..seen])?;
            src.reserve(HANDSHAKE_LEN - src.len());
            return Ok(None);
        }
        let handshake = Handshake::check(&src[..HANDSHAKE_LEN], &self.info_hash, &self.peer_id)?;
        src.advance(HANDSHAKE_LEN);
        Ok(Some(handshake))
    }
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("info_hash", &hex::encode(self.info_hash))
            .field("peer_id", &String::from_utf8_lossy(&self.peer_id))
            .finish()
    }
}
