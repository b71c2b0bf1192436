use std::io::Read;
use bytes::{BufMut, Buf, Bytes, BytesMut};
use tokio_util::codec::{Encoder, Decoder};
use crate::block::{BlockData, BlockInfo};
use crate::bitfield::Bitfield;
use crate::config::DEFAULT_MAX_FRAME_LEN;
use super::{PeerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have,
    Bitfield,
    Request,
    Piece,
    Cancel,
    Port,
    // Zero length frame, carries no id.
    KeepAlive,
}

impl MessageKind {
    pub fn id(self) -> Option<u8> {
        match self {
            MessageKind::Choke => Some(0),
            MessageKind::Unchoke => Some(1),
            MessageKind::Interested => Some(2),
            MessageKind::NotInterested => Some(3),
            MessageKind::Have => Some(4),
            MessageKind::Bitfield => Some(5),
            MessageKind::Request => Some(6),
            MessageKind::Piece => Some(7),
            MessageKind::Cancel => Some(8),
            MessageKind::Port => Some(9),
            MessageKind::KeepAlive => None,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = PeerError;

    fn try_from(id: u8) -> Result<Self> {
        Ok(match id {
            0 => MessageKind::Choke,
            1 => MessageKind::Unchoke,
            2 => MessageKind::Interested,
            3 => MessageKind::NotInterested,
            4 => MessageKind::Have,
            5 => MessageKind::Bitfield,
            6 => MessageKind::Request,
            7 => MessageKind::Piece,
            8 => MessageKind::Cancel,
            9 => MessageKind::Port,
            id => {
                tracing::warn!("invalid message id: {}", id);
                return Err(PeerError::InvalidMessageId(id));
            },
        })
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::Choke => "choke",
            MessageKind::Unchoke => "unchoke",
            MessageKind::Interested => "interested",
            MessageKind::NotInterested => "not interested",
            MessageKind::Have => "have",
            MessageKind::Bitfield => "bitfield",
            MessageKind::Request => "request",
            MessageKind::Piece => "piece",
            MessageKind::Cancel => "cancel",
            MessageKind::Port => "port",
            MessageKind::KeepAlive => "keep alive",
        };
        f.write_str(name)
    }
}

/// Checks a frame's declared `length` (id byte plus payload) against the size
/// rules for its kind, and that the payload actually has `length - 1` bytes.
pub fn validate(kind: MessageKind, length: u32, payload: &[u8]) -> Result<()> {
    if kind == MessageKind::KeepAlive {
        if length != 0 {
            return Err(PeerError::InvalidLength { kind, length });
        }
        if !payload.is_empty() {
            return Err(PeerError::PayloadMismatch { declared: 0, found: payload.len() });
        }
        return Ok(());
    }

    let valid = match kind {
        MessageKind::Choke
        | MessageKind::Unchoke
        | MessageKind::Interested
        | MessageKind::NotInterested => length == 1,
        // have: <len=0005><id=4><piece index>
        MessageKind::Have => length == 5,
        // request/cancel: <len=0013><id><index><begin><length>
        MessageKind::Request | MessageKind::Cancel => length == 13,
        // port: <len=0003><id=9><listen-port>
        MessageKind::Port => length == 3,
        // piece: <len=0009+X><id=7><index><begin><block>
        MessageKind::Piece => length >= 9,
        // bitfield: <len=0001+X><id=5><bitfield>, sized against the piece count later.
        MessageKind::Bitfield => length >= 1,
        MessageKind::KeepAlive => length == 0,
    };
    if !valid {
        return Err(PeerError::InvalidLength { kind, length });
    }

    let declared = length as usize - 1;
    if payload.len() != declared {
        return Err(PeerError::PayloadMismatch { declared, found: payload.len() });
    }
    Ok(())
}

/// One validated peer wire message.
///
/// Only produced by the frame readers or the constructors below, so the
/// length and payload always satisfy `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    length: u32,
    payload: Bytes,
}

impl Message {

    fn new(kind: MessageKind, payload: Bytes) -> Result<Self> {
        let length = u32::try_from(payload.len() + 1)
            .map_err(|_| PeerError::FrameTooLarge { length: payload.len() as u64 + 1, max: u32::MAX })?;
        validate(kind, length, &payload)?;
        Ok(Self { kind, length, payload })
    }

    // Only for kinds whose payload size is fixed and known to match.
    fn fixed(kind: MessageKind, payload: Bytes) -> Self {
        Self { kind, length: payload.len() as u32 + 1, payload }
    }

    pub fn keep_alive() -> Self {
        Self { kind: MessageKind::KeepAlive, length: 0, payload: Bytes::new() }
    }

    pub fn choke() -> Self { Self::fixed(MessageKind::Choke, Bytes::new()) }

    pub fn unchoke() -> Self { Self::fixed(MessageKind::Unchoke, Bytes::new()) }

    pub fn interested() -> Self { Self::fixed(MessageKind::Interested, Bytes::new()) }

    pub fn not_interested() -> Self { Self::fixed(MessageKind::NotInterested, Bytes::new()) }

    pub fn have(piece_idx: u32) -> Self {
        Self::fixed(MessageKind::Have, Bytes::copy_from_slice(&piece_idx.to_be_bytes()))
    }

    pub fn bitfield(bitfield: &Bitfield) -> Result<Self> {
        Self::new(MessageKind::Bitfield, Bytes::copy_from_slice(bitfield.as_bytes()))
    }

    pub fn request(block: BlockInfo) -> Self {
        Self::fixed(MessageKind::Request, block_info_payload(block))
    }

    pub fn cancel(block: BlockInfo) -> Self {
        Self::fixed(MessageKind::Cancel, block_info_payload(block))
    }

    pub fn piece(block: &BlockData) -> Result<Self> {
        let mut payload = BytesMut::with_capacity(8 + block.data.len());
        payload.put_u32(block.piece_idx);
        payload.put_u32(block.offset);
        payload.extend_from_slice(&block.data);
        Self::new(MessageKind::Piece, payload.freeze())
    }

    pub fn port(port: u16) -> Self {
        Self::fixed(MessageKind::Port, Bytes::copy_from_slice(&port.to_be_bytes()))
    }

    pub fn kind(&self) -> MessageKind { self.kind }

    // Wire length prefix, 0 for keep alive.
    pub fn length(&self) -> u32 { self.length }

    pub fn payload(&self) -> &Bytes { &self.payload }

    pub fn have_index(&self) -> Option<u32> {
        match self.kind {
            MessageKind::Have => Some((&self.payload[..]).get_u32()),
            _ => None,
        }
    }

    pub fn block_info(&self) -> Option<BlockInfo> {
        match self.kind {
            MessageKind::Request | MessageKind::Cancel => {
                let mut p = &self.payload[..];
                Some(BlockInfo {
                    piece_idx: p.get_u32(),
                    offset: p.get_u32(),
                    len: p.get_u32(),
                })
            },
            _ => None,
        }
    }

    pub fn block_data(&self) -> Option<BlockData> {
        match self.kind {
            MessageKind::Piece => {
                let mut p = &self.payload[..8];
                Some(BlockData {
                    piece_idx: p.get_u32(),
                    offset: p.get_u32(),
                    data: self.payload.slice(8..),
                })
            },
            _ => None,
        }
    }

    pub fn port_number(&self) -> Option<u16> {
        match self.kind {
            MessageKind::Port => Some((&self.payload[..]).get_u16()),
            _ => None,
        }
    }

    // Interprets a bitfield message against the number of pieces in the torrent.
    pub fn to_bitfield(&self, num_pieces: usize) -> Result<Bitfield> {
        if self.kind != MessageKind::Bitfield {
            return Err(PeerError::UnexpectedKind { expected: MessageKind::Bitfield, found: self.kind });
        }
        Ok(Bitfield::wrap(self.payload.to_vec(), num_pieces)?)
    }

    // Length prefix, id and payload as sent on the wire.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(4 + self.length as usize);
        dst.put_u32(self.length);
        if let Some(id) = self.kind.id() {
            dst.put_u8(id);
        }
        dst.extend_from_slice(&self.payload);
    }
}

fn block_info_payload(block: BlockInfo) -> Bytes {
    let mut payload = BytesMut::with_capacity(12);
    payload.put_u32(block.piece_idx);
    payload.put_u32(block.offset);
    payload.put_u32(block.len);
    payload.freeze()
}

// Turns the body of a frame (everything after the length prefix) into a message.
fn parse_frame(length: u32, mut body: Bytes) -> Result<Message> {
    if body.is_empty() {
        return Ok(Message::keep_alive());
    }
    let kind = MessageKind::try_from(body.get_u8())?;
    validate(kind, length, &body)?;
    let msg = Message { kind, length, payload: body };
    tracing::trace!("decoded {}", msg);
    Ok(msg)
}

fn check_frame_len(length: u32, max: u32) -> Result<()> {
    if length > max {
        tracing::warn!("frame of {} bytes exceeds limit of {}", length, max);
        return Err(PeerError::FrameTooLarge { length: length as u64, max });
    }
    Ok(())
}

// Blocking read of a single message using the default frame limit.
pub fn read_message<R: Read>(r: &mut R) -> Result<Message> {
    read_message_with(r, DEFAULT_MAX_FRAME_LEN)
}

/// Reads exactly one frame from `r`: a 4 byte big endian length, then that
/// many bytes. Nothing past the frame is consumed. A short read at any point
/// is an I/O error.
pub fn read_message_with<R: Read>(r: &mut R, max_frame_len: u32) -> Result<Message> {
    let mut len_buf = [0; 4];
    r.read_exact(&mut len_buf)?;
    let length = u32::from_be_bytes(len_buf);
    if length == 0 {
        return Ok(Message::keep_alive());
    }
    check_frame_len(length, max_frame_len)?;

    let mut body = vec![0; length as usize];
    r.read_exact(&mut body)?;
    parse_frame(length, Bytes::from(body))
}

// Frames messages over an async byte stream with the same rules as `read_message`.
pub struct MessageCodec {
    max_frame_len: u32,
}

impl MessageCodec {
    pub fn new(max_frame_len: u32) -> Self {
        Self { max_frame_len }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl From<&crate::Config> for MessageCodec {
    fn from(config: &crate::Config) -> Self {
        Self::new(config.max_frame_len)
    }
}

impl Encoder<Message> for MessageCodec {

    type Error = PeerError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode_into(dst);
        Ok(())
    }
}

impl Decoder for MessageCodec {

    type Item = Message;
    type Error = PeerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {

        // Can't read message length.
        if src.len() < 4 { return Ok(None); }

        let length = (&src[..4]).get_u32();
        check_frame_len(length, self.max_frame_len)?;

        let frame_len = 4 + length as usize;
        if src.len() < frame_len {
            // Haven't received all of message.
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let body = src.split_to(length as usize).freeze();
        parse_frame(length, body).map(Some)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MessageKind::Have => write!(f, "have piece idx: {}", self.have_index().unwrap_or_default()),
            MessageKind::Bitfield => write!(f, "bitfield of {} bytes", self.payload.len()),
            MessageKind::Request | MessageKind::Cancel => match self.block_info() {
                Some(b) => write!(f, "{} for block {{ piece idx: {}, offset: {}, length: {} }}",
                    self.kind,
                    b.piece_idx,
                    b.offset,
                    b.len,
                ),
                None => write!(f, "{}", self.kind),
            },
            MessageKind::Piece => write!(f, "piece {{ length: {} }}", self.payload.len().saturating_sub(8)),
            MessageKind::Port => write!(f, "port {}", self.port_number().unwrap_or_default()),
            kind => write!(f, "{}", kind),
        }
    }
}
