use bytes::Bytes;

// Standard request size, 16 KiB.
pub const BLOCK_SIZE: u32 = 0x4000;

// A span of a piece, as named by request and cancel messages.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct BlockInfo {

    pub piece_idx: u32,

    // Offset in bytes of block within piece.
    pub offset: u32,

    pub len: u32,

}

// Block contents carried by a piece message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {

    pub piece_idx: u32,

    pub offset: u32,

    pub data: Bytes,

}

impl BlockInfo {
    pub fn new(piece_idx: u32, offset: u32) -> Self {
        Self { piece_idx, offset, len: BLOCK_SIZE }
    }
}

impl BlockData {
    // The request this block answers.
    pub fn info(&self) -> BlockInfo {
        BlockInfo {
            piece_idx: self.piece_idx,
            offset: self.offset,
            len: self.data.len() as u32,
        }
    }
}
