mod bitfield;
mod block;
mod config;
mod de;
mod metainfo;
pub mod p2p;
pub mod tracker;

// 20 byte SHA1 info hash, also the size of a peer id.
pub type ID = [u8; 20];

// Re-exports
pub use bitfield::{Bitfield, BitfieldError};
pub use block::{BlockData, BlockInfo, BLOCK_SIZE};
pub use config::{Config, DEFAULT_MAX_FRAME_LEN};
pub use metainfo::{File, Info, MetaInfo, MetaInfoError};
