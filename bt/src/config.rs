use crate::{p2p::handshake::Handshake, ID};

// Largest piece message carrying a standard block, plus headroom for bitfields
// of very large torrents.
pub const DEFAULT_MAX_FRAME_LEN: u32 = (1 << 20) + 13;

#[derive(Debug, Clone)]
pub struct Config {

    // Peer id presented in handshakes.
    pub client_id: ID,

    // Length prefixes above this are rejected before the frame is buffered.
    pub max_frame_len: u32,

}

const DEFAULT_CLIENT_ID: ID = *b"-BT0001-4e3f1c2a9b7d";

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl Config {
    pub fn handshake(&self, info_hash: ID) -> Handshake {
        Handshake::new(info_hash, self.client_id)
    }
}
