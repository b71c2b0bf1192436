use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use bytes::Buf;
use serde::de;
use serde_bytes::ByteBuf;
use serde_derive::Deserialize;
use crate::ID;

type Result<T> = std::result::Result<T, TrackerError>;

#[derive(thiserror::Error, Debug)]
pub enum TrackerError {

    #[error("error deserializing response: {0}")]
    Bencode(#[from] bencode::Error),

    #[error("tracker failure: {0}")]
    Failure(String),

    #[error("response missing {0}")]
    MissingField(&'static str),

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {

    // Only present in the dictionary model.
    pub id: Option<ID>,

    pub addr: SocketAddr,

}

/// A successful announce response.
#[derive(Debug, Clone)]
pub struct Announce {

    // Seconds to wait between regular announces.
    pub interval: u64,

    pub min_interval: Option<u64>,

    // Sent back on subsequent announces.
    pub tracker_id: Option<String>,

    // Seeders.
    pub complete: Option<u64>,

    // Leechers.
    pub incomplete: Option<u64>,

    pub warning_message: Option<String>,

    pub peers: Vec<Peer>,

}

#[derive(Deserialize, Debug, Default)]
struct Response {

    // If present, then no other keys are required.
    #[serde(rename = "failure reason")]
    failure_reason: Option<String>,

    // Shown like an error, but the response is still processed.
    #[serde(rename = "warning message")]
    warning_message: Option<String>,

    interval: Option<u64>,

    #[serde(rename = "min interval")]
    min_interval: Option<u64>,

    #[serde(rename = "tracker id")]
    tracker_id: Option<String>,

    complete: Option<u64>,

    incomplete: Option<u64>,

    #[serde(default)]
    #[serde(deserialize_with = "peers_deserialize")]
    peers: Option<Vec<Peer>>,
}

impl Announce {
    pub fn from_bytes(raw: &[u8]) -> Result<Announce> {
        let resp: Response = bencode::decode_bytes(raw)?;
        tracing::debug!("announce response: {:?}", resp);

        if let Some(failure) = resp.failure_reason {
            return Err(TrackerError::Failure(failure));
        }
        if let Some(warning) = &resp.warning_message {
            tracing::warn!("tracker warning: {}", warning);
        }

        Ok(Announce {
            interval: resp.interval.ok_or(TrackerError::MissingField("interval"))?,
            min_interval: resp.min_interval,
            tracker_id: resp.tracker_id,
            complete: resp.complete,
            incomplete: resp.incomplete,
            warning_message: resp.warning_message,
            peers: resp.peers.ok_or(TrackerError::MissingField("peers"))?,
        })
    }
}

// Peers come either as a list of dictionaries or as a compact string, the
// value's type says which.
fn peers_deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<Peer>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct PeerVisitor;

    impl<'de> de::Visitor<'de> for PeerVisitor {

        type Value = Vec<Peer>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string of bytes or a list of dictionaries")
        }

        // Compact model, 4 byte IPv4 address then 2 byte port, both big endian.
        fn visit_bytes<E>(self, mut v: &[u8]) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.len() % 6 != 0 {
                return Err(E::custom(format!("compact peers length {} not a multiple of 6", v.len())));
            }

            let mut peers = Vec::with_capacity(v.len() / 6);
            while v.has_remaining() {
                let ip = Ipv4Addr::from(v.get_u32());
                let port = v.get_u16();
                peers.push(Peer { id: None, addr: SocketAddr::new(IpAddr::V4(ip), port) });
            }
            Ok(peers)
        }

        // Dictionary model, each entry has "peer id", "ip" and "port".
        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            #[derive(Deserialize)]
            struct PeerItem {
                #[serde(default)]
                #[serde(rename = "peer id")]
                peer_id: Option<ByteBuf>,
                ip: String,
                port: u16,
            }

            let mut peers = Vec::new();
            while let Some(peer) = seq.next_element::<PeerItem>()? {
                // May also be a dns name, which we have no way to resolve here.
                let ip = match peer.ip.parse::<IpAddr>() {
                    Ok(ip) => ip,
                    Err(_) => {
                        tracing::debug!("skipping peer with unparsable ip: {}", peer.ip);
                        continue;
                    },
                };
                let id = peer.peer_id.and_then(|id| ID::try_from(id.as_slice()).ok());
                peers.push(Peer { id, addr: SocketAddr::new(ip, peer.port) });
            }
            Ok(peers)
        }
    }

    deserializer.deserialize_any(PeerVisitor).map(Some)
}
