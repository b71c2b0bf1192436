use serde::{de, Deserialize};
use serde_bytes::ByteBuf;
use url::Url;

// Custom field deserializers for metainfo.

// Tracker urls arrive as byte strings which need not be UTF-8.
fn tracker_url<E: de::Error>(raw: &[u8]) -> Result<Url, E> {
    let s = std::str::from_utf8(raw)
        .map_err(|_| E::custom(format!("tracker url is not utf-8: {:?}", String::from_utf8_lossy(raw))))?;
    Url::parse(s).map_err(|e| E::custom(format!("invalid tracker url {:?}: {}", s, e)))
}

pub fn url_deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: de::Deserializer<'de>,
{
    tracker_url(&ByteBuf::deserialize(deserializer)?)
}

// Tiers of tracker urls. Empty lists, or lists of empty tiers, count as absent.
pub fn announce_list_deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<Vec<Url>>>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let tiers = Vec::<Vec<ByteBuf>>::deserialize(deserializer)?
        .iter()
        .map(|tier| tier.iter().map(|raw| tracker_url(raw)).collect::<Result<Vec<_>, _>>())
        .filter(|tier| !matches!(tier, Ok(urls) if urls.is_empty()))
        .collect::<Result<Vec<_>, D::Error>>()?;

    Ok(Some(tiers).filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_derive::Deserialize;

    #[derive(Deserialize)]
    struct Trackers {
        #[serde(deserialize_with = "url_deserialize")]
        announce: Url,
        #[serde(default)]
        #[serde(deserialize_with = "announce_list_deserialize")]
        list: Option<Vec<Vec<Url>>>,
    }

    #[test]
    fn test_tracker_urls() {
        let t: Trackers = bencode::decode_bytes(
            b"d8:announce11:udp://a:80/4:listll9:http://b/el9:http://c/9:http://d/eee"
        ).unwrap();
        assert_eq!(t.announce.as_str(), "udp://a:80/");
        let list = t.list.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1][1].as_str(), "http://d/");
    }

    #[test]
    fn test_empty_tiers_dropped() {
        let t: Trackers = bencode::decode_bytes(b"d8:announce9:http://a/4:listlleleee").unwrap();
        assert!(t.list.is_none());
    }

    #[test]
    fn test_bad_tracker_urls() {
        assert!(bencode::decode_bytes::<Trackers>(b"d8:announce3:\xff\xfe\xfde").is_err());
        assert!(bencode::decode_bytes::<Trackers>(b"d8:announce9:not a urle").is_err());
        assert!(bencode::decode_bytes::<Trackers>(b"d8:announce9:http://a/4:listll3:bogeee").is_err());
    }
}
