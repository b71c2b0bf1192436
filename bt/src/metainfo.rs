use serde_derive::{Deserialize, Serialize};
use crate::{bitfield::{Bitfield, BitfieldError}, ID};

type Result<T> = std::result::Result<T, MetaInfoError>;

#[derive(Debug, thiserror::Error)]
pub enum MetaInfoError {

    #[error("bencode error whilst decoding metainfo: {0}")]
    Bencode(#[from] bencode::Error),

    #[error("invalid file extension, expected .torrent")]
    InvalidExtension,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid pieces length {0}, must be a non-zero multiple of 20")]
    InvalidPiecesLength(usize),

    #[error("negative {0}")]
    NegativeLength(&'static str),

    #[error("info has both length and files")]
    LengthAndFiles,

    #[error("info has neither length nor files")]
    NeitherLengthNorFiles,

    #[error("file(s) with empty path or path segment")]
    FileEmptyPath,

    #[error("metainfo has no info dictionary")]
    MissingInfo,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct File {

    pub path: Vec<String>,

    pub length: i64,

    #[serde(default)]
    pub md5sum: Option<String>,

}

#[derive(Clone, Deserialize, Serialize)]
pub struct Info {

    // Suggested file name, or directory name for multi file torrents.
    pub name: String,

    // Concatenation of the 20 byte SHA1 hash of every piece.
    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,

    #[serde(rename = "piece length")]
    pub piece_length: i64,

    // Single file torrents only.
    #[serde(default)]
    pub length: Option<i64>,

    // Multi file torrents only.
    #[serde(default)]
    pub files: Option<Vec<File>>,

    // If set to 1, peers must only be obtained from the listed trackers.
    #[serde(default)]
    pub private: Option<u8>,

    #[serde(default)]
    pub md5sum: Option<String>,

}

impl Info {
    fn validate(&self) -> Result<()> {
        if self.piece_length < 0 {
            return Err(MetaInfoError::NegativeLength("piece length"));
        }
        if self.pieces.is_empty() || self.pieces.len() % 20 != 0 {
            return Err(MetaInfoError::InvalidPiecesLength(self.pieces.len()));
        }

        match (&self.length, &self.files) {
            (Some(_), Some(_)) => Err(MetaInfoError::LengthAndFiles),
            (None, None) => Err(MetaInfoError::NeitherLengthNorFiles),
            (Some(length), None) if *length < 0 => Err(MetaInfoError::NegativeLength("length")),
            (Some(_), None) => Ok(()),
            (None, Some(files)) => {
                for file in files {
                    if file.length < 0 {
                        return Err(MetaInfoError::NegativeLength("file length"));
                    }
                    if file.path.is_empty() || file.path.iter().any(String::is_empty) {
                        return Err(MetaInfoError::FileEmptyPath);
                    }
                }
                Ok(())
            },
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct MetaInfo {

    // The announce URL of the tracker.
    #[serde(deserialize_with = "crate::de::url_deserialize")]
    pub announce: url::Url,

    pub info: Info,

    // SHA1 of the info dictionary exactly as it appeared in the file.
    #[serde(skip)]
    info_hash: ID,

    #[serde(skip)]
    info_raw: Vec<u8>,

    // Encoding of the strings in the info dictionary.
    #[serde(default)]
    pub encoding: Option<String>,

    // Tiers of backup trackers.
    #[serde(default)]
    #[serde(rename = "announce-list")]
    #[serde(deserialize_with = "crate::de::announce_list_deserialize")]
    pub announce_list: Option<Vec<Vec<url::Url>>>,

    // Seconds since the unix epoch.
    #[serde(default)]
    #[serde(rename = "creation date")]
    pub creation_date: Option<i64>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    #[serde(rename = "created by")]
    pub created_by: Option<String>,

}

impl MetaInfo {

    /// Decodes and validates a metainfo document.
    ///
    /// The info hash is taken over the `info` value's bytes as found in `raw`,
    /// not over a re-encoding, so non canonical files still hash the way
    /// trackers and peers expect.
    pub fn from_bytes(raw: &[u8]) -> Result<MetaInfo> {
        use sha1::Digest;

        let mut metainfo: MetaInfo = bencode::decode_bytes(raw)?;
        metainfo.info.validate()?;

        let info_raw = bencode::find_raw(raw, b"info")
            .map_err(bencode::Error::from)?
            .ok_or(MetaInfoError::MissingInfo)?;
        metainfo.info_hash = sha1::Sha1::digest(info_raw).into();
        metainfo.info_raw = info_raw.to_vec();

        tracing::debug!("metainfo decoded: {:#?}", metainfo);
        Ok(metainfo)
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<MetaInfo> {
        if path.as_ref().extension().unwrap_or_default() != "torrent" {
            return Err(MetaInfoError::InvalidExtension);
        }
        Self::from_bytes(&std::fs::read(path)?)
    }

    pub fn piece_hashes(&self) -> Vec<ID> {
        self.info.pieces
            .chunks_exact(20)
            .map(|c| {
                let mut hash = [0; 20];
                hash.copy_from_slice(c);
                hash
            })
            .collect()
    }

    pub fn piece_len(&self) -> u64 { self.info.piece_length as u64 }

    // Size of the piece at `index`, the final piece may be short.
    pub fn piece_size(&self, index: usize) -> Option<u64> {
        if index >= self.num_pieces() {
            return None;
        }
        let start = index as u64 * self.piece_len();
        Some(self.piece_len().min(self.total_len().saturating_sub(start)))
    }

    pub fn num_pieces(&self) -> usize { self.info.pieces.len() / 20 }

    pub fn is_multi_file(&self) -> bool { self.info.files.is_some() }

    pub fn total_len(&self) -> u64 {
        if let Some(files) = &self.info.files {
            files.iter().map(|f| f.length as u64).sum()
        } else {
            self.info.length.unwrap_or(0) as u64
        }
    }

    pub fn info_hash(&self) -> ID { self.info_hash }

    pub fn info_hash_hex(&self) -> String { hex::encode(self.info_hash) }

    // Bytes of the info dictionary as they appeared in the document.
    pub fn info_raw(&self) -> &[u8] { &self.info_raw }

    pub fn name(&self) -> &str { &self.info.name }

    // Empty have set sized to this torrent.
    pub fn new_bitfield(&self) -> std::result::Result<Bitfield, BitfieldError> {
        Bitfield::new(self.num_pieces())
    }

    pub fn creation_date_fmt(&self) -> Option<String> {
        self.creation_date.map(|v| {
            chrono::DateTime::from_timestamp(v, 0)
                .map(|v| v.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "Invalid date".to_string())
        })
    }
}

impl std::fmt::Debug for MetaInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaInfo")
            .field("announce", &self.announce.as_str())
            .field("info", &self.info)
            .field("info_hash", &self.info_hash_hex())
            .field("encoding", &self.encoding)
            .field("announce_list", &self.announce_list.as_ref().map(|tiers|
                tiers.iter()
                    .map(|tier| tier.iter().map(url::Url::as_str).collect())
                    .collect::<Vec<Vec<&str>>>()
            ))
            .field("creation_date", &self.creation_date_fmt())
            .field("comment", &self.comment)
            .field("created_by", &self.created_by)
            .finish()
    }
}

// Piece hashes are noise in logs, only their count is shown.
impl std::fmt::Debug for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Info")
            .field("name", &self.name)
            .field("num pieces", &(self.pieces.len() / 20))
            .field("piece_length", &self.piece_length)
            .field("length", &self.length)
            .field("files", &self.files)
            .field("private", &self.private)
            .field("md5sum", &self.md5sum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use super::*;

    const SINGLE: &[u8] = b"d8:announce31:http://tracker.example/announce13:creation datei1600000000e4:infod6:lengthi40000e4:name8:test.iso12:piece lengthi16384e6:pieces60:aaaaaaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbbbbbccccccccccccccccccccee";

    fn multi(files: &str) -> Vec<u8> {
        format!(
            "d8:announce14:http://t/annce13:announce-listll14:http://t/annceelel9:udp://b:1ee4:infod5:filesl{}e4:name3:dir12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee",
            files,
        ).into_bytes()
    }

    #[test]
    fn test_single_file() {
        let metainfo = MetaInfo::from_bytes(SINGLE).unwrap();
        assert_eq!(metainfo.announce.as_str(), "http://tracker.example/announce");
        assert_eq!(metainfo.name(), "test.iso");
        assert_eq!(metainfo.num_pieces(), 3);
        assert_eq!(metainfo.piece_len(), 16384);
        assert_eq!(metainfo.total_len(), 40000);
        assert!(!metainfo.is_multi_file());
        assert_eq!(metainfo.piece_hashes()[1], [b'b'; 20]);
        assert_eq!(metainfo.info_hash_hex(), "a57ad12a55596059abca39243e0d17f8e77d5558");
        assert_eq!(metainfo.creation_date_fmt().as_deref(), Some("2020-09-13 12:26:40"));
        assert_eq!(metainfo.announce_list, None);
    }

    #[test]
    fn test_info_raw_is_input_slice() {
        let metainfo = MetaInfo::from_bytes(SINGLE).unwrap();
        let start = SINGLE.windows(7).position(|w| w == b"4:infod").unwrap() + 6;
        assert_eq!(metainfo.info_raw(), &SINGLE[start..SINGLE.len() - 1]);
    }

    #[test]
    fn test_piece_size() {
        let metainfo = MetaInfo::from_bytes(SINGLE).unwrap();
        assert_eq!(metainfo.piece_size(0), Some(16384));
        assert_eq!(metainfo.piece_size(2), Some(40000 - 2 * 16384));
        assert_eq!(metainfo.piece_size(3), None);
    }

    #[test]
    fn test_new_bitfield() {
        let metainfo = MetaInfo::from_bytes(SINGLE).unwrap();
        let mut have = metainfo.new_bitfield().unwrap();
        assert_eq!(have.len(), 3);
        assert_eq!(have.next_true(), (3, true));
        assert_eq!(have.next_false(), (0, false));
    }

    #[test]
    fn test_multi_file() {
        let raw = multi("d6:lengthi10e4:pathl1:a5:b.bineed6:lengthi5e4:pathl1:cee");
        let metainfo = MetaInfo::from_bytes(&raw).unwrap();
        assert!(metainfo.is_multi_file());
        assert_eq!(metainfo.total_len(), 15);
        let files = metainfo.info.files.as_ref().unwrap();
        assert_eq!(files[0].path, ["a", "b.bin"]);
        // The empty tier is dropped.
        let tiers = metainfo.announce_list.as_ref().unwrap();
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[1][0].as_str(), "udp://b:1");
    }

    #[test]
    fn test_invalid_files() {
        let cases = [
            "d6:lengthi10e4:pathlee",
            "d6:lengthi10e4:pathl1:a0:ee",
            "d6:lengthi-1e4:pathl1:aee",
        ];
        let raw = multi(cases[0]);
        assert!(matches!(MetaInfo::from_bytes(&raw), Err(MetaInfoError::FileEmptyPath)));
        let raw = multi(cases[1]);
        assert!(matches!(MetaInfo::from_bytes(&raw), Err(MetaInfoError::FileEmptyPath)));
        let raw = multi(cases[2]);
        assert!(matches!(MetaInfo::from_bytes(&raw), Err(MetaInfoError::NegativeLength(_))));
    }

    #[test]
    fn test_invalid_info() {
        let both = b"d8:announce8:http://t4:infod5:filesle6:lengthi1e4:name1:n12:piece lengthi1e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        assert!(matches!(MetaInfo::from_bytes(both), Err(MetaInfoError::LengthAndFiles)));

        let neither = b"d8:announce8:http://t4:infod4:name1:n12:piece lengthi1e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        assert!(matches!(MetaInfo::from_bytes(neither), Err(MetaInfoError::NeitherLengthNorFiles)));

        let short = b"d8:announce8:http://t4:infod6:lengthi1e4:name1:n12:piece lengthi1e6:pieces3:abcee";
        assert!(matches!(MetaInfo::from_bytes(short), Err(MetaInfoError::InvalidPiecesLength(3))));

        let negative = b"d8:announce8:http://t4:infod6:lengthi1e4:name1:n12:piece lengthi-1e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        assert!(matches!(MetaInfo::from_bytes(negative), Err(MetaInfoError::NegativeLength("piece length"))));
    }

    #[test]
    fn test_missing_field_and_bad_url() {
        let no_info = b"d8:announce8:http://te";
        assert!(matches!(MetaInfo::from_bytes(no_info), Err(MetaInfoError::Bencode(_))));

        let bad_url = b"d8:announce9:not a url4:infod6:lengthi1e4:name1:n12:piece lengthi1e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        assert!(matches!(MetaInfo::from_bytes(bad_url), Err(MetaInfoError::Bencode(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("test.torrent");
        std::fs::File::create(&path).unwrap().write_all(SINGLE).unwrap();
        let metainfo = MetaInfo::from_file(&path).unwrap();
        assert_eq!(metainfo.num_pieces(), 3);

        let wrong_ext = dir.path().join("test.txt");
        std::fs::write(&wrong_ext, SINGLE).unwrap();
        assert!(matches!(MetaInfo::from_file(&wrong_ext), Err(MetaInfoError::InvalidExtension)));

        let missing = dir.path().join("missing.torrent");
        assert!(matches!(MetaInfo::from_file(&missing), Err(MetaInfoError::Io(_))));
    }

    #[test]
    fn debug_meta_info() {
        let metainfo = MetaInfo::from_bytes(SINGLE).unwrap();
        let out = format!("{:?}", metainfo);
        assert!(out.contains("a57ad12a55596059abca39243e0d17f8e77d5558"));
        assert!(out.contains("num pieces: 3"));
    }
}
