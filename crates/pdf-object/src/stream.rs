use crate::dict::Dict;

/// A stream's payload, tracked so that raw and decoded bytes are never both
/// resident at once (spec §5 "Memory discipline"). Filter encode/decode
/// always consumes one variant and produces the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamData {
    Raw(Vec<u8>),
    Decoded(Vec<u8>),
}

impl StreamData {
    pub fn bytes(&self) -> &[u8] {
        match self {
            StreamData::Raw(b) | StreamData::Decoded(b) => b,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, StreamData::Raw(_))
    }
}

/// A PDF stream object: its dict header plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dict,
    pub data: StreamData,
}

impl Stream {
    pub fn new_raw(dict: Dict, raw: Vec<u8>) -> Self {
        Stream {
            dict,
            data: StreamData::Raw(raw),
        }
    }

    pub fn raw_len(&self) -> usize {
        self.data.bytes().len()
    }
}
