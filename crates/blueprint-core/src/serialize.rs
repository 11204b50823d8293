//! Binary encoding of history snapshots for the diagnostic stream.
//!
//! Payloads are `bitcode` behind a versioned header so a reader can reject
//! foreign or future data before trusting the contents.

use serde::{Deserialize, Serialize};

use crate::history::{FrameHistory, FrameSnapshot};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a blueprint snapshot stream.
pub const SNAPSHOT_MAGIC: u32 = 0xB1E0_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("{0} snapshots do not fit in one stream")]
    TooManySnapshots(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Number of snapshots in the payload.
    pub count: u32,
}

impl SnapshotHeader {
    pub fn new(count: usize) -> Result<Self, SerializeError> {
        let count = u32::try_from(count).map_err(|_| SerializeError::TooManySnapshots(count))?;
        Ok(Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            count,
        })
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotStream {
    header: SnapshotHeader,
    snapshots: Vec<FrameSnapshot>,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

fn encode(snapshots: Vec<FrameSnapshot>) -> Result<Vec<u8>, SerializeError> {
    let stream = SnapshotStream {
        header: SnapshotHeader::new(snapshots.len())?,
        snapshots,
    };
    bitcode::serialize(&stream).map_err(|e| SerializeError::Encode(e.to_string()))
}

fn decode(data: &[u8]) -> Result<Vec<FrameSnapshot>, DeserializeError> {
    let stream: SnapshotStream =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    stream.header.validate()?;
    if stream.header.count as usize != stream.snapshots.len() {
        return Err(DeserializeError::Decode(format!(
            "header announces {} snapshots, payload has {}",
            stream.header.count,
            stream.snapshots.len()
        )));
    }
    Ok(stream.snapshots)
}

pub fn encode_snapshot(snapshot: &FrameSnapshot) -> Result<Vec<u8>, SerializeError> {
    encode(vec![snapshot.clone()])
}

pub fn decode_snapshot(data: &[u8]) -> Result<FrameSnapshot, DeserializeError> {
    let mut snapshots = decode(data)?;
    match snapshots.pop() {
        Some(snapshot) if snapshots.is_empty() => Ok(snapshot),
        _ => Err(DeserializeError::Decode(
            "expected exactly one snapshot".to_string(),
        )),
    }
}

/// Encode every retained snapshot of `history`, oldest first.
pub fn encode_history(history: &FrameHistory) -> Result<Vec<u8>, SerializeError> {
    encode(history.export())
}

pub fn decode_history(data: &[u8]) -> Result<Vec<FrameSnapshot>, DeserializeError> {
    decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BlueprintFrame;
    use crate::id::ActionIndex;
    use crate::state::Phase;
    use crate::test_utils::linear_graph;

    fn history_with_two_ticks() -> FrameHistory {
        let mut frame = BlueprintFrame::load(linear_graph(&["delay"])).unwrap();
        let mut history = FrameHistory::new(4);
        history.reset(&frame);
        frame.begin_tick();
        frame.complete_and_emit(ActionIndex(0), "out");
        history.record(&frame);
        frame.begin_tick();
        history.record(&frame);
        history
    }

    #[test]
    fn snapshot_survives_encoding() {
        let history = history_with_two_ticks();
        let snapshot = history.get(1).unwrap();
        let data = encode_snapshot(snapshot).unwrap();
        let decoded = decode_snapshot(&data).unwrap();
        assert_eq!(&decoded, snapshot);
        assert_eq!(decoded.phase(ActionIndex(0)), Phase::Completed);
        assert_eq!(decoded.pending.len(), 1);
    }

    #[test]
    fn history_stream_keeps_order() {
        let history = history_with_two_ticks();
        let data = encode_history(&history).unwrap();
        let decoded = decode_history(&data).unwrap();
        let ticks: Vec<u64> = decoded.iter().map(|s| s.tick_count).collect();
        assert_eq!(ticks, vec![1, 2]);
    }

    #[test]
    fn single_decode_rejects_multi_snapshot_stream() {
        let history = history_with_two_ticks();
        let data = encode_history(&history).unwrap();
        assert!(matches!(
            decode_snapshot(&data),
            Err(DeserializeError::Decode(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let garbage = vec![0u8; 10];
        assert!(decode_snapshot(&garbage).is_err());
        assert!(decode_history(&[0xFF; 3]).is_err());
    }

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::new(1).unwrap().validate().is_ok());

        let mut header = SnapshotHeader::new(1).unwrap();
        header.magic = 0xDEAD_BEEF;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));

        let mut header = SnapshotHeader::new(1).unwrap();
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::FutureVersion(_))
        ));

        let mut header = SnapshotHeader::new(1).unwrap();
        header.version = 0;
        assert!(matches!(
            header.validate(),
            Err(DeserializeError::UnsupportedVersion(0))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_count_is_an_error() {
        let count = u32::MAX as usize + 1;
        assert!(matches!(
            SnapshotHeader::new(count),
            Err(SerializeError::TooManySnapshots(c)) if c == count
        ));
        assert_eq!(SnapshotHeader::new(u32::MAX as usize).unwrap().count, u32::MAX);
    }
}
