//! Events, buffers and the small value types flowing through the traits.

use std::{fmt, str::FromStr, time::Duration};

use bitflags::bitflags;

use crate::Error;

bitflags! {
    /// Seek behavior flags, parsed from symbolic form (`flush+accurate`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SeekFlags: u32 {
        /// Flush the pipeline before the new segment.
        const FLUSH = 1 << 0;
        /// Land exactly on the requested position.
        const ACCURATE = 1 << 1;
        /// Snap to the nearest keyframe.
        const KEY_UNIT = 1 << 2;
        /// Emit segment-done instead of EOS at segment end.
        const SEGMENT = 1 << 3;
        /// Snap to the position before the requested one.
        const SNAP_BEFORE = 1 << 4;
        /// Snap to the position after the requested one.
        const SNAP_AFTER = 1 << 5;
    }
}

impl FromStr for SeekFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut flags = SeekFlags::empty();
        for token in s.split('+').filter(|t| !t.is_empty()) {
            flags |= match token {
                "none" => SeekFlags::empty(),
                "flush" => SeekFlags::FLUSH,
                "accurate" => SeekFlags::ACCURATE,
                "key-unit" | "key_unit" => SeekFlags::KEY_UNIT,
                "segment" => SeekFlags::SEGMENT,
                "snap-before" | "snap_before" => SeekFlags::SNAP_BEFORE,
                "snap-after" | "snap_after" => SeekFlags::SNAP_AFTER,
                other => {
                    return Err(Error::UnknownName {
                        what: "seek flag",
                        value: other.to_string(),
                    });
                }
            };
        }
        Ok(flags)
    }
}

/// How a seek boundary value is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekType {
    /// Leave the boundary unchanged.
    None,
    /// Absolute position.
    #[default]
    Set,
    /// Relative to the end of the stream.
    End,
}

impl FromStr for SeekType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "none" => Ok(SeekType::None),
            "set" => Ok(SeekType::Set),
            "end" => Ok(SeekType::End),
            other => Err(Error::UnknownName {
                what: "seek type",
                value: other.to_string(),
            }),
        }
    }
}

/// A control event sent into the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Reposition playback.
    Seek {
        /// Playback rate; negative plays backwards.
        rate: f64,
        /// Behavior flags.
        flags: SeekFlags,
        /// How `start` is interpreted.
        start_type: SeekType,
        /// New segment start.
        start: Option<Duration>,
        /// How `stop` is interpreted.
        stop_type: SeekType,
        /// New segment stop.
        stop: Option<Duration>,
    },
    /// End of stream.
    Eos,
    /// Begin flushing.
    FlushStart,
    /// Stop flushing.
    FlushStop {
        /// Whether running time resets to zero.
        reset_time: bool,
    },
    /// Select a new set of streams by id (stream-aware pipelines).
    SelectStreams {
        /// The full new selection.
        streams: Vec<String>,
    },
    /// A new stream starts flowing on a pad.
    StreamStart {
        /// Id of the starting stream, when known.
        stream_id: Option<String>,
    },
}

bitflags! {
    /// Flags carried by a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BufferFlags: u32 {
        /// First buffer after a discontinuity.
        const DISCONT = 1 << 0;
    }
}

/// A chunk of media data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Buffer flags.
    pub flags: BufferFlags,
}

impl Buffer {
    /// Wrap bytes into a flag-less buffer.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            flags: BufferFlags::empty(),
        }
    }
}

/// A buffer plus the caps it was negotiated with.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The sample payload.
    pub buffer: Buffer,
    /// Negotiated caps, serialized.
    pub caps: Option<String>,
}

/// Result of a latency query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    /// Minimum latency across the pipeline.
    pub min: Duration,
    /// Maximum latency, unbounded when `None`.
    pub max: Option<Duration>,
    /// Whether a live source is involved.
    pub live: bool,
}

/// Flow result for buffer pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowReturn {
    /// Data accepted.
    Ok,
    /// The pad is flushing.
    Flushing,
    /// The pad saw end-of-stream.
    Eos,
    /// The pad is not linked.
    NotLinked,
    /// Fatal error.
    Error,
}

/// Track categories for stream selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Audio track.
    Audio,
    /// Video track.
    Video,
    /// Subtitle/text track.
    Text,
}

impl FromStr for StreamType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "audio" => Ok(StreamType::Audio),
            "video" => Ok(StreamType::Video),
            "text" => Ok(StreamType::Text),
            other => Err(Error::UnknownName {
                what: "stream type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamType::Audio => "audio",
            StreamType::Video => "video",
            StreamType::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// One stream in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Unique stream id.
    pub id: String,
    /// Track category.
    pub stream_type: StreamType,
}

impl StreamInfo {
    /// Convenience constructor.
    pub fn new(id: impl Into<String>, stream_type: StreamType) -> Self {
        Self {
            id: id.into(),
            stream_type,
        }
    }
}

/// Detail level for topology dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotDetails(pub i32);

impl DotDetails {
    /// Everything.
    pub const ALL: Self = Self(-1);
}

impl Default for DotDetails {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_flags_parse() {
        let flags: SeekFlags = "flush+accurate".parse().unwrap();
        assert!(flags.contains(SeekFlags::FLUSH | SeekFlags::ACCURATE));
        assert!(!flags.contains(SeekFlags::KEY_UNIT));
        assert_eq!("none".parse::<SeekFlags>().unwrap(), SeekFlags::empty());
        assert!("flush+sideways".parse::<SeekFlags>().is_err());
    }

    #[test]
    fn stream_type_parse() {
        assert_eq!("audio".parse::<StreamType>().unwrap(), StreamType::Audio);
        assert!("smell".parse::<StreamType>().is_err());
    }
}
