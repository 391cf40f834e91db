//! Controller wire frames and the length-prefixed JSON codec.
//!
//! The remote stream is one-way: after connecting, the client writes a
//! single startup frame, then one frame per report or action event. Every
//! frame is a 4-byte big-endian byte length followed by a UTF-8 JSON
//! object.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Handshake frame written once after `connect()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartupFrame {
    /// Session UUID handed to the engine through the environment.
    pub uuid: String,
    /// Always true; marks the start of a session.
    pub started: bool,
}

/// One reported issue occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportFrame {
    /// Frame discriminator, always `report`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Interned issue key (`area::name`).
    #[serde(rename = "issue-id")]
    pub issue_id: String,
    /// One-line issue summary.
    pub summary: String,
    /// Severity name (`issue`, `warning`, `critical`, `ignore`).
    pub level: String,
    /// Reporter name, plus any shadow reporter names.
    #[serde(rename = "detected-on")]
    pub detected_on: Vec<String>,
    /// Free-text details.
    pub details: String,
}

impl ReportFrame {
    /// Build a report frame with the discriminator filled in.
    pub fn new(
        issue_id: impl Into<String>,
        summary: impl Into<String>,
        level: impl Into<String>,
        detected_on: Vec<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind: "report".into(),
            issue_id: issue_id.into(),
            summary: summary.into(),
            level: level.into(),
            detected_on,
            details: details.into(),
        }
    }
}

/// An action about to execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionFrame {
    /// Frame discriminator, always `action`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action type name.
    #[serde(rename = "action-type")]
    pub action_type: String,
    /// Scheduled stream position in seconds, when set.
    #[serde(rename = "playback-time", skip_serializing_if = "Option::is_none")]
    pub playback_time: Option<f64>,
    /// The action's argument structure, serialized as a JSON object.
    pub arguments: serde_json::Value,
}

impl ActionFrame {
    /// Build an action frame with the discriminator filled in.
    pub fn new(
        action_type: impl Into<String>,
        playback_time: Option<f64>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            kind: "action".into(),
            action_type: action_type.into(),
            playback_time,
            arguments,
        }
    }
}

/// An action that finished executing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionDoneFrame {
    /// Frame discriminator, always `action-done`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action type name.
    #[serde(rename = "action-type")]
    pub action_type: String,
    /// Wall-clock execution duration in seconds.
    #[serde(rename = "execution-duration")]
    pub execution_duration: f64,
}

impl ActionDoneFrame {
    /// Build an action-done frame with the discriminator filled in.
    pub fn new(action_type: impl Into<String>, execution_duration: f64) -> Self {
        Self {
            kind: "action-done".into(),
            action_type: action_type.into(),
            execution_duration,
        }
    }
}

/// Encode one frame: 4-byte big-endian length, then the JSON body.
pub fn encode_frame<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(body)?;
    let mut out = Vec::with_capacity(json.len() + 4);
    out.extend_from_slice(&(json.len() as u32).to_be_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

/// Split a byte stream back into its JSON bodies.
///
/// The concatenation of valid frames always splits losslessly; trailing
/// or truncated bytes are an error.
pub fn decode_frames(mut bytes: &[u8]) -> Result<Vec<serde_json::Value>> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 4 {
            return Err(Error::BadFrame("truncated length prefix".into()));
        }
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let rest = &bytes[4..];
        if rest.len() < len {
            return Err(Error::BadFrame(format!(
                "body truncated: expected {} bytes, have {}",
                len,
                rest.len()
            )));
        }
        frames.push(serde_json::from_slice(&rest[..len])?);
        bytes = &rest[len..];
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let frames: Vec<Vec<u8>> = vec![
            encode_frame(&StartupFrame {
                uuid: "abc".into(),
                started: true,
            })
            .unwrap(),
            encode_frame(&ActionFrame::new("seek", Some(0.5), serde_json::json!({"start": 5.0})))
                .unwrap(),
            encode_frame(&ActionDoneFrame::new("seek", 0.25)).unwrap(),
        ];
        let stream: Vec<u8> = frames.concat();

        let decoded = decode_frames(&stream).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0]["uuid"], "abc");
        assert_eq!(decoded[1]["type"], "action");
        assert_eq!(decoded[1]["playback-time"], 0.5);
        assert_eq!(decoded[2]["type"], "action-done");
    }

    #[test]
    fn length_prefix_is_exact() {
        let frame = encode_frame(&ActionDoneFrame::new("stop", 0.0)).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }

    #[test]
    fn truncated_streams_error() {
        let frame = encode_frame(&ActionDoneFrame::new("stop", 0.0)).unwrap();
        assert!(decode_frames(&frame[..frame.len() - 1]).is_err());
        assert!(decode_frames(&frame[..2]).is_err());
    }
}
