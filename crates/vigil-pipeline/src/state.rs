//! Pipeline states and state-change results.

use std::{fmt, str::FromStr};

use crate::Error;

/// The four pipeline states, ordered from torn-down to running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Resources released.
    Null,
    /// Allocated but no data flow.
    Ready,
    /// Prerolled, clock stopped.
    Paused,
    /// Running against the clock.
    Playing,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Null => "null",
            State::Ready => "ready",
            State::Paused => "paused",
            State::Playing => "playing",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "null" => Ok(State::Null),
            "ready" => Ok(State::Ready),
            "paused" => Ok(State::Paused),
            "playing" => Ok(State::Playing),
            other => Err(Error::UnknownName {
                what: "state",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of requesting a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The change failed.
    Failure,
    /// The change completed synchronously.
    Success,
    /// The change will complete asynchronously (`async-done` follows).
    Async,
    /// Success, but the pipeline cannot preroll (live source).
    NoPreroll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ordering() {
        assert!(State::Null < State::Ready);
        assert!(State::Ready < State::Paused);
        assert!(State::Paused < State::Playing);
    }

    #[test]
    fn state_round_trip() {
        for s in [State::Null, State::Ready, State::Paused, State::Playing] {
            assert_eq!(s.to_string().parse::<State>().unwrap(), s);
        }
        assert!("flying".parse::<State>().is_err());
    }
}
