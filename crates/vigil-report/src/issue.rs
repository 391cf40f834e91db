//! The process-wide catalog of known issue kinds.
//!
//! Issues are keyed by an interned `area::name` string, registered once
//! at init and never freed. Severity is fixed at registration time; a
//! scenario override may retune it through [`set_severity`].

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;

use crate::{Error, Result, Severity};

/// A registered issue kind.
#[derive(Debug)]
pub struct Issue {
    id: String,
    summary: String,
    description: Option<String>,
    level: RwLock<Severity>,
}

impl Issue {
    fn new(id: &str, summary: &str, description: Option<&str>, level: Severity) -> Result<Self> {
        if !id.contains("::") || id.starts_with("::") || id.ends_with("::") {
            return Err(Error::BadIssueKey(id.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            summary: summary.to_string(),
            description: description.map(str::to_string),
            level: RwLock::new(level),
        })
    }

    /// The interned `area::name` key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `area` half of the key.
    pub fn area(&self) -> &str {
        self.id.split("::").next().unwrap_or(&self.id)
    }

    /// One-line summary. Summaries identify known issues in test suites;
    /// treat them as stable.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Longer description, when the summary needs context.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Current severity (default, or a scenario override).
    pub fn severity(&self) -> Severity {
        *self.level.read()
    }
}

fn registry() -> &'static RwLock<HashMap<String, Arc<Issue>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<Issue>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a new issue kind. Registering the same key twice, or a key
/// not of the `area::name` shape, is a contract violation.
pub fn register(
    id: &str,
    summary: &str,
    description: Option<&str>,
    level: Severity,
) -> Result<()> {
    let issue = Issue::new(id, summary, description, level)?;
    let mut map = registry().write();
    if map.contains_key(id) {
        return Err(Error::DuplicateIssue(id.to_string()));
    }
    let _ = map.insert(id.to_string(), Arc::new(issue));
    Ok(())
}

/// Look up an issue by key.
pub fn lookup(id: &str) -> Option<Arc<Issue>> {
    init();
    registry().read().get(id).cloned()
}

/// Override the severity of a registered issue (scenario overrides).
pub fn set_severity(id: &str, level: Severity) -> bool {
    init();
    match registry().read().get(id) {
        Some(issue) => {
            *issue.level.write() = level;
            true
        }
        None => false,
    }
}

/// Identifiers of every built-in issue kind.
pub mod ids {
    /// Buffer received before a segment event.
    pub const BUFFER_BEFORE_SEGMENT: &str = "buffer::before-segment";
    /// Buffer outside the current segment range.
    pub const BUFFER_IS_OUT_OF_SEGMENT: &str = "buffer::is-out-of-segment";
    /// Outgoing timestamp outside the received timestamp range.
    pub const BUFFER_TIMESTAMP_OUT_OF_RECEIVED_RANGE: &str =
        "buffer::timestamp-out-of-received-range";
    /// Buffer does not match the expectation file.
    pub const WRONG_BUFFER: &str = "buffer::wrong-buffer";
    /// Flow return does not match the downstream value.
    pub const WRONG_FLOW_RETURN: &str = "buffer::wrong-flow-return";
    /// Buffer received after EOS.
    pub const BUFFER_AFTER_EOS: &str = "buffer::after-eos";
    /// Flow error without an error message on the bus.
    pub const FLOW_ERROR_WITHOUT_ERROR_MESSAGE: &str = "buffer::flow-error-without-error-message";
    /// Missing DISCONT flag after a flush or segment.
    pub const BUFFER_MISSING_DISCONT: &str = "buffer::missing-discont";

    /// Caps missing a field required for their type.
    pub const CAPS_IS_MISSING_FIELD: &str = "caps::is-missing-field";
    /// Caps field carries an unexpected type.
    pub const CAPS_FIELD_HAS_BAD_TYPE: &str = "caps::field-has-bad-type";
    /// Expected caps field not found.
    pub const CAPS_EXPECTED_FIELD_NOT_FOUND: &str = "caps::expected-field-not-found";
    /// getcaps is not proxying downstream fields.
    pub const GET_CAPS_NOT_PROXYING_FIELDS: &str = "caps::get-caps-not-proxying-fields";
    /// Caps field has an unexpected value.
    pub const CAPS_FIELD_UNEXPECTED_VALUE: &str = "caps::field-unexpected-value";

    /// Segment event not propagated downstream.
    pub const EVENT_NEWSEGMENT_NOT_PUSHED: &str = "event::newsegment-not-pushed";
    /// Serialized event not pushed at its expected time.
    pub const SERIALIZED_EVENT_WASNT_PUSHED_IN_TIME: &str =
        "event::serialized-event-wasnt-pushed-in-time";
    /// EOS seqnum differs from the originating operation.
    pub const EOS_HAS_WRONG_SEQNUM: &str = "event::eos-has-wrong-seqnum";
    /// Flush-start seqnum differs from the originating operation.
    pub const FLUSH_START_HAS_WRONG_SEQNUM: &str = "event::flush-start-has-wrong-seqnum";
    /// Flush-stop seqnum differs from the originating operation.
    pub const FLUSH_STOP_HAS_WRONG_SEQNUM: &str = "event::flush-stop-has-wrong-seqnum";
    /// Segment seqnum differs from the originating operation.
    pub const SEGMENT_HAS_WRONG_SEQNUM: &str = "event::segment-has-wrong-seqnum";
    /// Segment start mismatch after an accurate seek.
    pub const SEGMENT_HAS_WRONG_START: &str = "event::segment-has-wrong-start";
    /// Serialized event pushed out of order.
    pub const EVENT_SERIALIZED_OUT_OF_ORDER: &str = "event::serialized-out-of-order";
    /// Re-pushed segment differs from the received one.
    pub const EVENT_NEW_SEGMENT_MISMATCH: &str = "event::new-segment-mismatch";
    /// Unexpected flush-start event.
    pub const EVENT_FLUSH_START_UNEXPECTED: &str = "event::flush-start-unexpected";
    /// Unexpected flush-stop event.
    pub const EVENT_FLUSH_STOP_UNEXPECTED: &str = "event::flush-stop-unexpected";
    /// Identical caps event received twice.
    pub const EVENT_CAPS_DUPLICATE: &str = "event::caps-duplicate";
    /// Seek event was not handled.
    pub const EVENT_SEEK_NOT_HANDLED: &str = "event::seek-not-handled";
    /// Position after a seek is wrong.
    pub const EVENT_SEEK_RESULT_POSITION_WRONG: &str = "event::seek-result-position-wrong";
    /// EOS without a prior segment event.
    pub const EVENT_EOS_WITHOUT_SEGMENT: &str = "event::eos-without-segment";
    /// Event carries the invalid seqnum.
    pub const EVENT_INVALID_SEQNUM: &str = "event::invalid-seqnum";

    /// A state change failed.
    pub const STATE_CHANGE_FAILURE: &str = "state::change-failure";

    /// Output file size out of the expected range.
    pub const FILE_SIZE_INCORRECT: &str = "file::size-incorrect";
    /// Output file duration out of the expected range.
    pub const FILE_DURATION_INCORRECT: &str = "file::duration-incorrect";
    /// Output file seekability differs from the expectation.
    pub const FILE_SEEKABLE_INCORRECT: &str = "file::seekable-incorrect";
    /// Output file stream profile mismatch.
    pub const FILE_PROFILE_INCORRECT: &str = "file::profile-incorrect";
    /// Detected tags differ from the expectation.
    pub const FILE_TAG_DETECTION_INCORRECT: &str = "file::tag-detection-incorrect";
    /// Output frames differ from the expectation.
    pub const FILE_FRAMES_INCORRECT: &str = "file::frames-incorrect";
    /// Output segment differs from the expectation.
    pub const FILE_SEGMENT_INCORRECT: &str = "file::segment-incorrect";
    /// No stream info could be discovered.
    pub const FILE_NO_STREAM_INFO: &str = "file::no-stream-info";
    /// A discovered stream has no stream id.
    pub const FILE_NO_STREAM_ID: &str = "file::no-stream-id";

    /// A memory allocation failed.
    pub const ALLOCATION_FAILURE: &str = "runtime::allocation-failure";
    /// A required plugin is missing.
    pub const MISSING_PLUGIN: &str = "runtime::missing-plugin";
    /// A not-negotiated error was posted.
    pub const NOT_NEGOTIATED: &str = "runtime::not-negotiated";
    /// A warning message was posted on the bus.
    pub const WARNING_ON_BUS: &str = "runtime::warning-on-bus";
    /// An error message was posted on the bus.
    pub const ERROR_ON_BUS: &str = "runtime::error-on-bus";

    /// Queried position exceeds the queried duration.
    pub const QUERY_POSITION_SUPERIOR_DURATION: &str = "query::position-superior-duration";
    /// Queried position is outside the current segment.
    pub const QUERY_POSITION_OUT_OF_SEGMENT: &str = "query::position-out-of-segment";

    /// The program stopped with actions still pending.
    pub const SCENARIO_NOT_ENDED: &str = "scenario::not-ended";
    /// An action timed out.
    pub const SCENARIO_ACTION_TIMEOUT: &str = "scenario::action-timeout";
    /// The scenario file was malformed.
    pub const SCENARIO_FILE_MALFORMED: &str = "scenario::file-malformed";
    /// An action did not execute properly.
    pub const SCENARIO_ACTION_EXECUTION_ERROR: &str = "scenario::execution-error";
    /// A non-fatal problem occurred while executing an action.
    pub const SCENARIO_ACTION_EXECUTION_ISSUE: &str = "scenario::execution-issue";

    /// Pipeline latency above the configured maximum.
    pub const CONFIG_LATENCY_TOO_HIGH: &str = "config::latency-too-high";
    /// More buffers dropped than the configured maximum.
    pub const CONFIG_TOO_MANY_BUFFERS_DROPPED: &str = "config::too-many-buffers-dropped";
    /// Buffer push frequency below the configured minimum.
    pub const CONFIG_BUFFER_FREQUENCY_TOO_LOW: &str = "config::buffer-frequency-too-low";

    /// A wrapped log warning.
    pub const LOG_WARNING: &str = "log::warning";
    /// A wrapped log critical.
    pub const LOG_CRITICAL: &str = "log::critical";
    /// A wrapped log issue.
    pub const LOG_ISSUE: &str = "log::issue";
}

/// Register the built-in catalog. Idempotent; called lazily by the
/// lookup path, but hosts may call it eagerly at init.
pub fn init() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        load_builtin_issues().expect("built-in issue catalog is consistent");
    });
}

#[allow(clippy::too_many_lines, reason = "one entry per catalog issue")]
fn load_builtin_issues() -> Result<()> {
    use Severity::{Critical, Issue as Iss, Warning};
    use ids::*;

    register(
        BUFFER_BEFORE_SEGMENT,
        "buffer was received before a segment",
        Some("in push mode, a segment event must be received before a buffer"),
        Warning,
    )?;
    register(
        BUFFER_IS_OUT_OF_SEGMENT,
        "buffer is out of the segment range",
        Some(
            "buffer being pushed is out of the current segment's start-stop range. Meaning \
             it is going to be discarded downstream without any use",
        ),
        Iss,
    )?;
    register(
        BUFFER_TIMESTAMP_OUT_OF_RECEIVED_RANGE,
        "buffer timestamp is out of the received buffer timestamps' range",
        Some(
            "a buffer leaving an element should have its timestamps in the range of the \
             received buffers timestamps. i.e. If an element received buffers with timestamps \
             from 0s to 10s, it can't push a buffer with a 11s timestamp, because it doesn't \
             have data for that",
        ),
        Warning,
    )?;
    register(
        WRONG_BUFFER,
        "received buffer does not correspond to wanted one",
        Some(
            "when checking playback of a file against an expectation file all buffers coming \
             into the decoders might be checked and should have the exact expected metadata \
             and hash of the content",
        ),
        Warning,
    )?;
    register(
        WRONG_FLOW_RETURN,
        "flow return from pad push doesn't match expected value",
        Some(
            "flow return from a 1:1 sink/src pad element is as simple as returning what \
             downstream returned. For elements that have multiple src pads, flow returns \
             should be properly combined",
        ),
        Critical,
    )?;
    register(
        BUFFER_AFTER_EOS,
        "buffer was received after EOS",
        Some("a pad shouldn't receive any more buffers after it gets EOS"),
        Iss,
    )?;
    register(
        FLOW_ERROR_WITHOUT_ERROR_MESSAGE,
        "flow error returned without posting an error on the bus",
        Some("an element returning a flow error must post an error message first"),
        Warning,
    )?;
    register(
        BUFFER_MISSING_DISCONT,
        "buffer didn't have expected DISCONT flag",
        Some("buffers after a segment or flush must carry a DISCONT flag"),
        Warning,
    )?;

    register(
        CAPS_IS_MISSING_FIELD,
        "caps is missing a required field for its type",
        Some(
            "some caps types are expected to contain a set of basic fields. For example, raw \
             video should have 'width', 'height', 'framerate' and 'pixel-aspect-ratio'",
        ),
        Iss,
    )?;
    register(
        CAPS_FIELD_HAS_BAD_TYPE,
        "caps field has an unexpected type",
        Some("some common caps fields should always use the same expected types"),
        Warning,
    )?;
    register(
        CAPS_EXPECTED_FIELD_NOT_FOUND,
        "caps expected field wasn't present",
        Some(
            "a field that should be present in the caps wasn't found. Fields set on a sink \
             pad caps should be propagated downstream when it makes sense to do so",
        ),
        Warning,
    )?;
    register(
        GET_CAPS_NOT_PROXYING_FIELDS,
        "getcaps function isn't proxying downstream fields correctly",
        Some(
            "elements should set downstream caps restrictions on their caps when replying to \
             upstream getcaps queries to avoid upstream sending data in an unsupported format",
        ),
        Critical,
    )?;
    register(
        CAPS_FIELD_UNEXPECTED_VALUE,
        "a field in caps has an unexpected value",
        Some("fields set on a sink pad should be propagated downstream via set caps"),
        Critical,
    )?;

    register(
        EVENT_NEWSEGMENT_NOT_PUSHED,
        "new segment event wasn't propagated downstream",
        Some("segments received from upstream should be pushed downstream"),
        Warning,
    )?;
    register(
        SERIALIZED_EVENT_WASNT_PUSHED_IN_TIME,
        "a serialized event received should be pushed in the same 'time' as it was received",
        Some(
            "serialized events should be pushed in the same order they are received and \
             serialized with buffers. If an event is received after a buffer with timestamp \
             end 'X', it should be pushed right after buffers with timestamp end 'X'",
        ),
        Warning,
    )?;
    register(
        EOS_HAS_WRONG_SEQNUM,
        "EOS events that are part of the same pipeline 'operation' should have the same seqnum",
        Some(
            "when events/messages are created from another event/message, they should have \
             their seqnums set to the original event/message seqnum",
        ),
        Iss,
    )?;
    register(
        FLUSH_START_HAS_WRONG_SEQNUM,
        "FLUSH_START events that are part of the same pipeline 'operation' should have the \
         same seqnum",
        Some(
            "when events/messages are created from another event/message, they should have \
             their seqnums set to the original event/message seqnum",
        ),
        Iss,
    )?;
    register(
        FLUSH_STOP_HAS_WRONG_SEQNUM,
        "FLUSH_STOP events that are part of the same pipeline 'operation' should have the \
         same seqnum",
        Some(
            "when events/messages are created from another event/message, they should have \
             their seqnums set to the original event/message seqnum",
        ),
        Iss,
    )?;
    register(
        SEGMENT_HAS_WRONG_SEQNUM,
        "SEGMENT events that are part of the same pipeline 'operation' should have the same \
         seqnum",
        Some(
            "when events/messages are created from another event/message, they should have \
             their seqnums set to the original event/message seqnum",
        ),
        Iss,
    )?;
    register(
        SEGMENT_HAS_WRONG_START,
        "a segment doesn't have the proper time value after an ACCURATE seek",
        Some(
            "if a seek with the ACCURATE flag was accepted, the following segment should have \
             a time value corresponding exactly to the requested start seek time",
        ),
        Critical,
    )?;
    register(
        EVENT_SERIALIZED_OUT_OF_ORDER,
        "a serialized event received should be pushed in the same order as it was received",
        Some("serialized events should be pushed in the same order they are received"),
        Warning,
    )?;
    register(
        EVENT_NEW_SEGMENT_MISMATCH,
        "a new segment event has different value than the received one",
        Some("when receiving a new segment, an element should push an equivalent segment downstream"),
        Warning,
    )?;
    register(
        EVENT_FLUSH_START_UNEXPECTED,
        "received an unexpected flush start event",
        None,
        Warning,
    )?;
    register(
        EVENT_FLUSH_STOP_UNEXPECTED,
        "received an unexpected flush stop event",
        None,
        Warning,
    )?;
    register(EVENT_CAPS_DUPLICATE, "received the same caps twice", None, Warning)?;
    register(EVENT_SEEK_NOT_HANDLED, "seek event wasn't handled", None, Critical)?;
    register(
        EVENT_SEEK_RESULT_POSITION_WRONG,
        "position after a seek is wrong",
        None,
        Critical,
    )?;
    register(
        EVENT_EOS_WITHOUT_SEGMENT,
        "EOS received without segment event before",
        Some(
            "a segment event should always be sent before data flow. EOS being some kind of \
             data flow, there is no exception in that regard",
        ),
        Warning,
    )?;
    register(
        EVENT_INVALID_SEQNUM,
        "event has an invalid seqnum",
        Some("an event is using the invalid seqnum. This should never happen"),
        Critical,
    )?;

    register(STATE_CHANGE_FAILURE, "state change failed", None, Critical)?;

    register(
        FILE_SIZE_INCORRECT,
        "resulting file size wasn't within the expected values",
        None,
        Warning,
    )?;
    register(
        FILE_DURATION_INCORRECT,
        "resulting file duration wasn't within the expected values",
        None,
        Warning,
    )?;
    register(
        FILE_SEEKABLE_INCORRECT,
        "resulting file wasn't seekable or not seekable as expected",
        None,
        Warning,
    )?;
    register(
        FILE_PROFILE_INCORRECT,
        "resulting file stream profiles didn't match expected values",
        None,
        Critical,
    )?;
    register(
        FILE_TAG_DETECTION_INCORRECT,
        "detected tags are different than expected ones",
        None,
        Iss,
    )?;
    register(
        FILE_FRAMES_INCORRECT,
        "resulting file frames are not as expected",
        None,
        Critical,
    )?;
    register(
        FILE_SEGMENT_INCORRECT,
        "resulting segment is not as expected",
        None,
        Critical,
    )?;
    register(
        FILE_NO_STREAM_INFO,
        "the discoverer could not determine the stream info",
        None,
        Warning,
    )?;
    register(
        FILE_NO_STREAM_ID,
        "the discoverer found a stream that had no stream ID",
        None,
        Warning,
    )?;

    register(
        ALLOCATION_FAILURE,
        "a memory allocation failed during the run",
        None,
        Critical,
    )?;
    register(
        MISSING_PLUGIN,
        "a plugin is missing and prevented the run",
        None,
        Critical,
    )?;
    register(
        NOT_NEGOTIATED,
        "a NOT NEGOTIATED message has been posted on the bus",
        None,
        Critical,
    )?;
    register(WARNING_ON_BUS, "we got a WARNING message on the bus", None, Warning)?;
    register(ERROR_ON_BUS, "we got an ERROR message on the bus", None, Critical)?;

    register(
        QUERY_POSITION_SUPERIOR_DURATION,
        "query position reported a value superior than what query duration returned",
        None,
        Warning,
    )?;
    register(
        QUERY_POSITION_OUT_OF_SEGMENT,
        "query position reported a value outside of the current expected segment",
        None,
        Warning,
    )?;

    register(
        SCENARIO_NOT_ENDED,
        "the program stopped before some actions were executed",
        None,
        Critical,
    )?;
    register(
        SCENARIO_ACTION_TIMEOUT,
        "the execution of an action timed out",
        None,
        Critical,
    )?;
    register(
        SCENARIO_FILE_MALFORMED,
        "the scenario file was malformed",
        None,
        Critical,
    )?;
    register(
        SCENARIO_ACTION_EXECUTION_ERROR,
        "the execution of an action did not properly happen",
        None,
        Critical,
    )?;
    register(
        SCENARIO_ACTION_EXECUTION_ISSUE,
        "an issue happened during the execution of a scenario",
        None,
        Iss,
    )?;

    register(
        CONFIG_LATENCY_TOO_HIGH,
        "the pipeline latency is higher than the maximum allowed by the scenario",
        None,
        Critical,
    )?;
    register(
        CONFIG_TOO_MANY_BUFFERS_DROPPED,
        "the number of dropped buffers is higher than the maximum allowed by the scenario",
        None,
        Critical,
    )?;
    register(
        CONFIG_BUFFER_FREQUENCY_TOO_LOW,
        "pad buffers push frequency is lower than the minimum required by the config",
        None,
        Critical,
    )?;

    register(LOG_WARNING, "we got a log warning", None, Warning)?;
    register(LOG_CRITICAL, "we got a log critical issue", None, Critical)?;
    register(LOG_ISSUE, "we got a log issue", None, Iss)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        init();
        let issue = lookup(ids::SCENARIO_ACTION_TIMEOUT).unwrap();
        assert_eq!(issue.severity(), Severity::Critical);
        assert_eq!(issue.area(), "scenario");
        assert!(lookup("nosuch::issue").is_none());
    }

    #[test]
    fn duplicate_and_malformed_keys_rejected() {
        init();
        assert!(matches!(
            register(ids::SCENARIO_NOT_ENDED, "x", None, Severity::Issue),
            Err(Error::DuplicateIssue(_))
        ));
        assert!(matches!(
            register("no-separator", "x", None, Severity::Issue),
            Err(Error::BadIssueKey(_))
        ));
        assert!(matches!(
            register("::name", "x", None, Severity::Issue),
            Err(Error::BadIssueKey(_))
        ));
    }

    #[test]
    fn severity_override() {
        init();
        assert!(set_severity(ids::WARNING_ON_BUS, Severity::Critical));
        assert_eq!(
            lookup(ids::WARNING_ON_BUS).unwrap().severity(),
            Severity::Critical
        );
        assert!(set_severity(ids::WARNING_ON_BUS, Severity::Warning));
        assert!(!set_severity("nosuch::issue", Severity::Ignore));
    }
}
