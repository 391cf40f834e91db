//! The report accumulator.

use std::{
    backtrace::Backtrace,
    env,
    sync::Arc,
    time::Instant,
};

use parking_lot::Mutex;
use tracing::error;

use crate::{
    PolicyFlags, Report, Reporter, ReportingDetails, Severity, Sink, issue, parse_policy,
};

/// Environment variable carrying the print/abort policy string.
pub const POLICY_ENV: &str = "VIGIL_POLICY";

/// What the runner did with a raised report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// First occurrence; recorded as a master and emitted.
    Fresh,
    /// Same issue seen again by the same reporter; attached as a repeat.
    Repeated,
    /// Same issue seen by a different reporter; attached as a shadow.
    Shadowed,
}

/// Accumulates reports for one run, coalescing duplicates and deriving
/// the host's exit code. Thread-safe; write-once issue data is read
/// lock-free through the issue registry.
pub struct Runner {
    sink: Sink,
    policy: PolicyFlags,
    default_details: ReportingDetails,
    reports: Mutex<Vec<Arc<Report>>>,
    start: Instant,
}

impl Runner {
    /// A runner with an explicit sink and no print/abort policy.
    pub fn new(sink: Sink) -> Arc<Self> {
        Self::with_policy(sink, PolicyFlags::empty())
    }

    /// A runner with an explicit sink and policy.
    pub fn with_policy(sink: Sink, policy: PolicyFlags) -> Arc<Self> {
        issue::init();
        Arc::new(Self {
            sink,
            policy,
            default_details: ReportingDetails::Smart,
            reports: Mutex::new(Vec::new()),
            start: Instant::now(),
        })
    }

    /// A runner configured from the environment (policy string, log
    /// sinks, remote stream).
    pub fn from_env() -> Arc<Self> {
        let policy = match env::var(POLICY_ENV) {
            Ok(spec) => parse_policy(&spec).unwrap_or_else(|e| {
                error!("ignoring malformed {}: {}", POLICY_ENV, e);
                PolicyFlags::empty()
            }),
            Err(_) => PolicyFlags::empty(),
        };
        Self::with_policy(Sink::from_env(), policy)
    }

    /// The report sink.
    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// The configured policy.
    pub fn policy(&self) -> PolicyFlags {
        self.policy
    }

    /// Raise a report on behalf of `reporter`.
    ///
    /// The abort decision is taken here, in the construction path, so
    /// backtraces capture the failure site.
    pub fn raise(
        &self,
        reporter: &dyn Reporter,
        issue_id: &str,
        message: String,
        dotfile_name: Option<String>,
    ) -> Option<Disposition> {
        let Some(issue) = issue::lookup(issue_id) else {
            error!("report raised for unregistered issue `{}`", issue_id);
            return None;
        };

        let level = reporter.intercept_severity(&issue, issue.severity());
        if level == Severity::Ignore {
            return None;
        }

        let details = reporter.reporting_details();
        let wants_trace = level == Severity::Critical
            || self.policy.should_abort(level)
            || self.default_details == ReportingDetails::All
            || details == Some(ReportingDetails::All);
        let trace = wants_trace.then(|| Backtrace::force_capture().to_string());

        let report = Report::new(
            issue,
            reporter.reporter_name(),
            message,
            level,
            self.start.elapsed(),
            trace,
            dotfile_name,
            details,
        );

        let disposition = self.add(Arc::clone(&report));
        if disposition == Disposition::Fresh {
            if self.policy.should_print(level) {
                self.sink.write_report(&report);
            }
            self.sink.send_frame(&report.to_frame());
        }

        if self.policy.should_abort(level) {
            self.sink
                .write_text(&format!("Fatal report, aborting:\n{}", report.render(self.sink.dot_dir())));
            std::process::exit(18);
        }

        Some(disposition)
    }

    /// Coalesce a report into the accumulated set.
    fn add(&self, report: Arc<Report>) -> Disposition {
        let mut reports = self.reports.lock();
        for existing in reports.iter() {
            if existing.issue().id() != report.issue().id() {
                continue;
            }
            if existing.reporter_name() == report.reporter_name() {
                existing.add_repeated(report);
                return Disposition::Repeated;
            }
            if Report::set_master(existing, Arc::clone(&report)) {
                return Disposition::Shadowed;
            }
        }
        reports.push(report);
        Disposition::Fresh
    }

    /// Snapshot of the accumulated master reports.
    pub fn reports(&self) -> Vec<Arc<Report>> {
        self.reports.lock().clone()
    }

    /// Number of master reports at critical level.
    pub fn criticals(&self) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.level() == Severity::Critical)
            .count()
    }

    /// Exit code for the host: zero iff no report reached critical.
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.criticals()).unwrap_or(i32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SharedBuffer, issue::ids};

    struct TestReporter(&'static str, Arc<Runner>);

    impl Reporter for TestReporter {
        fn reporter_name(&self) -> String {
            self.0.to_string()
        }

        fn runner(&self) -> Arc<Runner> {
            Arc::clone(&self.1)
        }
    }

    fn runner_with_buffer() -> (Arc<Runner>, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let runner = Runner::new(Sink::with_output(Box::new(buffer.clone())));
        (runner, buffer)
    }

    #[test]
    fn fresh_reports_print_and_accumulate() {
        let (runner, buffer) = runner_with_buffer();
        let reporter = TestReporter("scenario0", Arc::clone(&runner));

        let disposition = runner.raise(
            &reporter,
            ids::SCENARIO_ACTION_TIMEOUT,
            "action seek timed out after 2s".into(),
            None,
        );
        assert_eq!(disposition, Some(Disposition::Fresh));
        assert_eq!(runner.reports().len(), 1);
        assert_eq!(runner.criticals(), 1);
        assert_eq!(runner.exit_code(), 1);
        assert!(buffer.contents().contains("the execution of an action timed out"));
        assert!(buffer.contents().contains("Detected on <scenario0>"));
    }

    #[test]
    fn same_reporter_repeats_different_reporter_shadows() {
        let (runner, _buffer) = runner_with_buffer();
        let scenario = TestReporter("scenario0", Arc::clone(&runner));
        let sink0 = TestReporter("sink0", Arc::clone(&runner));
        let sink1 = TestReporter("sink1", Arc::clone(&runner));

        assert_eq!(
            runner.raise(&scenario, ids::WARNING_ON_BUS, "w1".into(), None),
            Some(Disposition::Fresh)
        );
        assert_eq!(
            runner.raise(&scenario, ids::WARNING_ON_BUS, "w2".into(), None),
            Some(Disposition::Repeated)
        );
        assert_eq!(
            runner.raise(&sink0, ids::WARNING_ON_BUS, "w3".into(), None),
            Some(Disposition::Shadowed)
        );
        assert_eq!(
            runner.raise(&sink1, ids::WARNING_ON_BUS, "w4".into(), None),
            Some(Disposition::Shadowed)
        );
        // One shadow per distinct reporter identity.
        assert_eq!(
            runner.raise(&sink0, ids::WARNING_ON_BUS, "w5".into(), None),
            Some(Disposition::Shadowed)
        );

        let masters = runner.reports();
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].shadows().len(), 2);
        assert_eq!(masters[0].repeats().len(), 1);
    }

    #[test]
    fn ignored_issues_are_dropped() {
        let (runner, buffer) = runner_with_buffer();
        let reporter = TestReporter("scenario0", Arc::clone(&runner));

        assert!(issue::set_severity(ids::LOG_ISSUE, Severity::Ignore));
        assert_eq!(runner.raise(&reporter, ids::LOG_ISSUE, "x".into(), None), None);
        assert!(runner.reports().is_empty());
        assert!(buffer.contents().is_empty());
        assert!(issue::set_severity(ids::LOG_ISSUE, Severity::Issue));
    }

    #[test]
    fn criticals_capture_a_trace() {
        let (runner, _buffer) = runner_with_buffer();
        let reporter = TestReporter("scenario0", Arc::clone(&runner));
        let _ = runner.raise(&reporter, ids::SCENARIO_NOT_ENDED, "left over".into(), None);
        let report = &runner.reports()[0];
        assert!(report.trace().is_some());
    }
}
