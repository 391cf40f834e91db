//! The polymorphic role for anything that can raise reports.

use std::sync::Arc;

use crate::{Issue, ReportingDetails, Runner, Severity};

/// Implemented by anything entitled to raise reports: the scenario, the
/// monitors a host installs, tests.
///
/// The default [`report`] path routes through the runner, which applies
/// the severity override hook, coalesces duplicates, prints, emits the
/// wire frame and takes the abort decision.
///
/// [`report`]: Reporter::report
pub trait Reporter: Send + Sync {
    /// Display name; cached on every report so reports outlive their
    /// reporter.
    fn reporter_name(&self) -> String;

    /// The runner reports are routed to.
    fn runner(&self) -> Arc<Runner>;

    /// Per-instance reporting detail level; `None` means unconfigured.
    fn reporting_details(&self) -> Option<ReportingDetails> {
        None
    }

    /// Severity-override hook: given the issue and the proposed level,
    /// return the level to actually use.
    fn intercept_severity(&self, issue: &Issue, proposed: Severity) -> Severity {
        let _ = issue;
        proposed
    }

    /// Raise a report against a registered issue.
    fn report(&self, issue_id: &str, message: impl Into<String>)
    where
        Self: Sized,
    {
        let _ = self.runner().raise(self, issue_id, message.into(), None);
    }

    /// Raise a report carrying the name of a pipeline-topology dump.
    fn report_with_dotfile(
        &self,
        issue_id: &str,
        message: impl Into<String>,
        dotfile_name: impl Into<String>,
    ) where
        Self: Sized,
    {
        let _ = self
            .runner()
            .raise(self, issue_id, message.into(), Some(dotfile_name.into()));
    }
}
