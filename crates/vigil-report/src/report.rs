//! A single reported occurrence of an issue.

use std::{
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use vigil_protocol::ReportFrame;

use crate::{Issue, ReportingDetails, Severity};

/// Shadow and repeat links, guarded by a per-report mutex.
#[derive(Default)]
struct Links {
    shadows: Vec<Arc<Report>>,
    repeats: Vec<Arc<Report>>,
}

/// One occurrence of an issue, immutable after creation except for its
/// shadow/repeat links.
pub struct Report {
    issue: Arc<Issue>,
    reporter_name: String,
    message: String,
    level: Severity,
    timestamp: Duration,
    trace: Option<String>,
    dotfile_name: Option<String>,
    reporting_details: Option<ReportingDetails>,
    links: Mutex<Links>,
}

impl Report {
    /// Build a report. The severity passed in has already been through
    /// the reporter's override hook; the reporter name is cached so the
    /// report can outlive its reporter.
    pub(crate) fn new(
        issue: Arc<Issue>,
        reporter_name: String,
        message: String,
        level: Severity,
        timestamp: Duration,
        trace: Option<String>,
        dotfile_name: Option<String>,
        reporting_details: Option<ReportingDetails>,
    ) -> Arc<Self> {
        Arc::new(Self {
            issue,
            reporter_name,
            message,
            level,
            timestamp,
            trace,
            dotfile_name,
            reporting_details,
            links: Mutex::new(Links::default()),
        })
    }

    /// The issue this report is an occurrence of.
    pub fn issue(&self) -> &Arc<Issue> {
        &self.issue
    }

    /// Cached reporter name.
    pub fn reporter_name(&self) -> &str {
        &self.reporter_name
    }

    /// Free-text message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Severity after overrides.
    pub fn level(&self) -> Severity {
        self.level
    }

    /// Monotonic timestamp since reporting init.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Captured backtrace, when one was taken.
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// Name of an associated pipeline-topology dump.
    pub fn dotfile_name(&self) -> Option<&str> {
        self.dotfile_name.as_deref()
    }

    /// Try to attach `shadow` under `master`.
    ///
    /// Succeeds iff the master's detail level is below the monitor
    /// threshold and no prior shadow came from the same reporter.
    pub fn set_master(master: &Arc<Self>, shadow: Arc<Self>) -> bool {
        if matches!(master.reporting_details, Some(d) if d >= ReportingDetails::Monitor) {
            return false;
        }
        let mut links = master.links.lock();
        if links
            .shadows
            .iter()
            .any(|s| s.reporter_name == shadow.reporter_name)
        {
            // At most one shadow per distinct reporter identity; the
            // linking still counts as handled.
            return true;
        }
        links.shadows.push(shadow);
        true
    }

    /// Record another occurrence of the same issue at the same site.
    pub fn add_repeated(&self, repeat: Arc<Self>) {
        self.links.lock().repeats.push(repeat);
    }

    /// Snapshot of the shadow reports.
    pub fn shadows(&self) -> Vec<Arc<Self>> {
        self.links.lock().shadows.clone()
    }

    /// Snapshot of the repeated reports.
    pub fn repeats(&self) -> Vec<Arc<Self>> {
        self.links.lock().repeats.clone()
    }

    /// All reporter names this report stands for: its own, then each
    /// shadow's.
    pub fn detected_on(&self) -> Vec<String> {
        let mut names = vec![self.reporter_name.clone()];
        names.extend(
            self.links
                .lock()
                .shadows
                .iter()
                .map(|s| s.reporter_name.clone()),
        );
        names
    }

    /// The wire frame for this report.
    pub fn to_frame(&self) -> ReportFrame {
        ReportFrame::new(
            self.issue.id(),
            self.issue.summary(),
            self.level.to_string(),
            self.detected_on(),
            &self.message,
        )
    }

    /// Render the human-readable block written to log sinks.
    ///
    /// Shape: level/summary line, detected-on line, indented details,
    /// optional dotfile note, optional backtrace, one details block per
    /// repeat, the issue description, then a blank line.
    pub fn render(&self, dot_dir: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:>10} : {}\n", self.level.to_string(), self.issue.summary()));
        out.push_str(&format!(
            "{:12} Detected on <{}>\n",
            "",
            self.detected_on().join(", ")
        ));
        Self::render_details(&mut out, &self.message);
        if let Some(dotfile) = &self.dotfile_name {
            match dot_dir {
                Some(dir) => {
                    out.push_str(&format!("{:12} dotfile : {}/{}.dot\n", "", dir, dotfile));
                }
                None => out.push_str(&format!(
                    "{:12} dotfile : no dotfile produced as no dot directory is configured\n",
                    ""
                )),
            }
        }
        if let Some(trace) = &self.trace {
            out.push_str(&format!("{:12} backtrace :\n", ""));
            for line in trace.lines() {
                out.push_str(&format!("{:15}{}\n", "", line));
            }
        }
        for repeat in self.repeats() {
            Self::render_details(&mut out, &repeat.message);
        }
        if let Some(description) = self.issue.description() {
            out.push_str(&format!("{:12} Description : {}\n", "", description));
        }
        out.push('\n');
        out
    }

    fn render_details(out: &mut String, message: &str) {
        let mut lines = message.lines();
        if let Some(first) = lines.next() {
            out.push_str(&format!("{:12} Details : {}\n", "", first));
            for line in lines {
                out.push_str(&format!("{:21}{}\n", "", line));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue;

    fn report(reporter: &str, details: Option<ReportingDetails>) -> Arc<Report> {
        issue::init();
        let iss = issue::lookup(issue::ids::SCENARIO_NOT_ENDED).unwrap();
        Report::new(
            iss,
            reporter.to_string(),
            "3 actions were not executed".to_string(),
            Severity::Critical,
            Duration::from_millis(1500),
            None,
            None,
            details,
        )
    }

    #[test]
    fn shadow_dedup_per_reporter() {
        let master = report("scenario0", None);
        assert!(Report::set_master(&master, report("sink0", None)));
        assert!(Report::set_master(&master, report("sink0", None)));
        assert!(Report::set_master(&master, report("sink1", None)));
        let names: Vec<String> = master.shadows().iter().map(|s| s.reporter_name().to_string()).collect();
        assert_eq!(names, vec!["sink0", "sink1"]);
        assert_eq!(master.detected_on(), vec!["scenario0", "sink0", "sink1"]);
    }

    #[test]
    fn monitor_level_masters_refuse_shadows() {
        let master = report("scenario0", Some(ReportingDetails::Monitor));
        assert!(!Report::set_master(&master, report("sink0", None)));
        assert!(master.shadows().is_empty());

        let master = report("scenario0", Some(ReportingDetails::Subchain));
        assert!(Report::set_master(&master, report("sink0", None)));
    }

    #[test]
    fn render_block_shape() {
        let master = report("scenario0", None);
        let _ = Report::set_master(&master, report("sink0", None));
        master.add_repeated(report("scenario0", None));

        let block = master.render(Some("/tmp/dots"));
        let lines: Vec<&str> = block.lines().collect();
        assert!(lines[0].starts_with("  critical : "));
        assert!(lines[1].contains("Detected on <scenario0, sink0>"));
        assert!(lines[2].contains("Details : 3 actions were not executed"));
        // Repeat block re-renders the details.
        assert_eq!(
            lines.iter().filter(|l| l.contains("Details :")).count(),
            2
        );
        assert!(block.ends_with("\n\n"));
    }
}
