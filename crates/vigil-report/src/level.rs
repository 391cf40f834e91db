//! Severities, reporting detail levels and the print/abort policy.

use std::{fmt, str::FromStr};

use bitflags::bitflags;

use crate::Error;

/// Severity of an issue or report, from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Known and deliberately ignored.
    Ignore,
    /// Worth recording, not a spec violation.
    Issue,
    /// A spec violation that playback usually survives.
    Warning,
    /// A hard violation.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Ignore => "ignore",
            Severity::Issue => "issue",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ignore" => Ok(Severity::Ignore),
            "issue" => Ok(Severity::Issue),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(Error::UnknownName {
                what: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// How much detail a reporter (or the whole run) wants reported.
///
/// A report whose detail level is at or above [`Monitor`] refuses to
/// act as a master for shadow reports.
///
/// [`Monitor`]: ReportingDetails::Monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportingDetails {
    /// Report nothing.
    None,
    /// Only synthetic (summary) reports.
    Synthetic,
    /// Deduplicate along the upstream chain.
    Subchain,
    /// One report per monitor.
    Monitor,
    /// Everything, no deduplication.
    All,
    /// Heuristic deduplication (the default).
    Smart,
}

impl FromStr for ReportingDetails {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "none" => Ok(Self::None),
            "synthetic" => Ok(Self::Synthetic),
            "subchain" => Ok(Self::Subchain),
            "monitor" => Ok(Self::Monitor),
            "all" => Ok(Self::All),
            "smart" => Ok(Self::Smart),
            other => Err(Error::UnknownName {
                what: "reporting details",
                value: other.to_string(),
            }),
        }
    }
}

bitflags! {
    /// Print and abort policy bits, configured once at init.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PolicyFlags: u32 {
        /// Abort on issues (and anything more severe).
        const FATAL_ISSUES = 1 << 0;
        /// Abort on warnings (and anything more severe).
        const FATAL_WARNINGS = 1 << 1;
        /// Abort on criticals.
        const FATAL_CRITICALS = 1 << 2;
        /// Print issues (and anything more severe).
        const PRINT_ISSUES = 1 << 3;
        /// Print warnings (and anything more severe).
        const PRINT_WARNINGS = 1 << 4;
        /// Print criticals.
        const PRINT_CRITICALS = 1 << 5;
    }
}

/// Parse a policy string such as `fatal_warnings+print_issues`.
///
/// Unknown tokens are rejected so typos cannot silently weaken a fatal
/// policy.
pub fn parse_policy(s: &str) -> Result<PolicyFlags, Error> {
    let mut flags = PolicyFlags::empty();
    for token in s.split('+').filter(|t| !t.is_empty()) {
        flags |= match token {
            "fatal_issues" => PolicyFlags::FATAL_ISSUES,
            "fatal_warnings" => PolicyFlags::FATAL_WARNINGS,
            "fatal_criticals" => PolicyFlags::FATAL_CRITICALS,
            "print_issues" => PolicyFlags::PRINT_ISSUES,
            "print_warnings" => PolicyFlags::PRINT_WARNINGS,
            "print_criticals" => PolicyFlags::PRINT_CRITICALS,
            other => {
                return Err(Error::UnknownName {
                    what: "policy token",
                    value: other.to_string(),
                });
            }
        };
    }
    Ok(flags)
}

impl PolicyFlags {
    /// Whether a report at `level` prints. With no print bit set at all,
    /// everything prints.
    pub fn should_print(self, level: Severity) -> bool {
        let print_bits = PolicyFlags::PRINT_ISSUES | PolicyFlags::PRINT_WARNINGS | PolicyFlags::PRINT_CRITICALS;
        if (self & print_bits).is_empty() {
            return true;
        }
        (level >= Severity::Issue && self.contains(PolicyFlags::PRINT_ISSUES))
            || (level >= Severity::Warning && self.contains(PolicyFlags::PRINT_WARNINGS))
            || (level >= Severity::Critical && self.contains(PolicyFlags::PRINT_CRITICALS))
    }

    /// Whether a report at `level` aborts the process.
    pub fn should_abort(self, level: Severity) -> bool {
        (level >= Severity::Issue && self.contains(PolicyFlags::FATAL_ISSUES))
            || (level >= Severity::Warning && self.contains(PolicyFlags::FATAL_WARNINGS))
            || (level >= Severity::Critical && self.contains(PolicyFlags::FATAL_CRITICALS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Ignore < Severity::Issue);
        assert!(Severity::Issue < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn policy_parsing() {
        let p = parse_policy("fatal_warnings+print_issues").unwrap();
        assert!(p.contains(PolicyFlags::FATAL_WARNINGS));
        assert!(p.contains(PolicyFlags::PRINT_ISSUES));
        assert!(parse_policy("").unwrap().is_empty());
        assert!(parse_policy("fatal_typos").is_err());
    }

    #[test]
    fn empty_print_set_prints_everything() {
        let p = PolicyFlags::FATAL_CRITICALS;
        assert!(p.should_print(Severity::Issue));
        assert!(p.should_print(Severity::Critical));
    }

    #[test]
    fn print_bits_select_minimum_severity() {
        let p = parse_policy("print_warnings").unwrap();
        assert!(!p.should_print(Severity::Issue));
        assert!(p.should_print(Severity::Warning));
        assert!(p.should_print(Severity::Critical));
    }

    #[test]
    fn abort_bits_select_minimum_severity() {
        let p = parse_policy("fatal_warnings").unwrap();
        assert!(!p.should_abort(Severity::Issue));
        assert!(p.should_abort(Severity::Warning));
        assert!(p.should_abort(Severity::Critical));
        assert!(!PolicyFlags::empty().should_abort(Severity::Critical));
    }
}
