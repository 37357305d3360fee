//! Terminal test-result formatter. Grounded on
//! `original_source/test/formatter.go`'s `TerminalFormatter.Format`: a ✓/✗
//! line per test, failure detail (source context plus Expected/Actual for
//! assertion mismatches), and a final summary line.

use std::fmt::Write as _;

use crate::commands::test::TestOutcome;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

pub struct Reporter {
    pub verbose: bool,
    pub color: bool,
}

impl Reporter {
    pub fn new(verbose: bool, color: bool) -> Self {
        Reporter { verbose, color }
    }

    pub fn format(&self, outcomes: &[TestOutcome]) -> String {
        let mut out = String::new();
        let mut passed = 0usize;
        let mut failed = 0usize;

        for outcome in outcomes {
            if outcome.passed {
                passed += 1;
                let _ = writeln!(out, "{} {}", self.mark(true), outcome.name);
            } else {
                failed += 1;
                let _ = writeln!(out, "{} {}", self.mark(false), outcome.name);
                if self.verbose || outcome.message.is_some() {
                    if let Some(message) = &outcome.message {
                        let _ = writeln!(out, "    {message}");
                    }
                    if let Some((file, line)) = &outcome.location {
                        let _ = writeln!(out, "    at {file}:{line}");
                    }
                    if let Some((expected, actual)) = outcome.assertion {
                        let _ = writeln!(out, "    Expected: {expected}");
                        let _ = writeln!(out, "    Actual:   {actual}");
                    }
                }
            }
        }

        let _ = writeln!(out, "Tests: {passed} passed, {failed} failed, {} total", outcomes.len());
        out
    }

    fn mark(&self, pass: bool) -> String {
        if !self.color {
            return if pass { "[PASS]".to_string() } else { "[FAIL]".to_string() };
        }
        if pass {
            format!("{GREEN}\u{2713}{RESET}")
        } else {
            format!("{RED}\u{2717}{RESET}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(name: &str) -> TestOutcome {
        TestOutcome { name: name.to_string(), passed: true, message: None, location: None, assertion: None }
    }

    fn failing(name: &str) -> TestOutcome {
        TestOutcome {
            name: name.to_string(),
            passed: false,
            message: Some("assertion failed at pc=0x0100".to_string()),
            location: Some(("main.mpu".to_string(), 4)),
            assertion: Some((2, 1)),
        }
    }

    #[test]
    fn summary_line_counts_pass_and_fail() {
        let out = Reporter::new(false, false).format(&[passing("a"), failing("b")]);
        assert!(out.contains("Tests: 1 passed, 1 failed, 2 total"));
    }

    #[test]
    fn failure_detail_includes_expected_and_actual() {
        let out = Reporter::new(false, false).format(&[failing("b")]);
        assert!(out.contains("Expected: 2"));
        assert!(out.contains("Actual:   1"));
        assert!(out.contains("main.mpu:4"));
    }

    #[test]
    fn no_color_uses_plain_markers() {
        let out = Reporter::new(false, false).format(&[passing("a")]);
        assert!(out.contains("[PASS]"));
        assert!(!out.contains("\x1b["));
    }
}
