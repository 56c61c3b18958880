//! Warning collection and strict mode.
//!
//! Warnings are logged the moment they are raised and remembered so the
//! orchestrator can abort at its checkpoints when strict mode is active.

use crate::log;
use anyhow::{Result, bail};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct Diagnostics {
    strict: bool,
    warnings: Mutex<Vec<String>>,
}

impl Diagnostics {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Log and record a recoverable problem about `subject`.
    pub fn warn(&self, subject: impl std::fmt::Display, message: impl std::fmt::Display) {
        let line = format!("{subject}: {message}");
        log!("warn"; "{}", line);
        self.warnings.lock().push(line);
    }

    pub fn count(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Fail if strict mode is active and anything has been recorded.
    pub fn check(&self, phase: &str) -> Result<()> {
        let count = self.count();
        if self.strict && count > 0 {
            bail!("strict mode: {count} warning(s) during {phase}");
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn messages(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_recorded() {
        let diag = Diagnostics::new(false);
        diag.warn("2021/01/01/a/index.md", "missing title");
        assert_eq!(diag.count(), 1);
        assert_eq!(diag.messages()[0], "2021/01/01/a/index.md: missing title");
        assert!(diag.check("scan").is_ok());
    }

    #[test]
    fn test_strict_promotes_warnings() {
        let diag = Diagnostics::new(true);
        assert!(diag.check("scan").is_ok());
        diag.warn("about.md", "malformed front-matter");
        let err = diag.check("scan").unwrap_err();
        assert!(format!("{err}").contains("1 warning"));
    }
}
