//! A `Reporter` that records every diagnostic for later assertions.

use stail_core::{Diagnostic, Reporter};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingReporter {
    seen: Mutex<Vec<Diagnostic>>,
}

impl RecordingReporter {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.seen.lock().unwrap().iter().filter(|d| pred(d)).count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        self.seen.lock().unwrap().push(diagnostic);
    }
}
