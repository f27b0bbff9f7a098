use filterdns_domain::FilterError;

/// Collects non-fatal per-list errors during `Storage::refresh_initial`/
/// `refresh` so that one bad source never aborts the whole refresh (spec §7
/// "Configuration" and "Malformed input" error kinds).
pub trait ErrorCollectorPort: Send + Sync {
    fn report(&self, list_id: &str, error: &FilterError);
}

/// Accumulates reported errors in memory. Useful for tests and for hosts
/// that just want to log them afterwards.
#[derive(Default)]
pub struct CollectingErrorCollector {
    errors: std::sync::Mutex<Vec<(String, String)>>,
}

impl CollectingErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(String, String)> {
        std::mem::take(&mut self.errors.lock().unwrap())
    }
}

impl ErrorCollectorPort for CollectingErrorCollector {
    fn report(&self, list_id: &str, error: &FilterError) {
        self.errors
            .lock()
            .unwrap()
            .push((list_id.to_string(), error.to_string()));
    }
}
