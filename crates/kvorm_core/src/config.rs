//! ORM configuration.

/// Default page size used when a request leaves `limit` at zero.
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Tuning knobs for pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Page size substituted for a zero `limit`.
    pub default_page_limit: u64,

    /// Number of items a total-count drain may visit before a warning is
    /// logged.
    pub scan_warning_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_page_limit: DEFAULT_PAGE_LIMIT,
            scan_warning_threshold: 10_000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default page limit.
    #[must_use]
    pub const fn default_page_limit(mut self, limit: u64) -> Self {
        self.default_page_limit = limit;
        self
    }

    /// Sets the scan warning threshold.
    #[must_use]
    pub const fn scan_warning_threshold(mut self, threshold: u64) -> Self {
        self.scan_warning_threshold = threshold;
        self
    }
}
