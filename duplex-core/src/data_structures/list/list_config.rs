/// Tuning knobs for an [`AtomicList`](super::AtomicList).
///
/// ```
/// use duplex_core::ListConfig;
///
/// let config = ListConfig::default()
///     .with_retry_limit(16)
///     .with_spin_backoff(false);
/// assert_eq!(config.retry_limit(), 16);
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListConfig {
    spin_backoff: bool,
    retry_limit: u32,
    segment_capacity: u32,
}

impl ListConfig {
    pub const DEFAULT_RETRY_LIMIT: u32 = 128;
    pub const DEFAULT_SEGMENT_CAPACITY: u32 = 32;

    pub fn new() -> Self {
        ListConfig {
            spin_backoff: true,
            retry_limit: Self::DEFAULT_RETRY_LIMIT,
            segment_capacity: Self::DEFAULT_SEGMENT_CAPACITY,
        }
    }

    /// Spin with exponential backoff between failed CAS attempts.
    pub fn with_spin_backoff(mut self, spin_backoff: bool) -> Self {
        self.spin_backoff = spin_backoff;
        self
    }

    /// Failed anchor CAS attempts a `try_*` operation tolerates before giving up.
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Slots in the first arena segment. Rounded up to a power of two.
    pub fn with_segment_capacity(mut self, segment_capacity: u32) -> Self {
        self.segment_capacity = segment_capacity;
        self
    }

    pub fn spin_backoff(&self) -> bool {
        self.spin_backoff
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn segment_capacity(&self) -> u32 {
        self.segment_capacity
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self::new()
    }
}
