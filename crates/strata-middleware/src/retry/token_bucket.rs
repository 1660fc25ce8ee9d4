//! Client-wide retry quota.

use parking_lot::Mutex;

/// A bucket of retry tokens shared by every call a client makes.
///
/// Throttling retries and timeout retries withdraw tokens; successful calls
/// put tokens back. When the bucket runs dry those retries stop, which keeps
/// a struggling service from being hammered by every caller at once.
#[derive(Debug)]
pub struct TokenBucket {
    available: Mutex<u32>,
    capacity: u32,
}

impl TokenBucket {
    /// Default capacity.
    pub const DEFAULT_CAPACITY: u32 = 500;

    /// Creates a full bucket.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            available: Mutex::new(capacity),
            capacity,
        }
    }

    /// Withdraws `cost` tokens if that many are available.
    pub fn try_acquire(&self, cost: u32) -> bool {
        let mut available = self.available.lock();
        if *available < cost {
            return false;
        }
        *available -= cost;
        true
    }

    /// Returns `amount` tokens, never exceeding capacity.
    pub fn release(&self, amount: u32) {
        let mut available = self.available.lock();
        *available = available.saturating_add(amount).min(self.capacity);
    }

    /// Returns the number of tokens currently available.
    #[must_use]
    pub fn available(&self) -> u32 {
        *self.available.lock()
    }

    /// Returns the capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
