//! Shard numbering shared by every login issued from one client.

use parking_lot::Mutex;
use relay_core::{ShardAssignment, ShardError};

/// Current shard and total shard count, validated together.
///
/// Both numbers live behind one lock, so `current < total` holds for every
/// observable state. Failed updates leave the previous pair in place.
#[derive(Debug)]
pub struct ShardConfig {
    state: Mutex<ShardAssignment>,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self::new(ShardAssignment::unsharded())
    }
}

impl ShardConfig {
    /// Start from an already validated assignment.
    #[must_use]
    pub fn new(assignment: ShardAssignment) -> Self {
        Self {
            state: Mutex::new(assignment),
        }
    }

    /// The current `(current, total)` pair.
    pub fn assignment(&self) -> ShardAssignment {
        *self.state.lock()
    }

    /// Index of the shard single logins connect as.
    pub fn current(&self) -> u32 {
        self.state.lock().index()
    }

    /// Total number of shards.
    pub fn total(&self) -> u32 {
        self.state.lock().total()
    }

    /// Change the total shard count.
    ///
    /// Fails if `total` is zero or would leave the current shard out of range.
    pub fn set_total_shards(&self, total: u32) -> Result<(), ShardError> {
        let mut state = self.state.lock();
        *state = ShardAssignment::new(state.index(), total)?;
        Ok(())
    }

    /// Change the current shard. Fails if `current >= total`.
    pub fn set_current_shard(&self, current: u32) -> Result<(), ShardError> {
        let mut state = self.state.lock();
        *state = ShardAssignment::new(current, state.total())?;
        Ok(())
    }

    /// Replace both numbers at once.
    pub fn set(&self, current: u32, total: u32) -> Result<(), ShardError> {
        let assignment = ShardAssignment::new(current, total)?;
        *self.state.lock() = assignment;
        Ok(())
    }
}
