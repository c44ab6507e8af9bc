//! Engine-wide tunables supplied by the host runtime.

use std::cmp;

/// Configuration record for construction sites.
///
/// The host runtime hands one of these to every builder; literal sites
/// need none, since their arity fixes every buffer size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of the boxed scratch buffer an uninitialised build starts
    /// with when no length hint is given.
    pub uninitialized_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { uninitialized_size: 16 }
    }
}

impl EngineConfig {
    /// Creates a config with the given scratch-buffer capacity.
    pub const fn new(uninitialized_size: usize) -> Self {
        EngineConfig { uninitialized_size }
    }

    /// Next buffer capacity when a buffer of `current` slots must fit
    /// `required`. Doubles the buffer so pushes stay amortised O(1).
    pub fn capacity(&self, current: usize, required: usize) -> usize {
        cmp::max(current * 2, cmp::max(required, 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_host_runtime() {
        assert_eq!(EngineConfig::default().uninitialized_size, 16);
    }

    #[test]
    fn growth_is_geometric_with_a_floor() {
        let config = EngineConfig::default();
        assert_eq!(config.capacity(0, 1), 4);
        assert_eq!(config.capacity(4, 5), 8);
        assert_eq!(config.capacity(16, 17), 32);
        assert_eq!(config.capacity(16, 100), 100);
    }
}
