//! Network map build parameters.

/// Configuration for building a [`NetworkMap`](super::NetworkMap).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Stops closer than this to an existing vertex are merged into it (km).
    pub merge_radius_km: f64,

    /// A hop slower than a known path by more than this factor is kept
    /// as its own edge instead of being composed from that path.
    pub shortcut_factor: f64,
}

impl NetworkConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(merge_radius_km: f64, shortcut_factor: f64) -> Self {
        Self {
            merge_radius_km,
            shortcut_factor,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            merge_radius_km: 0.8,
            shortcut_factor: 1.66,
        }
    }
}
