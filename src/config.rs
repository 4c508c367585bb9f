//! # Engine configuration.
//!
//! Provides [`EngineConfig`], the immutable settings of one [`Engine`](crate::Engine):
//! queue capacities, worker pool sizes and the multi-listener flag.
//!
//! ## Sentinel values
//! Every capacity and pool size must be positive. A `0` is clamped to `1` by the
//! accessor methods (and reported by [`EngineConfig::clamped_fields`]), so the engine
//! never constructs an invalid channel or an empty pool.

/// Default intake (dispense) queue capacity.
pub const DEFAULT_INTAKE_CAPACITY: usize = 1;
/// Default number of dispense workers.
pub const DEFAULT_DISPENSE_WORKERS: usize = 3;
/// Default execution queue capacity.
pub const DEFAULT_EXECUTION_CAPACITY: usize = 5;
/// Default number of execution workers (and after-stage workers).
pub const DEFAULT_EXECUTION_WORKERS: usize = 10;
/// Default multi-listener mode.
pub const DEFAULT_MULTI_LISTENER: bool = true;
/// Default telemetry bus capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Configuration for one engine instance.
///
/// Defines:
/// - **Intake**: queue between `dispatch` and the dispense stage, and its pool size
/// - **Execution**: queue between dispense and execution, and its pool size
/// - **After**: queue feeding `then`/`catch` callbacks (pool size = execution workers)
/// - **Registry mode**: one or many listeners per entity type
/// - **Telemetry**: ring buffer size of the engine event bus
///
/// ## Notes
/// All fields are public for flexibility. Prefer the accessors, which clamp `0` to `1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of the intake queue. A full intake queue makes `dispatch` wait.
    pub intake_capacity: usize,

    /// Number of dispense workers.
    pub dispense_workers: usize,

    /// Capacity of the execution queue.
    pub execution_capacity: usize,

    /// Number of execution workers. The after stage runs the same number of workers.
    pub execution_workers: usize,

    /// Capacity of the after queue (`then`/`catch` actions).
    pub after_capacity: usize,

    /// Allow more than one listener per entity type.
    pub multi_listener: bool,

    /// Capacity of the engine event bus broadcast channel.
    ///
    /// Slow bus receivers that lag behind more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,
}

impl EngineConfig {
    /// Creates a configuration from the five externally tunable values.
    ///
    /// The after queue gets the same capacity as the execution queue.
    pub fn new(
        intake_capacity: usize,
        dispense_workers: usize,
        execution_capacity: usize,
        execution_workers: usize,
        multi_listener: bool,
    ) -> Self {
        Self {
            intake_capacity,
            dispense_workers,
            execution_capacity,
            execution_workers,
            after_capacity: execution_capacity,
            multi_listener,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    /// Sets the after queue capacity.
    pub fn with_after_capacity(mut self, capacity: usize) -> Self {
        self.after_capacity = capacity;
        self
    }

    /// Sets the engine event bus capacity.
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Sets the multi-listener flag.
    pub fn with_multi_listener(mut self, multi: bool) -> Self {
        self.multi_listener = multi;
        self
    }

    #[inline]
    pub fn intake_capacity_clamped(&self) -> usize {
        self.intake_capacity.max(1)
    }

    #[inline]
    pub fn dispense_workers_clamped(&self) -> usize {
        self.dispense_workers.max(1)
    }

    #[inline]
    pub fn execution_capacity_clamped(&self) -> usize {
        self.execution_capacity.max(1)
    }

    #[inline]
    pub fn execution_workers_clamped(&self) -> usize {
        self.execution_workers.max(1)
    }

    #[inline]
    pub fn after_capacity_clamped(&self) -> usize {
        self.after_capacity.max(1)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Names of the fields that hold `0` and will be clamped to `1`.
    pub fn clamped_fields(&self) -> Vec<&'static str> {
        [
            ("intake_capacity", self.intake_capacity),
            ("dispense_workers", self.dispense_workers),
            ("execution_capacity", self.execution_capacity),
            ("execution_workers", self.execution_workers),
            ("after_capacity", self.after_capacity),
            ("bus_capacity", self.bus_capacity),
        ]
        .into_iter()
        .filter(|(_, v)| *v == 0)
        .map(|(name, _)| name)
        .collect()
    }

    /// True if the queue and pool settings are the stock ones.
    ///
    /// Used for the startup log line ("default" vs "customized").
    pub fn is_default(&self) -> bool {
        self.intake_capacity == DEFAULT_INTAKE_CAPACITY
            && self.dispense_workers == DEFAULT_DISPENSE_WORKERS
            && self.execution_capacity == DEFAULT_EXECUTION_CAPACITY
            && self.execution_workers == DEFAULT_EXECUTION_WORKERS
            && self.after_capacity == DEFAULT_EXECUTION_CAPACITY
            && self.multi_listener == DEFAULT_MULTI_LISTENER
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `intake_capacity = 1`, `dispense_workers = 3`
    /// - `execution_capacity = 5`, `execution_workers = 10`
    /// - `after_capacity = 5`
    /// - `multi_listener = true`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            dispense_workers: DEFAULT_DISPENSE_WORKERS,
            execution_capacity: DEFAULT_EXECUTION_CAPACITY,
            execution_workers: DEFAULT_EXECUTION_WORKERS,
            after_capacity: DEFAULT_EXECUTION_CAPACITY,
            multi_listener: DEFAULT_MULTI_LISTENER,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_default() {
        assert!(EngineConfig::default().is_default());
    }

    #[test]
    fn test_new_mirrors_execution_capacity_into_after_queue() {
        let cfg = EngineConfig::new(8, 2, 16, 4, false);
        assert_eq!(cfg.after_capacity, 16);
        assert!(!cfg.multi_listener);
        assert!(!cfg.is_default());
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let cfg = EngineConfig::new(0, 0, 3, 0, true).with_bus_capacity(0);
        assert_eq!(cfg.intake_capacity_clamped(), 1);
        assert_eq!(cfg.dispense_workers_clamped(), 1);
        assert_eq!(cfg.execution_capacity_clamped(), 3);
        assert_eq!(cfg.execution_workers_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(
            cfg.clamped_fields(),
            vec!["intake_capacity", "dispense_workers", "execution_workers", "bus_capacity"]
        );
    }

    #[test]
    fn test_single_listener_mode_counts_as_customized() {
        let cfg = EngineConfig::default().with_multi_listener(false);
        assert!(!cfg.is_default());
    }
}
