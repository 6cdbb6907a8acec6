use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// Default nesting limit for copy, formatting and conversion of nested containers.
///
/// A deep copy without epoch memoization of a self-referencing structure only stops
/// here, so the limit also bounds runaway recursion.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

/// Error returned when a resource limit is exceeded or the host asked to interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum memory usage exceeded.
    Memory { limit: usize, used: usize },
    /// Container nesting is deeper than the configured limit.
    Nesting { limit: usize, depth: usize },
    /// The host raised the interrupt flag during a long-running enumeration.
    Interrupted,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::Nesting { limit, depth } => {
                write!(f, "variable nested too deep: {depth} > {limit}")
            }
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Cooperative interrupt signal shared between the host and a heap.
///
/// The host (typically a signal handler or a UI thread) calls [`InterruptFlag::raise`];
/// long-running enumerations poll it between entries and abort early.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Trait for tracking resource usage of a heap.
///
/// Implementations can enforce limits on allocations and memory, and surface the
/// host's interrupt signal. [`NoLimitTracker`] compiles every check away.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each container allocation.
    ///
    /// Returns `Err(ResourceError)` if a limit would be exceeded.
    ///
    /// # Arguments
    /// * `get_size` - Lazily computed approximate size in bytes of the allocation
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called before adding an entry to an existing container.
    ///
    /// Entries are separate allocations in the classic design, so they count against
    /// the allocation budget too. The default routes through `on_allocate`.
    fn on_container_insert(&mut self) -> Result<(), ResourceError> {
        self.on_allocate(|| 0)
    }

    /// Called when a container header is released.
    fn on_free(&mut self, get_size: impl FnOnce() -> usize);

    /// Polled between entries of long-running enumerations.
    fn check_interrupt(&self) -> Result<(), ResourceError>;

    /// Maximum nesting depth for copies and formatting.
    fn nesting_limit(&self) -> usize {
        DEFAULT_MAX_NESTING_DEPTH
    }

    /// Returns the total number of allocations tracked, if this tracker records them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of allocations (containers and entries) allowed.
    pub max_allocations: Option<usize>,
    /// Maximum heap memory in bytes (approximate).
    pub max_memory: Option<usize>,
    /// Maximum container nesting depth for copies and formatting.
    pub max_nesting_depth: Option<usize>,
}

impl ResourceLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    #[must_use]
    pub fn max_nesting_depth(mut self, limit: usize) -> Self {
        self.max_nesting_depth = Some(limit);
        self
    }
}

/// A tracker with no limits. Every hook is a no-op except the default nesting limit.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_container_insert(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_free(&mut self, _get_size: impl FnOnce() -> usize) {}

    #[inline]
    fn check_interrupt(&self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// A tracker that enforces [`ResourceLimits`] and honours an [`InterruptFlag`].
///
/// Allocation exhaustion is reported as [`ResourceError::Allocation`] or
/// [`ResourceError::Memory`]; setting a small `max_allocations` is also the way tests
/// simulate out-of-memory in the middle of an operation.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// Total number of allocations made.
    allocation_count: usize,
    /// Current approximate memory usage in bytes.
    current_memory: usize,
    /// Not serialized: a deserialized tracker starts without an interrupt source.
    #[serde(skip)]
    interrupt: InterruptFlag,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocation_count: 0,
            current_memory: 0,
            interrupt: InterruptFlag::new(),
        }
    }

    /// Attaches the host's interrupt flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[must_use]
    pub fn interrupt(&self) -> &InterruptFlag {
        &self.interrupt
    }

    #[must_use]
    pub fn current_memory(&self) -> usize {
        self.current_memory
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }

        if let Some(max) = self.limits.max_memory {
            let new_memory = self.current_memory + get_size();
            if new_memory > max {
                return Err(ResourceError::Memory {
                    limit: max,
                    used: new_memory,
                });
            }
            self.current_memory = new_memory;
        }

        self.allocation_count += 1;
        Ok(())
    }

    fn on_free(&mut self, get_size: impl FnOnce() -> usize) {
        if self.limits.max_memory.is_some() {
            self.current_memory = self.current_memory.saturating_sub(get_size());
        }
    }

    fn check_interrupt(&self) -> Result<(), ResourceError> {
        if self.interrupt.is_raised() {
            Err(ResourceError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn nesting_limit(&self) -> usize {
        self.limits.max_nesting_depth.unwrap_or(DEFAULT_MAX_NESTING_DEPTH)
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }
}
