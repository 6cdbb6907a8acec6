//! Heap lifecycle tracing infrastructure.
//!
//! Provides a trait-based tracing system for container lifecycle events with zero-cost
//! abstraction. When using [`NoopTracer`], all trace methods compile away entirely via
//! monomorphization, identical to how [`NoLimitTracker`](crate::resource::NoLimitTracker)
//! eliminates resource checking overhead.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default) |
//! | [`StderrTracer`] | Human-readable lifecycle log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests or post-mortem |
//!
//! The heap is parameterized as `Heap<T: ResourceTracker, R: HeapTracer>`; callers pick
//! the tracer at construction time with [`Heap::with_tracer`](crate::Heap::with_tracer).

use crate::heap::{ContainerKind, Epoch, HeapId};

/// Trace event emitted by the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A container header was allocated and registered.
    Alloc { id: HeapId, kind: ContainerKind },
    /// A container was freed because its refcount reached zero outside a sweep.
    Free { id: HeapId, kind: ContainerKind },
    /// The first sweep pass released the entries of an unmarked container.
    SweepRelease { id: HeapId, epoch: Epoch },
    /// The second sweep pass released and unregistered a header.
    SweepFree { id: HeapId },
    /// A container was copied.
    Copy { source: HeapId, copy: HeapId, deep: bool },
}

/// Trait for heap lifecycle tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires zero lines
/// of code. Implementations only override the hooks they care about.
pub trait HeapTracer: std::fmt::Debug {
    #[inline(always)]
    fn on_alloc(&mut self, _id: HeapId, _kind: ContainerKind) {}

    #[inline(always)]
    fn on_free(&mut self, _id: HeapId, _kind: ContainerKind) {}

    /// Called once per unmarked container in the first sweep pass.
    #[inline(always)]
    fn on_sweep_release(&mut self, _id: HeapId, _epoch: Epoch) {}

    /// Called once per header released by the second sweep pass.
    #[inline(always)]
    fn on_sweep_free(&mut self, _id: HeapId) {}

    #[inline(always)]
    fn on_copy(&mut self, _source: HeapId, _copy: HeapId, _deep: bool) {}
}

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl HeapTracer for NoopTracer {}

/// Tracer that prints a human-readable lifecycle log to stderr.
///
/// Output format:
/// ```text
///   +++ ALLOC  Dict #3
///   --- FREE   List #1
///   ~~~ SWEEP  release #4 epoch=7
///   ~~~ SWEEP  free    #4
///   === COPY   #2 -> #5 (deep)
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer;

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HeapTracer for StderrTracer {
    fn on_alloc(&mut self, id: HeapId, kind: ContainerKind) {
        eprintln!("  +++ ALLOC  {kind} #{}", id.index());
    }

    fn on_free(&mut self, id: HeapId, kind: ContainerKind) {
        eprintln!("  --- FREE   {kind} #{}", id.index());
    }

    fn on_sweep_release(&mut self, id: HeapId, epoch: Epoch) {
        eprintln!("  ~~~ SWEEP  release #{} epoch={}", id.index(), epoch.get());
    }

    fn on_sweep_free(&mut self, id: HeapId) {
        eprintln!("  ~~~ SWEEP  free    #{}", id.index());
    }

    fn on_copy(&mut self, source: HeapId, copy: HeapId, deep: bool) {
        let how = if deep { "deep" } else { "shallow" };
        eprintln!("  === COPY   #{} -> #{} ({how})", source.index(), copy.index());
    }
}

/// Tracer that records every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Removes and returns all recorded events.
    pub fn take_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl HeapTracer for RecordingTracer {
    fn on_alloc(&mut self, id: HeapId, kind: ContainerKind) {
        self.events.push(TraceEvent::Alloc { id, kind });
    }

    fn on_free(&mut self, id: HeapId, kind: ContainerKind) {
        self.events.push(TraceEvent::Free { id, kind });
    }

    fn on_sweep_release(&mut self, id: HeapId, epoch: Epoch) {
        self.events.push(TraceEvent::SweepRelease { id, epoch });
    }

    fn on_sweep_free(&mut self, id: HeapId) {
        self.events.push(TraceEvent::SweepFree { id });
    }

    fn on_copy(&mut self, source: HeapId, copy: HeapId, deep: bool) {
        self.events.push(TraceEvent::Copy { source, copy, deep });
    }
}
