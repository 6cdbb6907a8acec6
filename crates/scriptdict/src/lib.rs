#![doc = include_str!("../../../README.md")]
// first so the container types can implement on it
mod heap;

mod copy;
mod error;
mod literal;
mod merge;
mod resource;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    error::{Denial, DictError, DictResult, ErrorKind},
    heap::{ContainerKind, DropWithHeap, Epoch, Heap, HeapId, HeapStats, PendingSweep},
    literal::{Cursor, ExprEvaluator, LiteralEvaluator, LiteralOutcome, parse_dict_literal},
    merge::{DefaultNameRules, ExtendAction, NameRules},
    resource::{
        DEFAULT_MAX_NESTING_DEPTH, InterruptFlag, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits,
        ResourceTracker,
    },
    tracer::{HeapTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{Dict, DictEntry, DictIter, DictListKind, EntryFlags, List, LockLevel, ScopeKind},
    value::{Special, Value},
};
