//! The declarative transition table: `(strategy, state, event) -> (next_state, guard?)`.

use asrhub_action::{EventKind, FsmState, Strategy};
use std::collections::HashMap;

/// Inputs a guard predicate may consult. Side-effect free, as mandated for
/// the FSM engine: guards never touch the pipeline, pool or timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardContext {
    /// Whether the pending LLM/TTS turn will actually reply (vs. a bare ack).
    pub will_reply: bool,
    /// Whether the session should stay `ACTIVATED` after a reply finishes,
    /// instead of dropping back to `LISTENING`.
    pub keep_awake: bool,
    /// The state the session occupied before its current one; consulted by
    /// `RECOVER`, which is handled outside the per-strategy table (see
    /// `engine::next_state`) since it is the same for every strategy.
    pub previous_state: Option<FsmState>,
}

pub type Guard = Box<dyn Fn(&GuardContext) -> bool + Send + Sync>;

pub struct TableEntry {
    pub next_state: FsmState,
    pub guard: Option<Guard>,
}

impl TableEntry {
    pub fn unconditional(next_state: FsmState) -> Self {
        Self {
            next_state,
            guard: None,
        }
    }

    pub fn guarded(next_state: FsmState, guard: Guard) -> Self {
        Self {
            next_state,
            guard: Some(guard),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub state: FsmState,
    pub event: EventKind,
}

/// One strategy's full transition table. Entries for the same key are tried
/// in insertion order; the first whose guard passes (or that has no guard)
/// wins. A key with no entries, or whose entries all fail their guards,
/// yields no transition.
#[derive(Default)]
pub struct TransitionTable {
    entries: HashMap<TableKey, Vec<TableEntry>>,
}

impl TransitionTable {
    pub fn builder() -> TransitionTableBuilder {
        TransitionTableBuilder::default()
    }

    pub fn resolve(&self, state: FsmState, event: EventKind, ctx: &GuardContext) -> Option<FsmState> {
        let key = TableKey { state, event };
        self.entries.get(&key)?.iter().find_map(|entry| match &entry.guard {
            Some(guard) if !guard(ctx) => None,
            _ => Some(entry.next_state),
        })
    }
}

#[derive(Default)]
pub struct TransitionTableBuilder {
    entries: HashMap<TableKey, Vec<TableEntry>>,
}

impl TransitionTableBuilder {
    pub fn on(mut self, state: FsmState, event: EventKind, entry: TableEntry) -> Self {
        self.entries
            .entry(TableKey { state, event })
            .or_default()
            .push(entry);
        self
    }

    pub fn build(self) -> TransitionTable {
        TransitionTable { entries: self.entries }
    }
}

/// Selects which strategy's table a `(state, event)` lookup runs against.
pub fn strategies() -> [Strategy; 3] {
    [Strategy::NonStreaming, Strategy::Streaming, Strategy::Batch]
}
