//! The single pure entry point: `next_state(strategy, current, event, context)`.

use crate::table::{GuardContext, TransitionTable};
use crate::tables;
use asrhub_action::{EventKind, FsmState, Strategy};
use std::sync::OnceLock;

struct Tables {
    non_streaming: TransitionTable,
    streaming: TransitionTable,
    batch: TransitionTable,
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| Tables {
        non_streaming: tables::non_streaming(),
        streaming: tables::streaming(),
        batch: tables::batch(),
    })
}

fn table_for(strategy: Strategy) -> &'static TransitionTable {
    let t = tables();
    match strategy {
        Strategy::NonStreaming => &t.non_streaming,
        Strategy::Streaming => &t.streaming,
        Strategy::Batch => &t.batch,
    }
}

/// Compute the next state for `(strategy, current, event)`, or `None` if the
/// pair has no table entry (a `StateError`, logged by the caller, not by this
/// pure function).
///
/// `ERROR`, `RECOVER` and `RESET` are handled uniformly across every strategy
/// rather than duplicated in each table, matching the canonical flow's "any
/// --error--> ERROR", "ERROR --recover--> previous_state" and "any --reset-->
/// initial" rules.
pub fn next_state(
    strategy: Strategy,
    current: FsmState,
    event: EventKind,
    ctx: &GuardContext,
) -> Option<FsmState> {
    if current == FsmState::Terminated {
        return None;
    }
    match event {
        EventKind::Reset => Some(FsmState::initial(strategy)),
        EventKind::Error => Some(FsmState::Error),
        EventKind::Recover => {
            if current != FsmState::Error {
                return None;
            }
            ctx.previous_state.or(Some(FsmState::initial(strategy)))
        }
        _ => table_for(strategy).resolve(current, event, ctx),
    }
}
