//! Streaming view of the controller's published state.
//!
//! ## Why stream?
//!
//! A presentation layer usually wants "tell me whenever something changes"
//! rather than polling. These helpers wrap the controller's watch channel in
//! a `Stream`. Watch semantics apply: a slow consumer sees the latest state,
//! not every intermediate one, so a stream may skip straight from
//! `Extracting` to `Ready`.

use crate::controller::PipelineController;
use crate::state::PipelineRun;
use futures::stream;
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of published runs.
pub type RunStream = Pin<Box<dyn Stream<Item = PipelineRun> + Send>>;

/// Every published state, starting with the current one. Never ends while
/// the controller is alive.
pub fn watch_runs(controller: &PipelineController) -> RunStream {
    Box::pin(WatchStream::new(controller.subscribe()))
}

/// States of one generation only.
///
/// Skips anything older, then yields states of `generation` until one is
/// terminal (that one included) or a newer generation replaces it.
pub fn follow_generation(controller: &PipelineController, generation: u64) -> RunStream {
    let rx = controller.subscribe();
    let runs = stream::unfold(Some((rx, true)), move |state| async move {
        let (mut rx, first) = state?;
        if !first {
            rx.changed().await.ok()?;
        }
        loop {
            let run = rx.borrow_and_update().clone();
            if run.generation() > generation {
                return None;
            }
            if run.generation() == generation {
                let next = (!run.status().is_terminal()).then_some((rx, false));
                return Some((run, next));
            }
            rx.changed().await.ok()?;
        }
    });
    Box::pin(runs)
}
