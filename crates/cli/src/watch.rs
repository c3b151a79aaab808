//! Intake directory watcher. Arrival events go straight onto the processing
//! queue; all filtering (exclusions, queue capacity) happens in the
//! pipeline's enqueue path.

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sorter_core::pipeline::Pipeline;
use std::sync::Arc;
use tracing::{debug, warn};

/// Starts watching the intake directory. The returned watcher must be kept
/// alive; dropping it stops the callbacks.
pub fn spawn_watcher(pipeline: Arc<Pipeline>) -> Result<RecommendedWatcher> {
    let drop_dir = pipeline.config().drop_dir();

    let handler = {
        let pipeline = pipeline.clone();
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_arrival(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if path.is_file() {
                        pipeline.enqueue(path);
                    }
                }
            }
            Err(e) => warn!(error = %e, "watch error"),
        }
    };

    let mut watcher = notify::recommended_watcher(handler)?;
    watcher
        .watch(&drop_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching intake directory {:?}", drop_dir))?;
    debug!(dir = %drop_dir.display(), "watcher started");
    Ok(watcher)
}

/// Creations plus renames into the directory; moves from another location
/// on the same filesystem surface as the latter.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}
