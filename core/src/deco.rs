//! Decompression preload: the tissue baseline a dive starts from.
//!
//! Residual nitrogen from earlier dives matters until there is a 48 hour
//! break. The preload scans backwards from the target to find where that
//! chain of dives begins, then replays the chain forwards through a
//! [`TissueModel`], feeding surface intervals between dives as air.
//!
//! A dive only sees predecessors in the same trip as itself; loose dives only
//! see other loose dives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buhlmann::TissueModel;
use crate::error::PreloadError;
use crate::models::{Dive, DiveId, GasMix};
use crate::storage::DiveStore;
use crate::trip::DiveLog;
use crate::units::interpolate;

/// Gap after which an earlier dive no longer affects the tissues.
pub const PRELOAD_WINDOW_SEC: i64 = 48 * 60 * 60;

/// Cooperative cancellation flag for a running preload.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Store indexes of the dives to replay before `target`, oldest first.
pub fn preload_window(store: &DiveStore, target: usize) -> Vec<usize> {
    let Some(dive) = store.get(target) else {
        return Vec::new();
    };
    let mut when = dive.start_time_unix;
    let mut window = Vec::new();

    for index in (0..target).rev() {
        let Some(prev) = store.get(index) else {
            break;
        };
        if prev.trip != dive.trip {
            continue;
        }
        if prev.start_time_unix > when
            || prev.end_time_unix().saturating_add(PRELOAD_WINDOW_SEC) < when
        {
            break;
        }
        // chain from the accepted dive, not from the target
        when = prev.start_time_unix;
        window.push(index);
    }
    window.reverse();
    window
}

/// Replay one dive at one-second resolution.
fn replay_dive(
    dive: &Dive,
    model: &mut dyn TissueModel,
    cancel: Option<&CancelToken>,
) -> Result<Option<f64>, PreloadError> {
    let mut tolerance = None;
    for pair in dive.samples.windows(2) {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(PreloadError::Cancelled);
        }
        let (prev, sample) = (&pair[0], &pair[1]);
        let (t0, t1) = (prev.t_sec, sample.t_sec);
        for t in t0..t1 {
            let depth = interpolate(prev.depth_mm, sample.depth_mm, t - t0, t1 - t0);
            tolerance = Some(model.add_segment(
                dive.depth_to_mbar(depth) / 1000.0,
                dive.mix_at(t),
                1,
                sample.po2_mbar,
                dive,
            ));
        }
    }
    Ok(tolerance)
}

/// Seconds spent at the surface between `end` and `start`, if any.
fn surface_interval(end: i64, start: i64) -> Option<u32> {
    let gap = start.saturating_sub(end);
    (gap > 0).then(|| u32::try_from(gap).unwrap_or(u32::MAX))
}

fn run(
    store: &DiveStore,
    target: usize,
    model: &mut dyn TissueModel,
    cancel: Option<&CancelToken>,
) -> Result<f64, PreloadError> {
    let Some(dive) = store.get(target) else {
        return Ok(0.0);
    };
    let window = preload_window(store, target);
    let Some(&first) = window.first() else {
        debug!(dive = ?dive.id, "no earlier dives to preload");
        model.reset_surface(dive.surface_bar());
        return Ok(0.0);
    };
    debug!(
        dive = ?dive.id,
        first,
        replayed = window.len(),
        "preloading tissues"
    );

    let mut tolerance = 0.0;
    let mut last_end: Option<i64> = None;
    if let Some(start) = store.get(first) {
        model.reset_surface(start.surface_bar());
    }

    for index in window {
        let Some(prev) = store.get(index) else {
            continue;
        };
        if let Some(end) = last_end {
            if let Some(seconds) = surface_interval(end, prev.start_time_unix) {
                tolerance = model.add_segment(prev.surface_bar(), GasMix::AIR, seconds, None, dive);
            }
        }
        if let Some(t) = replay_dive(prev, model, cancel)? {
            tolerance = t;
        }
        trace!(dive = ?prev.id, tolerance, "replayed dive");
        last_end = Some(prev.end_time_unix());
    }

    if let Some(end) = last_end {
        if let Some(seconds) = surface_interval(end, dive.start_time_unix) {
            tolerance = model.add_segment(dive.surface_bar(), GasMix::AIR, seconds, None, dive);
        }
    }
    Ok(tolerance)
}

/// Load `model` with the residual gas from dives before `target` and return
/// the resulting tolerance.
///
/// Returns 0.0 without touching the model for no target or an unknown one.
/// With no relevant history the model is reset at the target's surface
/// pressure and 0.0 is returned.
pub fn preload(log: &DiveLog, target: Option<DiveId>, model: &mut dyn TissueModel) -> f64 {
    let Some(index) = target.and_then(|id| log.store().index_of(id)) else {
        return 0.0;
    };
    run(log.store(), index, model, None).unwrap_or(0.0)
}

/// Like [`preload`], but checks `cancel` between samples.
///
/// The replay runs on a copy of `model`, which is only overwritten when the
/// replay completes, so a cancelled preload leaves it untouched.
pub fn preload_cancellable<M>(
    log: &DiveLog,
    target: Option<DiveId>,
    model: &mut M,
    cancel: &CancelToken,
) -> Result<f64, PreloadError>
where
    M: TissueModel + Clone,
{
    let Some(index) = target.and_then(|id| log.store().index_of(id)) else {
        return Ok(0.0);
    };
    let mut scratch = model.clone();
    match run(log.store(), index, &mut scratch, Some(cancel)) {
        Ok(tolerance) => {
            *model = scratch;
            Ok(tolerance)
        }
        Err(err) => {
            warn!(dive = ?target, "tissue preload cancelled");
            Err(err)
        }
    }
}

impl DiveLog {
    /// Tissue baseline for `target`, see [`preload`].
    pub fn deco_preload(&self, target: Option<DiveId>, model: &mut dyn TissueModel) -> f64 {
        preload(self, target, model)
    }
}
