//! Simulation observer trait for progress reporting and data collection.

use tp_core::Tick;
use tp_stage::StageContext;

use crate::Transportable;

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points in the
/// tick loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_tick_end(&mut self, tick: Tick, woken: usize) {
///         if tick.0 % self.interval == 0 {
///             println!("tick {tick}: woke {woken} transportables");
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before any processing.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called at the end of each tick.
    ///
    /// `woken` is the number of transportables whose itinerary advanced this
    /// tick, by timer, boarding or alighting.
    fn on_tick_end(&mut self, _tick: Tick, _woken: usize) {}

    /// Called once per transportable when its itinerary ends, normally, by
    /// abort, or at simulation end.
    ///
    /// `ctx` resolves the network and the vehicles still in the fleet, so
    /// stages can describe themselves.
    fn on_itinerary_end(&mut self, _agent: &Transportable, _ctx: &StageContext<'_>) {}

    /// Called once after the final tick completes.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
