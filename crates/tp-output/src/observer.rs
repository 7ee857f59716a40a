//! `StageOutputObserver<W>`: bridges `SimObserver` to an `OutputWriter`.

use tracing::debug;

use tp_core::{SimConfig, Tick};
use tp_sim::{SimObserver, Transportable};
use tp_stage::{RecordBuffer, StageContext};

use crate::row::TickSummaryRow;
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`SimObserver`] that writes each transportable's trip info and routes
/// when its itinerary ends, plus one summary row per tick.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After `sim.run()` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct StageOutputObserver<W: OutputWriter> {
    writer:             W,
    start_unix_secs:    i64,
    tick_duration_secs: u32,
    route_lengths:      bool,
    reported:           usize,
    last_error:         Option<OutputError>,
}

impl<W: OutputWriter> StageOutputObserver<W> {
    /// Create an observer backed by `writer`.  `route_lengths` adds the
    /// length column to route rows.
    pub fn new(writer: W, config: &SimConfig, route_lengths: bool) -> Self {
        Self {
            writer,
            start_unix_secs:    config.start_unix_secs,
            tick_duration_secs: config.tick_duration_secs,
            route_lengths,
            reported:           0,
            last_error:         None,
        }
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Number of itineraries reported so far.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Unwrap the inner writer (e.g. to inspect files after the sim).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn unix_time(&self, tick: Tick) -> i64 {
        self.start_unix_secs + tick.0 as i64 * self.tick_duration_secs as i64
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> SimObserver for StageOutputObserver<W> {
    fn on_tick_end(&mut self, tick: Tick, woken: usize) {
        let row = TickSummaryRow {
            tick:           tick.0,
            unix_time_secs: self.unix_time(tick),
            woken_agents:   woken as u64,
        };
        let result = self.writer.write_tick_summary(&row);
        self.store_err(result);
    }

    fn on_itinerary_end(&mut self, agent: &Transportable, ctx: &StageContext<'_>) {
        let who = agent.agent_ref();
        let mut buffer = RecordBuffer::new();
        for stage in agent.itinerary.stages() {
            // Stages never activated have nothing to report yet.
            if stage.departed().is_some() {
                stage.trip_info_output(&mut buffer, &who, ctx);
            }
            stage.route_output(&mut buffer, &who, self.route_lengths, ctx);
        }
        debug!(agent = %agent.name, trip_infos = buffer.trip_infos.len(), routes = buffer.routes.len(), "reporting itinerary");
        self.reported += 1;

        let result = self.writer.write_trip_infos(&buffer.trip_infos);
        self.store_err(result);
        let result = self.writer.write_routes(&buffer.routes);
        self.store_err(result);
    }

    fn on_sim_end(&mut self, _final_tick: Tick) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
