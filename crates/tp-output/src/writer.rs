//! The `OutputWriter` trait implemented by all backend writers.

use tp_stage::{RouteRecord, TripInfoRecord};

use crate::{OutputResult, TickSummaryRow};

/// Trait implemented by report writers.
///
/// All methods are infallible from the observer's perspective; errors are
/// stored internally and retrieved with
/// [`StageOutputObserver::take_error`](crate::StageOutputObserver::take_error).
pub trait OutputWriter {
    /// Write what happened during each stage of one or more itineraries.
    fn write_trip_infos(&mut self, rows: &[TripInfoRecord]) -> OutputResult<()>;

    /// Write the planned stages of one or more itineraries.
    fn write_routes(&mut self, rows: &[RouteRecord]) -> OutputResult<()>;

    /// Write one tick summary row.
    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent.
    fn finish(&mut self) -> OutputResult<()>;
}
