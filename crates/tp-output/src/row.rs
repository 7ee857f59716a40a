//! Rows that are not stage records.

/// One row per simulated tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickSummaryRow {
    pub tick:           u64,
    pub unix_time_secs: i64,
    /// Transportables whose itinerary moved on this tick.
    pub woken_agents:   u64,
}
