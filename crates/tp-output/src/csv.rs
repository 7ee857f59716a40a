//! CSV output backend.
//!
//! Creates three files in the configured output directory:
//! - `tripinfo.csv`
//! - `routes.csv`
//! - `tick_summaries.csv`
//!
//! Absent values are written as empty fields.  Edge and line lists are
//! space-separated.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use tp_core::Tick;
use tp_stage::{RouteRecord, TripInfoRecord};

use crate::writer::OutputWriter;
use crate::{OutputResult, TickSummaryRow};

fn tick(t: Option<Tick>) -> String {
    t.map(|t| t.0.to_string()).unwrap_or_default()
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes reports to three CSV files.
pub struct CsvWriter {
    trip_infos: Writer<File>,
    routes:     Writer<File>,
    summaries:  Writer<File>,
    finished:   bool,
}

impl CsvWriter {
    /// Create `dir` if needed, open the three CSV files in it and write the
    /// header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;

        let mut trip_infos = Writer::from_path(dir.join("tripinfo.csv"))?;
        trip_infos.write_record([
            "agent", "element", "depart", "arrival", "from_edge", "to_edge", "to_stop", "arrival_pos", "duration",
            "route_length", "waiting_time", "vehicle", "line", "vehicle_class", "intended_vehicle", "intended_depart",
            "act_type",
        ])?;

        let mut routes = Writer::from_path(dir.join("routes.csv"))?;
        routes.write_record([
            "agent", "element", "edges", "to_stop", "arrival_pos", "lines", "modes", "duration", "until", "act_type",
            "route_length", "intended_vehicle", "intended_depart", "started", "ended",
        ])?;

        let mut summaries = Writer::from_path(dir.join("tick_summaries.csv"))?;
        summaries.write_record(["tick", "unix_time_secs", "woken_agents"])?;

        Ok(Self { trip_infos, routes, summaries, finished: false })
    }
}

impl OutputWriter for CsvWriter {
    fn write_trip_infos(&mut self, rows: &[TripInfoRecord]) -> OutputResult<()> {
        for r in rows {
            self.trip_infos.write_record(&[
                r.agent.clone(),
                r.element.to_owned(),
                tick(r.depart),
                tick(r.arrival),
                r.from_edge.clone(),
                r.to_edge.clone(),
                r.to_stop.clone(),
                format!("{:.2}", r.arrival_pos),
                opt(r.duration),
                format!("{:.2}", r.route_length),
                r.waiting_time.to_string(),
                r.vehicle.clone(),
                r.line.clone(),
                opt(r.vehicle_class),
                r.intended_vehicle.clone(),
                tick(r.intended_depart),
                r.act_type.clone(),
            ])?;
        }
        Ok(())
    }

    fn write_routes(&mut self, rows: &[RouteRecord]) -> OutputResult<()> {
        for r in rows {
            self.routes.write_record(&[
                r.agent.clone(),
                r.element.to_owned(),
                r.edges.join(" "),
                r.to_stop.clone(),
                format!("{:.2}", r.arrival_pos),
                r.lines.join(" "),
                r.modes.clone(),
                opt(r.duration),
                tick(r.until),
                r.act_type.clone(),
                r.route_length.map(|l| format!("{l:.2}")).unwrap_or_default(),
                r.intended_vehicle.clone(),
                tick(r.intended_depart),
                tick(r.started),
                tick(r.ended),
            ])?;
        }
        Ok(())
    }

    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.write_record(&[
            row.tick.to_string(),
            row.unix_time_secs.to_string(),
            row.woken_agents.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.trip_infos.flush()?;
        self.routes.flush()?;
        self.summaries.flush()?;
        Ok(())
    }
}
