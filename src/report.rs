//! Snapshot observers that write runs to disk.
//!
//! [`CompartmentReport`] writes one CSV row per day with the realised counts next to the
//! trajectory targets. [`SnapshotWriter`] writes every snapshot, positions included, as one JSON
//! object per line.

use crate::{
    clock::{Snapshot, SnapshotObserver},
    error::SimError,
    population::InfectionStatus::*,
};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

#[derive(Serialize)]
struct ReportRow {
    day: usize,
    susceptible: usize,
    exposed: usize,
    infected: usize,
    recovered: usize,
    dead: usize,
    target_susceptible: f64,
    target_exposed: f64,
    target_infected: f64,
    target_recovered: f64,
    target_dead: f64,
    fallback_draws: usize,
    shortfall: usize,
}

impl From<&Snapshot> for ReportRow {
    fn from(snapshot: &Snapshot) -> Self {
        let counts = &snapshot.counts;
        let targets = &snapshot.targets;
        ReportRow {
            day: snapshot.day,
            susceptible: counts[Susceptible],
            exposed: counts[Exposed],
            infected: counts[Infected],
            recovered: counts[Recovered],
            dead: counts[Dead],
            target_susceptible: targets[Susceptible],
            target_exposed: targets[Exposed],
            target_infected: targets[Infected],
            target_recovered: targets[Recovered],
            target_dead: targets[Dead],
            fallback_draws: snapshot.reconciliation.fallback_draws,
            shortfall: snapshot.reconciliation.shortfall,
        }
    }
}

pub struct CompartmentReport<W: Write> {
    writer: csv::Writer<W>,
}

impl CompartmentReport<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimError> {
        Ok(CompartmentReport {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CompartmentReport<W> {
    pub fn new(writer: W) -> Self {
        CompartmentReport {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, SimError> {
        self.writer
            .into_inner()
            .map_err(|error| SimError::Io(io::Error::new(error.error().kind(), error.error().to_string())))
    }
}

impl<W: Write> SnapshotObserver for CompartmentReport<W> {
    fn observe(&mut self, snapshot: &Snapshot) -> Result<(), SimError> {
        self.writer.serialize(ReportRow::from(snapshot))?;
        self.writer.flush()?;
        Ok(())
    }
}

pub struct SnapshotWriter<W: Write> {
    writer: W,
}

impl SnapshotWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimError> {
        Ok(SnapshotWriter {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(writer: W) -> Self {
        SnapshotWriter { writer }
    }

    pub fn into_inner(mut self) -> Result<W, SimError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> SnapshotObserver for SnapshotWriter<W> {
    fn observe(&mut self, snapshot: &Snapshot) -> Result<(), SimError> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
