//! Gzip-compressed JSON output frames.
//!
//! One file per worker per output time, named after the simulation date
//! and UT seconds: `20230501_36060.000000_r0000.json.gz`. Field frames go
//! to the output directory, aux (GLOW) frames to `aurmaps/` and milestones
//! to `milestones/`. Only interior cells are written.

use crate::error::{IoError, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ionodrive_core::collaborators::{OutputRecord, OutputSink};
use ionodrive_core::RunSummary;
use ionodrive_data::{
    BufferLayout, ElectroVar, FieldBuffers, FluidVar, GridExtents, LocalTopology, OutputMode,
    ProcessGrid,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const AUX_DIR: &str = "aurmaps";
pub const MILESTONE_DIR: &str = "milestones";
pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Field,
    Aux,
    Milestone,
}

/// Where a frame sits in the run and in the process grid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub run_id: Uuid,
    pub fingerprint: String,
    pub kind: FrameKind,
    pub mode: OutputMode,
    pub it: u64,
    pub t: f64,
    pub ymd: [i32; 3],
    pub ut_sec: f64,
    pub rank: usize,
    pub process_grid: ProcessGrid,
    pub global: GridExtents,
    pub local: GridExtents,
    pub offset2: usize,
    pub offset3: usize,
    pub lsp: usize,
    pub written_at: DateTime<Utc>,
}

/// Header plus named variables, interior cells only, x1 fastest. Species
/// variables hold `lsp` consecutive blocks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub variables: BTreeMap<String, Vec<f64>>,
}

/// File name for one worker's frame at `record`'s time.
#[must_use]
pub fn frame_file_name(record: &OutputRecord) -> String {
    let [year, month, day] = record.time.ymd();
    format!(
        "{year:04}{month:02}{day:02}_{:012.6}_r{:04}.json.gz",
        record.time.ut_sec(),
        record.rank
    )
}

fn interior(layout: &BufferLayout, block: &[f64]) -> Vec<f64> {
    layout.interior_indices().map(|i| block[i]).collect()
}

fn species_interior(buffers: &FieldBuffers, var: FluidVar) -> Vec<f64> {
    let layout = buffers.layout();
    (0..layout.lsp)
        .flat_map(|species| interior(layout, buffers.species(var, species)))
        .collect()
}

/// Density-weighted ion average of `var`, per interior cell.
fn ion_average(buffers: &FieldBuffers, var: FluidVar) -> Vec<f64> {
    let layout = buffers.layout();
    let ions = layout.lsp.saturating_sub(1);
    layout
        .interior_indices()
        .map(|i| {
            let (weighted, total) = (0..ions).fold((0.0, 0.0), |(w, n), s| {
                let density = buffers.species(FluidVar::Density, s)[i];
                (w + density * buffers.species(var, s)[i], n + density)
            });
            if total > 0.0 {
                weighted / total
            } else {
                0.0
            }
        })
        .collect()
}

fn electron_interior(buffers: &FieldBuffers, var: FluidVar) -> Vec<f64> {
    let layout = buffers.layout();
    interior(layout, buffers.species(var, layout.lsp - 1))
}

fn field_variables(mode: OutputMode, buffers: &FieldBuffers) -> BTreeMap<String, Vec<f64>> {
    let layout = buffers.layout();
    let mut vars = BTreeMap::new();
    match mode {
        OutputMode::Full => {
            for var in FluidVar::ALL {
                vars.insert(var.name().to_string(), species_interior(buffers, var));
            }
            for var in ElectroVar::ALL {
                vars.insert(var.name().to_string(), interior(layout, buffers.electro_var(var)));
            }
        }
        OutputMode::Averaged => {
            vars.insert("ne".into(), electron_interior(buffers, FluidVar::Density));
            vars.insert("v1avg".into(), ion_average(buffers, FluidVar::V1));
            vars.insert("v2avg".into(), ion_average(buffers, FluidVar::V2));
            vars.insert("v3avg".into(), ion_average(buffers, FluidVar::V3));
            vars.insert("Tavg".into(), ion_average(buffers, FluidVar::Temperature));
            vars.insert("Te".into(), electron_interior(buffers, FluidVar::Temperature));
            for var in [
                ElectroVar::J1,
                ElectroVar::J2,
                ElectroVar::J3,
                ElectroVar::Potential,
            ] {
                vars.insert(var.name().to_string(), interior(layout, buffers.electro_var(var)));
            }
        }
        OutputMode::ElectronDensity => {
            vars.insert("ne".into(), electron_interior(buffers, FluidVar::Density));
        }
    }
    vars
}

fn aux_variables(buffers: &FieldBuffers) -> BTreeMap<String, Vec<f64>> {
    let layout = buffers.layout();
    let cells = layout.ghosted_cells();
    buffers
        .fluid_aux()
        .chunks(cells)
        .enumerate()
        .map(|(k, block)| (format!("aux{k}"), interior(layout, block)))
        .collect()
}

/// Writes frames under the run's output directory.
pub struct FileOutputWriter {
    out_dir: PathBuf,
    run_id: Uuid,
    fingerprint: String,
    topology: Option<LocalTopology>,
}

impl FileOutputWriter {
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, run_id: Uuid, fingerprint: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            run_id,
            fingerprint: fingerprint.into(),
            topology: None,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn dir(&self, kind: FrameKind) -> PathBuf {
        match kind {
            FrameKind::Field => self.out_dir.clone(),
            FrameKind::Aux => self.out_dir.join(AUX_DIR),
            FrameKind::Milestone => self.out_dir.join(MILESTONE_DIR),
        }
    }

    fn write_frame(
        &self,
        kind: FrameKind,
        mode: OutputMode,
        record: &OutputRecord,
        lsp: usize,
        variables: BTreeMap<String, Vec<f64>>,
    ) -> Result<PathBuf> {
        let topology = self
            .topology
            .ok_or_else(|| IoError::not_found("output writer used before prepare"))?;
        let header = FrameHeader {
            run_id: self.run_id,
            fingerprint: self.fingerprint.clone(),
            kind,
            mode,
            it: record.it,
            t: record.t,
            ymd: record.time.ymd(),
            ut_sec: record.time.ut_sec(),
            rank: record.rank,
            process_grid: topology.process_grid,
            global: topology.global,
            local: topology.local,
            offset2: topology.offset2,
            offset3: topology.offset3,
            lsp,
            written_at: Utc::now(),
        };
        let frame = Frame { header, variables };

        let path = self.dir(kind).join(frame_file_name(record));
        let file = File::create(&path)
            .map_err(|e| IoError::from(e).with_context(format!("creating {}", path.display())))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, &frame)?;
        encoder.finish()?.flush()?;

        tracing::debug!(rank = record.rank, path = %path.display(), ?kind, "Wrote output frame");
        Ok(path)
    }
}

impl OutputSink for FileOutputWriter {
    fn prepare(&mut self, topology: &LocalTopology) -> anyhow::Result<()> {
        for kind in [FrameKind::Aux, FrameKind::Milestone] {
            let dir = self.dir(kind);
            std::fs::create_dir_all(&dir)
                .map_err(|e| IoError::from(e).with_context(format!("creating {}", dir.display())))?;
        }
        self.topology = Some(*topology);
        Ok(())
    }

    fn write_field(&mut self, record: &OutputRecord, buffers: &FieldBuffers) -> anyhow::Result<()> {
        if record.rank == 0 {
            tracing::info!(it = record.it, t = record.t, "Writing field output");
        }
        let vars = field_variables(record.mode, buffers);
        let lsp = buffers.layout().lsp;
        self.write_frame(FrameKind::Field, record.mode, record, lsp, vars)?;
        Ok(())
    }

    fn write_aux(&mut self, record: &OutputRecord, buffers: &FieldBuffers) -> anyhow::Result<()> {
        let vars = aux_variables(buffers);
        let lsp = buffers.layout().lsp;
        self.write_frame(FrameKind::Aux, record.mode, record, lsp, vars)?;
        Ok(())
    }

    fn write_milestone(&mut self, record: &OutputRecord, buffers: &FieldBuffers) -> anyhow::Result<()> {
        if record.rank == 0 {
            tracing::info!(it = record.it, t = record.t, "Writing milestone");
        }
        let vars = field_variables(OutputMode::Full, buffers);
        let lsp = buffers.layout().lsp;
        self.write_frame(FrameKind::Milestone, OutputMode::Full, record, lsp, vars)?;
        Ok(())
    }
}

/// Reads a frame written by [`FileOutputWriter`].
pub fn read_frame(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| IoError::from(e).with_context(format!("opening {}", path.display())))?;
    let frame = serde_json::from_reader(GzDecoder::new(BufReader::new(file)))?;
    Ok(frame)
}

/// Writes the end-of-run summary as pretty JSON.
pub fn write_run_summary(out_dir: &Path, run_id: Uuid, summary: &RunSummary) -> Result<PathBuf> {
    #[derive(Serialize)]
    struct SummaryFile<'a> {
        run_id: Uuid,
        #[serde(flatten)]
        summary: &'a RunSummary,
    }

    let path = out_dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&SummaryFile { run_id, summary })?;
    std::fs::write(&path, json)
        .map_err(|e| IoError::from(e).with_context(format!("writing {}", path.display())))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionodrive_core::topology::{resolve, BalancedPlanner};
    use ionodrive_data::CalendarTime;

    fn topology() -> LocalTopology {
        resolve(GridExtents::new(4, 2, 2), None, 1, 0, &BalancedPlanner).unwrap()
    }

    fn buffers() -> FieldBuffers {
        let mut b = FieldBuffers::zeroed(BufferLayout::new(GridExtents::new(4, 2, 2), 3));
        for s in 0..3 {
            b.species_mut(FluidVar::Density, s).fill(1.0e10 * (s + 1) as f64);
            b.species_mut(FluidVar::Temperature, s).fill(1000.0 + s as f64);
        }
        b
    }

    fn record(mode: OutputMode) -> OutputRecord {
        OutputRecord {
            it: 3,
            t: 60.0,
            time: CalendarTime::from_ymd([2023, 5, 1], 36_060.0).unwrap(),
            mode,
            rank: 0,
        }
    }

    fn writer(dir: &Path) -> FileOutputWriter {
        let mut w = FileOutputWriter::new(dir, Uuid::new_v4(), "abc123");
        w.prepare(&topology()).unwrap();
        w
    }

    #[test]
    fn test_file_name_from_date() {
        assert_eq!(
            frame_file_name(&record(OutputMode::Full)),
            "20230501_36060.000000_r0000.json.gz"
        );
    }

    #[test]
    fn test_full_frame_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        w.write_field(&record(OutputMode::Full), &buffers()).unwrap();

        let path = dir.path().join(frame_file_name(&record(OutputMode::Full)));
        let frame = read_frame(&path).unwrap();
        assert_eq!(frame.header.kind, FrameKind::Field);
        assert_eq!(frame.header.fingerprint, "abc123");
        assert_eq!(frame.header.lsp, 3);
        assert_eq!(frame.variables["ns"].len(), 3 * 16);
        assert_eq!(frame.variables["Phi"].len(), 16);
    }

    #[test]
    fn test_electron_density_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        let rec = record(OutputMode::ElectronDensity);
        w.write_field(&rec, &buffers()).unwrap();
        let frame = read_frame(dir.path().join(frame_file_name(&rec))).unwrap();
        assert_eq!(frame.variables.keys().collect::<Vec<_>>(), vec!["ne"]);
        assert!(frame.variables["ne"].iter().all(|&n| n == 3.0e10));
    }

    #[test]
    fn test_averaged_mode_weights_by_density() {
        let vars = field_variables(OutputMode::Averaged, &buffers());
        let expected = (1.0e10 * 1000.0 + 2.0e10 * 1001.0) / 3.0e10;
        assert!(vars["Tavg"].iter().all(|t| (t - expected).abs() < 1e-9));
        assert!(vars["Te"].iter().all(|&t| t == 1002.0));
    }

    #[test]
    fn test_aux_and_milestone_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        let rec = record(OutputMode::ElectronDensity);
        w.write_aux(&rec, &buffers()).unwrap();
        w.write_milestone(&rec, &buffers()).unwrap();

        let aux = read_frame(dir.path().join(AUX_DIR).join(frame_file_name(&rec))).unwrap();
        assert_eq!(aux.header.kind, FrameKind::Aux);
        let milestone =
            read_frame(dir.path().join(MILESTONE_DIR).join(frame_file_name(&rec))).unwrap();
        assert_eq!(milestone.header.mode, OutputMode::Full);
        assert!(milestone.variables.contains_key("Ts"));
    }

    #[test]
    fn test_write_before_prepare_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = FileOutputWriter::new(dir.path(), Uuid::new_v4(), "x");
        assert!(w.write_field(&record(OutputMode::Full), &buffers()).is_err());
    }
}
