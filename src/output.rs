use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use serde::Serialize;

use crate::result::{CollectionReport, CollectionRun};
use crate::scenario::Scenario;
use crate::settings::Settings;
use crate::volume::BoundingVolume;


pub const COLLECTIONS_FILE: &str = "Collections3D.csv";
pub const TARGET_DECK_FILE: &str = "Target_deck3D.csv";
pub const ACTORS_FILE: &str = "Actors_location3D.csv";
pub const STATS_FILE: &str = "rtree_Stats_3D.csv";
pub const REPORT_FILE: &str = "collections.json";
pub const SETTINGS_FILE: &str = "settings.toml";

const BOX_COLUMNS: [&str; 6] = ["xMin", "yMin", "zMin", "xMax", "yMax", "zMax"];
const STATS_HEADER: [&str; 4] = [
    "NumOfTargets",
    "NumOfActors",
    "TimeToProcessActors (s)",
    "TimeToProcessScenario (s)",
];

/// One line of the timing log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRow {
    pub targets: usize,
    pub actors: usize,
    /// Query and visibility filtering.
    pub collect: Duration,
    /// Collection plus output writing.
    pub total: Duration,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated: String,
    seed: u64,
    build_seconds: f64,
    collect_seconds: f64,
    report: &'a CollectionReport,
}

/// Writes every output file into `settings.directory`, creating it if needed.
pub fn write_outputs(settings: &Settings, scenario: &Scenario, run: &CollectionRun) -> Result<PathBuf> {
    let start = Instant::now();
    let dir = &settings.directory;
    fs::create_dir_all(dir).with_context(|| format!("creating output directory {:?}", dir))?;

    let path = dir.join(COLLECTIONS_FILE);
    write_collections(create(&path)?, &run.report).with_context(|| format!("writing {:?}", path))?;
    let path = dir.join(TARGET_DECK_FILE);
    write_volumes(create(&path)?, "Site", &scenario.targets)
        .with_context(|| format!("writing {:?}", path))?;
    let path = dir.join(ACTORS_FILE);
    write_volumes(create(&path)?, "ActorsLocation", &scenario.actors)
        .with_context(|| format!("writing {:?}", path))?;

    let report_file = ReportFile {
        generated: Local::now().to_rfc3339(),
        seed: settings.seed,
        build_seconds: run.timings.build.as_secs_f64(),
        collect_seconds: run.timings.collect.as_secs_f64(),
        report: &run.report,
    };
    write_file(&dir.join(REPORT_FILE), |w| {
        serde_json::to_writer_pretty(&mut *w, &report_file)?;
        writeln!(w)
    })?;

    let toml = toml::to_string(settings).context("serializing settings")?;
    fs::write(dir.join(SETTINGS_FILE), toml)
        .with_context(|| format!("writing {:?}", dir.join(SETTINGS_FILE)))?;

    let row = StatsRow {
        targets: scenario.targets.len(),
        actors: scenario.actors.len(),
        collect: run.timings.collect,
        total: run.timings.collect + start.elapsed(),
    };
    append_stats(&dir.join(STATS_FILE), &row)?;

    info!("Wrote results to {:?}", dir);
    Ok(dir.clone())
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating {:?}", path))
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let mut writer = BufWriter::new(create(path)?);
    write(&mut writer).with_context(|| format!("writing {:?}", path))?;
    writer.flush().with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

/// One row per capture: target label, actor label, actor box.
pub fn write_collections<W: Write>(writer: W, report: &CollectionReport) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header(&["Location", "Actors"]))?;
    for collection in report {
        for capture in &collection.captures {
            let labels = [collection.target.as_str(), capture.actor.as_str()];
            wtr.write_record(box_record(&labels, &capture.volume))?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// One row per volume, under a leading label column named `label_column`.
pub fn write_volumes<W: Write>(
    writer: W,
    label_column: &str,
    volumes: &[BoundingVolume],
) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header(&[label_column]))?;
    for volume in volumes {
        wtr.write_record(box_record(&[volume.label()], volume))?;
    }
    wtr.flush()?;
    Ok(())
}

fn header(labels: &[&str]) -> Vec<String> {
    labels
        .iter()
        .chain(BOX_COLUMNS.iter())
        .map(|column| column.to_string())
        .collect()
}

fn box_record(labels: &[&str], volume: &BoundingVolume) -> Vec<String> {
    labels
        .iter()
        .map(|label| label.to_string())
        .chain(volume.bounds().iter().map(|bound| bound.to_string()))
        .collect()
}

/// Appends a row to the timing log, writing the header if the file is new.
pub fn append_stats(path: &Path, row: &StatsRow) -> Result<()> {
    let fresh = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {:?}", path))?;
    let mut wtr = csv::Writer::from_writer(file);
    if fresh {
        wtr.write_record(STATS_HEADER)?;
    }
    wtr.write_record(&[
        row.targets.to_string(),
        row.actors.to_string(),
        format!("{:.3}", row.collect.as_secs_f64()),
        format!("{:.3}", row.total.as_secs_f64()),
    ])?;
    wtr.flush()?;
    Ok(())
}
