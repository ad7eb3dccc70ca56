//! Residual-load curves from `;`-separated CSV files.
//!
//! Each file has a `TimeStamp` column followed by one load column in MW.
//! Rows outside the time grid are ignored; the remaining rows must cover
//! every grid step exactly once.

use crate::mobility::parse_timestamp;
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use evflex_core::{ResidualLoad, TimeGrid};
use std::fs;
use std::path::{Path, PathBuf};

/// Read one residual-load file on the given grid.
pub fn read_residual(path: &Path, grid: &TimeGrid) -> Result<ResidualLoad> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening residual load '{}'", path.display()))?;

    let n_steps = grid.n_steps();
    let mut values = vec![f64::NAN; n_steps];
    for (row, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading residual load row {}", row + 1))?;
        let (Some(stamp), Some(value)) = (record.get(0), record.get(1)) else {
            return Err(anyhow!("residual load row {} needs a timestamp and a value", row + 1));
        };
        let ts = parse_timestamp(stamp)?;
        if ts < grid.start || ts >= grid.end {
            continue;
        }
        let step = grid.index_of(ts) as usize;
        let load: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("parsing residual load value '{value}' at {ts}"))?;
        if let Some(slot) = values.get_mut(step) {
            *slot = load;
        }
    }

    if let Some(missing) = values.iter().position(|v| v.is_nan()) {
        return Err(anyhow!(
            "residual load '{}' has no value for step {} ({})",
            path.display(),
            missing,
            grid.timestamp(missing)
        ));
    }
    Ok(ResidualLoad::new(values))
}

/// Residual load of one region: `<dir>/<region>.csv`.
pub fn region_residual(dir: &Path, region_id: &str, grid: &TimeGrid) -> Result<ResidualLoad> {
    read_residual(&dir.join(format!("{region_id}.csv")), grid)
        .with_context(|| format!("loading residual load of region {region_id}"))
}

/// Sum of every `.csv` file in `dir`, the shared curve of a national run.
pub fn total_residual(dir: &Path, grid: &TimeGrid) -> Result<ResidualLoad> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing residual loads in '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(anyhow!("no residual load files in '{}'", dir.display()));
    }

    let mut total = ResidualLoad::zeros(grid.n_steps());
    for file in &files {
        let load = read_residual(file, grid)?;
        total.accumulate(&load)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::tempdir;

    fn grid() -> TimeGrid {
        let start = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        TimeGrid::new(start, end, 900).unwrap()
    }

    fn write_csv(dir: &Path, name: &str, values: &[f64]) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        writeln!(file, "TimeStamp;Load [MW]").unwrap();
        for (i, v) in values.iter().enumerate() {
            writeln!(file, "2030-01-01 00:{:02}:00;{v}", i * 15).unwrap();
        }
        // Grid end is included in the files and must be dropped.
        writeln!(file, "2030-01-01 01:00:00;99").unwrap();
    }

    #[test]
    fn reads_values_on_grid() {
        let dir = tempdir().unwrap();
        write_csv(dir.path(), "r1.csv", &[1.0, 2.0, 3.0, 4.0]);
        let load = region_residual(dir.path(), "r1", &grid()).unwrap();
        assert_eq!(load.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn total_sums_all_regions() {
        let dir = tempdir().unwrap();
        write_csv(dir.path(), "r1.csv", &[1.0, 2.0, 3.0, 4.0]);
        write_csv(dir.path(), "r2.csv", &[0.5, 0.5, 0.5, 0.5]);
        fs::write(dir.path().join("README.txt"), "not a load").unwrap();
        let load = total_residual(dir.path(), &grid()).unwrap();
        assert_eq!(load.as_slice(), &[1.5, 2.5, 3.5, 4.5]);
    }

    #[test]
    fn missing_step_is_an_error() {
        let dir = tempdir().unwrap();
        write_csv(dir.path(), "r1.csv", &[1.0, 2.0, 3.0]);
        let err = region_residual(dir.path(), "r1", &grid()).unwrap_err();
        assert!(format!("{err:#}").contains("step 3"));
    }
}
