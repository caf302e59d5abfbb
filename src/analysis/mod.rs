//! Typed accessors for the vgosDB variable groups used in EOP analysis.
//!
//! Each accessor names the group and file it reads; lookup and decode
//! failures are reported as [`AnalysisError::MissingData`] with that name
//! attached.

pub mod time;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use thiserror::Error;

use crate::archive::ArchiveHandle;
use crate::netcdf::{ArrayTable, Variable};

pub use time::{calendar_mjd, ymdhm_to_mjd};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("required data not found in vgosDB ({what}): {source}")]
    MissingData {
        what: String,
        #[source]
        source: crate::Error,
    },

    #[error("variable {variable} not found in {what}")]
    MissingVariable { what: String, variable: String },

    #[error("{what}: expected {expected} values, found {found}")]
    Shape {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid time tag: {0}")]
    InvalidTime(String),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

/// Frequency band of the group delay observable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Band {
    #[default]
    X,
    S,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::X => write!(f, "X"),
            Band::S => write!(f, "S"),
        }
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" | "x" => Ok(Band::X),
            "S" | "s" => Ok(Band::S),
            other => Err(format!("unknown band '{other}' (expected X or S)")),
        }
    }
}

/// One group-delay observation
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub time_mjd: f64,
    pub station_1: String,
    pub station_2: String,
    /// `"STATION1-STATION2"`
    pub baseline: String,
    pub source: String,
    /// Observed group delay, seconds
    pub delay_obs: f64,
    /// Formal error of the group delay, seconds
    pub delay_sigma: f64,
    /// Theoretical delay, seconds
    pub delay_theo: f64,
}

/// EOP partial derivatives per observation
#[derive(Debug, Clone, PartialEq)]
pub struct EopPartials {
    pub ut1: Vec<f64>,
    pub ut1_shape: Vec<usize>,
    pub x_pole: Vec<f64>,
    pub y_pole: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationPositions {
    pub names: Vec<String>,
    /// Geocentric X, Y, Z in metres, one row per station
    pub xyz: Vec<[f64; 3]>,
}

/// A priori Earth orientation used for the theoretical delays, per scan
#[derive(Debug, Clone, PartialEq)]
pub struct AprioriEop {
    pub time_mjd: Vec<f64>,
    pub ut1: Vec<f64>,
    pub x_pole: Vec<f64>,
    pub y_pole: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineInfo {
    pub baseline: String,
    pub station_1: String,
    pub station_2: String,
    pub xyz_1: [f64; 3],
    pub xyz_2: [f64; 3],
    /// `xyz_2 - xyz_1`
    pub vector: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub start_mjd: f64,
    pub end_mjd: f64,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelayStats {
    pub mean_delay_us: f64,
    /// Sample standard deviation; NaN with fewer than two observations
    pub std_delay_us: f64,
    pub mean_sigma_ns: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub n_observations: usize,
    pub n_stations: usize,
    pub stations: Vec<String>,
    pub sources: Vec<String>,
    pub baselines: Vec<String>,
    pub time_range: Option<TimeRange>,
    pub delay_stats: Option<DelayStats>,
}

/// Analysis view over an opened session archive
pub struct SessionAnalysis<'a> {
    archive: &'a ArchiveHandle,
}

impl<'a> SessionAnalysis<'a> {
    pub fn new(archive: &'a ArchiveHandle) -> Self {
        SessionAnalysis { archive }
    }

    fn table(&self, what: &str) -> Result<Rc<ArrayTable>> {
        self.archive
            .root()
            .table(what)
            .map_err(|source| AnalysisError::MissingData {
                what: what.to_string(),
                source,
            })
    }

    /// Clean group-delay observations for one band
    pub fn observations(&self, band: Band) -> Result<Vec<Observation>> {
        let time_file = "Observables/TimeUTC.nc";
        let time = self.table(time_file)?;
        let seconds = numbers(&time, time_file, "Second")?;
        let times = ymdhm_to_mjd(variable(&time, time_file, "YMDHM")?, &seconds)?;
        let n = times.len();

        let baseline_file = "Observables/Baseline.nc";
        let pairs = strings(&*self.table(baseline_file)?, baseline_file, "Baseline")?;
        expect_len(baseline_file, 2 * n, pairs.len())?;

        let source_file = "Observables/Source.nc";
        let sources = strings(&*self.table(source_file)?, source_file, "Source")?;
        expect_len(source_file, n, sources.len())?;

        let delay_file = format!("ObsEdit/GroupDelayFull_b{band}.nc");
        let delay_obs = numbers(&*self.table(&delay_file)?, &delay_file, "GroupDelayFull")?;
        expect_len(&delay_file, n, delay_obs.len())?;

        let sigma_file = format!("Observables/GroupDelay_b{band}.nc");
        let delay_sigma = numbers(&*self.table(&sigma_file)?, &sigma_file, "GroupDelaySig")?;
        expect_len(&sigma_file, n, delay_sigma.len())?;

        let theo_file = "ObsTheoretical/DelayTheoretical.nc";
        let delay_theo = numbers(&*self.table(theo_file)?, theo_file, "DelayTheoretical")?;
        expect_len(theo_file, n, delay_theo.len())?;

        let observations = (0..n)
            .map(|i| {
                let station_1 = pairs[2 * i].clone();
                let station_2 = pairs[2 * i + 1].clone();
                Observation {
                    time_mjd: times[i],
                    baseline: format!("{station_1}-{station_2}"),
                    station_1,
                    station_2,
                    source: sources[i].clone(),
                    delay_obs: delay_obs[i],
                    delay_sigma: delay_sigma[i],
                    delay_theo: delay_theo[i],
                }
            })
            .collect();
        Ok(observations)
    }

    /// UT1 and polar motion partials; `WobblePart` is split along its first
    /// axis into x and y
    pub fn eop_partials(&self) -> Result<EopPartials> {
        let file = "ObsPart/Part-EOP.nc";
        let table = self.table(file)?;
        let ut1 = variable(&table, file, "UT1Part")?;
        let wobble = variable(&table, file, "WobblePart")?;

        let component = |index: usize| {
            wobble.row(index).ok_or_else(|| AnalysisError::Shape {
                what: format!("{file} WobblePart"),
                expected: 2,
                found: wobble.shape.first().copied().unwrap_or(0),
            })
        };

        Ok(EopPartials {
            ut1: to_numbers(ut1, file)?,
            ut1_shape: ut1.shape.clone(),
            x_pole: component(0)?,
            y_pole: component(1)?,
        })
    }

    /// A priori station names and coordinates
    pub fn station_positions(&self) -> Result<StationPositions> {
        let file = "Apriori/StationApriori.nc";
        let table = self.table(file)?;
        let names = strings(&table, file, "StationNameApriori")?;
        let xyz_var = variable(&table, file, "StationXYZ")?;
        let values = to_numbers(xyz_var, file)?;
        let n = names.len();
        expect_len(file, 3 * n, values.len())?;

        let stations_first = xyz_var.shape.first() == Some(&n) || n == 3;
        let xyz = (0..n)
            .map(|i| {
                if stations_first {
                    [values[3 * i], values[3 * i + 1], values[3 * i + 2]]
                } else {
                    [values[i], values[n + i], values[2 * n + i]]
                }
            })
            .collect();
        Ok(StationPositions { names, xyz })
    }

    /// A priori UT1 and polar motion at each scan
    pub fn a_priori_eop(&self) -> Result<AprioriEop> {
        let file = "Scan/ERPApriori.nc";
        let table = self.table(file)?;
        let ut1 = numbers(&table, file, "UT1")?;
        let polar = variable(&table, file, "PolarMotion")?;
        let values = to_numbers(polar, file)?;
        let n = ut1.len();
        expect_len(file, 2 * n, values.len())?;

        // [2, N] holds x then y (including [2, 2]); [N, 2] interleaves them
        let (x_pole, y_pole) = if polar.shape.first() == Some(&2) {
            (values[..n].to_vec(), values[n..].to_vec())
        } else {
            (
                values.iter().step_by(2).copied().collect(),
                values.iter().skip(1).step_by(2).copied().collect(),
            )
        };

        let time_file = "Scan/TimeUTC.nc";
        let time = self.table(time_file)?;
        let seconds = numbers(&time, time_file, "Second")?;
        let time_mjd = ymdhm_to_mjd(variable(&time, time_file, "YMDHM")?, &seconds)?;

        Ok(AprioriEop {
            time_mjd,
            ut1,
            x_pole,
            y_pole,
        })
    }

    /// X-band observations joined with a priori station coordinates.
    /// Observations involving unknown stations are skipped.
    pub fn baseline_info(&self) -> Result<Vec<BaselineInfo>> {
        let observations = self.observations(Band::X)?;
        let stations = self.station_positions()?;
        let coords: HashMap<&str, [f64; 3]> = stations
            .names
            .iter()
            .map(String::as_str)
            .zip(stations.xyz.iter().copied())
            .collect();

        let info = observations
            .into_iter()
            .filter_map(|obs| {
                let xyz_1 = *coords.get(obs.station_1.as_str())?;
                let xyz_2 = *coords.get(obs.station_2.as_str())?;
                Some(BaselineInfo {
                    vector: [xyz_2[0] - xyz_1[0], xyz_2[1] - xyz_1[1], xyz_2[2] - xyz_1[2]],
                    baseline: obs.baseline,
                    station_1: obs.station_1,
                    station_2: obs.station_2,
                    xyz_1,
                    xyz_2,
                })
            })
            .collect();
        Ok(info)
    }

    /// Overview of the session's observations in one band
    pub fn summary(&self, band: Band) -> Result<SessionSummary> {
        let observations = self.observations(band)?;
        let stations = self.station_positions()?;

        let sources = unique(observations.iter().map(|o| o.source.as_str()));
        let baselines = unique(observations.iter().map(|o| o.baseline.as_str()));

        let time_range = if observations.is_empty() {
            None
        } else {
            let start = observations.iter().map(|o| o.time_mjd).fold(f64::INFINITY, f64::min);
            let end = observations.iter().map(|o| o.time_mjd).fold(f64::NEG_INFINITY, f64::max);
            Some(TimeRange {
                start_mjd: start,
                end_mjd: end,
                duration_hours: (end - start) * 24.0,
            })
        };

        let delay_stats = if observations.is_empty() {
            None
        } else {
            let delays: Vec<f64> = observations.iter().map(|o| o.delay_obs).collect();
            let sigmas: Vec<f64> = observations.iter().map(|o| o.delay_sigma).collect();
            Some(DelayStats {
                mean_delay_us: mean(&delays) * 1e6,
                std_delay_us: sample_std(&delays) * 1e6,
                mean_sigma_ns: mean(&sigmas) * 1e9,
            })
        };

        Ok(SessionSummary {
            n_observations: observations.len(),
            n_stations: stations.names.len(),
            stations: stations.names,
            sources,
            baselines,
            time_range,
            delay_stats,
        })
    }
}

fn variable<'t>(table: &'t ArrayTable, what: &str, name: &str) -> Result<&'t Variable> {
    table
        .variable(name)
        .ok_or_else(|| AnalysisError::MissingVariable {
            what: what.to_string(),
            variable: name.to_string(),
        })
}

fn to_numbers(var: &Variable, what: &str) -> Result<Vec<f64>> {
    var.to_f64().ok_or_else(|| AnalysisError::MissingVariable {
        what: what.to_string(),
        variable: format!("{} (numeric)", var.name),
    })
}

fn numbers(table: &ArrayTable, what: &str, name: &str) -> Result<Vec<f64>> {
    to_numbers(variable(table, what, name)?, what)
}

fn strings(table: &ArrayTable, what: &str, name: &str) -> Result<Vec<String>> {
    variable(table, what, name)?
        .strings()
        .ok_or_else(|| AnalysisError::MissingVariable {
            what: what.to_string(),
            variable: format!("{name} (text)"),
        })
}

fn expect_len(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(AnalysisError::Shape {
            what: what.to_string(),
            expected,
            found,
        })
    }
}

/// Distinct values in first-seen order
fn unique<'s>(items: impl Iterator<Item = &'s str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|item| seen.insert(*item))
        .map(String::from)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
