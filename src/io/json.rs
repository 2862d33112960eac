use std::io::{self, Write};

use serde::Serialize;

use crate::eigenray::Eigenray;
use crate::geo::GeoPosition;
use crate::proploss::{ArrivalSum, Proploss};

/// Everything known about one target after a run.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport<'a> {
    pub row: usize,
    pub col: usize,
    pub position: GeoPosition,
    pub eigenrays: &'a [Eigenray],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<&'a ArrivalSum>,
}

/// Serializable view of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ProplossReport<'a> {
    pub scenario: &'a str,
    pub frequencies: &'a [f64],
    pub eigenray_count: usize,
    pub targets: Vec<TargetReport<'a>>,
}

impl<'a> ProplossReport<'a> {
    pub fn new(scenario: &'a str, proploss: &'a Proploss) -> Self {
        let targets = proploss
            .targets()
            .iter()
            .map(|(row, col, p)| TargetReport {
                row,
                col,
                position: *p,
                eigenrays: proploss.eigenrays(row, col).unwrap_or_default(),
                total: proploss.total(row, col),
            })
            .collect();
        Self {
            scenario,
            frequencies: proploss.frequencies(),
            eigenray_count: proploss.eigenray_count(),
            targets,
        }
    }
}

/// Write eigenrays and summed loss for every target as pretty JSON.
pub fn write_proploss<W: Write>(writer: &mut W, scenario: &str, proploss: &Proploss) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &ProplossReport::new(scenario, proploss))?;
    writeln!(writer)
}

/// Write the run report to a file.
pub fn write_proploss_file(path: &str, scenario: &str, proploss: &Proploss) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_proploss(&mut file, scenario, proploss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eigenray::{Bracket, DuplicateTolerance, TargetGrid};
    use crate::proploss::SumMode;

    fn run_result() -> Proploss {
        let grid = TargetGrid::line(vec![
            GeoPosition::new(45.01, -45.0, -100.0),
            GeoPosition::new(45.02, -45.0, -100.0),
        ])
        .unwrap();
        let mut pl = Proploss::new(grid, vec![1000.0]);
        let ray = Eigenray {
            time: 1.2,
            intensity: vec![62.0],
            phase: vec![0.0],
            source_de: -0.01,
            source_az: 0.0,
            target_de: 0.01,
            target_az: 0.0,
            surface: 0,
            bottom: 0,
            caustic: 0,
        };
        pl.add_eigenray(0, 1, ray, Bracket { step: 8, de: 1, az: 1 }, &DuplicateTolerance { time: 0.1, de: 1.0, az: 1.0 });
        pl
    }

    #[test]
    fn report_lists_every_target() {
        let mut pl = run_result();
        pl.sum_eigenrays(SumMode::Coherent);
        let mut buf = Vec::new();
        write_proploss(&mut buf, "unit", &pl).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(v["scenario"], "unit");
        assert_eq!(v["eigenray_count"], 1);
        let targets = v["targets"].as_array().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0]["eigenrays"].as_array().unwrap().len(), 0);
        assert_eq!(targets[1]["eigenrays"][0]["time"], 1.2);
        assert_eq!(targets[1]["total"]["arrivals"], 1);
    }

    #[test]
    fn unsummed_run_omits_totals() {
        let pl = run_result();
        let report = ProplossReport::new("unit", &pl);
        let v = serde_json::to_value(&report).unwrap();
        assert!(v["targets"][1].get("total").is_none());
    }
}
