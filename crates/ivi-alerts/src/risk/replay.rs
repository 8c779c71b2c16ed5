//! Feeds recorded score rows through the recompute trigger in file order.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::detector::{DetectionError, RecomputeOutcome, RecomputeService};
use super::repository::ScoreRepository;
use super::scoring::ScoreInput;

#[derive(Debug)]
pub enum ScoreReplayError {
    Io(std::io::Error),
    Csv(csv::Error),
    Detection { row: usize, source: DetectionError },
}

impl std::fmt::Display for ScoreReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreReplayError::Io(err) => write!(f, "failed to read score file: {}", err),
            ScoreReplayError::Csv(err) => write!(f, "invalid score CSV data: {}", err),
            ScoreReplayError::Detection { row, source } => {
                write!(f, "row {} could not be recomputed: {}", row, source)
            }
        }
    }
}

impl std::error::Error for ScoreReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScoreReplayError::Io(err) => Some(err),
            ScoreReplayError::Csv(err) => Some(err),
            ScoreReplayError::Detection { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for ScoreReplayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ScoreReplayError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    #[serde(alias = "contNo", alias = "Contract")]
    contract_number: String,
    #[serde(default, alias = "companyName", alias = "Company")]
    company_name: Option<String>,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(alias = "H")]
    health: f64,
    #[serde(alias = "E")]
    experience: f64,
    #[serde(alias = "U")]
    utilization: f64,
}

impl From<ScoreRow> for ScoreInput {
    fn from(row: ScoreRow) -> Self {
        Self {
            contract_number: row.contract_number,
            company_name: row.company_name,
            sector: row.sector,
            region: row.region,
            health: row.health,
            experience: row.experience,
            utilization: row.utilization,
        }
    }
}

/// Replays a CSV of score snapshots. Rows are processed sequentially and the first failing
/// row stops the replay; earlier rows stay committed.
pub struct ScoreReplay;

impl ScoreReplay {
    pub fn from_path<S, P>(
        service: &RecomputeService<S>,
        path: P,
    ) -> Result<Vec<RecomputeOutcome>, ScoreReplayError>
    where
        S: ScoreRepository + 'static,
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Self::from_reader(service, file)
    }

    pub fn from_reader<S, R>(
        service: &RecomputeService<S>,
        reader: R,
    ) -> Result<Vec<RecomputeOutcome>, ScoreReplayError>
    where
        S: ScoreRepository + 'static,
        R: Read,
    {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut outcomes = Vec::new();
        for (index, row) in csv_reader.deserialize::<ScoreRow>().enumerate() {
            let row = row?;
            let outcome = service
                .recompute(row.into())
                .map_err(|source| ScoreReplayError::Detection {
                    row: index + 1,
                    source,
                })?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
