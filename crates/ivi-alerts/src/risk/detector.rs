use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use super::domain::{ContractNumber, NewRiskAlert, RiskAlert};
use super::repository::ScoreRepository;
use super::scoring::{ClientScore, RiskCategory, ScoreInput, ScoreValidationError};
use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::storage::RepositoryError;

/// Pure transition check between the stored snapshot and a fresh score.
pub struct RiskAlertDetector;

impl RiskAlertDetector {
    /// A first-ever score and a same-category recompute both yield `None`.
    pub fn detect_transition(
        previous: Option<&ClientScore>,
        next: &ClientScore,
    ) -> Option<NewRiskAlert> {
        let previous = previous?;
        if previous.risk == next.risk {
            return None;
        }

        Some(NewRiskAlert {
            contract_number: next.contract_number.clone(),
            company_name: next
                .company_name
                .clone()
                .or_else(|| previous.company_name.clone()),
            previous_risk: previous.risk,
            new_risk: next.risk,
            previous_score: Some(previous.composite),
            new_score: Some(next.composite),
            created_at: next.computed_at,
        })
    }
}

/// Result of one recompute call.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeOutcome {
    pub score: ClientScore,
    pub previous_risk: Option<RiskCategory>,
    pub alert: Option<RiskAlert>,
}

/// Entry point for the score recompute trigger.
///
/// Recomputes for the same contract are serialized so two callers can never observe the same
/// previous snapshot; different contracts proceed in parallel.
pub struct RecomputeService<S> {
    repository: Arc<S>,
    clock: Arc<dyn Clock>,
    locks: ContractLocks,
}

impl<S> RecomputeService<S>
where
    S: ScoreRepository + 'static,
{
    pub fn new(repository: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            locks: ContractLocks::default(),
        }
    }

    pub fn recompute(&self, input: ScoreInput) -> Result<RecomputeOutcome, DetectionError> {
        let score = ClientScore::from_input(input, self.clock.now())?;

        let lock = self.locks.for_contract(&score.contract_number);
        let _serialized = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.repository.current(&score.contract_number)?;
        let transition = RiskAlertDetector::detect_transition(previous.as_ref(), &score);
        let alert = self.repository.commit(score.clone(), transition)?;

        match &alert {
            Some(alert) => info!(
                alert_id = %alert.id,
                contract = %alert.contract_number,
                previous = ?alert.previous_risk,
                new = ?alert.new_risk,
                "risk category transition recorded"
            ),
            None => debug!(
                contract = %score.contract_number,
                composite = score.composite,
                "score updated without category change"
            ),
        }

        Ok(RecomputeOutcome {
            previous_risk: previous.map(|snapshot| snapshot.risk),
            score,
            alert,
        })
    }

    pub fn current(&self, contract: &ContractNumber) -> Result<ClientScore, DetectionError> {
        self.repository
            .current(contract)?
            .ok_or_else(|| DetectionError::NotFound(contract.clone()))
    }
}

#[derive(Default)]
struct ContractLocks {
    inner: Mutex<HashMap<ContractNumber, Arc<Mutex<()>>>>,
}

impl ContractLocks {
    fn for_contract(&self, contract: &ContractNumber) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(contract.clone()).or_default().clone()
    }
}

/// Error raised by a recompute or a score lookup. A failed recompute writes nothing.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error(transparent)]
    Validation(#[from] ScoreValidationError),
    #[error("no score recorded for contract {0}")]
    NotFound(ContractNumber),
    #[error(transparent)]
    Infrastructure(#[from] RepositoryError),
}

impl DetectionError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            DetectionError::Validation(err) => err.kind(),
            DetectionError::NotFound(_) => ErrorKind::NotFound,
            DetectionError::Infrastructure(err) => err.kind(),
        }
    }
}
