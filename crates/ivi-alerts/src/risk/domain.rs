use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::scoring::RiskCategory;

/// Auto-incrementing alert identifier. Zero never identifies a stored alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl AlertId {
    pub const NONE: AlertId = AlertId(0);
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique key of a client contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractNumber(pub String);

impl fmt::Display for ContractNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alert payload produced by the detector before the log assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRiskAlert {
    pub contract_number: ContractNumber,
    pub company_name: Option<String>,
    pub previous_risk: RiskCategory,
    pub new_risk: RiskCategory,
    pub previous_score: Option<f64>,
    pub new_score: Option<f64>,
    pub created_at: NaiveDateTime,
}

/// Recorded risk-category transition. Append-only apart from the one-way
/// `notification_sent` flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub id: AlertId,
    pub contract_number: ContractNumber,
    pub company_name: Option<String>,
    pub previous_risk: RiskCategory,
    pub new_risk: RiskCategory,
    pub previous_score: Option<f64>,
    pub new_score: Option<f64>,
    pub created_at: NaiveDateTime,
    pub notification_sent: bool,
}

impl RiskAlert {
    pub fn from_new(id: AlertId, alert: NewRiskAlert) -> Self {
        Self {
            id,
            contract_number: alert.contract_number,
            company_name: alert.company_name,
            previous_risk: alert.previous_risk,
            new_risk: alert.new_risk,
            previous_score: alert.previous_score,
            new_score: alert.new_score,
            created_at: alert.created_at,
            notification_sent: false,
        }
    }

    pub fn transition(&self) -> TransitionKind {
        TransitionKind::between(self.previous_risk, self.new_risk)
    }

    /// Who the notification is about: the company name, else the contract number.
    pub fn contact_target(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| Some(self.contract_number.0.trim()).filter(|value| !value.is_empty()))
    }
}

/// Direction of a category change. Informational only; it never filters delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Escalation,
    Improvement,
}

impl TransitionKind {
    pub fn between(previous: RiskCategory, new: RiskCategory) -> Self {
        if new.severity() > previous.severity() {
            Self::Escalation
        } else {
            Self::Improvement
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Skipped,
}

/// Audit row for one delivery attempt before the log assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeliveryAttempt {
    pub alert_id: AlertId,
    pub contract_number: ContractNumber,
    pub company_name: Option<String>,
    pub title: Option<String>,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub attempted_at: NaiveDateTime,
}

/// One recorded attempt to deliver an alert, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: u64,
    pub alert_id: AlertId,
    pub contract_number: ContractNumber,
    pub company_name: Option<String>,
    pub title: Option<String>,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted_at: NaiveDateTime,
}

impl DeliveryAttempt {
    pub fn from_new(id: u64, attempt: NewDeliveryAttempt) -> Self {
        Self {
            id,
            alert_id: attempt.alert_id,
            contract_number: attempt.contract_number,
            company_name: attempt.company_name,
            title: attempt.title,
            status: attempt.status,
            error: attempt.error,
            attempted_at: attempt.attempted_at,
        }
    }
}
