use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::domain::ContractNumber;
use crate::error::ErrorKind;

pub const HEALTH_WEIGHT: f64 = 0.40;
pub const EXPERIENCE_WEIGHT: f64 = 0.30;
pub const UTILIZATION_WEIGHT: f64 = 0.30;

/// Composite scores at or above this value are Low risk.
pub const LOW_RISK_FLOOR: f64 = 70.0;
/// Composite scores at or above this value (and below [`LOW_RISK_FLOOR`]) are Medium risk.
pub const MEDIUM_RISK_FLOOR: f64 = 35.0;

/// Risk classification derived from the composite IVI score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Boundary values fall on the lower-risk side: 70.0 is Low, 35.0 is Medium.
    pub fn from_composite(composite: f64) -> Self {
        if composite >= LOW_RISK_FLOOR {
            Self::Low
        } else if composite >= MEDIUM_RISK_FLOOR {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub const fn severity(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    pub const fn label(self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, Self::Low) => "Low",
            (Locale::En, Self::Medium) => "Medium",
            (Locale::En, Self::High) => "High",
            (Locale::Ar, Self::Low) => "منخفضة",
            (Locale::Ar, Self::Medium) => "متوسطة",
            (Locale::Ar, Self::High) => "عالية",
        }
    }
}

/// Language used when composing outbound notification text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "ar" | "arabic" => Some(Self::Ar),
            _ => None,
        }
    }
}

/// Weighted IVI composite, rounded to one decimal place.
pub fn compute_composite(health: f64, experience: f64, utilization: f64) -> f64 {
    let raw =
        HEALTH_WEIGHT * health + EXPERIENCE_WEIGHT * experience + UTILIZATION_WEIGHT * utilization;
    (raw * 10.0).round() / 10.0
}

/// Inbound recompute request for one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    pub contract_number: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub health: f64,
    pub experience: f64,
    pub utilization: f64,
}

/// Current IVI score for a contract. Only the latest value is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientScore {
    pub contract_number: ContractNumber,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub region: Option<String>,
    pub health: f64,
    pub experience: f64,
    pub utilization: f64,
    pub composite: f64,
    pub risk: RiskCategory,
    pub computed_at: NaiveDateTime,
}

impl ClientScore {
    pub fn from_input(
        input: ScoreInput,
        computed_at: NaiveDateTime,
    ) -> Result<Self, ScoreValidationError> {
        let contract_number = input.contract_number.trim();
        if contract_number.is_empty() {
            return Err(ScoreValidationError::MissingContract);
        }

        for (pillar, value) in [
            ("health", input.health),
            ("experience", input.experience),
            ("utilization", input.utilization),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ScoreValidationError::OutOfRange { pillar, value });
            }
        }

        let composite = compute_composite(input.health, input.experience, input.utilization);

        Ok(Self {
            contract_number: ContractNumber(contract_number.to_string()),
            company_name: non_blank(input.company_name),
            sector: non_blank(input.sector),
            region: non_blank(input.region),
            health: input.health,
            experience: input.experience,
            utilization: input.utilization,
            composite,
            risk: RiskCategory::from_composite(composite),
            computed_at,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreValidationError {
    #[error("contract number is required")]
    MissingContract,
    #[error("{pillar} score {value} must be between 0 and 100")]
    OutOfRange { pillar: &'static str, value: f64 },
}

impl ScoreValidationError {
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
