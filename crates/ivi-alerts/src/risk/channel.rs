use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{AlertId, ContractNumber, RiskAlert, TransitionKind};
use super::scoring::Locale;
use crate::error::ErrorKind;

/// Human-readable notification for one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub alert_id: AlertId,
    pub contract_number: ContractNumber,
    pub locale: Locale,
    pub kind: TransitionKind,
    pub title: String,
    pub body: String,
}

impl AlertMessage {
    pub fn compose(alert: &RiskAlert, locale: Locale) -> Result<Self, MessageError> {
        let target = alert
            .contact_target()
            .ok_or(MessageError::MissingTarget(alert.id))?;
        let kind = alert.transition();
        let previous = alert.previous_risk.label(locale);
        let new = alert.new_risk.label(locale);
        let previous_score = format_score(alert.previous_score);
        let new_score = format_score(alert.new_score);

        let (title, body) = match locale {
            Locale::En => {
                let title = match kind {
                    TransitionKind::Escalation => format!("Risk escalation: {target}"),
                    TransitionKind::Improvement => format!("Risk improvement: {target}"),
                };
                let body = format!(
                    "Risk category for \"{target}\" changed from {previous} to {new}.\n\
                     Contract: {contract}\n\
                     Previous score: {previous_score}\n\
                     New score: {new_score}\n\
                     Review the dashboard for details.",
                    contract = alert.contract_number,
                );
                (title, body)
            }
            Locale::Ar => {
                let title = match kind {
                    TransitionKind::Escalation => {
                        format!("تنبيه عاجل: ارتفاع مستوى المخاطر - {target}")
                    }
                    TransitionKind::Improvement => format!("تحسن مستوى المخاطر - {target}"),
                };
                let body = format!(
                    "تغيرت فئة المخاطر للشركة \"{target}\"\n\
                     رقم العقد: {contract}\n\
                     الفئة السابقة: {previous}\n\
                     الفئة الجديدة: {new}\n\
                     الدرجة السابقة: {previous_score}\n\
                     الدرجة الجديدة: {new_score}\n\
                     يرجى مراجعة لوحة التحكم للمزيد من التفاصيل.",
                    contract = alert.contract_number,
                );
                (title, body)
            }
        };

        Ok(Self {
            alert_id: alert.id,
            contract_number: alert.contract_number.clone(),
            locale,
            kind,
            title,
            body,
        })
    }
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{value:.1}"),
        None => "-".to_string(),
    }
}

/// Alert failed validation and cannot be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("alert {0} has neither a company name nor a contract number to address")]
    MissingTarget(AlertId),
}

/// Outbound transport for alert notifications (toast, push, e-mail, in-app).
pub trait NotificationChannel: Send + Sync {
    fn deliver(
        &self,
        message: AlertMessage,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Transport-level failure. Retryable by a later send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
    #[error("notification delivery timed out after {0:?}")]
    TimedOut(Duration),
}

impl DeliveryError {
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::DeliveryFailure
    }
}

/// Channel that records notifications in the service log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingChannel;

impl NotificationChannel for LoggingChannel {
    async fn deliver(&self, message: AlertMessage) -> Result<(), DeliveryError> {
        info!(
            alert_id = %message.alert_id,
            contract = %message.contract_number,
            kind = ?message.kind,
            title = %message.title,
            "risk alert notification"
        );
        Ok(())
    }
}
