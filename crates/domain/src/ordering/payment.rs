use chrono::{DateTime, Utc};
use common::{Money, PaymentId};
use serde::{Deserialize, Serialize};

use super::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            _ => None,
        }
    }
}

/// ```text
/// Authorized ──► Captured
///     └────────► Voided
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Authorized,
    Captured,
    Voided,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Voided => "voided",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorized" => Some(PaymentStatus::Authorized),
            "captured" => Some(PaymentStatus::Captured),
            "voided" => Some(PaymentStatus::Voided),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment recorded against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Reference returned by the payment gateway.
    pub gateway_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Records a successful authorization.
    pub fn authorized(
        amount: Money,
        method: PaymentMethod,
        gateway_reference: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            amount,
            method,
            status: PaymentStatus::Authorized,
            gateway_reference,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn capture(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition(PaymentStatus::Captured, "capture", now)
    }

    pub fn void(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition(PaymentStatus::Voided, "void", now)
    }

    fn transition(
        &mut self,
        to: PaymentStatus,
        action: &'static str,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.status != PaymentStatus::Authorized {
            return Err(OrderError::PaymentTransition {
                status: self.status,
                action,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
