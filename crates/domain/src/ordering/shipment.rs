use chrono::{DateTime, Utc};
use common::{ShipmentId, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// ```text
/// Pending ──► InTransit ──► Delivered
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ShipmentStatus::Pending),
            "in_transit" => Some(ShipmentStatus::InTransit),
            "delivered" => Some(ShipmentStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipment of an order, assigned to a carrier when dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub carrier_id: Option<UserId>,
    pub tracking_number: Option<String>,
    pub status: ShipmentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Shipment {
    pub fn pending() -> Self {
        Self {
            id: ShipmentId::new(),
            carrier_id: None,
            tracking_number: None,
            status: ShipmentStatus::Pending,
            shipped_at: None,
            delivered_at: None,
        }
    }

    /// Hands the parcel to a carrier.
    pub fn dispatch(
        &mut self,
        carrier_id: UserId,
        tracking_number: String,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if self.status != ShipmentStatus::Pending {
            return Err(OrderError::ShipmentTransition {
                status: self.status,
                action: "dispatch",
            });
        }
        self.carrier_id = Some(carrier_id);
        self.tracking_number = Some(tracking_number);
        self.status = ShipmentStatus::InTransit;
        self.shipped_at = Some(now);
        Ok(())
    }

    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != ShipmentStatus::InTransit {
            return Err(OrderError::ShipmentTransition {
                status: self.status,
                action: "deliver",
            });
        }
        self.status = ShipmentStatus::Delivered;
        self.delivered_at = Some(now);
        Ok(())
    }
}
