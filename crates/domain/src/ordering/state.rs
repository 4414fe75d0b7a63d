//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Placed ──► Shipped ──► Delivered
///   │
///   └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Stock reserved and payment authorized, awaiting shipment.
    #[default]
    Placed,

    /// Handed to a carrier; payment captured.
    Shipped,

    /// Received by the customer (terminal state).
    Delivered,

    /// Cancelled before shipping (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Placed)
    }

    /// Returns true if the order can be shipped in this state.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Placed)
    }

    /// Returns true if the order can be delivered in this state.
    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the stored representation of a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "placed" => Some(OrderStatus::Placed),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
