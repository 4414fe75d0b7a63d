//! Stock level of a single product.

use serde::{Deserialize, Serialize};

use super::InventoryError;

/// On-hand and reserved stock for a product.
///
/// Invariant: `0 <= reserved <= on_hand`. Stock reserved by placed orders
/// leaves `on_hand` only when the order ships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    on_hand: i64,
    reserved: i64,
}

impl Inventory {
    /// Builds an inventory, checking the invariant.
    pub fn new(on_hand: i64, reserved: i64) -> Result<Self, InventoryError> {
        if on_hand < 0 || reserved < 0 {
            return Err(InventoryError::NegativeStock);
        }
        if reserved > on_hand {
            return Err(InventoryError::BelowReserved { on_hand, reserved });
        }
        Ok(Self { on_hand, reserved })
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Stock that can still be reserved.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }

    /// Adds `delta` (possibly negative) to on-hand stock.
    pub fn adjust(&mut self, delta: i64) -> Result<(), InventoryError> {
        let on_hand = self
            .on_hand
            .checked_add(delta)
            .ok_or(InventoryError::NegativeStock)?;
        self.set_on_hand(on_hand)
    }

    /// Replaces on-hand stock.
    pub fn set_on_hand(&mut self, on_hand: i64) -> Result<(), InventoryError> {
        *self = Self::new(on_hand, self.reserved)?;
        Ok(())
    }

    /// Sets aside stock for a placed order.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), InventoryError> {
        let requested = i64::from(quantity);
        if requested > self.available() {
            return Err(InventoryError::Insufficient {
                requested,
                available: self.available(),
            });
        }
        self.reserved += requested;
        Ok(())
    }

    /// Returns reserved stock to the available pool.
    pub fn release(&mut self, quantity: u32) -> Result<(), InventoryError> {
        let requested = i64::from(quantity);
        if requested > self.reserved {
            return Err(InventoryError::ExceedsReserved {
                requested,
                reserved: self.reserved,
            });
        }
        self.reserved -= requested;
        Ok(())
    }

    /// Removes shipped stock from both reserved and on-hand.
    pub fn commit(&mut self, quantity: u32) -> Result<(), InventoryError> {
        let requested = i64::from(quantity);
        if requested > self.reserved {
            return Err(InventoryError::ExceedsReserved {
                requested,
                reserved: self.reserved,
            });
        }
        self.reserved -= requested;
        self.on_hand -= requested;
        Ok(())
    }

    /// Undoes a `commit`: the stock goes back on hand, still reserved.
    pub fn restore(&mut self, quantity: u32) -> Result<(), InventoryError> {
        let requested = i64::from(quantity);
        let on_hand = self
            .on_hand
            .checked_add(requested)
            .ok_or(InventoryError::NegativeStock)?;
        *self = Self::new(on_hand, self.reserved + requested)?;
        Ok(())
    }
}
