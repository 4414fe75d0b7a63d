use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each entity gets its own identifier type so a `ProductId` can never be
/// passed where an `OrderId` is expected.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user (customer, admin or carrier).
    UserId
);
entity_id!(
    /// Identifier of an address owned by a user.
    AddressId
);
entity_id!(
    /// Identifier of a catalog category.
    CategoryId
);
entity_id!(
    /// Identifier of a catalog product.
    ProductId
);
entity_id!(
    /// Identifier of a product image.
    ImageId
);
entity_id!(
    /// Identifier of a sale.
    SaleId
);
entity_id!(
    /// Identifier of a coupon.
    CouponId
);
entity_id!(
    /// Identifier of a shipping method.
    ShippingMethodId
);
entity_id!(
    /// Identifier of an order.
    OrderId
);
entity_id!(
    /// Identifier of the shipment attached to an order.
    ShipmentId
);
entity_id!(
    /// Identifier of the payment attached to an order.
    PaymentId
);
