//! Value Objects for the marketplace

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raised when a stored or submitted string does not name a known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Closed string-backed enum. The wire and database representation is the
/// literal attached to each variant.
macro_rules! string_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name { $($variant),+ }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self { $($name::$variant => $text),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: stringify!($name), value: other.to_string() }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_enum! {
    /// Account role. Authorization is decided through [`Capability`] sets,
    /// never by comparing role names.
    pub enum Role {
        Individual => "individual",
        Buyer => "buyer",
        Seller => "seller",
        ProductProvider => "product provider",
        Admin => "admin",
        SuperAdmin => "super admin",
        MarketingTeam => "marketing team",
        CustomerSupport => "customer support",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create products and manage one's own listings.
    ListProducts,
    /// Edit or delete products owned by anyone.
    ManageAnyProduct,
    ManagePromotions,
    /// Change any order's status without the transition table, and its payment status.
    ManageOrders,
    ViewAllOrders,
    ManageUsers,
    ViewDashboard,
}

impl Role {
    /// Roles a user may pick for themselves at registration.
    pub const SELF_ASSIGNABLE: &'static [Role] = &[Role::Individual, Role::Buyer, Role::Seller, Role::ProductProvider];

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Buyer => &[],
            Role::Individual | Role::Seller | Role::ProductProvider => &[ListProducts],
            Role::Admin | Role::SuperAdmin => {
                &[ListProducts, ManageAnyProduct, ManagePromotions, ManageOrders, ViewAllOrders, ManageUsers, ViewDashboard]
            }
            Role::MarketingTeam => &[ManageAnyProduct, ManagePromotions, ViewDashboard],
            Role::CustomerSupport => &[ViewAllOrders, ViewDashboard],
        }
    }

    pub fn can(&self, capability: Capability) -> bool { self.capabilities().contains(&capability) }

    pub fn is_seller(&self) -> bool { matches!(self, Role::Individual | Role::Seller | Role::ProductProvider) }
}

impl Default for Role { fn default() -> Self { Role::Buyer } }

string_enum! {
    pub enum Category {
        Electronics => "Electronics",
        Fashion => "Fashion",
        HomeGarden => "Home & Garden",
        Beauty => "Beauty & Health",
        Sports => "Sports & Outdoors",
        Books => "Books",
        Toys => "Toys & Games",
        Automotive => "Automotive",
        Groceries => "Groceries",
        Other => "Other",
    }
}

string_enum! {
    pub enum OrderStatus {
        Pending => "pending",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool { self.allowed_next().contains(&next) }

    pub fn is_terminal(&self) -> bool { self.allowed_next().is_empty() }
}

impl Default for OrderStatus { fn default() -> Self { OrderStatus::Pending } }

string_enum! {
    pub enum PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
    }
}

impl Default for PaymentStatus { fn default() -> Self { PaymentStatus::Pending } }

string_enum! {
    pub enum PaymentMethod {
        CashOnDelivery => "cash_on_delivery",
        CreditCard => "credit_card",
        DebitCard => "debit_card",
        Paypal => "paypal",
        BankTransfer => "bank_transfer",
        MobileMoney => "mobile_money",
    }
}

string_enum! {
    pub enum DiscountType {
        Percentage => "percentage",
        FixedAmount => "fixed_amount",
    }
}

string_enum! {
    pub enum PromotionKind {
        Seasonal => "seasonal",
        FlashSale => "flash_sale",
        Clearance => "clearance",
        Holiday => "holiday",
        General => "general",
    }
}

impl Default for PromotionKind { fn default() -> Self { PromotionKind::General } }

/// Human-readable order identifier: three uppercase letters followed by six digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const FALLBACK_PREFIX: &'static str = "ORD";

    /// Letters of `category`, uppercased, cut or padded with `X` to three.
    pub fn prefix_for(category: &str) -> String {
        let mut prefix: String = category
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(3)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if prefix.is_empty() { return Self::FALLBACK_PREFIX.to_string(); }
        while prefix.len() < 3 { prefix.push('X'); }
        prefix
    }

    pub fn generate<R: Rng + ?Sized>(category: &str, rng: &mut R) -> Self {
        Self(format!("{}{:06}", Self::prefix_for(category), rng.gen_range(0..1_000_000u32)))
    }

    pub fn is_well_formed(value: &str) -> bool {
        let bytes = value.as_bytes();
        bytes.len() == 9
            && bytes[..3].iter().all(|b| b.is_ascii_uppercase())
            && bytes[3..].iter().all(|b| b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
