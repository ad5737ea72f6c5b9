//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;
pub mod promotion;
pub mod review;
pub mod subscription;
pub mod user;

pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem, ShippingAddress};
pub use product::{AppliedPromotion, NewProduct, Product, ProductView, Rating};
pub use promotion::{PricedDiscount, Promotion};
pub use review::Review;
pub use subscription::Subscription;
pub use user::User;
