//! Cart Aggregate

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{MarketplaceError, Result};

#[derive(Clone, Debug)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, items: vec![], created_at: now, updated_at: now }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.id == item_id) }

    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.items.iter().find(|i| i.product_id == product_id).map_or(0, |i| i.quantity)
    }

    /// Merge into an existing line for the same product or append a new one.
    /// The resulting line quantity must not exceed `available`; on rejection
    /// the cart is unchanged.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32, available: u32) -> Result<&CartItem> {
        validate_quantity(quantity)?;
        let wanted = self.quantity_of(product_id).saturating_add(quantity);
        if wanted > available {
            return Err(MarketplaceError::validation(format!("Only {available} items available in stock")));
        }
        let index = match self.items.iter().position(|i| i.product_id == product_id) {
            Some(index) => {
                self.items[index].quantity = wanted;
                index
            }
            None => {
                self.items.push(CartItem { id: Uuid::now_v7(), product_id, quantity });
                self.items.len() - 1
            }
        };
        self.touch();
        Ok(&self.items[index])
    }

    pub fn update_quantity(&mut self, item_id: Uuid, quantity: u32, available: u32) -> Result<()> {
        validate_quantity(quantity)?;
        if quantity > available {
            return Err(MarketplaceError::validation(format!("Only {available} items available in stock")));
        }
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or_else(|| MarketplaceError::not_found("Cart item"))?;
        item.quantity = quantity;
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<()> {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before { return Err(MarketplaceError::not_found("Cart item")); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    /// Drop lines whose product fails `keep`. Returns how many were dropped.
    pub fn retain_products(&mut self, mut keep: impl FnMut(Uuid) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|i| keep(i.product_id));
        let dropped = before - self.items.len();
        if dropped > 0 { self.touch(); }
        dropped
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 { return Err(MarketplaceError::validation("Quantity must be at least 1")); }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::for_user(Uuid::now_v7());
        let product = Uuid::now_v7();
        cart.add_item(product, 2, 10).unwrap();
        assert_eq!(cart.item_count(), 1);
        cart.add_item(product, 1, 10).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
    }

    #[test]
    fn test_add_beyond_stock_leaves_cart_unchanged() {
        let mut cart = Cart::for_user(Uuid::now_v7());
        let product = Uuid::now_v7();
        cart.add_item(product, 2, 3).unwrap();
        let snapshot = cart.items().to_vec();
        assert!(cart.add_item(product, 2, 3).is_err());
        assert_eq!(cart.items(), snapshot.as_slice());
        assert!(cart.add_item(Uuid::now_v7(), 0, 3).is_err());
    }

    #[test]
    fn test_update_remove_clear() {
        let mut cart = Cart::for_user(Uuid::now_v7());
        let item_id = cart.add_item(Uuid::now_v7(), 1, 5).unwrap().id;
        cart.update_quantity(item_id, 4, 5).unwrap();
        assert_eq!(cart.item(item_id).unwrap().quantity, 4);
        assert!(cart.update_quantity(item_id, 6, 5).is_err());
        assert!(cart.update_quantity(item_id, 0, 5).is_err());
        cart.remove_item(item_id).unwrap();
        assert!(matches!(cart.remove_item(item_id), Err(MarketplaceError::NotFound(_))));
        cart.add_item(Uuid::now_v7(), 1, 5).unwrap();
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_retain_products() {
        let mut cart = Cart::for_user(Uuid::now_v7());
        let keep = Uuid::now_v7();
        cart.add_item(keep, 1, 5).unwrap();
        cart.add_item(Uuid::now_v7(), 1, 5).unwrap();
        assert_eq!(cart.retain_products(|id| id == keep), 1);
        assert_eq!(cart.items()[0].product_id, keep);
    }
}
