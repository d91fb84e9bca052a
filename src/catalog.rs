//! The standard grocery price list.
//!
//! Clients resolve item names against this list when composing orders, so
//! a hotel types `Rice=5` rather than a full price/unit triple.

use crate::domain::OrderItem;

pub struct CatalogItem {
    pub name: &'static str,
    pub price: f64,
    pub unit: &'static str,
}

impl CatalogItem {
    pub fn to_order_item(&self, quantity: u32) -> OrderItem {
        OrderItem {
            name: self.name.to_string(),
            quantity,
            price: self.price,
            unit: self.unit.to_string(),
        }
    }
}

pub const GROCERY_PRICE_LIST: &[CatalogItem] = &[
    CatalogItem { name: "Rice", price: 50.0, unit: "kg" },
    CatalogItem { name: "Wheat Flour", price: 40.0, unit: "kg" },
    CatalogItem { name: "Sugar", price: 45.0, unit: "kg" },
    CatalogItem { name: "Cooking Oil", price: 120.0, unit: "liter" },
    CatalogItem { name: "Milk", price: 60.0, unit: "liter" },
    CatalogItem { name: "Tomatoes", price: 30.0, unit: "kg" },
    CatalogItem { name: "Onions", price: 25.0, unit: "kg" },
    CatalogItem { name: "Potatoes", price: 20.0, unit: "kg" },
    CatalogItem { name: "Lentils", price: 90.0, unit: "kg" },
    CatalogItem { name: "Salt", price: 15.0, unit: "kg" },
];

/// Case-insensitive lookup by item name.
pub fn find(name: &str) -> Option<&'static CatalogItem> {
    GROCERY_PRICE_LIST
        .iter()
        .find(|item| item.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(find("rice").unwrap().price, 50.0);
        assert_eq!(find("Cooking Oil").unwrap().unit, "liter");
        assert!(find("Caviar").is_none());
    }

    #[test]
    fn test_catalog_items_convert_to_order_lines() {
        let item = find("Milk").unwrap().to_order_item(10);
        assert_eq!(item.name, "Milk");
        assert_eq!(item.quantity, 10);
        assert_eq!(item.line_total(), 600.0);
    }
}
