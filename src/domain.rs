// This file contains the core data types: orders and their lifecycle,
// hotels, and the recurring default orders.
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Lifecycle stage of an order.
///
/// The only legal moves are the forward chain
/// `pending → confirmed → ready → delivering → completed`, plus a jump to
/// `failed` from any non-terminal stage. `completed` and `failed` are
/// final.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Ready,
    Delivering,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<OrderStatus> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "ready" => Ok(OrderStatus::Ready),
            "delivering" => Ok(OrderStatus::Delivering),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(Error::BadRequest(format!("unknown status '{other}'"))),
        }
    }

    /// Terminal stages accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    pub fn can_move_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Ready) | (Ready, Delivering) | (Delivering, Completed)
        )
    }

    /// Guard applied at the single write funnel; anything outside the
    /// table leaves the stored status untouched.
    pub fn check_move_to(self, next: OrderStatus) -> Result<()> {
        if self.can_move_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single grocery line in an order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    pub unit: String,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }
}

/// A persisted order, as stored by the backend and shipped over the API.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Order {
    /// Backend-assigned, opaque to everyone else.
    pub id: String,
    /// Immutable after creation; partitions visibility between hotels.
    pub hotel_id: String,
    pub items: Vec<OrderItem>,
    /// Fixed at placement time, never recomputed afterwards.
    pub total: f64,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status change.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order was placed on the current calendar day, in the
    /// server's local time zone.
    pub fn placed_today(&self) -> bool {
        self.created_at.with_timezone(&Local).date_naive() == Local::now().date_naive()
    }
}

/// A not-yet-persisted order, as submitted by a client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderDraft {
    pub hotel_id: String,
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OrderDraft {
    /// Validate the draft and return its total.
    ///
    /// An order needs at least one item with a quantity above zero, and no
    /// negative prices. The total only counts qualifying lines; a
    /// quantity of zero contributes nothing either way.
    pub fn validated_total(&self) -> Result<f64> {
        if let Some(item) = self.items.iter().find(|item| item.price < 0.0) {
            return Err(Error::Validation(format!(
                "item '{}' has a negative price",
                item.name
            )));
        }
        let qualifying: Vec<&OrderItem> =
            self.items.iter().filter(|item| item.quantity > 0).collect();
        if qualifying.is_empty() {
            return Err(Error::Validation(
                "an order needs at least one item with a quantity above zero".to_string(),
            ));
        }
        Ok(qualifying.iter().map(|item| item.line_total()).sum())
    }
}

/// The ordering customer: a small hotel or restaurant.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub owner_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration data for a new hotel.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HotelDraft {
    pub name: String,
    pub owner_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_link: Option<String>,
}

/// The recurring grocery list a hotel reorders week after week. Editable
/// by the admin, placeable as a regular order in one step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DefaultOrder {
    pub hotel_id: String,
    pub items: Vec<OrderItem>,
}
