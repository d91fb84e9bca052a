// This file contains the basic types used to communicate through the API.
// Orders, hotels and drafts already serialize the way the API speaks, so
// they are re-exported as-is.
use serde::{Deserialize, Serialize};

pub use crate::domain::{
    DefaultOrder, Hotel, HotelDraft, Order, OrderDraft, OrderItem, OrderStatus,
};

/// Body of a status-change request
#[derive(Serialize, Deserialize, Debug)]
pub struct StatusUpdate {
    /// The target status; the server decides whether the move is legal
    pub status: OrderStatus,
}

/// Body of a default-order replacement request
#[derive(Serialize, Deserialize, Debug)]
pub struct DefaultOrderUpdate {
    pub items: Vec<OrderItem>,
}

/// Error payload returned alongside 4xx/5xx statuses
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}
