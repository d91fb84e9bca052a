use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::auth::Visibility;
use crate::domain::{DefaultOrder, Hotel, HotelDraft, Order, OrderDraft, OrderStatus};
use crate::errors::Result;

pub mod sqlite;

/// Notification pushed to live feeds after a committed write.
///
/// Feeds treat any change as a cue to re-fetch their filtered view, so
/// the payload only matters for logging.
#[derive(Debug, Clone)]
pub enum Change {
    Placed {
        order_id: String,
    },
    StatusChanged {
        order_id: String,
        status: OrderStatus,
    },
}

/// Trait hiding the storage backend.
///
/// This is the seam where a hosted document store used to sit; everything
/// above it only knows about these operations and the change stream. A
/// mock lives next to the real implementation so the store and feed logic
/// can be tested without touching disk.
///
/// Contract notes:
/// - `update_status` must read, validate the transition and write
///   atomically, and leave the record untouched on a rejected move.
/// - `fetch_orders` returns newest-first (`created_at` descending).
/// - Change notifications fire only after the write is durable.
/// - Orders are never deleted; terminal statuses end their lifecycle.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Persist a new order. The backend assigns the id and both
    /// timestamps; the caller has already validated the draft and
    /// computed the total.
    async fn insert_order(&self, draft: OrderDraft, total: f64) -> Result<Order>;

    /// Apply a guarded status change and refresh `updated_at`.
    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<Order>;

    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>>;

    async fn fetch_orders(&self, visibility: &Visibility) -> Result<Vec<Order>>;

    async fn insert_hotel(&self, draft: HotelDraft) -> Result<Hotel>;

    async fn fetch_hotel(&self, hotel_id: &str) -> Result<Option<Hotel>>;

    async fn fetch_hotels(&self) -> Result<Vec<Hotel>>;

    /// Replace the hotel's recurring default order.
    async fn store_default_order(&self, default: DefaultOrder) -> Result<()>;

    async fn fetch_default_order(&self, hotel_id: &str) -> Result<Option<DefaultOrder>>;

    /// Subscribe to the change stream. Dropping the receiver releases the
    /// subscription.
    fn changes(&self) -> broadcast::Receiver<Change>;
}

pub mod mock {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, MutexGuard};

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::errors::Error;

    /// In-memory backend for unit tests.
    ///
    /// The failure switches simulate a flaky remote store: with
    /// `fail_writes` set every mutation returns a persistence error, with
    /// `fail_reads` set every fetch does.
    pub struct MockBackend {
        orders: Mutex<Vec<Order>>,
        hotels: Mutex<Vec<Hotel>>,
        defaults: Mutex<Vec<DefaultOrder>>,
        changes: broadcast::Sender<Change>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    impl MockBackend {
        pub fn new() -> MockBackend {
            let (changes, _) = broadcast::channel(64);
            MockBackend {
                orders: Mutex::new(Vec::new()),
                hotels: Mutex::new(Vec::new()),
                defaults: Mutex::new(Vec::new()),
                changes,
                fail_writes: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
            }
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// How many live feeds currently hold a change subscription.
        pub fn change_subscribers(&self) -> usize {
            self.changes.receiver_count()
        }

        /// Insert a pre-built order as-is, bypassing validation. Lets
        /// tests plant records with chosen timestamps or statuses.
        pub fn seed_order(&self, order: Order) {
            let id = order.id.clone();
            self.orders().push(order);
            self.notify(Change::Placed { order_id: id });
        }

        fn orders(&self) -> MutexGuard<'_, Vec<Order>> {
            self.orders.lock().expect("order table lock poisoned")
        }

        fn check_write(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(Error::Persistence("injected write failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn check_read(&self) -> Result<()> {
            if self.fail_reads.load(Ordering::SeqCst) {
                Err(Error::Persistence("injected read failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn notify(&self, change: Change) {
            // nobody listening is fine
            let _ = self.changes.send(change);
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn insert_order(&self, draft: OrderDraft, total: f64) -> Result<Order> {
            self.check_write()?;
            let now = Utc::now();
            let order = Order {
                id: Uuid::new_v4().to_string(),
                hotel_id: draft.hotel_id,
                items: draft.items,
                total,
                status: OrderStatus::Pending,
                note: draft.note,
                created_at: now,
                updated_at: now,
            };
            self.orders().push(order.clone());
            self.notify(Change::Placed {
                order_id: order.id.clone(),
            });
            Ok(order)
        }

        async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<Order> {
            self.check_write()?;
            let updated = {
                let mut orders = self.orders();
                let order = orders
                    .iter_mut()
                    .find(|order| order.id == order_id)
                    .ok_or_else(|| Error::NotFound(format!("no order '{order_id}'")))?;
                order.status.check_move_to(status)?;
                order.status = status;
                order.updated_at = Utc::now();
                order.clone()
            };
            self.notify(Change::StatusChanged {
                order_id: updated.id.clone(),
                status,
            });
            Ok(updated)
        }

        async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>> {
            self.check_read()?;
            Ok(self
                .orders()
                .iter()
                .find(|order| order.id == order_id)
                .cloned())
        }

        async fn fetch_orders(&self, visibility: &Visibility) -> Result<Vec<Order>> {
            self.check_read()?;
            let mut orders: Vec<Order> = self
                .orders()
                .iter()
                .filter(|order| visibility.allows(order))
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(orders)
        }

        async fn insert_hotel(&self, draft: HotelDraft) -> Result<Hotel> {
            self.check_write()?;
            let hotel = Hotel {
                id: Uuid::new_v4().to_string(),
                name: draft.name,
                owner_name: draft.owner_name,
                phone: draft.phone,
                address: draft.address,
                address_link: draft.address_link,
                created_at: Utc::now(),
            };
            self.hotels
                .lock()
                .expect("hotel table lock poisoned")
                .push(hotel.clone());
            Ok(hotel)
        }

        async fn fetch_hotel(&self, hotel_id: &str) -> Result<Option<Hotel>> {
            self.check_read()?;
            Ok(self
                .hotels
                .lock()
                .expect("hotel table lock poisoned")
                .iter()
                .find(|hotel| hotel.id == hotel_id)
                .cloned())
        }

        async fn fetch_hotels(&self) -> Result<Vec<Hotel>> {
            self.check_read()?;
            let mut hotels = self
                .hotels
                .lock()
                .expect("hotel table lock poisoned")
                .clone();
            hotels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(hotels)
        }

        async fn store_default_order(&self, default: DefaultOrder) -> Result<()> {
            self.check_write()?;
            let mut defaults = self.defaults.lock().expect("defaults lock poisoned");
            defaults.retain(|existing| existing.hotel_id != default.hotel_id);
            defaults.push(default);
            Ok(())
        }

        async fn fetch_default_order(&self, hotel_id: &str) -> Result<Option<DefaultOrder>> {
            self.check_read()?;
            Ok(self
                .defaults
                .lock()
                .expect("defaults lock poisoned")
                .iter()
                .find(|default| default.hotel_id == hotel_id)
                .cloned())
        }

        fn changes(&self) -> broadcast::Receiver<Change> {
            self.changes.subscribe()
        }
    }

}
