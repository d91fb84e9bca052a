//! Role-scoped live feeds.
//!
//! A feed owns a background task that mirrors the backend's order
//! collection, filtered down to what the subscriber's role may see. Every
//! committed write makes the task re-fetch and publish a fresh snapshot;
//! when the backend is unreachable the feed keeps serving the last good
//! data and flags it as stale instead of going blank.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::{Role, Visibility};
use crate::backend::{Backend, Change};
use crate::domain::Order;

/// Health of a live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// The first fetch has not landed yet.
    Syncing,
    /// The snapshot matches the backend as of the last change.
    Live,
    /// The last re-fetch failed; the orders shown are stale.
    Degraded,
}

/// What subscribers see: the filtered order collection plus its health.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub status: FeedStatus,
}

impl Snapshot {
    fn initial() -> Snapshot {
        Snapshot {
            orders: Vec::new(),
            status: FeedStatus::Syncing,
        }
    }
}

/// A live, role-scoped view of the order collection.
///
/// Dropping the feed aborts its task and releases the change
/// subscription; re-subscribing (e.g. after a role change) is just
/// building a new one.
pub struct OrderFeed {
    rx: watch::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl OrderFeed {
    pub fn subscribe(backend: Arc<dyn Backend>, role: &Role) -> OrderFeed {
        let visibility = role.visibility();
        let (tx, rx) = watch::channel(Snapshot::initial());

        if visibility == Visibility::Nothing {
            // An unauthenticated session gets a permanently empty feed
            // and holds no backend resources at all.
            tx.send_replace(Snapshot {
                orders: Vec::new(),
                status: FeedStatus::Live,
            });
            return OrderFeed { rx, task: None };
        }

        let changes = backend.changes();
        let task = tokio::spawn(run_feed(backend, visibility, changes, tx));
        OrderFeed {
            rx,
            task: Some(task),
        }
    }

    /// The current snapshot, cloned out of the channel.
    pub fn snapshot(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// A receiver for callers that want to await updates themselves.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.rx.clone()
    }

    /// Wait until the next snapshot is published.
    pub async fn changed(&mut self) {
        // Err here means the task is gone; the last snapshot stays
        // readable either way.
        let _ = self.rx.changed().await;
    }
}

impl Drop for OrderFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Re-fetch attempts per change notification before giving up until the
/// next one.
const FETCH_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(50);

async fn run_feed(
    backend: Arc<dyn Backend>,
    visibility: Visibility,
    mut changes: broadcast::Receiver<Change>,
    tx: watch::Sender<Snapshot>,
) {
    refresh(backend.as_ref(), &visibility, &tx).await;

    loop {
        match changes.recv().await {
            Ok(change) => {
                debug!(?change, "backend change, refreshing feed");
                refresh(backend.as_ref(), &visibility, &tx).await;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // We only ever re-fetch the full view, so missing
                // notifications costs nothing beyond this refresh.
                warn!(missed, "feed lagged behind the change stream");
                refresh(backend.as_ref(), &visibility, &tx).await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("change stream closed, feed stopping");
                break;
            }
        }
    }
}

/// Fetch the filtered view with a few retries; on persistent failure keep
/// the previous orders and mark the snapshot stale.
async fn refresh(backend: &dyn Backend, visibility: &Visibility, tx: &watch::Sender<Snapshot>) {
    for attempt in 1..=FETCH_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
        match backend.fetch_orders(visibility).await {
            Ok(orders) => {
                tx.send_replace(Snapshot {
                    orders,
                    status: FeedStatus::Live,
                });
                return;
            }
            Err(err) => warn!(%err, attempt, "order fetch failed"),
        }
    }
    tx.send_modify(|snapshot| snapshot.status = FeedStatus::Degraded);
}

fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(2);
    let base = BASE_BACKOFF * 2u32.saturating_pow(exponent);
    base + Duration::from_millis(rand::thread_rng().gen_range(0..20))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::domain::{OrderDraft, OrderItem, OrderStatus};

    fn draft(hotel_id: &str) -> OrderDraft {
        OrderDraft {
            hotel_id: hotel_id.to_string(),
            items: vec![OrderItem {
                name: "Rice".to_string(),
                quantity: 5,
                price: 50.0,
                unit: "kg".to_string(),
            }],
            note: None,
        }
    }

    /// Publishing races with the writes that trigger it, so positive
    /// assertions wait for the snapshot to reach the expected state
    /// instead of counting publishes.
    async fn wait_until(feed: &mut OrderFeed, cond: impl Fn(&Snapshot) -> bool) {
        for _ in 0..100 {
            if cond(&feed.snapshot()) {
                return;
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), feed.changed()).await;
        }
        panic!("feed never reached the expected state");
    }

    /// Give the feed task time to react before asserting that something
    /// did NOT show up.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_unauthenticated_feed_is_empty_and_free() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_order(draft("KIR001"), 250.0).await.unwrap();

        let feed = OrderFeed::subscribe(backend.clone(), &Role::Unauthenticated);
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.status, FeedStatus::Live);
        assert!(snapshot.orders.is_empty());
        assert_eq!(backend.change_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_delivery_feed_only_shows_the_delivery_queue() {
        let backend = Arc::new(MockBackend::new());
        let mut feed = OrderFeed::subscribe(backend.clone(), &Role::Delivery);

        let order = backend.insert_order(draft("KIR001"), 250.0).await.unwrap();
        settle().await;
        assert!(feed.snapshot().orders.is_empty(), "pending must stay hidden");

        backend
            .update_status(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        settle().await;
        assert!(feed.snapshot().orders.is_empty(), "confirmed too");

        backend
            .update_status(&order.id, OrderStatus::Ready)
            .await
            .unwrap();
        wait_until(&mut feed, |snapshot| snapshot.orders.len() == 1).await;
        assert_eq!(feed.snapshot().orders[0].status, OrderStatus::Ready);

        // handed-out receivers observe the same snapshots
        let watcher = feed.watch();
        assert_eq!(watcher.borrow().orders.len(), 1);
    }

    #[tokio::test]
    async fn test_hotel_feed_never_leaks_other_hotels() {
        let backend = Arc::new(MockBackend::new());
        let role = Role::HotelUser {
            hotel_id: "KIR002".to_string(),
        };
        let mut feed = OrderFeed::subscribe(backend.clone(), &role);

        backend.insert_order(draft("KIR001"), 250.0).await.unwrap();
        settle().await;
        assert!(feed.snapshot().orders.is_empty());

        backend.insert_order(draft("KIR002"), 250.0).await.unwrap();
        wait_until(&mut feed, |snapshot| snapshot.orders.len() == 1).await;
        assert_eq!(feed.snapshot().orders[0].hotel_id, "KIR002");
    }

    #[tokio::test]
    async fn test_degraded_feed_keeps_stale_orders() {
        let backend = Arc::new(MockBackend::new());
        let mut feed = OrderFeed::subscribe(backend.clone(), &Role::Admin);

        let order = backend.insert_order(draft("KIR001"), 250.0).await.unwrap();
        wait_until(&mut feed, |snapshot| snapshot.orders.len() == 1).await;

        // the next change finds the backend unreadable
        backend.fail_reads(true);
        backend
            .update_status(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        wait_until(&mut feed, |snapshot| snapshot.status == FeedStatus::Degraded).await;
        let stale = feed.snapshot();
        assert_eq!(stale.orders.len(), 1, "stale data beats no data");
        assert_eq!(stale.orders[0].status, OrderStatus::Pending);

        // and recovers on the next change
        backend.fail_reads(false);
        backend
            .update_status(&order.id, OrderStatus::Ready)
            .await
            .unwrap();
        wait_until(&mut feed, |snapshot| snapshot.status == FeedStatus::Live).await;
        assert_eq!(feed.snapshot().orders[0].status, OrderStatus::Ready);
    }

    #[tokio::test]
    async fn test_dropping_the_feed_releases_the_subscription() {
        let backend = Arc::new(MockBackend::new());
        let feed = OrderFeed::subscribe(backend.clone(), &Role::Admin);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.change_subscribers(), 1);

        drop(feed);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.change_subscribers(), 0);
    }
}
