//! The order store: single owner of the order collection a session sees.
//!
//! Mutations go write-then-reconcile: nothing is applied locally until
//! the backend acknowledges, and the local snapshot catches up through
//! the live feed. The derived views are plain filters over that
//! snapshot, recomputed on every call.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::{Identity, Role};
use crate::backend::Backend;
use crate::domain::{Order, OrderDraft, OrderStatus};
use crate::errors::{Error, Result};
use crate::feed::{FeedStatus, OrderFeed};
use crate::notify::{self, Notify, PushMessage};

/// Place an order as `role`.
///
/// Checks the placement policy, validates the draft, computes the total
/// and persists. On backend failure the error propagates and no local
/// state changes anywhere — the feed only ever reflects committed
/// writes.
#[instrument(skip(backend, notifier, draft), fields(role = %role, hotel_id = %draft.hotel_id))]
pub async fn place_order(
    backend: &dyn Backend,
    notifier: &Arc<dyn Notify>,
    role: &Role,
    draft: OrderDraft,
) -> Result<Order> {
    if !role.may_place_for(&draft.hotel_id) {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: format!("place an order for hotel '{}'", draft.hotel_id),
        });
    }
    let total = draft.validated_total()?;
    let order = backend.insert_order(draft, total).await?;
    info!(order_id = %order.id, total = order.total, "order placed");
    notify::fire_and_forget(notifier.clone(), PushMessage::order_placed(&order));
    Ok(order)
}

/// Apply a status change as `role`.
///
/// Checked in order: scope (an order outside this role's view reads as
/// missing, same as an unknown id), then the transition guard, then the
/// role's write policy. Scope is checked against the backend rather
/// than the local snapshot so a caller can advance an order it just
/// placed even if the feed has not caught up yet; the backend re-runs
/// the guard atomically at the write.
#[instrument(skip(backend, notifier), fields(role = %role))]
pub async fn update_status(
    backend: &dyn Backend,
    notifier: &Arc<dyn Notify>,
    role: &Role,
    order_id: &str,
    new_status: OrderStatus,
) -> Result<Order> {
    let current = match backend.fetch_order(order_id).await? {
        Some(order) if role.visibility().allows(&order) => order,
        _ => return Err(Error::NotFound(format!("no order '{order_id}' in view"))),
    };
    current.status.check_move_to(new_status)?;
    if !role.may_set(new_status) {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: format!("mark an order '{new_status}'"),
        });
    }
    let order = backend.update_status(order_id, new_status).await?;
    info!(order_id = %order.id, status = %order.status, "order status updated");
    if new_status == OrderStatus::Ready {
        notify::fire_and_forget(notifier.clone(), PushMessage::order_ready(&order));
    }
    Ok(order)
}

/// A session's view of the order collection, plus the operations its
/// role may perform on it.
///
/// Built explicitly from its collaborators; there is no ambient
/// backend or store singleton anywhere in the crate.
pub struct OrderStore {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notify>,
    identity: Identity,
    feed: OrderFeed,
}

impl OrderStore {
    pub fn new(backend: Arc<dyn Backend>, notifier: Arc<dyn Notify>, identity: Identity) -> OrderStore {
        let feed = OrderFeed::subscribe(backend.clone(), &identity.role);
        OrderStore {
            backend,
            notifier,
            identity,
            feed,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Swap the session identity, e.g. after login or logout.
    ///
    /// The old subscription is torn down and a new one opened, scoped to
    /// the new role. A no-op when the identity is unchanged.
    pub fn set_identity(&mut self, identity: Identity) {
        if identity == self.identity {
            return;
        }
        info!(role = %identity.role, "identity changed, re-subscribing");
        self.feed = OrderFeed::subscribe(self.backend.clone(), &identity.role);
        self.identity = identity;
    }

    pub async fn place_order(&self, draft: OrderDraft) -> Result<Order> {
        place_order(self.backend.as_ref(), &self.notifier, &self.identity.role, draft).await
    }

    pub async fn update_status(&self, order_id: &str, new_status: OrderStatus) -> Result<Order> {
        update_status(
            self.backend.as_ref(),
            &self.notifier,
            &self.identity.role,
            order_id,
            new_status,
        )
        .await
    }

    /// Everything currently visible, newest first.
    pub fn orders(&self) -> Vec<Order> {
        self.feed.snapshot().orders
    }

    pub fn pending_orders(&self) -> Vec<Order> {
        self.with_status(OrderStatus::Pending)
    }

    pub fn ready_orders(&self) -> Vec<Order> {
        self.with_status(OrderStatus::Ready)
    }

    pub fn completed_orders(&self) -> Vec<Order> {
        self.with_status(OrderStatus::Completed)
    }

    /// Orders placed on the current calendar day, local time.
    pub fn today_orders(&self) -> Vec<Order> {
        self.orders()
            .into_iter()
            .filter(|order| order.placed_today())
            .collect()
    }

    pub fn orders_for_hotel(&self, hotel_id: &str) -> Vec<Order> {
        self.orders()
            .into_iter()
            .filter(|order| order.hotel_id == hotel_id)
            .collect()
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed.snapshot().status
    }

    /// Wait until the feed publishes its next snapshot.
    pub async fn feed_changed(&mut self) {
        self.feed.changed().await;
    }

    fn with_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders()
            .into_iter()
            .filter(|order| order.status == status)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::domain::OrderItem;
    use crate::notify::LogNotifier;
    use chrono::Utc;
    use std::time::Duration;

    fn notifier() -> Arc<dyn Notify> {
        Arc::new(LogNotifier)
    }

    fn admin_store(backend: &Arc<MockBackend>) -> OrderStore {
        OrderStore::new(
            backend.clone(),
            notifier(),
            Identity::signed_in("admin-uid", Role::Admin),
        )
    }

    fn hotel_store(backend: &Arc<MockBackend>, hotel_id: &str) -> OrderStore {
        OrderStore::new(
            backend.clone(),
            notifier(),
            Identity::signed_in(
                hotel_id,
                Role::HotelUser {
                    hotel_id: hotel_id.to_string(),
                },
            ),
        )
    }

    fn delivery_store(backend: &Arc<MockBackend>) -> OrderStore {
        OrderStore::new(
            backend.clone(),
            notifier(),
            Identity::signed_in("delivery-uid", Role::Delivery),
        )
    }

    fn rice_draft(hotel_id: &str) -> OrderDraft {
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

    /// Writes reconcile through the feed asynchronously, so view
    /// assertions wait for the expected state rather than counting
    /// snapshots.
    async fn wait_until(store: &mut OrderStore, cond: impl Fn(&OrderStore) -> bool) {
        for _ in 0..100 {
            if cond(store) {
                return;
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), store.feed_changed()).await;
        }
        panic!("store view never reached the expected state");
    }

    #[tokio::test]
    async fn test_placing_an_order() {
        let backend = Arc::new(MockBackend::new());
        let mut store = hotel_store(&backend, "KIR001");

        let order = store.place_order(rice_draft("KIR001")).await.unwrap();
        assert_eq!(order.total, 250.0);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.hotel_id, "KIR001");

        // the view catches up through the feed
        wait_until(&mut store, |store| store.pending_orders().len() == 1).await;
        assert_eq!(store.pending_orders()[0].id, order.id);
        assert_eq!(store.today_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_drafts_leave_no_trace() {
        let backend = Arc::new(MockBackend::new());
        let store = hotel_store(&backend, "KIR001");

        let empty = OrderDraft {
            hotel_id: "KIR001".to_string(),
            items: vec![OrderItem {
                name: "Rice".to_string(),
                quantity: 0,
                price: 50.0,
                unit: "kg".to_string(),
            }],
            note: None,
        };
        assert!(matches!(
            store.place_order(empty).await,
            Err(Error::Validation(_))
        ));
        assert!(backend
            .fetch_orders(&crate::auth::Visibility::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_hotels_order_for_themselves_only() {
        let backend = Arc::new(MockBackend::new());
        let store = hotel_store(&backend, "KIR001");

        let err = store.place_order(rice_draft("KIR002")).await.unwrap_err();
        assert!(matches!(err, Error::Authorization { .. }));

        // the admin may order on a hotel's behalf
        let admin = admin_store(&backend);
        admin.place_order(rice_draft("KIR002")).await.unwrap();
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_views_unchanged() {
        let backend = Arc::new(MockBackend::new());
        let mut store = hotel_store(&backend, "KIR001");
        store.place_order(rice_draft("KIR001")).await.unwrap();
        wait_until(&mut store, |store| store.orders().len() == 1).await;

        backend.fail_writes(true);
        let err = store.place_order(rice_draft("KIR001")).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));

        // a failed write fires no change, so the view stays put
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.orders().len(), 1);
        assert_eq!(store.feed_status(), FeedStatus::Live);
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_increasing_timestamps() {
        let backend = Arc::new(MockBackend::new());
        let admin = admin_store(&backend);
        let delivery = delivery_store(&backend);

        let order = admin.place_order(rice_draft("KIR001")).await.unwrap();
        let mut last = order.updated_at;

        let steps = [
            (&admin, OrderStatus::Confirmed),
            (&admin, OrderStatus::Ready),
            (&delivery, OrderStatus::Delivering),
            (&delivery, OrderStatus::Completed),
        ];
        for (store, status) in steps {
            tokio::time::sleep(Duration::from_millis(3)).await;
            let updated = store.update_status(&order.id, status).await.unwrap();
            assert_eq!(updated.status, status);
            assert!(updated.updated_at > last, "updated_at must strictly increase");
            last = updated.updated_at;
        }
    }

    #[tokio::test]
    async fn test_going_backwards_is_rejected() {
        let backend = Arc::new(MockBackend::new());
        let admin = admin_store(&backend);

        let order = admin.place_order(rice_draft("KIR001")).await.unwrap();
        admin
            .update_status(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        // "confirmed -> pending" is not a thing, even for the admin
        let err = admin
            .update_status(&order.id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        let stored = backend.fetch_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_role_write_policy_is_enforced() {
        let backend = Arc::new(MockBackend::new());
        let admin = admin_store(&backend);
        let delivery = delivery_store(&backend);
        let hotel = hotel_store(&backend, "KIR001");

        let order = hotel.place_order(rice_draft("KIR001")).await.unwrap();

        // hotels never mutate status, not even on their own orders
        assert!(matches!(
            hotel
                .update_status(&order.id, OrderStatus::Confirmed)
                .await
                .unwrap_err(),
            Error::Authorization { .. }
        ));

        // a pending order is invisible to delivery, so their attempt
        // reads as missing rather than forbidden
        assert!(matches!(
            delivery
                .update_status(&order.id, OrderStatus::Failed)
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));

        // admin cannot take orders out; that is delivery's move
        admin
            .update_status(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        admin
            .update_status(&order.id, OrderStatus::Ready)
            .await
            .unwrap();
        assert!(matches!(
            admin
                .update_status(&order.id, OrderStatus::Delivering)
                .await
                .unwrap_err(),
            Error::Authorization { .. }
        ));

        // and delivery can, now that the order is in its queue
        delivery
            .update_status(&order.id, OrderStatus::Delivering)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_orders_outside_the_view_read_as_missing() {
        let backend = Arc::new(MockBackend::new());
        let admin = admin_store(&backend);
        let delivery = delivery_store(&backend);

        let order = admin.place_order(rice_draft("KIR001")).await.unwrap();

        // a pending order is not in the delivery queue, so to a delivery
        // session it simply does not exist
        assert!(matches!(
            delivery
                .update_status(&order.id, OrderStatus::Delivering)
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));

        // unknown ids are missing for everyone
        assert!(matches!(
            admin
                .update_status("no-such-order", OrderStatus::Confirmed)
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_derived_views_follow_the_lifecycle() {
        let backend = Arc::new(MockBackend::new());
        let mut admin = admin_store(&backend);

        let order = admin.place_order(rice_draft("KIR001")).await.unwrap();
        wait_until(&mut admin, |store| store.pending_orders().len() == 1).await;
        assert!(admin.ready_orders().is_empty());

        admin
            .update_status(&order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        admin
            .update_status(&order.id, OrderStatus::Ready)
            .await
            .unwrap();
        wait_until(&mut admin, |store| store.ready_orders().len() == 1).await;

        assert!(admin.pending_orders().is_empty());
        assert!(admin.completed_orders().is_empty());
        assert_eq!(admin.orders_for_hotel("KIR001").len(), 1);
        assert!(admin.orders_for_hotel("KIR002").is_empty());
    }

    #[tokio::test]
    async fn test_yesterdays_orders_are_not_todays() {
        let backend = Arc::new(MockBackend::new());
        let yesterday = Utc::now() - chrono::Duration::days(1);
        backend.seed_order(Order {
            id: "old-order".to_string(),
            hotel_id: "KIR001".to_string(),
            items: vec![],
            total: 0.0,
            status: OrderStatus::Completed,
            note: None,
            created_at: yesterday,
            updated_at: yesterday,
        });

        let mut admin = admin_store(&backend);
        wait_until(&mut admin, |store| store.orders().len() == 1).await;
        assert!(admin.today_orders().is_empty());
    }

    #[tokio::test]
    async fn test_store_follows_auth_state() {
        use crate::auth::AuthState;

        let backend = Arc::new(MockBackend::new());
        let auth = AuthState::new();
        let mut identity_changes = auth.watch();
        let mut store = OrderStore::new(backend.clone(), notifier(), auth.identity());

        // logged out: empty view, no placing
        assert!(store.orders().is_empty());
        assert!(matches!(
            store.place_order(rice_draft("KIR001")).await.unwrap_err(),
            Error::Authorization { .. }
        ));

        auth.sign_in("KIR001", Role::HotelUser {
            hotel_id: "KIR001".to_string(),
        });
        assert!(identity_changes.has_changed().unwrap());
        store.set_identity(identity_changes.borrow_and_update().clone());

        store.place_order(rice_draft("KIR001")).await.unwrap();
        wait_until(&mut store, |store| store.orders().len() == 1).await;
    }

    #[tokio::test]
    async fn test_identity_change_rescopes_the_view() {
        let backend = Arc::new(MockBackend::new());
        let mut store = admin_store(&backend);

        store.place_order(rice_draft("KIR001")).await.unwrap();
        store.place_order(rice_draft("KIR002")).await.unwrap();
        wait_until(&mut store, |store| store.orders().len() == 2).await;

        store.set_identity(Identity::signed_in(
            "KIR001",
            Role::HotelUser {
                hotel_id: "KIR001".to_string(),
            },
        ));
        wait_until(&mut store, |store| store.orders().len() == 1).await;
        assert_eq!(store.orders()[0].hotel_id, "KIR001");

        // logout empties the view immediately
        store.set_identity(Identity::unauthenticated());
        assert!(store.orders().is_empty());
    }
}
