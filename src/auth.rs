//! Roles, identities and the policies attached to them.
//!
//! Authentication itself happens elsewhere; this module only deals with
//! the `(user id, role)` pair an authenticator hands us, and with what
//! each role is allowed to see and do.

use tokio::sync::watch;

use crate::domain::{Order, OrderStatus};
use crate::errors::{Error, Result};

/// Who is using the system. Each variant carries exactly the data that
/// role needs, so a delivery session cannot accidentally pose as a hotel
/// and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Delivery,
    HotelUser { hotel_id: String },
    Unauthenticated,
}

impl Role {
    /// Parse the textual form used on the wire and the command line:
    /// `admin`, `delivery`, `hotel:<id>` or `anon`.
    pub fn parse(s: &str) -> Result<Role> {
        match s {
            "admin" => Ok(Role::Admin),
            "delivery" => Ok(Role::Delivery),
            "anon" | "" => Ok(Role::Unauthenticated),
            other => match other.strip_prefix("hotel:") {
                Some(id) if !id.is_empty() => Ok(Role::HotelUser {
                    hotel_id: id.to_string(),
                }),
                _ => Err(Error::BadRequest(format!("unknown role '{other}'"))),
            },
        }
    }

    /// The subset of orders this role may observe.
    pub fn visibility(&self) -> Visibility {
        match self {
            Role::Admin => Visibility::All,
            Role::Delivery => Visibility::DeliveryQueue,
            Role::HotelUser { hotel_id } => Visibility::Hotel(hotel_id.clone()),
            Role::Unauthenticated => Visibility::Nothing,
        }
    }

    /// Hotels order for themselves; the admin may order on a hotel's
    /// behalf (that is how default orders get placed from the dashboard).
    pub fn may_place_for(&self, hotel_id: &str) -> bool {
        match self {
            Role::Admin => true,
            Role::HotelUser { hotel_id: own } => own == hotel_id,
            Role::Delivery | Role::Unauthenticated => false,
        }
    }

    /// Which target statuses this role may write: the admin confirms and
    /// readies, delivery takes out and completes, both may fail an order.
    pub fn may_set(&self, status: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Role::Admin => matches!(status, Confirmed | Ready | Failed),
            Role::Delivery => matches!(status, Delivering | Completed | Failed),
            Role::HotelUser { .. } | Role::Unauthenticated => false,
        }
    }

    /// Hotel registration and the full registry are admin matters.
    pub fn may_manage_hotels(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// A single hotel record is visible to staff roles and to the hotel
    /// itself.
    pub fn may_view_hotel(&self, hotel_id: &str) -> bool {
        match self {
            Role::Admin | Role::Delivery => true,
            Role::HotelUser { hotel_id: own } => own == hotel_id,
            Role::Unauthenticated => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Delivery => write!(f, "delivery"),
            Role::HotelUser { hotel_id } => write!(f, "hotel:{hotel_id}"),
            Role::Unauthenticated => write!(f, "anon"),
        }
    }
}

/// A role-derived filter over the order collection, applied both by the
/// backend queries and by the live feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Every order (admin).
    All,
    /// Orders on the delivery path: ready or out for delivery.
    DeliveryQueue,
    /// Orders belonging to one hotel.
    Hotel(String),
    /// An empty view (unauthenticated sessions).
    Nothing,
}

impl Visibility {
    pub fn allows(&self, order: &Order) -> bool {
        match self {
            Visibility::All => true,
            Visibility::DeliveryQueue => {
                matches!(order.status, OrderStatus::Ready | OrderStatus::Delivering)
            }
            Visibility::Hotel(hotel_id) => order.hotel_id == *hotel_id,
            Visibility::Nothing => false,
        }
    }
}

/// The authenticated session, as reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque; we never interpret it.
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn signed_in(user_id: impl Into<String>, role: Role) -> Identity {
        Identity {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn unauthenticated() -> Identity {
        Identity {
            user_id: String::new(),
            role: Role::Unauthenticated,
        }
    }
}

/// Publishes identity changes so that order stores can re-derive their
/// subscription whenever someone logs in or out.
pub struct AuthState {
    tx: watch::Sender<Identity>,
}

impl AuthState {
    pub fn new() -> AuthState {
        let (tx, _rx) = watch::channel(Identity::unauthenticated());
        AuthState { tx }
    }

    pub fn sign_in(&self, user_id: impl Into<String>, role: Role) {
        self.tx.send_replace(Identity::signed_in(user_id, role));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(Identity::unauthenticated());
    }

    pub fn identity(&self) -> Identity {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::OrderItem;
    use chrono::Utc;

    fn order_for(hotel_id: &str, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: "o1".to_string(),
            hotel_id: hotel_id.to_string(),
            items: vec![OrderItem {
                name: "Rice".to_string(),
                quantity: 5,
                price: 50.0,
                unit: "kg".to_string(),
            }],
            total: 250.0,
            status,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_round_trip() {
        for text in ["admin", "delivery", "hotel:KIR001", "anon"] {
            assert_eq!(Role::parse(text).unwrap().to_string(), text);
        }
        assert_eq!(Role::parse("").unwrap(), Role::Unauthenticated);
        assert!(Role::parse("hotel:").is_err());
        assert!(Role::parse("superuser").is_err());
    }

    #[test]
    fn test_visibility_policy_table() {
        use OrderStatus::*;
        let pending = order_for("KIR001", Pending);
        let ready = order_for("KIR001", Ready);
        let delivering = order_for("KIR002", Delivering);

        let admin = Role::Admin.visibility();
        assert!(admin.allows(&pending) && admin.allows(&ready) && admin.allows(&delivering));

        let delivery = Role::Delivery.visibility();
        assert!(!delivery.allows(&pending));
        assert!(delivery.allows(&ready));
        assert!(delivery.allows(&delivering));

        let own = Role::HotelUser {
            hotel_id: "KIR001".to_string(),
        }
        .visibility();
        assert!(own.allows(&pending));
        assert!(!own.allows(&delivering)); // belongs to KIR002

        let anon = Role::Unauthenticated.visibility();
        assert!(!anon.allows(&pending) && !anon.allows(&ready));
    }

    #[test]
    fn test_write_policy() {
        use OrderStatus::*;
        let hotel = Role::HotelUser {
            hotel_id: "KIR001".to_string(),
        };

        assert!(Role::Admin.may_set(Confirmed));
        assert!(Role::Admin.may_set(Ready));
        assert!(Role::Admin.may_set(Failed));
        assert!(!Role::Admin.may_set(Delivering));

        assert!(Role::Delivery.may_set(Delivering));
        assert!(Role::Delivery.may_set(Completed));
        assert!(Role::Delivery.may_set(Failed));
        assert!(!Role::Delivery.may_set(Confirmed));

        assert!(!hotel.may_set(Confirmed));
        assert!(!Role::Unauthenticated.may_set(Failed));

        assert!(hotel.may_place_for("KIR001"));
        assert!(!hotel.may_place_for("KIR002"));
        assert!(Role::Admin.may_place_for("KIR002"));
        assert!(!Role::Delivery.may_place_for("KIR001"));
    }

    #[test]
    fn test_auth_state_publishes_changes() {
        let auth = AuthState::new();
        let mut watcher = auth.watch();

        assert_eq!(auth.identity(), Identity::unauthenticated());

        auth.sign_in("user-7", Role::Admin);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().role, Role::Admin);

        auth.sign_out();
        assert_eq!(auth.identity().role, Role::Unauthenticated);
    }
}
