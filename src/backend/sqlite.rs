use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Backend, Change};
use crate::auth::Visibility;
use crate::domain::{DefaultOrder, Hotel, HotelDraft, Order, OrderDraft, OrderItem, OrderStatus};
use crate::errors::{Error, Result};
use async_trait::async_trait;

/// Contains the SQL used to interact with the database.
///
/// The schema mirrors the hosted store this replaces: orders and their
/// line items live in separate tables, and a hotel's recurring default
/// order is just another item table keyed by hotel.
pub mod sql_queries {
    pub const CREATE_SCHEMA: &str = "
        CREATE TABLE IF NOT EXISTS hotels (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT NOT NULL,
            address_link TEXT,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            hotel_id TEXT NOT NULL,
            total REAL NOT NULL,
            status TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS order_items (
            order_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            price REAL NOT NULL,
            unit TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS default_order_items (
            hotel_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            price REAL NOT NULL,
            unit TEXT NOT NULL
        );
    ";

    pub const INSERT_ORDER: &str =
        "INSERT INTO orders (id, hotel_id, total, status, note, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
    pub const INSERT_ORDER_ITEM: &str =
        "INSERT INTO order_items (order_id, position, name, quantity, price, unit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
    pub const SELECT_ORDER_HEAD: &str =
        "SELECT id, hotel_id, total, status, note, created_at, updated_at
         FROM orders WHERE id = ?1";
    pub const SELECT_ALL_ORDERS: &str =
        "SELECT id, hotel_id, total, status, note, created_at, updated_at
         FROM orders ORDER BY created_at DESC";
    pub const SELECT_DELIVERY_ORDERS: &str =
        "SELECT id, hotel_id, total, status, note, created_at, updated_at
         FROM orders WHERE status IN ('ready', 'delivering') ORDER BY created_at DESC";
    pub const SELECT_HOTEL_ORDERS: &str =
        "SELECT id, hotel_id, total, status, note, created_at, updated_at
         FROM orders WHERE hotel_id = ?1 ORDER BY created_at DESC";
    pub const SELECT_ORDER_ITEMS: &str =
        "SELECT name, quantity, price, unit FROM order_items
         WHERE order_id = ?1 ORDER BY position";
    pub const SELECT_STATUS: &str = "SELECT status FROM orders WHERE id = ?1";
    pub const UPDATE_STATUS: &str =
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3";

    pub const INSERT_HOTEL: &str =
        "INSERT INTO hotels (id, name, owner_name, phone, address, address_link, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
    pub const SELECT_HOTEL: &str =
        "SELECT id, name, owner_name, phone, address, address_link, created_at
         FROM hotels WHERE id = ?1";
    pub const SELECT_ALL_HOTELS: &str =
        "SELECT id, name, owner_name, phone, address, address_link, created_at
         FROM hotels ORDER BY created_at DESC";

    pub const DELETE_DEFAULT_ORDER: &str =
        "DELETE FROM default_order_items WHERE hotel_id = ?1";
    pub const INSERT_DEFAULT_ORDER_ITEM: &str =
        "INSERT INTO default_order_items (hotel_id, position, name, quantity, price, unit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
    pub const SELECT_DEFAULT_ORDER_ITEMS: &str =
        "SELECT name, quantity, price, unit FROM default_order_items
         WHERE hotel_id = ?1 ORDER BY position";
}

pub struct SqliteBackend {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<Change>,
}

impl SqliteBackend {
    /// Open (and if needed initialize) the database at `path`.
    pub fn open(path: &str) -> Result<SqliteBackend> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A throwaway database, mostly for tests.
    pub fn in_memory() -> Result<SqliteBackend> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<SqliteBackend> {
        conn.execute_batch(sql_queries::CREATE_SCHEMA)?;
        let (changes, _) = broadcast::channel(64);
        Ok(SqliteBackend {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database lock poisoned")
    }

    fn notify(&self, change: Change) {
        // nobody listening is fine
        let _ = self.changes.send(change);
    }
}

fn status_from_column(index: usize, text: &str) -> rusqlite::Result<OrderStatus> {
    OrderStatus::parse(text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

fn row_to_order_head(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(3)?;
    Ok(Order {
        id: row.get(0)?,
        hotel_id: row.get(1)?,
        total: row.get(2)?,
        status: status_from_column(3, &status)?,
        note: row.get(4)?,
        created_at: row.get::<_, DateTime<Utc>>(5)?,
        updated_at: row.get::<_, DateTime<Utc>>(6)?,
        // filled in by a second query
        items: Vec::new(),
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        name: row.get(0)?,
        quantity: row.get(1)?,
        price: row.get(2)?,
        unit: row.get(3)?,
    })
}

fn load_items(conn: &Connection, sql: &str, key: &str) -> Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(sql)?;
    let items = stmt
        .query_map(params![key], row_to_item)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// This exists only to make the borrow checker happy around the prepared
/// statement inside a transaction.
fn insert_items(
    tx: &rusqlite::Transaction,
    sql: &str,
    key: &str,
    items: &[OrderItem],
) -> Result<()> {
    let mut stmt = tx.prepare(sql)?;
    for (position, item) in items.iter().enumerate() {
        stmt.execute(params![
            key,
            position as i64,
            item.name,
            item.quantity,
            item.price,
            item.unit
        ])?;
    }
    Ok(())
}

fn collect_orders(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Order>> {
    let heads = {
        let mut stmt = conn.prepare(sql)?;
        let heads = stmt.query_map(args, row_to_order_head)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        heads
    };
    let mut orders = Vec::with_capacity(heads.len());
    for mut order in heads {
        order.items = load_items(conn, sql_queries::SELECT_ORDER_ITEMS, &order.id)?;
        orders.push(order);
    }
    // the SQL already sorts, but don't trust the text format of the
    // timestamps for ordering
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
}

fn get_order(conn: &Connection, order_id: &str) -> Result<Option<Order>> {
    let head = conn
        .query_row(sql_queries::SELECT_ORDER_HEAD, params![order_id], row_to_order_head)
        .optional()?;
    match head {
        Some(mut order) => {
            order.items = load_items(conn, sql_queries::SELECT_ORDER_ITEMS, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn insert_order(&self, draft: OrderDraft, total: f64) -> Result<Order> {
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

        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            tx.execute(
                sql_queries::INSERT_ORDER,
                params![
                    order.id,
                    order.hotel_id,
                    order.total,
                    order.status.as_str(),
                    order.note,
                    order.created_at,
                    order.updated_at
                ],
            )?;
            insert_items(&tx, sql_queries::INSERT_ORDER_ITEM, &order.id, &order.items)?;
            tx.commit()?;
        }

        self.notify(Change::Placed {
            order_id: order.id.clone(),
        });
        Ok(order)
    }

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<Order> {
        let updated = {
            let mut conn = self.conn();
            let tx = conn.transaction()?;

            let current: Option<String> = tx
                .query_row(sql_queries::SELECT_STATUS, params![order_id], |row| {
                    row.get(0)
                })
                .optional()?;
            let current = current.ok_or_else(|| Error::NotFound(format!("no order '{order_id}'")))?;
            let current = OrderStatus::parse(&current).map_err(|_| {
                Error::Persistence(format!("corrupt status '{current}' on order '{order_id}'"))
            })?;
            current.check_move_to(status)?;

            tx.execute(
                sql_queries::UPDATE_STATUS,
                params![status.as_str(), Utc::now(), order_id],
            )?;
            let order = get_order(&tx, order_id)?
                .ok_or_else(|| Error::Persistence(format!("order '{order_id}' vanished mid-update")))?;
            tx.commit()?;
            order
        };

        self.notify(Change::StatusChanged {
            order_id: updated.id.clone(),
            status,
        });
        Ok(updated)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Option<Order>> {
        get_order(&self.conn(), order_id)
    }

    async fn fetch_orders(&self, visibility: &Visibility) -> Result<Vec<Order>> {
        let conn = self.conn();
        match visibility {
            Visibility::All => collect_orders(&conn, sql_queries::SELECT_ALL_ORDERS, &[]),
            Visibility::DeliveryQueue => {
                collect_orders(&conn, sql_queries::SELECT_DELIVERY_ORDERS, &[])
            }
            Visibility::Hotel(hotel_id) => {
                collect_orders(&conn, sql_queries::SELECT_HOTEL_ORDERS, &[hotel_id])
            }
            Visibility::Nothing => Ok(Vec::new()),
        }
    }

    async fn insert_hotel(&self, draft: HotelDraft) -> Result<Hotel> {
        let hotel = Hotel {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            owner_name: draft.owner_name,
            phone: draft.phone,
            address: draft.address,
            address_link: draft.address_link,
            created_at: Utc::now(),
        };
        self.conn().execute(
            sql_queries::INSERT_HOTEL,
            params![
                hotel.id,
                hotel.name,
                hotel.owner_name,
                hotel.phone,
                hotel.address,
                hotel.address_link,
                hotel.created_at
            ],
        )?;
        Ok(hotel)
    }

    async fn fetch_hotel(&self, hotel_id: &str) -> Result<Option<Hotel>> {
        let conn = self.conn();
        let hotel = conn
            .query_row(sql_queries::SELECT_HOTEL, params![hotel_id], row_to_hotel)
            .optional()?;
        Ok(hotel)
    }

    async fn fetch_hotels(&self) -> Result<Vec<Hotel>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql_queries::SELECT_ALL_HOTELS)?;
        let hotels = stmt
            .query_map([], row_to_hotel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hotels)
    }

    async fn store_default_order(&self, default: DefaultOrder) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(sql_queries::DELETE_DEFAULT_ORDER, params![default.hotel_id])?;
        insert_items(
            &tx,
            sql_queries::INSERT_DEFAULT_ORDER_ITEM,
            &default.hotel_id,
            &default.items,
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn fetch_default_order(&self, hotel_id: &str) -> Result<Option<DefaultOrder>> {
        let items = load_items(
            &self.conn(),
            sql_queries::SELECT_DEFAULT_ORDER_ITEMS,
            hotel_id,
        )?;
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(DefaultOrder {
                hotel_id: hotel_id.to_string(),
                items,
            }))
        }
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}

fn row_to_hotel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Hotel> {
    Ok(Hotel {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_name: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        address_link: row.get(5)?,
        created_at: row.get::<_, DateTime<Utc>>(6)?,
    })
}
