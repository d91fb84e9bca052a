//! Kirana — grocery ordering for small hotels and restaurants.
//!
//! Hotels place recurring grocery orders, an admin confirms them and
//! marks them ready, a delivery role takes them out. The crate is built
//! around three pieces:
//!
//! - [`store::OrderStore`], the single owner of the order collection a
//!   session sees, with its mutation operations and derived views;
//! - [`feed::OrderFeed`], the role-scoped live subscription keeping that
//!   collection in sync with the backend;
//! - [`backend::Backend`], the seam to the storage service, with a mock
//!   and a SQLite implementation.
//!
//! Around them sit the order lifecycle state machine ([`domain`]), role
//! policies ([`auth`]), push notifications ([`notify`]) and a small
//! HTTP/1.1 surface ([`http`], [`routes`], [`endpoints`]) served by the
//! `server` binary and driven by the `client` binary.

pub mod api;
pub mod auth;
pub mod backend;
pub mod catalog;
pub mod cli;
pub mod domain;
pub mod endpoints;
pub mod errors;
pub mod feed;
pub mod http;
pub mod notify;
pub mod routes;
pub mod store;
