//! Request dispatch and handlers for the HTTP API.
//!
//! Routing proper lives in [`crate::routes`]; this module takes the
//! resolved endpoint name and runs the matching operation against the
//! shared application state. The caller's role arrives in a header and
//! is treated as an opaque claim — verifying it is the job of whatever
//! authentication sits in front of the service.

use std::sync::Arc;

use tracing::debug;

use crate::api::{DefaultOrderUpdate, ErrorBody, StatusUpdate};
use crate::auth::Role;
use crate::backend::Backend;
use crate::domain::{DefaultOrder, HotelDraft, OrderDraft};
use crate::errors::{Error, Result};
use crate::http::{Request, Response};
use crate::notify::Notify;
use crate::routes::{endpoints, params, ApiRouter, HttpParams};
use crate::store;

/// Header carrying the caller's role claim.
pub const ROLE_HEADER: &str = "X-Kirana-Role";

/// Everything the handlers share. Built once at startup and passed
/// around explicitly.
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub notifier: Arc<dyn Notify>,
    router: ApiRouter,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, notifier: Arc<dyn Notify>) -> Result<AppState> {
        Ok(AppState {
            backend,
            notifier,
            router: ApiRouter::new()?,
        })
    }
}

/// Entry point wired into the HTTP server: never fails, errors become
/// JSON error responses.
pub async fn handle(state: Arc<AppState>, request: Request) -> Response {
    match dispatch(&state, &request).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &Error) -> Response {
    Response::json(
        err.http_status(),
        &ErrorBody {
            error: err.to_string(),
        },
    )
    .unwrap_or_else(|_| Response::error(500))
}

fn role_from(request: &Request) -> Result<Role> {
    match request.header(ROLE_HEADER) {
        Some(value) => Role::parse(value),
        None => Ok(Role::Unauthenticated),
    }
}

fn param<'a>(params: &'a HttpParams, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::Internal(format!("missing path parameter '{key}'")))
}

async fn dispatch(state: &AppState, request: &Request) -> Result<Response> {
    let (endpoint, params) = state.router.resolve(&request.path)?;
    let role = role_from(request)?;
    debug!(endpoint, method = %request.method, %role, "dispatching request");

    match (endpoint, request.method.as_str()) {
        (endpoints::ORDERS, "POST") => place_order(state, &role, request).await,
        (endpoints::ORDERS, "GET") => list_orders(state, &role).await,
        (endpoints::ORDER_BY_ID, "GET") => get_order(state, &role, &params).await,
        (endpoints::ORDER_STATUS, "POST") => update_status(state, &role, &params, request).await,
        (endpoints::HOTELS, "POST") => register_hotel(state, &role, request).await,
        (endpoints::HOTELS, "GET") => list_hotels(state, &role).await,
        (endpoints::HOTEL_BY_ID, "GET") => get_hotel(state, &role, &params).await,
        (endpoints::DEFAULT_ORDER, "PUT") => {
            save_default_order(state, &role, &params, request).await
        }
        (endpoints::DEFAULT_ORDER, "GET") => get_default_order(state, &role, &params).await,
        (endpoints::DEFAULT_ORDER_PLACE, "POST") => {
            place_default_order(state, &role, &params).await
        }
        (endpoint, method) => Err(Error::NotFound(format!(
            "no handler for {method} {endpoint}"
        ))),
    }
}

async fn place_order(state: &AppState, role: &Role, request: &Request) -> Result<Response> {
    let draft: OrderDraft = serde_json::from_str(&request.body)?;
    let order = store::place_order(state.backend.as_ref(), &state.notifier, role, draft).await?;
    Response::json(201, &order)
}

async fn list_orders(state: &AppState, role: &Role) -> Result<Response> {
    let orders = state.backend.fetch_orders(&role.visibility()).await?;
    Response::json(200, &orders)
}

async fn get_order(state: &AppState, role: &Role, params: &HttpParams) -> Result<Response> {
    let order_id = param(params, params::ORDER_ID)?;
    match state.backend.fetch_order(order_id).await? {
        Some(order) if role.visibility().allows(&order) => Response::json(200, &order),
        _ => Err(Error::NotFound(format!("no order '{order_id}' in view"))),
    }
}

async fn update_status(
    state: &AppState,
    role: &Role,
    params: &HttpParams,
    request: &Request,
) -> Result<Response> {
    let order_id = param(params, params::ORDER_ID)?;
    let update: StatusUpdate = serde_json::from_str(&request.body)?;
    let order = store::update_status(
        state.backend.as_ref(),
        &state.notifier,
        role,
        order_id,
        update.status,
    )
    .await?;
    Response::json(200, &order)
}

async fn register_hotel(state: &AppState, role: &Role, request: &Request) -> Result<Response> {
    if !role.may_manage_hotels() {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: "register hotels".to_string(),
        });
    }
    let draft: HotelDraft = serde_json::from_str(&request.body)?;
    let hotel = state.backend.insert_hotel(draft).await?;
    Response::json(201, &hotel)
}

async fn list_hotels(state: &AppState, role: &Role) -> Result<Response> {
    if !role.may_manage_hotels() {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: "list hotels".to_string(),
        });
    }
    Response::json(200, &state.backend.fetch_hotels().await?)
}

async fn get_hotel(state: &AppState, role: &Role, params: &HttpParams) -> Result<Response> {
    let hotel_id = param(params, params::HOTEL_ID)?;
    if !role.may_view_hotel(hotel_id) {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: format!("view hotel '{hotel_id}'"),
        });
    }
    match state.backend.fetch_hotel(hotel_id).await? {
        Some(hotel) => Response::json(200, &hotel),
        None => Err(Error::NotFound(format!("no hotel '{hotel_id}'"))),
    }
}

async fn save_default_order(
    state: &AppState,
    role: &Role,
    params: &HttpParams,
    request: &Request,
) -> Result<Response> {
    if !role.may_manage_hotels() {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: "edit default orders".to_string(),
        });
    }
    let hotel_id = param(params, params::HOTEL_ID)?;
    let update: DefaultOrderUpdate = serde_json::from_str(&request.body)?;
    state
        .backend
        .store_default_order(DefaultOrder {
            hotel_id: hotel_id.to_string(),
            items: update.items,
        })
        .await?;
    Ok(Response::ok())
}

async fn get_default_order(state: &AppState, role: &Role, params: &HttpParams) -> Result<Response> {
    let hotel_id = param(params, params::HOTEL_ID)?;
    // same circle that may place for the hotel: the hotel itself and the
    // admin
    if !role.may_place_for(hotel_id) {
        return Err(Error::Authorization {
            role: role.to_string(),
            action: format!("view the default order of hotel '{hotel_id}'"),
        });
    }
    match state.backend.fetch_default_order(hotel_id).await? {
        Some(default) => Response::json(200, &default),
        None => Err(Error::NotFound(format!(
            "no default order for hotel '{hotel_id}'"
        ))),
    }
}

async fn place_default_order(
    state: &AppState,
    role: &Role,
    params: &HttpParams,
) -> Result<Response> {
    let hotel_id = param(params, params::HOTEL_ID)?;
    let default = state
        .backend
        .fetch_default_order(hotel_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no default order for hotel '{hotel_id}'")))?;
    let draft = OrderDraft {
        hotel_id: default.hotel_id,
        items: default.items,
        note: None,
    };
    let order = store::place_order(state.backend.as_ref(), &state.notifier, role, draft).await?;
    Response::json(201, &order)
}
