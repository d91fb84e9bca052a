use std::collections::HashMap;

use matchit::Router;

use crate::errors::{Error, Result};

/// Utility macro generating a constant for the HTTP endpoint, and associate it with
/// an identifier. Matchit requires both
macro_rules! make_paths {
        ($($name:ident: $path:expr,)*) => {

        pub mod paths {
                    $(
                        pub const $name: &str = concat!("/api/v1", $path);
                    )*
        }
        pub mod endpoints {
            $(
                pub const $name: &str = stringify!($name);
            )*
        }

        }
    }

make_paths! {
    ORDERS: "/orders",
    ORDER_BY_ID: "/orders/{order_id}",
    ORDER_STATUS: "/orders/{order_id}/status",
    HOTELS: "/hotels",
    HOTEL_BY_ID: "/hotels/{hotel_id}",
    DEFAULT_ORDER: "/hotels/{hotel_id}/default-order",
    DEFAULT_ORDER_PLACE: "/hotels/{hotel_id}/default-order/place",
}

/// Utility to add a list of paths to the router automatically
macro_rules! add_path{
    ($router:ident $(, $path:ident)*) => {
        $(
            $router.insert(paths::$path, endpoints::$path)
                .map_err(|err| Error::Internal(format!("route table: {err}")))?;
        )*
    }
}

/// Names of the parameters in the HTTP paths, used to extract them
/// from the parameters inside of request handling
pub mod params {
    /// Key of order ids in HTTP paths
    pub const ORDER_ID: &str = "order_id";

    /// Key of hotel ids in HTTP paths
    pub const HOTEL_ID: &str = "hotel_id";
}

/// Return the HTTP path for an order based on its id
pub fn order_by_id(order_id: &str) -> String {
    paths::ORDER_BY_ID.replace("{order_id}", order_id)
}

/// Return the HTTP path for the status of an order based on its id
pub fn order_status(order_id: &str) -> String {
    paths::ORDER_STATUS.replace("{order_id}", order_id)
}

/// Return the HTTP path for a hotel based on its id
pub fn hotel_by_id(hotel_id: &str) -> String {
    paths::HOTEL_BY_ID.replace("{hotel_id}", hotel_id)
}

/// Return the HTTP path for a hotel's default order
pub fn default_order(hotel_id: &str) -> String {
    paths::DEFAULT_ORDER.replace("{hotel_id}", hotel_id)
}

/// Return the HTTP path for placing a hotel's default order
pub fn default_order_place(hotel_id: &str) -> String {
    paths::DEFAULT_ORDER_PLACE.replace("{hotel_id}", hotel_id)
}

// spurious warning, I am using this in tests
#[allow(unused_macros)]
/// Utility to create easily hashmaps of parameters for testing
macro_rules! make_params {
    () => {
        std::collections::HashMap::new()
    };
    ($name:ident: $value:expr $(, $name2:ident: $value2:expr)* ) => {
        {
            let mut map = std::collections::HashMap::new();
            map.insert(params::$name.to_string(), $value.to_string());
            $(
                map.insert(params::$name2.to_string(), $value2.to_string());
            )*
            map
        }
        }
    }

#[allow(unused_imports)]
pub(crate) use make_params;

fn new_router() -> Result<Router<&'static str>> {
    let mut router = Router::new();
    add_path!(
        router,
        ORDERS,
        ORDER_BY_ID,
        ORDER_STATUS,
        HOTELS,
        HOTEL_BY_ID,
        DEFAULT_ORDER,
        DEFAULT_ORDER_PLACE
    );
    Ok(router)
}

/// Type of the object containing the HTTP path parameters passed to handlers
pub type HttpParams = HashMap<String, String>;

/// Maps raw request paths onto endpoint names and extracts their
/// parameters. What happens to an endpoint is the dispatcher's business.
pub struct ApiRouter {
    routes: Router<&'static str>,
}

impl ApiRouter {
    /// Errors from this function are programming errors, most likely
    /// stemming from a misuse of matchit.
    pub fn new() -> Result<ApiRouter> {
        Ok(ApiRouter {
            routes: new_router()?,
        })
    }

    /// Resolve a path to its endpoint name and parameters.
    ///
    /// Returns NotFound when no route matches; whether the method makes
    /// sense for the endpoint is checked at dispatch.
    pub fn resolve(&self, path: &str) -> Result<(&'static str, HttpParams)> {
        let route = self
            .routes
            .at(path)
            .map_err(|err| Error::NotFound(err.to_string()))?;
        let params: HttpParams = route
            .params
            .iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Ok((*route.value, params))
    }
}
