use kirana::api::{
    DefaultOrder, DefaultOrderUpdate, ErrorBody, Hotel, HotelDraft, Order, OrderDraft, OrderItem,
    OrderStatus, StatusUpdate,
};
use kirana::auth::Role;
use kirana::catalog;
use kirana::cli::*;
use kirana::endpoints::ROLE_HEADER;
use kirana::http::{call, code_to_string, Request, Response};
use kirana::routes;

#[derive(Debug)]
enum Action {
    Place {
        hotel_id: String,
        items: Vec<OrderItem>,
        note: Option<String>,
    },
    Status {
        order_id: String,
        status: OrderStatus,
    },
    List,
    Show {
        order_id: String,
    },
    Hotels,
    Register {
        name: String,
        owner_name: String,
        phone: String,
        address: String,
    },
    ShowDefault {
        hotel_id: String,
    },
    SetDefault {
        hotel_id: String,
        items: Vec<OrderItem>,
    },
    PlaceDefault {
        hotel_id: String,
    },
}

#[derive(Debug)]
struct CLIOptions {
    target: String,
    role: Role,
    action: Action,
}

/// Usage:
///   client [<host>:<port>] <role> <action> [args...]
///
/// where role is admin | delivery | hotel:<id> | anon, and actions are
///   place <hotel-id> <Item=qty>... [note:<text>]
///   status <order-id> <new-status>
///   list
///   show <order-id>
///   hotels
///   register <name> <owner> <phone> <address...>
///   default <hotel-id>
///   set-default <hotel-id> <Item=qty>...
///   place-default <hotel-id>
fn parse_cli_args<I>(mut args: I) -> Result<CLIOptions, CLIError>
where
    I: Iterator<Item = String>,
{
    assert!(args.next().is_some()); // Skip the program name
    let first = args
        .next()
        .ok_or(CLIError::MissingParameter("target or role"))?;

    let (target, role_arg) = match validate_address(&first) {
        Ok(target) => (
            target.to_string(),
            args.next().ok_or(CLIError::MissingParameter("role"))?,
        ),
        Err(_) => (DEFAULT_ADDRESS.to_string(), first),
    };
    let role = parse_role(&role_arg)?;

    let action_word = args.next().ok_or(CLIError::MissingParameter("action"))?;
    let action = parse_action(&action_word, &mut args)?;

    Ok(CLIOptions {
        target,
        role,
        action,
    })
}

fn parse_action<I>(word: &str, args: &mut I) -> Result<Action, CLIError>
where
    I: Iterator<Item = String>,
{
    match word {
        "place" => {
            let hotel_id = args.next().ok_or(CLIError::MissingParameter("hotel id"))?;
            let (items, note) = parse_items(args)?;
            if items.is_empty() {
                return Err(CLIError::MissingParameter("items"));
            }
            Ok(Action::Place {
                hotel_id,
                items,
                note,
            })
        }
        "status" => {
            let order_id = args.next().ok_or(CLIError::MissingParameter("order id"))?;
            let status_arg = args.next().ok_or(CLIError::MissingParameter("status"))?;
            let status = OrderStatus::parse(&status_arg)
                .map_err(|_| CLIError::InvalidParameter(format!("unknown status '{status_arg}'")))?;
            Ok(Action::Status { order_id, status })
        }
        "list" => Ok(Action::List),
        "show" => Ok(Action::Show {
            order_id: args.next().ok_or(CLIError::MissingParameter("order id"))?,
        }),
        "hotels" => Ok(Action::Hotels),
        "register" => {
            let name = args.next().ok_or(CLIError::MissingParameter("name"))?;
            let owner_name = args.next().ok_or(CLIError::MissingParameter("owner"))?;
            let phone = args.next().ok_or(CLIError::MissingParameter("phone"))?;
            let address: Vec<String> = args.collect();
            if address.is_empty() {
                return Err(CLIError::MissingParameter("address"));
            }
            Ok(Action::Register {
                name,
                owner_name,
                phone,
                address: address.join(" "),
            })
        }
        "default" => Ok(Action::ShowDefault {
            hotel_id: args.next().ok_or(CLIError::MissingParameter("hotel id"))?,
        }),
        "set-default" => {
            let hotel_id = args.next().ok_or(CLIError::MissingParameter("hotel id"))?;
            let (items, _) = parse_items(args)?;
            if items.is_empty() {
                return Err(CLIError::MissingParameter("items"));
            }
            Ok(Action::SetDefault { hotel_id, items })
        }
        "place-default" => Ok(Action::PlaceDefault {
            hotel_id: args.next().ok_or(CLIError::MissingParameter("hotel id"))?,
        }),
        other => Err(CLIError::InvalidParameter(format!(
            "unknown action '{other}'"
        ))),
    }
}

/// Resolve `Item=qty` arguments against the grocery catalog; a trailing
/// `note:<text>` argument becomes the order note.
fn parse_items<I>(args: &mut I) -> Result<(Vec<OrderItem>, Option<String>), CLIError>
where
    I: Iterator<Item = String>,
{
    let mut items = Vec::new();
    let mut note = None;
    for arg in args {
        if let Some(text) = arg.strip_prefix("note:") {
            note = Some(text.to_string());
            continue;
        }
        let (name, quantity) = arg.split_once('=').ok_or_else(|| {
            CLIError::InvalidParameter(format!("expected <item>=<quantity>, got '{arg}'"))
        })?;
        let quantity: u32 = quantity
            .parse()
            .map_err(|_| CLIError::InvalidParameter(format!("bad quantity in '{arg}'")))?;
        let item = catalog::find(name)
            .ok_or_else(|| CLIError::InvalidParameter(format!("'{name}' is not in the catalog")))?;
        items.push(item.to_order_item(quantity));
    }
    Ok((items, note))
}

fn print_response<'a, Body>(response: &'a Response)
where
    Body: serde::Deserialize<'a> + std::fmt::Debug,
{
    println!(
        "Response Status: {} - {}",
        response.status,
        code_to_string(response.status)
    );
    if response.body.is_empty() {
        return;
    }
    if response.status >= 400 {
        match serde_json::from_str::<ErrorBody>(&response.body) {
            Ok(body) => println!("Error: {}", body.error),
            Err(_) => println!("{}", response.body),
        }
        return;
    }
    match serde_json::from_str::<Body>(&response.body) {
        Ok(json) => println!("Response Body: {:?}", json),
        Err(e) => println!("Error parsing response body: {}\n{:?}", e, response.body),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = parse_cli_args(std::env::args())?;
    let role = options.role.to_string();
    let target = options.target;

    match options.action {
        Action::Place {
            hotel_id,
            items,
            note,
        } => {
            let draft = OrderDraft {
                hotel_id,
                items,
                note,
            };
            let request = Request::post(routes::paths::ORDERS, serde_json::to_string(&draft)?)
                .with_header(ROLE_HEADER, &role);
            print_response::<Order>(&call(&target, request).await?);
        }
        Action::Status { order_id, status } => {
            let body = serde_json::to_string(&StatusUpdate { status })?;
            let request = Request::post(&routes::order_status(&order_id), body)
                .with_header(ROLE_HEADER, &role);
            print_response::<Order>(&call(&target, request).await?);
        }
        Action::List => {
            let request = Request::get(routes::paths::ORDERS).with_header(ROLE_HEADER, &role);
            print_response::<Vec<Order>>(&call(&target, request).await?);
        }
        Action::Show { order_id } => {
            let request =
                Request::get(&routes::order_by_id(&order_id)).with_header(ROLE_HEADER, &role);
            print_response::<Order>(&call(&target, request).await?);
        }
        Action::Hotels => {
            let request = Request::get(routes::paths::HOTELS).with_header(ROLE_HEADER, &role);
            print_response::<Vec<Hotel>>(&call(&target, request).await?);
        }
        Action::Register {
            name,
            owner_name,
            phone,
            address,
        } => {
            let draft = HotelDraft {
                name,
                owner_name,
                phone,
                address,
                address_link: None,
            };
            let request = Request::post(routes::paths::HOTELS, serde_json::to_string(&draft)?)
                .with_header(ROLE_HEADER, &role);
            print_response::<Hotel>(&call(&target, request).await?);
        }
        Action::ShowDefault { hotel_id } => {
            let request =
                Request::get(&routes::default_order(&hotel_id)).with_header(ROLE_HEADER, &role);
            print_response::<DefaultOrder>(&call(&target, request).await?);
        }
        Action::SetDefault { hotel_id, items } => {
            let body = serde_json::to_string(&DefaultOrderUpdate { items })?;
            let request = Request::put(&routes::default_order(&hotel_id), body)
                .with_header(ROLE_HEADER, &role);
            print_response::<serde_json::Value>(&call(&target, request).await?);
        }
        Action::PlaceDefault { hotel_id } => {
            let request = Request::post(&routes::default_order_place(&hotel_id), String::new())
                .with_header(ROLE_HEADER, &role);
            print_response::<Order>(&call(&target, request).await?);
        }
    }

    Ok(())
}
