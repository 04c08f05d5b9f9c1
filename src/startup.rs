//! Application startup and command execution.
//!
//! Builds the token store, session coordinator and storefront from the
//! configuration, and runs one client command against them.

use std::sync::Arc;

use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use crate::config::ConfigV1;
use crate::models::{CustomerUpdate, NewAccount};
use crate::session::error::Result;
use crate::session::SessionCoordinator;
use crate::state::AppState;
use crate::store::create_store;
use crate::storefront::Storefront;

/// Client commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the JSON schema of the configuration file.
    Schema,
    /// Sign in and keep the session for later commands.
    Login { username: String, password: String },
    /// Sign out and forget the stored tokens.
    Logout,
    /// Show whether a session is active, and its role.
    Status,
    /// Create a customer account.
    Register {
        username: String,
        email: String,
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// List the catalog.
    Products,
    /// Show one product.
    Product { product_id: String },
    /// Show the stock of a product at the configured store.
    Stock { product_id: String },
    /// Show the signed-in customer's record.
    Profile,
    /// Change the signed-in customer's email, username or password.
    UpdateProfile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// List the signed-in customer's orders.
    Orders,
    /// Show one order.
    Order { order_id: String },
    /// Show the cart (pending order), opening one if needed.
    Cart,
    /// Put a product in the cart.
    AddItem { product_id: String, quantity: i64 },
    /// Change the quantity of a cart line.
    SetQuantity { item_id: String, quantity: i64 },
    /// Take a line out of the cart.
    RemoveItem { item_id: String },
    /// Check the cart against current stock before paying.
    CheckoutCheck,
    /// Pay the cart with a payment method id from the payment provider.
    /// Nothing is charged while any line is short of stock.
    Pay { payment_method_id: String },
    /// Move an order to another status (staff only).
    SetStatus { order_id: String, status: String },
}

/// Sets up the token store, session coordinator and storefront.
///
/// # Errors
///
/// Returns an error if the configured token store cannot be opened.
pub fn build_state(config: Arc<ConfigV1>) -> std::result::Result<AppState, String> {
    let store = create_store(&config.store)?;
    let session = Arc::new(SessionCoordinator::new(&config.api, store));
    let storefront = Storefront::new(session.clone(), config.storefront.clone());

    info!(base_url = config.api.base_url.as_str(), "Storefront client ready");

    Ok(AppState {
        config,
        session,
        storefront,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Runs one command and returns its JSON result.
pub async fn run(state: &AppState, command: Command) -> Result<Value> {
    let storefront = &state.storefront;
    match command {
        Command::Schema => {
            let schema = crate::config::config_schema().unwrap_or_default();
            Ok(serde_json::from_str(&schema).unwrap_or(Value::Null))
        }
        Command::Login { username, password } => {
            let claims = state.session.authenticate(&username, &password).await?;
            Ok(json!({
                "authenticated": true,
                "role": claims.role(),
                "expires_at": claims.exp,
            }))
        }
        Command::Logout => {
            state.session.deauthenticate();
            Ok(to_json(&state.session.current_session()))
        }
        Command::Status => Ok(to_json(&state.session.current_session())),
        Command::Register {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            storefront
                .register(&NewAccount {
                    username,
                    email,
                    password,
                    first_name,
                    last_name,
                })
                .await
        }
        Command::Products => Ok(to_json(&storefront.list_products().await?)),
        Command::Product { product_id } => Ok(to_json(&storefront.get_product(&product_id).await?)),
        Command::Stock { product_id } => Ok(to_json(&storefront.stock_level(&product_id).await?)),
        Command::Profile => Ok(to_json(&storefront.customer_profile().await?)),
        Command::UpdateProfile {
            email,
            username,
            password,
        } => {
            let update = CustomerUpdate::new(email, username, password);
            match storefront.update_customer(&update).await? {
                Some(customer) => Ok(customer),
                None => Ok(json!({ "updated": false })),
            }
        }
        Command::Orders => Ok(to_json(&storefront.list_orders().await?)),
        Command::Order { order_id } => Ok(to_json(&storefront.get_order(&order_id).await?)),
        Command::Cart => Ok(to_json(&storefront.pending_order().await?)),
        Command::AddItem {
            product_id,
            quantity,
        } => {
            let cart = storefront.pending_order().await?;
            storefront
                .add_item(&cart.order_id, &product_id, quantity)
                .await
        }
        Command::SetQuantity { item_id, quantity } => {
            let cart = storefront.pending_order().await?;
            storefront
                .update_item_quantity(&cart.order_id, &item_id, quantity)
                .await
        }
        Command::RemoveItem { item_id } => {
            let cart = storefront.pending_order().await?;
            storefront.remove_item(&cart.order_id, &item_id).await?;
            Ok(to_json(&storefront.get_order(&cart.order_id).await?))
        }
        Command::Pay { payment_method_id } => {
            let cart = storefront.pending_order().await?;
            let detail = storefront.get_order(&cart.order_id).await?;
            let shortfalls = storefront.stock_shortfalls(&detail).await?;
            if !shortfalls.is_empty() {
                return Ok(json!({
                    "order_id": detail.order_id,
                    "paid": false,
                    "shortfalls": shortfalls,
                }));
            }
            let outcome = storefront
                .process_payment(&detail, &payment_method_id)
                .await?;
            Ok(json!({
                "order_id": detail.order_id,
                "paid": outcome.succeeded(),
                "payment": outcome,
            }))
        }
        Command::CheckoutCheck => {
            let cart = storefront.pending_order().await?;
            let detail = storefront.get_order(&cart.order_id).await?;
            let shortfalls = storefront.stock_shortfalls(&detail).await?;
            Ok(json!({
                "order_id": detail.order_id,
                "ready_to_pay": shortfalls.is_empty() && !detail.items.is_empty(),
                "shortfalls": shortfalls,
                "total_amount": detail.total_amount,
            }))
        }
        Command::SetStatus { order_id, status } => Ok(to_json(
            &storefront.update_order_status(&order_id, &status).await?,
        )),
    }
}
