use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::StorefrontConfig;
use crate::models::{
    amount_in_cents, CustomerUpdate, NewAccount, Order, PaymentOutcome, PaymentRequest, Product,
    StockLevel, StockShortfall,
};
use crate::utils::value::value_to_string;
use crate::session::error::{Result, SessionError};
use crate::session::{RequestEnvelope, SessionCoordinator};

/// Catalog, customer and order operations of the shop.
///
/// Business failures (validation, stock, payment) come back untouched as
/// `SessionError::RequestFailed`.
#[derive(Clone)]
pub struct Storefront {
    session: Arc<SessionCoordinator>,
    config: StorefrontConfig,
}

#[derive(Serialize)]
struct NewOrder<'a> {
    customer_id: &'a str,
    store_id: &'a str,
    items: Vec<Value>,
}

#[derive(Serialize)]
struct NewOrderItem<'a> {
    order_id: &'a str,
    product_id: &'a str,
    quantity: i64,
}

/// Join a collection path and a resource id: `/api/orders/` + `12` -> `/api/orders/12/`.
fn member_path(collection: &str, id: &str) -> String {
    format!("{}/{}/", collection.trim_end_matches('/'), id)
}

/// The id of a customer record, whichever key the backend used.
fn customer_id_of(customer: &Value) -> Result<String> {
    customer
        .get("customer_id")
        .or_else(|| customer.get("id"))
        .cloned()
        .map(value_to_string)
        .ok_or_else(|| SessionError::MalformedResponse("customer record has no id".to_string()))
}

impl Storefront {
    pub fn new(session: Arc<SessionCoordinator>, config: StorefrontConfig) -> Self {
        Self { session, config }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, target: String) -> Result<T> {
        self.session
            .dispatch(RequestEnvelope::get(target))
            .await?
            .json()
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.get_json(self.config.products_path.clone()).await
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Product> {
        self.get_json(member_path(&self.config.products_path, product_id))
            .await
    }

    /// Create a customer account. Works without being signed in.
    pub async fn register(&self, account: &NewAccount) -> Result<Value> {
        let envelope = RequestEnvelope::post(self.config.register_path.clone()).json(account)?;
        let response = self.session.dispatch(envelope).await?;
        info!(username = account.username.as_str(), "Account created");
        response.json()
    }

    /// The customer record of the signed-in user. The backend answers with a
    /// list scoped to the caller; the first entry is theirs.
    pub async fn customer_profile(&self) -> Result<Option<Value>> {
        let customers: Vec<Value> = self.get_json(self.config.customers_path.clone()).await?;
        Ok(customers.into_iter().next())
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.get_json(self.config.orders_path.clone()).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.get_json(member_path(&self.config.orders_path, order_id))
            .await
    }

    /// Open an empty order for `customer_id` at the configured store.
    pub async fn create_order(&self, customer_id: &str) -> Result<Order> {
        let envelope = RequestEnvelope::post(self.config.orders_path.clone()).json(&NewOrder {
            customer_id,
            store_id: &self.config.store_id,
            items: Vec::new(),
        })?;
        let order: Order = self.session.dispatch(envelope).await?.json()?;
        info!(
            order_id = order.order_id.as_str(),
            customer_id, "Order created"
        );
        Ok(order)
    }

    pub async fn add_item(&self, order_id: &str, product_id: &str, quantity: i64) -> Result<Value> {
        let target = format!("{}items/", member_path(&self.config.orders_path, order_id));
        let envelope = RequestEnvelope::post(target).json(&NewOrderItem {
            order_id,
            product_id,
            quantity,
        })?;
        self.session.dispatch(envelope).await?.json()
    }

    /// The cart: the customer's pending order, opened on demand.
    pub async fn pending_order(&self) -> Result<Order> {
        if let Some(order) = self.find_pending().await? {
            return Ok(order);
        }

        debug!("No pending order, opening one");
        let customer_id = self.own_customer_id().await?;
        self.create_order(&customer_id).await?;

        self.find_pending().await?.ok_or_else(|| {
            SessionError::MalformedResponse("created order is not listed as pending".to_string())
        })
    }

    async fn own_customer_id(&self) -> Result<String> {
        let customer = self.customer_profile().await?.ok_or_else(|| {
            SessionError::MalformedResponse("no customer record for this account".to_string())
        })?;
        customer_id_of(&customer)
    }

    /// Send the changed profile fields. Returns `None` when there was
    /// nothing to change and no call was made.
    pub async fn update_customer(&self, update: &CustomerUpdate) -> Result<Option<Value>> {
        if update.is_empty() {
            debug!("Profile update has no changes, skipping");
            return Ok(None);
        }
        let customer_id = self.own_customer_id().await?;
        let envelope = RequestEnvelope::patch(member_path(&self.config.customers_path, &customer_id))
            .json(update)?;
        let updated = self.session.dispatch(envelope).await?.json()?;
        info!(customer_id = customer_id.as_str(), "Customer updated");
        Ok(Some(updated))
    }

    async fn find_pending(&self) -> Result<Option<Order>> {
        Ok(self
            .list_orders()
            .await?
            .into_iter()
            .find(|order| order.is_pending()))
    }

    fn item_path(&self, order_id: &str, item_id: &str) -> String {
        let items = format!("{}items/", member_path(&self.config.orders_path, order_id));
        member_path(&items, item_id)
    }

    pub async fn update_item_quantity(
        &self,
        order_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> Result<Value> {
        let envelope = RequestEnvelope::patch(self.item_path(order_id, item_id))
            .json(&json!({ "quantity": quantity }))?;
        self.session.dispatch(envelope).await?.json()
    }

    pub async fn remove_item(&self, order_id: &str, item_id: &str) -> Result<()> {
        self.session
            .dispatch(RequestEnvelope::delete(self.item_path(order_id, item_id)))
            .await?;
        info!(order_id, item_id, "Item removed from order");
        Ok(())
    }

    /// Stock of `product_id` at the configured store. The backend answers
    /// with either the record or a filtered list; no record means no stock.
    pub async fn stock_level(&self, product_id: &str) -> Result<Option<StockLevel>> {
        let envelope = RequestEnvelope::get(self.config.stocks_path.clone())
            .query("store", self.config.store_id.as_str())
            .query("product", product_id);
        let body: Value = self.session.dispatch(envelope).await?.json()?;
        let record = match body {
            Value::Array(records) => records.into_iter().next(),
            Value::Null => None,
            record => Some(record),
        };
        record
            .map(|record| {
                serde_json::from_value(record).map_err(|e| {
                    SessionError::MalformedResponse(format!("unexpected stock record: {}", e))
                })
            })
            .transpose()
    }

    /// Items of `order` that ask for more units than the store holds.
    pub async fn stock_shortfalls(&self, order: &Order) -> Result<Vec<StockShortfall>> {
        let mut shortfalls = Vec::new();
        for item in &order.items {
            let available = self
                .stock_level(&item.product)
                .await?
                .map_or(0, |level| level.quantity_in_stock);
            if available < item.quantity {
                shortfalls.push(StockShortfall {
                    product_id: item.product.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }
        Ok(shortfalls)
    }

    /// Charge `order` with a payment method obtained from the payment
    /// provider. A declined payment is an `Ok` outcome whose status is not
    /// `success`.
    pub async fn process_payment(
        &self,
        order: &Order,
        payment_method_id: &str,
    ) -> Result<PaymentOutcome> {
        let amount = order
            .total_amount
            .as_ref()
            .and_then(amount_in_cents)
            .ok_or_else(|| {
                SessionError::MalformedResponse(format!(
                    "order {} has no usable total amount",
                    order.order_id
                ))
            })?;
        let envelope = RequestEnvelope::post(self.config.payments_path.clone()).json(&PaymentRequest {
            order_id: order.order_id.clone(),
            payment_method_id: payment_method_id.to_string(),
            amount,
            currency: self.config.currency.clone(),
        })?;
        let outcome: PaymentOutcome = self.session.dispatch(envelope).await?.json()?;
        if outcome.succeeded() {
            info!(
                event_name = "storefront.payment.succeeded",
                event_domain = "storefront",
                order_id = order.order_id.as_str(),
                amount,
                "Payment processed"
            );
        } else {
            warn!(
                event_name = "storefront.payment.declined",
                event_domain = "storefront",
                order_id = order.order_id.as_str(),
                status = outcome.status.as_str(),
                "Payment not accepted"
            );
        }
        Ok(outcome)
    }

    /// Move an order to a new status (shop staff only).
    pub async fn update_order_status(&self, order_id: &str, status: &str) -> Result<Order> {
        let envelope = RequestEnvelope::patch(member_path(&self.config.orders_path, order_id))
            .json(&json!({ "status": status }))?;
        self.session.dispatch(envelope).await?.json()
    }
}
