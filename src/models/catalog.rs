use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::value::{deserialize_id, deserialize_opt_id, value_to_string};

/// A product listed in the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    #[serde(alias = "id", deserialize_with = "deserialize_id")]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub quantity_in_stock: Option<i64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Lifecycle of an order, from cart to pickup.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Ready,
    Fulfilled,
    #[serde(other)]
    Unknown,
}

/// One line of an order.
///
/// The backend sends `product` either as a bare id or as the nested product
/// record; both end up as `product` (the id) plus the name and unit price
/// when present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawOrderItem")]
pub struct OrderItem {
    pub id: Option<String>,
    pub product: String,
    pub product_name: Option<String>,
    pub price: Option<Value>,
    pub quantity: i64,
}

#[derive(Deserialize)]
struct RawOrderItem {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    id: Option<String>,
    #[serde(alias = "product_id")]
    product: Value,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    quantity: i64,
}

impl TryFrom<RawOrderItem> for OrderItem {
    type Error = String;

    fn try_from(raw: RawOrderItem) -> Result<Self, Self::Error> {
        let (product, nested_name, nested_price) = match raw.product {
            Value::Object(mut fields) => {
                let id = fields
                    .remove("product_id")
                    .or_else(|| fields.remove("id"))
                    .filter(|id| !id.is_null())
                    .ok_or("order item product has no id")?;
                let name = fields
                    .remove("product_name")
                    .or_else(|| fields.remove("name"))
                    .and_then(|name| name.as_str().map(str::to_string));
                (value_to_string(id), name, fields.remove("price"))
            }
            Value::Null => return Err("order item has no product".to_string()),
            id => (value_to_string(id), None, None),
        };
        Ok(OrderItem {
            id: raw.id,
            product,
            product_name: raw.product_name.or(nested_name),
            price: raw.price.or(nested_price),
            quantity: raw.quantity,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Order {
    #[serde(alias = "id", deserialize_with = "deserialize_id")]
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: Option<Value>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Sign-up form payload.
#[derive(Serialize, Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// An order line asking for more units than the shop holds.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StockShortfall {
    pub product_id: String,
    pub requested: i64,
    pub available: i64,
}
