use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::value::deserialize_opt_id;

/// Stock of one product at one store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StockLevel {
    #[serde(default, alias = "store_id", deserialize_with = "deserialize_opt_id")]
    pub store: Option<String>,
    #[serde(default, alias = "product_id", deserialize_with = "deserialize_opt_id")]
    pub product: Option<String>,
    #[serde(default)]
    pub quantity_in_stock: i64,
}

/// Body of the payment call: the provider's payment method plus the amount
/// to charge, in cents.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: String,
    pub payment_method_id: String,
    pub amount: i64,
    pub currency: String,
}

/// What the backend reports after charging.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub status: String,
    #[serde(default)]
    pub payment_intent: Option<Value>,
    #[serde(default)]
    pub payment: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl PaymentOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

/// Changes to the signed-in customer. Only the fields that are set are sent.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserUpdate>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl CustomerUpdate {
    pub fn new(email: Option<String>, username: Option<String>, password: Option<String>) -> Self {
        let user = (username.is_some() || password.is_some())
            .then_some(UserUpdate { username, password });
        Self { email, user }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.user.is_none()
    }
}

/// Convert a decimal amount as the backend writes it (`"19.90"` or `19.9`)
/// to cents.
pub fn amount_in_cents(amount: &Value) -> Option<i64> {
    let units = match amount {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some((units * 100.0).round() as i64)
}
