pub mod catalog;
pub mod checkout;
pub mod claims;
pub mod credentials;

pub use catalog::{NewAccount, Order, OrderItem, OrderStatus, Product, StockShortfall};
pub use checkout::{amount_in_cents, CustomerUpdate, PaymentOutcome, PaymentRequest, StockLevel, UserUpdate};
pub use claims::{decode_claims, Claims, Role, SessionStatus};
pub use credentials::CredentialPair;
