//! Data access for the checkout pipeline.
//!
//! Repositories are stateless. Every method takes the connection it runs on,
//! either the pool or a transaction opened by the calling service, so a
//! multi-step operation composes several repositories inside one unit of work.

pub mod basket;
pub mod checkout;
pub mod inventory;
pub mod order;
pub mod payment;

pub use basket::BasketRepository;
pub use checkout::CheckoutRepository;
pub use inventory::InventoryLedger;
pub use order::{NewOrder, OrderRepository};
pub use payment::PaymentRepository;
