//! Persistent records of the checkout pipeline.
pub mod basket_item;
pub mod checkout_item;
pub mod checkout_session;
pub mod customer_order;
pub mod online_transaction;
pub mod order_item;
pub mod order_simulation;
pub mod payment;
pub mod payment_card;
pub mod product;

// Re-export entities
pub use basket_item::{Entity as BasketItem, Model as BasketItemModel};
pub use checkout_item::{Entity as CheckoutItem, Model as CheckoutItemModel};
pub use checkout_session::{Entity as CheckoutSession, Model as CheckoutSessionModel};
pub use customer_order::{Entity as CustomerOrder, Model as CustomerOrderModel, OrderStatus};
pub use online_transaction::{Entity as OnlineTransaction, Model as OnlineTransactionModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_simulation::{Entity as OrderSimulation, Model as OrderSimulationModel};
pub use payment::{Entity as Payment, Model as PaymentModel, PaymentMethod, PaymentStatus};
pub use payment_card::{CardDetails, CardSummary, Entity as PaymentCard, Model as PaymentCardModel};
pub use product::{Entity as Product, Model as ProductModel};
