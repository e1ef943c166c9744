/// Commerce services: basket, checkout, payments and order settlement
pub mod basket_service;
pub mod checkout_service;
pub mod delivery_simulator;
pub mod order_service;
pub mod payment_service;

// Re-export services for convenience
pub use basket_service::{BasketService, BasketView, QuantityAdjustment, QuantityCorrection};
pub use checkout_service::{CheckoutService, CheckoutView};
pub use delivery_simulator::{
    DeliveryRng, DeliverySimulator, DeliveryWindow, SeededDeliveryRng,
};
pub use order_service::{OrderDetails, OrderService};
pub use payment_service::{DigitalPaymentReceipt, PaymentSelection, PaymentService};
