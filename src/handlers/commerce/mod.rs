/// Commerce API handlers module
pub mod basket;
pub mod checkout;
pub mod orders;
pub mod payments;

// Re-export route builders
pub use basket::basket_routes;
pub use checkout::checkout_routes;
pub use orders::orders_routes;
pub use payments::payments_routes;
