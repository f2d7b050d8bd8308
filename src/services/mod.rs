pub mod catalog;
pub mod checkout;
pub mod order_pricing;
pub mod orders;
pub mod payment_processing;
pub mod payments;
pub mod pricing;
