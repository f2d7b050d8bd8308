pub mod order;
pub mod order_item;
pub mod product;
pub mod tariff_rule;

pub use order::{
    Entity as Order, OrderState, PaymentMethod,
};
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use tariff_rule::{CustomerGroup, Entity as TariffRule};
