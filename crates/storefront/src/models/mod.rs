//! Domain models for the storefront.
//!
//! Derived fields (product availability, line subtotals, the denormalized
//! product name on order lines) are computed in constructors and accessors,
//! never stored independently of their inputs.

pub mod cart;
pub mod checkout;
pub mod order;
pub mod product;
pub mod session;

pub use cart::{Cart, CartLine, CartLineView, CartView};
pub use checkout::{CheckoutState, ShippingAddress};
pub use order::{NewOrder, NewOrderLine, Order, OrderLine, OrderSummary};
pub use product::{NewProduct, Product};
pub use session::{Principal, session_keys};
