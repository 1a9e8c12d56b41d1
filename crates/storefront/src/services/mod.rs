//! Domain services: cart resolution and mutation, the checkout pipeline,
//! code generation, and transactional email.

pub mod cart;
pub mod checkout;
pub mod codes;
pub mod email;

pub use cart::{CartError, CartService};
pub use checkout::{
    CheckoutDraft, CheckoutError, CheckoutService, ConfirmOutcome, PaymentSetup,
};
pub use email::Mailer;
