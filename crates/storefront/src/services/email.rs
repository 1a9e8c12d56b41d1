//! Order confirmation email via SMTP.
//!
//! Delivery is fire-and-forget: checkout spawns the send and a failure is
//! logged, never surfaced to the buyer or the transaction.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::models::Order;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// SMTP-backed sender for transactional mail.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    /// Spawn a best-effort confirmation send for a freshly placed order.
    pub fn spawn_order_confirmation(self: &std::sync::Arc<Self>, order: &Order) {
        let mailer = std::sync::Arc::clone(self);
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_order_confirmation(&order).await {
                tracing::warn!(
                    tracking_code = %order.tracking_code,
                    error = %e,
                    "order confirmation email failed"
                );
            }
        });
    }

    /// Send the order confirmation email.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_order_confirmation(&self, order: &Order) -> Result<(), EmailError> {
        let subject = format!("Your PetFun order {}", order.tracking_code);
        let body = format!(
            "Hi {},\n\n\
             Thanks for your order! We have received it and will start \
             preparing it shortly.\n\n\
             Tracking code: {}\n\
             Total: {} EUR\n\n\
             You can follow your order with the tracking code above.\n\n\
             PetFun",
            order.shipping.name, order.tracking_code, order.total
        );

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(order
                .contact_email
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(order.contact_email.to_string()))?)
            .subject(&subject)
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(body),
            )?;

        self.transport.send(message).await?;

        tracing::info!(tracking_code = %order.tracking_code, "order confirmation email sent");
        Ok(())
    }
}
