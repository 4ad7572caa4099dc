//! Booking confirmation email.
//!
//! If SMTP is not configured (empty `smtp_host`), the confirmation is logged
//! to stdout instead — useful during development without a mail server.

use lettre::{
    message::{header::ContentType, Attachment, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::services::tickets::TicketContext;

/// Send the booking confirmation with the PDF ticket attached.
///
/// Failures here must never affect the payment state; callers log the error
/// and move on.
pub async fn send_booking_confirmation(
    config: &Config,
    to: &str,
    ctx: &TicketContext,
    pdf_ticket: Vec<u8>,
) -> AppResult<()> {
    let subject = format!("Booking Confirmation - {}", ctx.booking_reference);

    if config.smtp_host.is_empty() {
        tracing::warn!(
            to,
            booking_reference = %ctx.booking_reference,
            "SMTP not configured — booking confirmation logged instead of sent"
        );
        return Ok(());
    }

    let body = format!(
        "Hi {},\n\nYour booking is confirmed!\n\n\
         Movie: {}\nCinema: {} — {}\nDate: {} at {}\nSeats: {}\nTotal: {}\n\n\
         Your ticket is attached as a PDF. Present it (or its QR code) at the entrance.\n\n\
         Booking reference: {}\nPayment reference: {}\n\nEnjoy the show!\nCineBook",
        ctx.customer_name,
        ctx.movie_title,
        ctx.cinema_name,
        ctx.room_name,
        ctx.show_date,
        ctx.show_time,
        ctx.seats.join(", "),
        ctx.total_amount,
        ctx.booking_reference,
        ctx.payment_reference,
    );

    let pdf_type = ContentType::parse("application/pdf")
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid attachment type: {e}")))?;
    let attachment = Attachment::new(format!("ticket_{}.pdf", ctx.booking_reference))
        .body(pdf_ticket, pdf_type);

    let email = Message::builder()
        .from(
            config.smtp_from.parse()
                .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid SMTP_FROM address")))?,
        )
        .to(to.parse().map_err(|_| AppError::BadRequest("Invalid email address".into()))?)
        .subject(subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body))
                .singlepart(attachment),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build email: {e}")))?;

    let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    transport
        .send(email)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to send email: {e}")))?;

    Ok(())
}
