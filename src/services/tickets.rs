//! Ticket artifacts: the scannable QR code and the printable PDF ticket.

use printpdf::{BuiltinFont, Mm, PdfDocument};
use qrcode::render::svg;
use qrcode::QrCode;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

const QR_DIR: &str = "uploads/qr_codes";

/// Everything the ticket and QR payload need, resolved from the booking's
/// showtime/movie/room relations by the caller.
#[derive(Debug, Clone)]
pub struct TicketContext {
    pub booking_reference: Uuid,
    pub customer_name:     String,
    pub movie_title:       String,
    pub show_date:         String,
    pub show_time:         String,
    pub cinema_name:       String,
    pub room_name:         String,
    pub seats:             Vec<String>,
    pub total_amount:      String,
    pub payment_reference: String,
}

/// The text payload embedded in the scannable code.
pub fn qr_payload(ctx: &TicketContext) -> String {
    format!(
        "Booking Reference: {}\n\
         Customer: {}\n\
         Movie: {}\n\
         Showtime: {} {}\n\
         Cinema: {}\n\
         Room: {}\n\
         Seats: {}\n\
         Payment Reference: {}",
        ctx.booking_reference,
        ctx.customer_name,
        ctx.movie_title,
        ctx.show_date,
        ctx.show_time,
        ctx.cinema_name,
        ctx.room_name,
        ctx.seats.join(", "),
        ctx.payment_reference,
    )
}

/// Render the QR code as SVG and store it under `uploads/qr_codes/`.
/// Returns the stored path, relative to the upload root served by the app.
pub async fn generate_qr_code(ctx: &TicketContext) -> AppResult<String> {
    let code = QrCode::new(qr_payload(ctx).as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("QR encoding failed: {e}")))?;

    let image = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    let file_name = format!("qr_{}.svg", ctx.booking_reference);
    let path = format!("{QR_DIR}/{file_name}");

    tokio::fs::create_dir_all(QR_DIR)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Cannot create QR directory: {e}")))?;
    tokio::fs::write(&path, image)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Cannot write QR file: {e}")))?;

    Ok(path)
}

/// Render the PDF ticket for a paid booking.
pub fn render_ticket_pdf(ctx: &TicketContext) -> AppResult<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Ticket {}", ctx.booking_reference),
        Mm(210.0),
        Mm(297.0),
        "Ticket",
    );

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF font error: {e}")))?;

    let layer = doc.get_page(page).get_layer(layer);

    layer.use_text("CineBook — Movie Ticket", 20.0, Mm(20.0), Mm(270.0), &bold);
    layer.use_text(ctx.movie_title.as_str(), 16.0, Mm(20.0), Mm(256.0), &bold);

    let lines = [
        format!("Booking reference: {}", ctx.booking_reference),
        format!("Customer: {}", ctx.customer_name),
        format!("Cinema: {}", ctx.cinema_name),
        format!("Room: {}", ctx.room_name),
        format!("Date: {}  Time: {}", ctx.show_date, ctx.show_time),
        format!("Seats: {}", ctx.seats.join(", ")),
        format!("Total: {}", ctx.total_amount),
        format!("Payment reference: {}", ctx.payment_reference),
    ];

    let mut y = 240.0;
    for line in &lines {
        layer.use_text(line.as_str(), 12.0, Mm(20.0), Mm(y), &regular);
        y -= 8.0;
    }

    layer.use_text(
        "Present this ticket and its QR code at the entrance.",
        10.0,
        Mm(20.0),
        Mm(y - 6.0),
        &regular,
    );

    doc.save_to_bytes()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF rendering failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TicketContext {
        TicketContext {
            booking_reference: Uuid::new_v4(),
            customer_name:     "Ada Lovelace".into(),
            movie_title:       "The Heist".into(),
            show_date:         "2025-06-14".into(),
            show_time:         "19:30".into(),
            cinema_name:       "Downtown".into(),
            room_name:         "Room 1".into(),
            seats:             vec!["A1".into(), "A2".into()],
            total_amount:      "300.00".into(),
            payment_reference: "MOCK_ABCDEF0123456789".into(),
        }
    }

    #[test]
    fn qr_payload_embeds_booking_fields() {
        let ctx = context();
        let payload = qr_payload(&ctx);

        assert!(payload.contains(&ctx.booking_reference.to_string()));
        assert!(payload.contains("Ada Lovelace"));
        assert!(payload.contains("The Heist"));
        assert!(payload.contains("Seats: A1, A2"));
        assert!(payload.contains("MOCK_ABCDEF0123456789"));
    }

    #[test]
    fn ticket_pdf_renders() {
        let bytes = render_ticket_pdf(&context()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
