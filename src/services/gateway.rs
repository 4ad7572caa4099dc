//! Payment gateway integration.
//!
//! Covers the two touchpoints with the external gateway: creating an invoice
//! for a pending booking, and authenticating the webhook callbacks it sends
//! back. Webhook payloads are signed with HMAC-SHA256 over the raw body,
//! hex encoded in the `x-callback-signature` header.

use chrono::{NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const EXTERNAL_ID_PREFIX: &str = "booking_";

/// Map a gateway `external_id` back to the local booking reference.
pub fn booking_reference_from_external_id(external_id: &str) -> Option<&str> {
    external_id.strip_prefix(EXTERNAL_ID_PREFIX)
}

pub fn external_id_for(booking_reference: &Uuid) -> String {
    format!("{EXTERNAL_ID_PREFIX}{booking_reference}")
}

/// Verify an HMAC-SHA256 hex signature over the raw webhook body.
///
/// `Mac::verify_slice` compares in constant time. An unconfigured secret or
/// a missing/malformed signature always fails.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&sig_bytes).is_ok()
}

// ── Webhook payload ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub external_id: String,
    pub status:      String,
    /// The gateway's own payment id for this transaction.
    pub id:          Option<String>,
}

// ── Invoice creation ──────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InvoiceCustomer {
    given_names:   String,
    email:         String,
    mobile_number: String,
}

#[derive(Debug, Serialize)]
struct InvoiceRequest {
    external_id:          String,
    amount:               f64,
    description:          String,
    invoice_duration:     i64,
    customer:             InvoiceCustomer,
    success_redirect_url: String,
    failure_redirect_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Invoice {
    pub id:          String,
    pub invoice_url: String,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

pub struct InvoiceParams<'a> {
    pub booking_reference: &'a Uuid,
    pub amount:            Decimal,
    pub movie_title:       &'a str,
    pub customer_name:     &'a str,
    pub customer_email:    &'a str,
    pub customer_phone:    Option<&'a str>,
    pub expires_at:        Option<NaiveDateTime>,
}

/// Create a gateway invoice for a pending booking.
///
/// The invoice duration matches the booking hold so the gateway-side expiry
/// and the reaper agree on when the booking dies.
pub async fn create_invoice(config: &Config, params: InvoiceParams<'_>) -> AppResult<Invoice> {
    if config.payment_api_key.is_empty() {
        return Err(AppError::BadRequest(
            "Payment gateway is not configured".into(),
        ));
    }

    let invoice_duration = params
        .expires_at
        .map(|t| (t - Utc::now().naive_utc()).num_seconds().max(60))
        .unwrap_or(config.booking_hold_minutes * 60);

    let body = InvoiceRequest {
        external_id: external_id_for(params.booking_reference),
        amount: params.amount.to_f64().unwrap_or_default(),
        description: format!("Movie tickets for {}", params.movie_title),
        invoice_duration,
        customer: InvoiceCustomer {
            given_names: params.customer_name.to_owned(),
            email: params.customer_email.to_owned(),
            mobile_number: params.customer_phone.unwrap_or_default().to_owned(),
        },
        success_redirect_url: format!("{}/booking-success", config.frontend_url),
        failure_redirect_url: format!("{}/booking-failed", config.frontend_url),
    };

    let url = format!("{}/v2/invoices", config.payment_api_base);
    let response = reqwest::Client::new()
        .post(&url)
        .basic_auth(&config.payment_api_key, Some(""))
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invoice request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AppError::Internal(anyhow::anyhow!(
            "Invoice creation rejected ({status}): {text}"
        )));
    }

    response
        .json::<Invoice>()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid invoice response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"external_id":"booking_abc","status":"PAID"}"#;
        let sig = sign("shared-secret", payload);
        assert!(verify_signature("shared-secret", payload, &sig));
    }

    #[test]
    fn rejects_wrong_secret_and_tampered_payload() {
        let payload = br#"{"status":"PAID"}"#;
        let sig = sign("shared-secret", payload);

        assert!(!verify_signature("other-secret", payload, &sig));
        assert!(!verify_signature("shared-secret", br#"{"status":"EXPIRED"}"#, &sig));
    }

    #[test]
    fn rejects_missing_or_malformed_signature() {
        let payload = b"{}";
        assert!(!verify_signature("shared-secret", payload, ""));
        assert!(!verify_signature("shared-secret", payload, "not-hex!"));
        assert!(!verify_signature("", payload, &sign("x", payload)));
    }

    #[test]
    fn external_id_round_trip() {
        let reference = Uuid::new_v4();
        let external = external_id_for(&reference);
        assert_eq!(
            booking_reference_from_external_id(&external),
            Some(reference.to_string().as_str())
        );
        assert_eq!(booking_reference_from_external_id("invoice_123"), None);
    }
}
