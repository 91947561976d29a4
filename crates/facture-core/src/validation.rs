//! # Validation Module
//!
//! Input validation for Facture. Every rule here runs before the ledger is
//! touched, so a rejected request never leaves a partial write behind.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI / API boundary                                           │
//! │  ├── Type validation (clap / serde parsing)                            │
//! │  └── Enum codes (FN, BIF, DMC, ...)                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Business rules (quantity ≥ 1, price ≥ 0, number shape)           │
//! │  └── ValidationError with the offending field                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK / NOT NULL constraints                                      │
//! │  ├── UNIQUE (email, tax id, invoice number, registration per invoice) │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewClient, NewInvoice, NewInvoiceItem};
use crate::{MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an item description.
///
/// ## Rules
/// - Must not be empty
/// - At most 255 characters
pub fn validate_description(description: &str) -> ValidationResult<()> {
    required("description", description, 255)
}

/// Validates an email address (shape only, no DNS).
///
/// ```rust
/// use facture_core::validation::validate_email;
///
/// assert!(validate_email("billing@example.bi").is_ok());
/// assert!(validate_email("billing@").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    required("email", email, 255)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "expected name@domain".to_string(),
    };

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.contains(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(())
}

/// Validates an invoice number and returns its sequence part.
///
/// ## Rules
/// - Shape `<sequence>/<year>`, e.g. `00042/2024`
/// - Sequence: 1 to 5 digits (the authority pads it to 5)
/// - Year: 4 digits
///
/// ```rust
/// use facture_core::validation::validate_invoice_number;
///
/// assert_eq!(validate_invoice_number("00042/2024").unwrap(), "00042");
/// assert!(validate_invoice_number("INV-42").is_err());
/// ```
pub fn validate_invoice_number(number: &str) -> ValidationResult<&str> {
    required("invoice_number", number, 50)?;

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "invoice_number".to_string(),
        reason: reason.to_string(),
    };

    let (sequence, year) = number
        .trim()
        .split_once('/')
        .ok_or_else(|| invalid("expected <sequence>/<year>"))?;

    if sequence.is_empty() || sequence.len() > 5 || !sequence.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("sequence must be 1 to 5 digits"));
    }
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("year must be 4 digits"));
    }

    Ok(sequence)
}

/// Validates a free-text cancellation reason (`cn_motif`).
pub fn validate_cancel_reason(reason: &str) -> ValidationResult<()> {
    required("reason", reason, 500)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an item quantity.
///
/// ## Rules
/// - Must be at least 1
/// - At most [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price: zero is allowed (free lines), negatives are not,
/// and nothing above [`MAX_UNIT_PRICE_CENTS`].
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        });
    }
    if price.cents() > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates every field of a new client.
pub fn validate_new_client(client: &NewClient) -> ValidationResult<()> {
    required("name", &client.name, 255)?;
    validate_email(&client.email)?;
    required("phone", &client.phone, 20)?;
    required("company", &client.company, 255)?;
    if let Some(tax_id) = &client.tax_id {
        required("tax_id", tax_id, 50)?;
    }
    Ok(())
}

/// Validates a new invoice header.
pub fn validate_new_invoice(invoice: &NewInvoice) -> ValidationResult<()> {
    validate_invoice_number(&invoice.invoice_number)?;
    if invoice.client_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "client_id".to_string(),
        });
    }
    Ok(())
}

/// Validates a new item: description non-empty, quantity ≥ 1, price ≥ 0.
pub fn validate_new_item(item: &NewInvoiceItem) -> ValidationResult<()> {
    validate_description(&item.description)?;
    validate_quantity(item.quantity)?;
    validate_unit_price(item.unit_price)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
