//! # Validation Module
//!
//! Input validation for request payloads, run before any repository call.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP handler                                                  │
//! │  ├── Type validation (serde deserialization)                            │
//! │  └── THIS MODULE: field rules (names, quantities, prices, ratings)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository                                                    │
//! │  ├── Case-insensitive uniqueness                                        │
//! │  └── Stock checks                                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  ├── UNIQUE constraints                                                 │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of names (products, offers, catalog entries, roles).
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name and returns it trimmed.
///
/// ## Rules
/// - Not empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates an email address and returns it trimmed and lowercased.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (1..=999).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a product price (0..=99_999_999 cents).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::Negative {
            field: "stock".to_string(),
        });
    }
    Ok(())
}

/// Offer discounts are absolute amounts and must be positive.
pub fn validate_discount_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "discount".to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 1,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Order ratings run from 1 to 5.
pub fn validate_rating(rating: i64) -> ValidationResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ValidationError::OutOfRange {
            field: "rating".to_string(),
            min: 1,
            max: 5,
        });
    }
    Ok(())
}

// =============================================================================
// Offer Window
// =============================================================================

pub fn validate_offer_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> ValidationResult<()> {
    if starts_at >= ends_at {
        return Err(ValidationError::InvalidRange {
            start_field: "starts_at".to_string(),
            end_field: "ends_at".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Product Classification
// =============================================================================

/// Accessories are not books: they carry no genre, author or publisher.
///
/// ## Arguments
/// * `category_name` - Name of the product's category, if it has one
/// * `has_genre`, `has_author`, `has_publisher` - Whether each link is set
pub fn validate_product_links(
    category_name: Option<&str>,
    has_genre: bool,
    has_author: bool,
    has_publisher: bool,
) -> ValidationResult<()> {
    let is_accessory =
        category_name.is_some_and(|name| name.trim().eq_ignore_ascii_case(crate::ACCESSORIES_CATEGORY));

    if !is_accessory {
        return Ok(());
    }

    for (field, set) in [
        ("genre", has_genre),
        ("author", has_author),
        ("publisher", has_publisher),
    ] {
        if set {
            return Err(ValidationError::Forbidden {
                field: field.to_string(),
                reason: "for accessories".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
