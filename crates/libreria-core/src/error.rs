//! # Error Types
//!
//! Domain-specific error types for libreria-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  libreria-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  libreria-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  HTTP errors (in apps/api)                                             │
//! │  └── ApiError         - Status code + JSON body                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. Every variant maps to a
/// 4xx response; none of them is retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough units in stock for the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Dune", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// 400: "Not enough stock for 'Dune'. Current stock: 3, requested: 5"
    /// ```
    #[error("Not enough stock for '{product}'. Current stock: {available}, requested: {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A cart with no active lines cannot become an order.
    #[error("Cannot create an order without products")]
    EmptyCart,

    /// The cart was already converted or deactivated.
    #[error("Cart {0} is not active")]
    InactiveCart(String),

    /// The product is not available for sale.
    #[error("Product '{0}' is not available")]
    ProductUnavailable(String),

    /// The caller lacks the permission or ownership required.
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Amount does not fit in the money type.
    #[error("{field} is too large")]
    TooLarge { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {}", allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., a category name that already exists).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Start of a range is not before its end.
    #[error("{start_field} must be before {end_field}")]
    InvalidRange {
        start_field: String,
        end_field: String,
    },

    /// Field may not be set in the current context.
    #[error("{field} is not allowed {reason}")]
    Forbidden { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
