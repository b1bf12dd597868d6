//! Response shapes that add computed fields to stored records.

use serde::Serialize;

use libreria_core::cart::{CartSummary, PricedLine};
use libreria_core::pricing::PriceSnapshot;
use libreria_core::{Cart, CartLine, Offer, Order, OrderLine, Product, User};
use libreria_db::OrderWithLines;

/// A cart or order line with its savings figures.
#[derive(Debug, Serialize)]
pub struct LineView<L: Serialize> {
    #[serde(flatten)]
    pub line: L,
    pub savings_cents: i64,
    pub subtotal_without_offer_cents: i64,
    pub has_offer: bool,
}

impl<L: PricedLine + Serialize> From<L> for LineView<L> {
    fn from(line: L) -> Self {
        LineView {
            savings_cents: line.savings().cents(),
            subtotal_without_offer_cents: line.subtotal_without_offer().cents(),
            has_offer: line.has_offer(),
            line,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub lines: Vec<LineView<CartLine>>,
    pub summary: CartSummary,
}

impl CartView {
    pub fn new(cart: Cart, lines: Vec<CartLine>, summary: CartSummary) -> Self {
        CartView {
            cart,
            lines: lines.into_iter().map(LineView::from).collect(),
            summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub subtotal_cents: i64,
    pub lines: Vec<LineView<OrderLine>>,
}

impl From<OrderWithLines> for OrderView {
    fn from(value: OrderWithLines) -> Self {
        OrderView {
            subtotal_cents: value.subtotal().cents(),
            order: value.order,
            lines: value.lines.into_iter().map(LineView::from).collect(),
        }
    }
}

/// A product with the price a customer would pay right now.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub current_price_cents: i64,
    pub offer_discount_cents: i64,
    pub offer_name: Option<String>,
    pub has_offer: bool,
}

impl ProductView {
    pub fn new(product: Product, price: PriceSnapshot) -> Self {
        ProductView {
            current_price_cents: price.unit_price.cents(),
            offer_discount_cents: price.discount.cents(),
            has_offer: price.has_offer(),
            offer_name: price.offer_name,
            product,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: Offer,
    pub in_effect: bool,
    pub product_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub role: Option<String>,
}
