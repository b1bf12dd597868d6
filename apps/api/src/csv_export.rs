//! CSV downloads for reports and the recommendation training set.
//!
//! Amounts are written as plain decimals ("525.00"), never as cents.

use axum::http::header::{
    ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_DISPOSITION, CONTENT_TYPE,
};
use axum::response::{IntoResponse, Response};
use csv::{QuoteStyle, Writer, WriterBuilder};

use libreria_core::reports::{DateRange, PurchaseCombination};
use libreria_core::Money;
use libreria_db::repository::report::{BestSeller, PeriodSales, SalesSummary};

use crate::error::{ApiError, ApiResult};

/// Wraps a finished CSV body in a download response.
pub fn attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
            (ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Disposition".to_string()),
        ],
        body,
    )
        .into_response()
}

pub fn best_sellers(rows: &[BestSeller]) -> ApiResult<Vec<u8>> {
    let mut wtr = Writer::from_writer(Vec::new());

    wtr.write_record([
        "Product ID",
        "Product",
        "Category",
        "Units Sold",
        "Times Ordered",
        "Revenue",
        "Average Sale Price",
    ])
    .map_err(csv_error)?;

    for row in rows {
        wtr.write_record([
            row.product_id.clone(),
            row.product_name.clone(),
            row.category_name.clone().unwrap_or_default(),
            row.units_sold.to_string(),
            row.order_count.to_string(),
            Money::from_cents(row.revenue_cents).to_decimal_string(),
            decimal(row.average_price_cents),
        ])
        .map_err(csv_error)?;
    }

    finish(wtr)
}

pub fn sales_by_period(rows: &[PeriodSales]) -> ApiResult<Vec<u8>> {
    let mut wtr = Writer::from_writer(Vec::new());

    wtr.write_record(["Period", "Orders", "Revenue", "Units Sold", "Average Order"])
        .map_err(csv_error)?;

    for row in rows {
        wtr.write_record([
            row.period.clone(),
            row.order_count.to_string(),
            Money::from_cents(row.revenue_cents).to_decimal_string(),
            row.units_sold.to_string(),
            decimal(row.average_order_cents),
        ])
        .map_err(csv_error)?;
    }

    finish(wtr)
}

/// Summary block followed by the best sellers, separated by a blank row.
pub fn full_report(
    period: &str,
    range: &DateRange,
    summary: &SalesSummary,
    best: &[BestSeller],
) -> ApiResult<Vec<u8>> {
    let mut wtr = WriterBuilder::new().flexible(true).from_writer(Vec::new());
    let fmt_date = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_default()
    };

    let rows: Vec<Vec<String>> = vec![
        vec!["=== SUMMARY ===".to_string()],
        vec!["Period".to_string(), period.to_string()],
        vec!["Start".to_string(), fmt_date(range.start)],
        vec!["End".to_string(), fmt_date(range.end)],
        vec![],
        vec!["Metric".to_string(), "Value".to_string()],
        vec!["Orders".to_string(), summary.order_count.to_string()],
        vec!["Revenue".to_string(), Money::from_cents(summary.revenue_cents).to_decimal_string()],
        vec!["Average Order".to_string(), decimal(summary.average_order_cents)],
        vec!["Units Sold".to_string(), summary.units_sold.to_string()],
        vec!["Customers".to_string(), summary.customer_count.to_string()],
        vec![
            "Average Rating".to_string(),
            summary.average_rating.map(|r| format!("{r:.2}")).unwrap_or_default(),
        ],
        vec![],
        vec!["=== BEST SELLERS ===".to_string()],
        vec![
            "ID".to_string(),
            "Product".to_string(),
            "Units Sold".to_string(),
            "Times Ordered".to_string(),
            "Revenue".to_string(),
        ],
    ];

    for row in rows {
        // csv skips zero-field records, so blank lines need one empty field
        if row.is_empty() {
            wtr.write_record([""]).map_err(csv_error)?;
        } else {
            wtr.write_record(&row).map_err(csv_error)?;
        }
    }

    for row in best {
        wtr.write_record([
            row.product_id.clone(),
            row.product_name.clone(),
            row.units_sold.to_string(),
            row.order_count.to_string(),
            Money::from_cents(row.revenue_cents).to_decimal_string(),
        ])
        .map_err(csv_error)?;
    }

    finish(wtr)
}

/// Two fully quoted columns holding JSON arrays of product ids.
pub fn combinations(rows: &[PurchaseCombination]) -> ApiResult<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    wtr.write_record(["input", "target"]).map_err(csv_error)?;

    for row in rows {
        let input = serde_json::to_string(&row.input)
            .map_err(|e| ApiError::Internal(format!("JSON encoding failed: {e}")))?;
        let target = serde_json::to_string(&[&row.target])
            .map_err(|e| ApiError::Internal(format!("JSON encoding failed: {e}")))?;
        wtr.write_record([input, target]).map_err(csv_error)?;
    }

    finish(wtr)
}

fn decimal(cents: f64) -> String {
    format!("{:.2}", cents / 100.0)
}

fn finish(wtr: Writer<Vec<u8>>) -> ApiResult<Vec<u8>> {
    wtr.into_inner()
        .map_err(|e| ApiError::Internal(format!("CSV flush failed: {e}")))
}

fn csv_error(e: csv::Error) -> ApiError {
    ApiError::Internal(format!("CSV write failed: {e}"))
}
