//! Sales reports and CSV exports. Every route needs `view_reports`.
//!
//! ## Query Parameters
//! ```text
//! fecha_inicio, fecha_fin   RFC 3339 or YYYY-MM-DD; see normalize_range
//! fecha_inicio_1 .. _2      the two periods of comparativa-periodos
//! limite                    list size, bounded per report
//! agrupar_por               day | week | month | year (default day)
//! periodo                   quick-report preset, e.g. last_month
//! ```

use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use libreria_core::permissions::{Operation, Requirement, Resource};
use libreria_core::reports::{
    bounded_range, compare, normalize_range, parse_date, resolve_limit, DateRange, MetricChange,
    QuickPeriod, BEST_SELLERS_LIMIT, TOP_CUSTOMERS_LIMIT,
};
use libreria_core::{Grouping, ValidationError};
use libreria_db::repository::report::{
    BestSeller, Dashboard, OfferEffectiveness, PeriodSales, SalesSummary, TopCustomer,
};

use crate::auth::RequireAuth;
use crate::csv_export;
use crate::error::ApiResult;
use crate::state::AppState;

const VIEW_REPORTS: Requirement = Requirement::new(Operation::View, Resource::Reports);

/// Best sellers included in the full CSV export.
const FULL_REPORT_BEST_SELLERS: i64 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reportes/productos-mas-vendidos", get(best_sellers))
        .route("/reportes/ventas-por-periodo", get(sales_by_period))
        .route("/reportes/resumen-general", get(summary))
        .route("/reportes/top-clientes", get(top_customers))
        .route("/reportes/efectividad-ofertas", get(offer_effectiveness))
        .route("/reportes/comparativa-periodos", get(comparison))
        .route("/reportes/reporte-rapido", get(quick_report))
        .route("/reportes/dashboard", get(dashboard))
        .route("/reportes/exportar-productos-csv", get(export_best_sellers))
        .route("/reportes/exportar-ventas-csv", get(export_sales))
        .route("/reportes/exportar-reporte-completo-csv", get(export_full_report))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub limite: Option<i64>,
    pub agrupar_por: Option<String>,
    pub periodo: Option<String>,
    pub fecha_inicio_1: Option<String>,
    pub fecha_fin_1: Option<String>,
    pub fecha_inicio_2: Option<String>,
    pub fecha_fin_2: Option<String>,
}

impl ReportQuery {
    fn range(&self, now: DateTime<Utc>) -> Result<DateRange, ValidationError> {
        let start = self
            .fecha_inicio
            .as_deref()
            .map(|v| parse_date("fecha_inicio", v))
            .transpose()?;
        let end = self
            .fecha_fin
            .as_deref()
            .map(|v| parse_date("fecha_fin", v))
            .transpose()?;

        normalize_range(start, end, now)
    }

    /// The two windows of a period comparison, as (measured, baseline).
    ///
    /// With any of `fecha_inicio_1`..`fecha_fin_2` all four are required and
    /// period 1 is measured against period 2. Otherwise `fecha_inicio` and
    /// `fecha_fin` are required and measured against the window of equal
    /// length right before them.
    fn comparison_ranges(&self) -> Result<(DateRange, DateRange), ValidationError> {
        let numbered = [
            &self.fecha_inicio_1,
            &self.fecha_fin_1,
            &self.fecha_inicio_2,
            &self.fecha_fin_2,
        ];

        if numbered.iter().any(|v| v.is_some()) {
            let first = bounded_range(
                required_date("fecha_inicio_1", &self.fecha_inicio_1)?,
                required_date("fecha_fin_1", &self.fecha_fin_1)?,
            )?;
            let second = bounded_range(
                required_date("fecha_inicio_2", &self.fecha_inicio_2)?,
                required_date("fecha_fin_2", &self.fecha_fin_2)?,
            )?;
            return Ok((first, second));
        }

        let current = bounded_range(
            required_date("fecha_inicio", &self.fecha_inicio)?,
            required_date("fecha_fin", &self.fecha_fin)?,
        )?;
        let previous = current.previous().ok_or_else(|| ValidationError::Required {
            field: "fecha_inicio".to_string(),
        })?;
        Ok((current, previous))
    }

    fn grouping(&self) -> Result<Grouping, ValidationError> {
        self.agrupar_por
            .as_deref()
            .map_or(Ok(Grouping::Day), str::parse)
    }

    fn quick_period(&self) -> Result<QuickPeriod, ValidationError> {
        self.periodo
            .as_deref()
            .ok_or_else(|| ValidationError::Required {
                field: "periodo".to_string(),
            })?
            .parse()
    }
}

fn required_date<'a>(
    field: &'a str,
    value: &Option<String>,
) -> Result<(&'a str, DateTime<Utc>), ValidationError> {
    let value = value.as_deref().ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })?;
    Ok((field, parse_date(field, value)?))
}

#[derive(Debug, Serialize)]
pub struct Ranged<T> {
    pub range: DateRange,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct BestSellers {
    pub products: Vec<BestSeller>,
}

/// GET /reportes/productos-mas-vendidos
pub async fn best_sellers(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Ranged<BestSellers>>> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let limit = resolve_limit(query.limite, BEST_SELLERS_LIMIT)?;
    let products = state.db().reports().best_sellers(&range, limit).await?;

    Ok(Json(Ranged {
        range,
        data: BestSellers { products },
    }))
}

#[derive(Debug, Serialize)]
pub struct SalesByPeriod {
    pub grouping: Grouping,
    pub periods: Vec<PeriodSales>,
}

/// GET /reportes/ventas-por-periodo
pub async fn sales_by_period(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Ranged<SalesByPeriod>>> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let grouping = query.grouping()?;
    let periods = state.db().reports().sales_by_period(&range, grouping).await?;

    Ok(Json(Ranged {
        range,
        data: SalesByPeriod { grouping, periods },
    }))
}

/// GET /reportes/resumen-general
pub async fn summary(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Ranged<SalesSummary>>> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let data = state.db().reports().summary(&range).await?;

    Ok(Json(Ranged { range, data }))
}

#[derive(Debug, Serialize)]
pub struct TopCustomers {
    pub customers: Vec<TopCustomer>,
}

/// GET /reportes/top-clientes
pub async fn top_customers(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Ranged<TopCustomers>>> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let limit = resolve_limit(query.limite, TOP_CUSTOMERS_LIMIT)?;
    let customers = state.db().reports().top_customers(&range, limit).await?;

    Ok(Json(Ranged {
        range,
        data: TopCustomers { customers },
    }))
}

/// GET /reportes/efectividad-ofertas
pub async fn offer_effectiveness(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Ranged<OfferEffectiveness>>> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let data = state.db().reports().offer_effectiveness(&range).await?;

    Ok(Json(Ranged { range, data }))
}

#[derive(Debug, Serialize)]
pub struct Comparison {
    pub current_range: DateRange,
    pub previous_range: DateRange,
    pub order_count: MetricChange,
    pub revenue_cents: MetricChange,
    pub average_order_cents: MetricChange,
    pub units_sold: MetricChange,
    pub customer_count: MetricChange,
}

/// GET /reportes/comparativa-periodos
///
/// `previous` holds the baseline period and `current` the measured one, so
/// `difference` is measured minus baseline.
pub async fn comparison(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Comparison>> {
    auth.require(VIEW_REPORTS)?;

    let (current_range, previous_range) = query.comparison_ranges()?;

    let reports = state.db().reports();
    let current = reports.summary(&current_range).await?;
    let previous = reports.summary(&previous_range).await?;
    debug!(?current_range, ?previous_range, "Comparing periods");

    Ok(Json(Comparison {
        current_range,
        previous_range,
        order_count: compare(previous.order_count as f64, current.order_count as f64),
        revenue_cents: compare(previous.revenue_cents as f64, current.revenue_cents as f64),
        average_order_cents: compare(previous.average_order_cents, current.average_order_cents),
        units_sold: compare(previous.units_sold as f64, current.units_sold as f64),
        customer_count: compare(previous.customer_count as f64, current.customer_count as f64),
    }))
}

#[derive(Debug, Serialize)]
pub struct QuickReport {
    pub period: QuickPeriod,
    pub range: DateRange,
    pub summary: SalesSummary,
    pub best_sellers: Vec<BestSeller>,
    pub top_customers: Vec<TopCustomer>,
    pub daily_sales: Vec<PeriodSales>,
    pub offer_effectiveness: OfferEffectiveness,
}

/// GET /reportes/reporte-rapido?periodo=
pub async fn quick_report(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<QuickReport>> {
    auth.require(VIEW_REPORTS)?;

    let period = query.quick_period()?;
    let range = period.range(Utc::now());
    let reports = state.db().reports();

    Ok(Json(QuickReport {
        period,
        range,
        summary: reports.summary(&range).await?,
        best_sellers: reports.best_sellers(&range, BEST_SELLERS_LIMIT.0).await?,
        top_customers: reports.top_customers(&range, 5).await?,
        daily_sales: reports.sales_by_period(&range, Grouping::Day).await?,
        offer_effectiveness: reports.offer_effectiveness(&range).await?,
    }))
}

/// GET /reportes/dashboard
pub async fn dashboard(State(state): State<AppState>, auth: RequireAuth) -> ApiResult<Json<Dashboard>> {
    auth.require(VIEW_REPORTS)?;

    Ok(Json(state.db().reports().dashboard(Utc::now()).await?))
}

// =============================================================================
// CSV Exports
// =============================================================================

/// GET /reportes/exportar-productos-csv
pub async fn export_best_sellers(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let limit = resolve_limit(query.limite, BEST_SELLERS_LIMIT)?;
    let rows = state.db().reports().best_sellers(&range, limit).await?;

    Ok(csv_export::attachment(
        "productos_mas_vendidos.csv",
        csv_export::best_sellers(&rows)?,
    ))
}

/// GET /reportes/exportar-ventas-csv
pub async fn export_sales(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    auth.require(VIEW_REPORTS)?;

    let range = query.range(Utc::now())?;
    let grouping = query.grouping()?;
    let rows = state.db().reports().sales_by_period(&range, grouping).await?;

    Ok(csv_export::attachment(
        &format!("ventas_por_{}.csv", grouping.as_str()),
        csv_export::sales_by_period(&rows)?,
    ))
}

/// GET /reportes/exportar-reporte-completo-csv?periodo=
pub async fn export_full_report(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    auth.require(VIEW_REPORTS)?;

    let period = query.quick_period()?;
    let range = period.range(Utc::now());
    let reports = state.db().reports();

    let summary = reports.summary(&range).await?;
    let best = reports.best_sellers(&range, FULL_REPORT_BEST_SELLERS).await?;

    Ok(csv_export::attachment(
        &format!("reporte_completo_{}.csv", period.as_str()),
        csv_export::full_report(period.as_str(), &range, &summary, &best)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: Option<&str>, end: Option<&str>) -> ReportQuery {
        ReportQuery {
            fecha_inicio: start.map(str::to_string),
            fecha_fin: end.map(str::to_string),
            ..ReportQuery::default()
        }
    }

    #[test]
    fn test_range_from_plain_dates() {
        let range = query(Some("2024-01-01"), Some("2024-01-31"))
            .range(Utc::now())
            .unwrap();
        assert_eq!(range.start.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(range.end.unwrap().to_rfc3339(), "2024-01-31T00:00:00+00:00");
    }

    #[test]
    fn test_range_rejects_inverted_dates() {
        assert!(query(Some("2024-02-01"), Some("2024-01-01")).range(Utc::now()).is_err());
        assert!(query(Some("yesterday-ish"), None).range(Utc::now()).is_err());
    }

    #[test]
    fn test_missing_dates_are_unbounded() {
        assert!(query(None, None).range(Utc::now()).unwrap().is_unbounded());
    }

    #[test]
    fn test_comparison_of_two_explicit_periods() {
        let q = ReportQuery {
            fecha_inicio_1: Some("2024-03-01".to_string()),
            fecha_fin_1: Some("2024-04-01".to_string()),
            fecha_inicio_2: Some("2023-03-01".to_string()),
            fecha_fin_2: Some("2023-04-01".to_string()),
            ..ReportQuery::default()
        };

        let (measured, baseline) = q.comparison_ranges().unwrap();
        assert_eq!(measured.start.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(baseline.end.unwrap().to_rfc3339(), "2023-04-01T00:00:00+00:00");
    }

    #[test]
    fn test_comparison_periods_are_each_validated() {
        let q = ReportQuery {
            fecha_inicio_1: Some("2024-03-01".to_string()),
            fecha_fin_1: Some("2024-04-01".to_string()),
            fecha_inicio_2: Some("2023-04-01".to_string()),
            fecha_fin_2: Some("2023-03-01".to_string()),
            ..ReportQuery::default()
        };
        assert!(matches!(
            q.comparison_ranges(),
            Err(ValidationError::InvalidRange { start_field, .. }) if start_field == "fecha_inicio_2"
        ));

        let partial = ReportQuery {
            fecha_inicio_1: Some("2024-03-01".to_string()),
            fecha_fin_1: Some("2024-04-01".to_string()),
            fecha_inicio_2: Some("2023-03-01".to_string()),
            ..ReportQuery::default()
        };
        assert!(matches!(
            partial.comparison_ranges(),
            Err(ValidationError::Required { field }) if field == "fecha_fin_2"
        ));
    }

    #[test]
    fn test_comparison_single_window_uses_preceding_one() {
        let (current, previous) = query(Some("2024-03-10"), Some("2024-03-20"))
            .comparison_ranges()
            .unwrap();
        assert_eq!(previous.end, current.start);
        assert_eq!(previous.start.unwrap().to_rfc3339(), "2024-02-29T00:00:00+00:00");

        assert!(query(Some("2024-03-10"), None).comparison_ranges().is_err());
    }

    #[test]
    fn test_grouping_defaults_to_day() {
        assert_eq!(ReportQuery::default().grouping().unwrap(), Grouping::Day);

        let q = ReportQuery {
            agrupar_por: Some("mes".to_string()),
            ..ReportQuery::default()
        };
        assert_eq!(q.grouping().unwrap(), Grouping::Month);
    }

    #[test]
    fn test_quick_period_is_required() {
        assert!(ReportQuery::default().quick_period().is_err());

        let q = ReportQuery {
            periodo: Some("ultimo_mes".to_string()),
            ..ReportQuery::default()
        };
        assert_eq!(q.quick_period().unwrap(), QuickPeriod::LastMonth);
    }
}
