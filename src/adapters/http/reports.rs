//! `/api/reports`, each taking `?period=7d|30d|90d|1y`.

use super::extract::TenantContext;
use super::SharedState;
use crate::domain::{
    AttendantsReport, DomainError, HourlyVolumeReport, OverviewReport, ReportPeriod,
};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

pub(super) fn routes() -> Router<SharedState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/attendants", get(attendants))
        .route("/hourly", get(hourly))
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

impl PeriodQuery {
    fn period(&self) -> ReportPeriod {
        ReportPeriod::parse(self.period.as_deref())
    }
}

async fn overview(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<OverviewReport>, DomainError> {
    Ok(Json(state.reports.overview(ctx.id(), q.period()).await?))
}

async fn attendants(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<AttendantsReport>, DomainError> {
    Ok(Json(state.reports.attendants(ctx.id(), q.period()).await?))
}

async fn hourly(
    State(state): State<SharedState>,
    ctx: TenantContext,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<HourlyVolumeReport>, DomainError> {
    Ok(Json(state.reports.hourly_volume(ctx.id(), q.period()).await?))
}

#[cfg(test)]
mod tests {
    use super::super::test_server::spawn;
    use reqwest::Method;
    use serde_json::Value;

    #[tokio::test]
    async fn reports_default_to_thirty_days() {
        let app = spawn().await;
        let t = app.whatsapp_tenant("hotel-reports").await;
        app.conversation(&t, "5511911110000").await;

        let overview: Value = app
            .as_tenant(Method::GET, "/api/reports/overview?period=bogus", &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(overview["period"], "30d");
        assert_eq!(overview["overview"]["totalConversations"], 1);

        let hourly: Value = app
            .as_tenant(Method::GET, "/api/reports/hourly?period=7d", &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(hourly["period"], "7d");
        assert_eq!(hourly["hourlyVolume"].as_array().unwrap().len(), 24);

        let attendants: Value = app
            .as_tenant(Method::GET, "/api/reports/attendants", &t)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(attendants["attendants"].as_array().unwrap().is_empty());
    }
}
