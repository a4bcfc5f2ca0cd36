//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::NaiveDateTime;

use super::AppState;
use super::types::{ErrorResponse, ModelResponse, SimulationQuery, SimulationRecord};
use crate::io::import::parse_timestamp;
use crate::report::ModelReport;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

fn parse_bound(name: &str, value: Option<&str>) -> Result<Option<NaiveDateTime>, ApiError> {
    value
        .map(|v| {
            parse_timestamp(v)
                .ok_or_else(|| bad_request(format!("`{name}` (\"{v}\") is not a valid date")))
        })
        .transpose()
}

/// Returns the fitted model summary.
///
/// `GET /model` → 200 + `ModelResponse` JSON
pub async fn get_model(State(state): State<Arc<AppState>>) -> Json<ModelResponse> {
    Json(ModelResponse::new(&state.model, state.ensemble.len()))
}

/// Returns per-season statistics, density and autocorrelation points.
///
/// `GET /report` → 200 + `ModelReport` JSON
pub async fn get_report(State(state): State<Arc<AppState>>) -> Json<ModelReport> {
    Json(state.report.clone())
}

/// Returns simulated records, optionally filtered by replicate and date.
///
/// `GET /simulation` → 200 + `Vec<SimulationRecord>` JSON
/// `GET /simulation?id=1&from=2021-01-01&to=2021-01-31` → filtered (inclusive)
/// `GET /simulation?from=2021-02-01&to=2021-01-01` → 400 + `ErrorResponse`
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SimulationQuery>,
) -> Result<Json<Vec<SimulationRecord>>, ApiError> {
    let from = parse_bound("from", query.from.as_deref())?;
    let to = parse_bound("to", query.to.as_deref())?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(bad_request(format!(
                "`from` ({from}) must be <= `to` ({to})"
            )));
        }
    }

    let records: Vec<SimulationRecord> = state
        .ensemble
        .iter()
        .filter(|s| query.id.is_none_or(|id| s.id == id))
        .flat_map(|s| &s.records)
        .filter(|r| from.is_none_or(|f| r.timestamp >= f) && to.is_none_or(|t| r.timestamp <= t))
        .map(SimulationRecord::from)
        .collect();

    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{NaiveDate, TimeDelta};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tower::util::ServiceExt;

    use super::*;
    use crate::analysis::{AnalysisOptions, analyze_with};
    use crate::api::router;
    use crate::series::{ObservedSeries, SeasonScheme};
    use crate::sim::{EnsembleOutcome, EnsembleRequest, MissingSeasonPolicy, run_ensemble};

    fn make_test_state() -> Arc<AppState> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut x = 0.0_f64;
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for d in 0..400 {
            x = 0.5 * x + rng.random_range(-1.0..1.0);
            dates.push(start + TimeDelta::days(d));
            values.push(10.0 + x);
        }
        let series = ObservedSeries::from_daily(&dates, &values).unwrap();
        let options = AnalysisOptions {
            scheme: SeasonScheme::None,
            max_lag: 2,
            parallel: false,
            ..AnalysisOptions::default()
        };
        let model = analyze_with(&series, &options).unwrap();

        let first = model.history.last + TimeDelta::days(1);
        let request = EnsembleRequest {
            from: first,
            to: first + TimeDelta::days(9),
            nsim: 2,
            seed: 1995,
            parallel: false,
            policy: MissingSeasonPolicy::Fail,
        };
        let ensemble = match run_ensemble(&model, &request).unwrap() {
            EnsembleOutcome::Simulated(e) => e.replicates,
            EnsembleOutcome::AlreadyCovered { .. } => panic!("range should need simulation"),
        };
        Arc::new(AppState::new(model, ensemble))
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(state);
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn model_returns_summary() {
        let (status, json) = get_json(make_test_state(), "/model").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scheme"], "none");
        assert_eq!(json["family"], "normal");
        assert_eq!(json["replicates"], 2);
        assert_eq!(json["seasons"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn report_returns_seasons() {
        let (status, json) = get_json(make_test_state(), "/report").await;
        assert_eq!(status, StatusCode::OK);
        let seasons = json["seasons"].as_array().unwrap();
        assert_eq!(seasons.len(), 1);
        assert!(seasons[0].get("stats").is_some());
        assert!(seasons[0].get("acf").is_some());
    }

    #[tokio::test]
    async fn simulation_returns_all_records() {
        let (status, json) = get_json(make_test_state(), "/simulation").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(20));
    }

    #[tokio::test]
    async fn simulation_filters_by_id_and_date() {
        let (status, json) =
            get_json(make_test_state(), "/simulation?id=1&from=2021-02-05&to=2021-02-07").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r["id"] == 1));
        assert_eq!(records[0]["date"], "2021-02-05T00:00:00");
    }

    #[tokio::test]
    async fn simulation_invalid_range_returns_400() {
        let (status, json) =
            get_json(make_test_state(), "/simulation?from=2021-02-10&to=2021-02-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn simulation_unparsable_date_returns_400() {
        let (status, _) = get_json(make_test_state(), "/simulation?from=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
