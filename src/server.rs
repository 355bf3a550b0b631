use crate::config::ServerConfig;
use crate::data::ObservationSource;
use crate::error::{DataLoadError, ExportError, NotFoundError};
use crate::export;
use crate::navigation::NavigationContext;
use crate::store::{CountryProfile, Criteria, GenderTrendPoint, ObservationStore, StoreHandle};
use crate::types::{Country, Gender, Indicator};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct AppState {
    pub store: StoreHandle,
    pub source: Box<dyn ObservationSource>,
}

impl AppState {
    /// Loads the initial table from `source`; fails if it cannot be built.
    pub fn load(source: Box<dyn ObservationSource>) -> Result<Self, DataLoadError> {
        let store = ObservationStore::load(source.as_ref())?;
        Ok(Self {
            store: StoreHandle::new(store),
            source,
        })
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(NotFoundError),
    BadRequest(String),
    Internal(String),
}

impl From<NotFoundError> for ApiError {
    fn from(err: NotFoundError) -> Self {
        ApiError::NotFound(err)
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DataLoadError> for ApiError {
    fn from(err: DataLoadError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => {
                warn!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Every JSON result is wrapped so callers can tell "no data" from a failure.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub count: usize,
    pub empty: bool,
}

fn envelope<T: Serialize>(data: T, count: usize) -> Json<Envelope<T>> {
    Json(Envelope {
        data,
        count,
        empty: count == 0,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    year: Option<u16>,
    gender: Option<String>,
    indicator: Option<String>,
    countries: Option<String>,
    country: Option<String>,
    first: Option<String>,
    second: Option<String>,
}

impl QueryParams {
    fn gender(&self) -> ApiResult<Option<Gender>> {
        Ok(self.gender.as_deref().map(str::parse::<Gender>).transpose()?)
    }

    fn gender_or_all(&self) -> ApiResult<Gender> {
        Ok(self.gender()?.unwrap_or(Gender::All))
    }

    fn indicator(&self) -> ApiResult<Option<Indicator>> {
        Ok(self.indicator.as_deref().map(str::parse::<Indicator>).transpose()?)
    }

    fn require_indicator(&self) -> ApiResult<Indicator> {
        self.indicator()?
            .ok_or_else(|| ApiError::BadRequest("missing query parameter `indicator`".to_string()))
    }

    fn require_year(&self) -> ApiResult<u16> {
        self.year
            .ok_or_else(|| ApiError::BadRequest("missing query parameter `year`".to_string()))
    }

    fn countries(&self) -> ApiResult<Option<BTreeSet<Country>>> {
        self.countries
            .as_deref()
            .map(|list| {
                list.split(',')
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| name.parse::<Country>().map_err(ApiError::from))
                    .collect::<ApiResult<BTreeSet<Country>>>()
            })
            .transpose()
    }

    // Absent list means "no countries selected".
    fn country_set(&self) -> ApiResult<BTreeSet<Country>> {
        Ok(self.countries()?.unwrap_or_default())
    }

    fn named_country(value: &Option<String>, param: &str) -> ApiResult<Country> {
        value
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest(format!("missing query parameter `{}`", param)))?
            .parse::<Country>()
            .map_err(ApiError::from)
    }

    fn criteria(&self) -> ApiResult<Criteria> {
        Ok(Criteria {
            year: self.year,
            gender: self.gender()?,
            countries: self.countries()?,
            indicator: self.indicator()?,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/options", get(options_handler))
        .route("/api/observations", get(observations_handler))
        .route("/api/averages/indicator", get(indicator_averages_handler))
        .route("/api/averages/country", get(country_averages_handler))
        .route("/api/averages/yearly", get(yearly_averages_handler))
        .route("/api/trend", get(trend_handler))
        .route("/api/radar", get(radar_handler))
        .route("/api/rank", get(rank_handler))
        .route("/api/map", get(map_handler))
        .route("/api/compare", get(compare_handler))
        .route("/api/profile", get(profile_handler))
        .route("/api/coordinates/:country", get(coordinates_handler))
        .route("/api/export/observations", get(export_observations_handler))
        .route("/api/export/rank", get(export_rank_handler))
        .route("/api/reload", post(reload_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, "Starting server");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "observations": state.store.snapshot().len(),
    }))
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let store = state.store.snapshot();
    Json(json!({
        "years": store.years(),
        "countries": store.countries(),
        "indicators": store.indicators(),
        "genders": Gender::ALL,
    }))
}

async fn observations_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.store.snapshot().filter(&params.criteria()?);
    let count = rows.len();
    Ok(envelope(rows, count))
}

async fn indicator_averages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let averages = state.store.snapshot().average_by_indicator(&params.criteria()?);
    let count = averages.len();
    Ok(envelope(averages, count))
}

async fn country_averages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let averages = state.store.snapshot().average_by_country(&params.criteria()?);
    let count = averages.len();
    Ok(envelope(averages, count))
}

async fn yearly_averages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let averages = state
        .store
        .snapshot()
        .yearly_indicator_averages(params.gender_or_all()?, &params.country_set()?);
    let count = averages.len();
    Ok(envelope(averages, count))
}

async fn trend_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let points = state.store.snapshot().trend(
        params.require_indicator()?,
        &params.country_set()?,
        params.gender_or_all()?,
    );
    let count = points.len();
    Ok(envelope(points, count))
}

async fn radar_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let pivot = state.store.snapshot().pivot_for_radar(
        params.require_year()?,
        &params.country_set()?,
        params.gender_or_all()?,
    );
    let count = pivot.rows.len();
    Ok(envelope(pivot, count))
}

async fn rank_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let entries = state.store.snapshot().rank(
        params.require_indicator()?,
        params.require_year()?,
        params.gender_or_all()?,
        params.countries()?.as_ref(),
    );
    let count = entries.len();
    Ok(envelope(entries, count))
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let points = state.store.snapshot().map_points(
        params.require_indicator()?,
        params.require_year()?,
        params.gender_or_all()?,
    )?;
    let count = points.len();
    Ok(envelope(points, count))
}

async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let first = QueryParams::named_country(&params.first, "first")?;
    let second = QueryParams::named_country(&params.second, "second")?;
    if first == second {
        return Err(ApiError::BadRequest(
            "`first` and `second` must name different countries".to_string(),
        ));
    }

    let comparison = state.store.snapshot().compare_pair(
        params.require_indicator()?,
        params.require_year()?,
        params.gender_or_all()?,
        first,
        second,
    );
    let count = usize::from(comparison.is_some());
    Ok(envelope(comparison, count))
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    navigation: NavigationContext,
    profile: Option<CountryProfile>,
    indicator: Indicator,
    trend: Vec<GenderTrendPoint>,
}

async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<impl IntoResponse> {
    let requested = params.country.as_deref().map(str::parse::<Country>).transpose()?;
    let mut navigation = NavigationContext::default();
    navigation.select_country(navigation.resolve_country(requested));

    let country = navigation.selected_country;
    let indicator = params.indicator()?.unwrap_or(Indicator::ALL[0]);
    let store = state.store.snapshot();
    let profile = store.country_profile(country);
    let trend = store.country_trend(country, indicator);
    let count = usize::from(profile.is_some());

    Ok(envelope(
        ProfileResponse {
            navigation,
            profile,
            indicator,
            trend,
        },
        count,
    ))
}

async fn coordinates_handler(
    State(state): State<Arc<AppState>>,
    Path(country): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (latitude, longitude) = state.store.snapshot().lookup_coordinates(&country)?;
    Ok(Json(json!({
        "country": country,
        "latitude": latitude,
        "longitude": longitude,
    })))
}

fn csv_response(file_name: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

fn export_file_name(criteria: &Criteria) -> String {
    let single_country = criteria
        .countries
        .as_ref()
        .filter(|set| set.len() == 1)
        .and_then(|set| set.iter().next().copied());

    match (criteria.indicator, criteria.year, criteria.gender, single_country) {
        (Some(indicator), Some(year), Some(gender), _) => {
            export::chart_data_file_name(indicator, year, gender)
        }
        (Some(indicator), Some(year), None, _) => export::comparison_file_name(indicator, year),
        (None, None, None, Some(country)) => export::country_data_file_name(country),
        _ => "observations.csv".to_string(),
    }
}

async fn export_observations_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Response> {
    let criteria = params.criteria()?;
    let rows = state.store.snapshot().filter(&criteria);
    let body = export::observations_to_csv(&rows)?;
    Ok(csv_response(export_file_name(&criteria), body))
}

async fn export_rank_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Response> {
    let indicator = params.require_indicator()?;
    let year = params.require_year()?;
    let gender = params.gender_or_all()?;
    let countries = params.countries()?;

    let entries = state.store.snapshot().rank(indicator, year, gender, countries.as_ref());
    let body = export::ranking_to_csv(indicator, &entries)?;
    Ok(csv_response(export::ranking_file_name(indicator, year, gender), body))
}

async fn reload_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let worker = Arc::clone(&state);
    let count = tokio::task::spawn_blocking(move || worker.store.reload(worker.source.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("reload task failed: {}", e)))??;

    info!(source = %state.source.describe(), observations = count, "Reloaded observation store");
    Ok(Json(json!({ "observations": count })))
}
