use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use vetrack_core::{
    configured_registry, CoreConfig, Patient, PatientService, StatusRegistry, TrackerError,
    TrackingToken,
};

/// Application state shared across REST API handlers
#[derive(Clone)]
struct AppState {
    cfg: Arc<CoreConfig>,
    registry: Arc<dyn StatusRegistry>,
    patients: PatientService,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct StatusRes {
    name: String,
    /// One of `none`, `confirmation`, `delay`, `double_confirm`
    protection_level: String,
    description: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ListStatusesRes {
    statuses: Vec<StatusRes>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct PatientRes {
    id: String,
    name: String,
    species: String,
    owner_name: String,
    status: String,
    tracking_url: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ListPatientsRes {
    patients: Vec<PatientRes>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct CreatePatientReq {
    name: String,
    species: String,
    owner_name: String,
    status: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct TimelineEntryRes {
    status: String,
    recorded_at: String,
}

/// What an owner sees through a tracking link. Owner details are deliberately absent.
#[derive(Serialize, Deserialize, ToSchema)]
struct TrackingRes {
    name: String,
    species: String,
    status: String,
    updated_at: String,
    timeline: Vec<TimelineEntryRes>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, list_statuses, list_patients, create_patient, track_patient),
    components(schemas(
        HealthRes,
        StatusRes,
        ListStatusesRes,
        PatientRes,
        ListPatientsRes,
        CreatePatientReq,
        TimelineEntryRes,
        TrackingRes
    ))
)]
struct ApiDoc;

/// Main entry point for the VetTrack REST server
///
/// # Environment Variables
/// - `VETRACK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `VETRACK_DATA_DIR`: Directory for patient records (default: "vetrack_data")
/// - `VETRACK_STATUS_FILE`: Optional YAML status registry
/// - `VETRACK_DELAY_SECONDS`: Countdown for delay-protected statuses (default: 5)
/// - `VETRACK_PUBLIC_BASE_URL`: Base of owner tracking links (default: "http://localhost:3000")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vetrack=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("VETRACK_DATA_DIR").ok(),
        std::env::var("VETRACK_STATUS_FILE").ok(),
        std::env::var("VETRACK_DELAY_SECONDS").ok(),
        std::env::var("VETRACK_PUBLIC_BASE_URL").ok(),
    )?);
    let rest_addr = std::env::var("VETRACK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let registry = configured_registry(cfg.status_file());
    let state = AppState {
        patients: PatientService::new(cfg.clone(), registry.clone()),
        registry,
        cfg,
    };

    tracing::info!("++ Starting VetTrack REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("VetTrack REST stopped");
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/statuses", get(list_statuses))
        .route("/patients", get(list_patients).post(create_patient))
        .route("/track/:token", get(track_patient))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("failed to install terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn patient_res(cfg: &CoreConfig, patient: Patient) -> PatientRes {
    PatientRes {
        tracking_url: cfg.tracking_url(&patient.tracking_token),
        id: patient.id.to_string(),
        name: patient.name,
        species: patient.species,
        owner_name: patient.owner_name,
        status: patient.status,
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "VetTrack is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/statuses",
    responses(
        (status = 200, description = "Statuses with their protection levels", body = ListStatusesRes),
        (status = 500, description = "Status registry unavailable")
    )
)]
/// List every status staff can assign, in display order
async fn list_statuses(
    State(state): State<AppState>,
) -> Result<Json<ListStatusesRes>, (StatusCode, &'static str)> {
    let statuses = state.registry.statuses().map_err(|e| {
        tracing::error!("List statuses error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Status registry unavailable")
    })?;

    Ok(Json(ListStatusesRes {
        statuses: statuses
            .into_iter()
            .map(|s| StatusRes {
                name: s.name,
                protection_level: s.protection_level.to_string(),
                description: s.description,
            })
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "List of patients", body = ListPatientsRes)
    )
)]
/// List all patients, oldest first
async fn list_patients(State(state): State<AppState>) -> Json<ListPatientsRes> {
    let patients = state
        .patients
        .list()
        .into_iter()
        .map(|p| patient_res(&state.cfg, p))
        .collect();
    Json(ListPatientsRes { patients })
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = PatientRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new patient
///
/// The response carries the public tracking link to share with the owner.
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<PatientRes>), (StatusCode, &'static str)> {
    match state.patients.create(
        &req.name,
        &req.species,
        &req.owner_name,
        req.status.as_deref(),
    ) {
        Ok(patient) => Ok((StatusCode::CREATED, Json(patient_res(&state.cfg, patient)))),
        Err(TrackerError::InvalidInput(_)) | Err(TrackerError::UnknownStatus(_)) => {
            Err((StatusCode::BAD_REQUEST, "Invalid patient details"))
        }
        Err(e) => {
            tracing::error!("Create patient error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/track/{token}",
    params(("token" = String, Path, description = "Tracking token from the owner's link")),
    responses(
        (status = 200, description = "Patient timeline", body = TrackingRes),
        (status = 404, description = "Unknown tracking link")
    )
)]
/// Public owner view of a patient's status timeline
async fn track_patient(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TrackingRes>, (StatusCode, &'static str)> {
    const NOT_FOUND: (StatusCode, &str) = (StatusCode::NOT_FOUND, "Unknown tracking link");

    let token = TrackingToken::parse(&token).map_err(|_| NOT_FOUND)?;
    let patient = state
        .patients
        .find_by_tracking_token(&token)
        .ok_or(NOT_FOUND)?;

    Ok(Json(TrackingRes {
        name: patient.name,
        species: patient.species,
        status: patient.status,
        updated_at: patient.updated_at.to_rfc3339(),
        timeline: patient
            .timeline
            .into_iter()
            .map(|entry| TimelineEntryRes {
                status: entry.status,
                recorded_at: entry.recorded_at.to_rfc3339(),
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use vetrack_core::{StaticStatusRegistry, StatusCommitter};

    fn state(dir: &tempfile::TempDir) -> AppState {
        let cfg = Arc::new(
            CoreConfig::new(
                dir.path().to_path_buf(),
                None,
                5,
                "https://clinic.example".into(),
            )
            .expect("config"),
        );
        let registry: Arc<dyn StatusRegistry> = Arc::new(StaticStatusRegistry::clinic_default());
        AppState {
            patients: PatientService::new(cfg.clone(), registry.clone()),
            registry,
            cfg,
        }
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn statuses_include_protection_levels() {
        let dir = tempfile::tempdir().expect("temp dir");
        let response = app(state(&dir))
            .oneshot(Request::get("/statuses").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body: ListStatusesRes = body_json(response).await;
        let surgery = body
            .statuses
            .iter()
            .find(|s| s.name == "In Surgery")
            .expect("surgery status");
        assert_eq!(surgery.protection_level, "delay");
    }

    #[tokio::test]
    async fn create_patient_returns_tracking_link() {
        let dir = tempfile::tempdir().expect("temp dir");
        let request = Request::post("/patients")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"name":"Biscuit","species":"Dog","owner_name":"Sam Carter","status":null}"#,
            ))
            .expect("request");

        let response = app(state(&dir)).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: PatientRes = body_json(response).await;
        assert_eq!(body.status, "Admitted");
        assert!(body.tracking_url.starts_with("https://clinic.example/track/"));
    }

    #[tokio::test]
    async fn create_patient_rejects_unknown_status() {
        let dir = tempfile::tempdir().expect("temp dir");
        let request = Request::post("/patients")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"name":"Biscuit","species":"Dog","owner_name":"Sam","status":"Boarding"}"#,
            ))
            .expect("request");

        let response = app(state(&dir)).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tracking_link_shows_timeline() {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = state(&dir);
        let patient = state
            .patients
            .create("Biscuit", "Dog", "Sam Carter", None)
            .expect("create patient");
        state
            .patients
            .commit(&patient.id, "Recovering")
            .expect("commit");

        let uri = format!("/track/{}", patient.tracking_token);
        let response = app(state)
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body: TrackingRes = body_json(response).await;
        assert_eq!(body.status, "Recovering");
        let statuses: Vec<_> = body.timeline.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, vec!["Admitted", "Recovering"]);
    }

    #[tokio::test]
    async fn unknown_tracking_link_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        for token in ["not-a-token", "0123456789abcdef0123456789abcdef"] {
            let response = app(state(&dir))
                .oneshot(
                    Request::get(format!("/track/{token}"))
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
