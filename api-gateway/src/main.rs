//! GridBill API Gateway
//!
//! REST/JSON façade over the utility billing platform:
//! - Readings: staff record meter readings, list unbilled ones
//! - Billing: single and bulk bill generation, bill detail
//! - Payments: record payments against bills
//! - Events: WebSocket stream of billing events

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use futures::{sink::SinkExt, stream::StreamExt};
use gridbill_common::{
    Connection, Consumer, GenerationError, GridbillError, MeterReading, TariffPlan, UtilityKind,
    UtilityType,
};
use gridbill_engine::{
    BillStore, BillingConfig, BillingEngine, CancelHandle, InMemoryBillStore,
    InMemoryReadingStore, InMemoryReferenceProvider, ReadingStore, ReferenceProvider,
    UnbilledFilter,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

// ============ STATE ============

#[derive(Clone)]
struct AppState {
    engine: Arc<BillingEngine>,
    reference: Arc<InMemoryReferenceProvider>,
}

// ============ ERRORS ============

/// API error wrapper mapping engine errors onto HTTP statuses
enum ApiError {
    BadRequest(String),
    Engine(GridbillError),
}

impl From<GridbillError> for ApiError {
    fn from(err: GridbillError) -> Self {
        ApiError::Engine(err)
    }
}

fn engine_status(err: &GridbillError) -> StatusCode {
    match err {
        GridbillError::Generation(gen) => match gen {
            GenerationError::ReadingNotFound(_)
            | GenerationError::ConnectionNotFound(_)
            | GenerationError::ConsumerNotFound(_)
            | GenerationError::BillNotFound(_)
            | GenerationError::NoUnbilledReading { .. } => StatusCode::NOT_FOUND,
            GenerationError::AlreadyBilled(_)
            | GenerationError::ConcurrentGenerationConflict(_) => StatusCode::CONFLICT,
            GenerationError::InvalidReading { .. }
            | GenerationError::InvalidPaymentAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            // Operator configuration gaps
            GenerationError::NoActiveTariff { .. }
            | GenerationError::InvalidBillingCycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Engine(err) => (engine_status(&err), err.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ============ REQUEST TYPES ============

#[derive(Debug, Deserialize)]
struct UnbilledQuery {
    billing_month: Option<u32>,
    billing_year: Option<i32>,
    connection_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct RecordReadingRequest {
    connection_id: Uuid,
    previous_reading: Decimal,
    current_reading: Decimal,
    reading_date: NaiveDate,
    billing_month: u32,
    billing_year: i32,
    #[serde(default)]
    is_estimated: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    reading_id: Option<Uuid>,
    connection_id: Option<Uuid>,
    billing_month: Option<u32>,
    billing_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GenerateBulkRequest {
    billing_month: u32,
    billing_year: i32,
}

#[derive(Debug, Deserialize)]
struct RecordPaymentRequest {
    amount: Decimal,
}

// ============ HANDLERS ============

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": gridbill_common::VERSION,
        "services": {
            "billing_engine": true,
            "reading_store": true,
            "bill_store": true
        }
    }))
}

async fn list_unbilled(
    State(state): State<AppState>,
    Query(query): Query<UnbilledQuery>,
) -> Result<Json<Vec<MeterReading>>, ApiError> {
    let filter = UnbilledFilter {
        billing_month: query.billing_month,
        billing_year: query.billing_year,
        connection_id: query.connection_id,
    };
    Ok(Json(state.engine.unbilled(&filter).await?))
}

async fn record_reading(
    State(state): State<AppState>,
    Json(req): Json<RecordReadingRequest>,
) -> Result<(StatusCode, Json<MeterReading>), ApiError> {
    let mut reading = MeterReading::new(
        req.connection_id,
        req.previous_reading,
        req.current_reading,
        req.reading_date,
        req.billing_month,
        req.billing_year,
    );
    if req.is_estimated {
        reading = reading.estimated();
    }
    let stored = state.engine.record_reading(reading).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn generate_bill(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<gridbill_common::Bill>), ApiError> {
    let bill = match req {
        GenerateRequest {
            reading_id: Some(reading_id),
            ..
        } => state.engine.generate(reading_id).await?,
        GenerateRequest {
            connection_id: Some(connection_id),
            billing_month: Some(billing_month),
            billing_year: Some(billing_year),
            ..
        } => {
            state
                .engine
                .generate_for_connection(connection_id, billing_month, billing_year)
                .await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "provide reading_id, or connection_id with billing_month and billing_year".into(),
            ))
        }
    };
    Ok((StatusCode::CREATED, Json(bill)))
}

async fn generate_bulk(
    State(state): State<AppState>,
    Json(req): Json<GenerateBulkRequest>,
) -> Result<Json<gridbill_engine::BulkReport>, ApiError> {
    let report = state
        .engine
        .clone()
        .generate_bulk(req.billing_month, req.billing_year, &CancelHandle::new())
        .await?;
    Ok(Json(report))
}

async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<gridbill_common::Bill>, ApiError> {
    let bill = state
        .engine
        .bill(bill_id)
        .await?
        .ok_or(GridbillError::Generation(GenerationError::BillNotFound(
            bill_id,
        )))?;
    Ok(Json(bill))
}

async fn list_connections(State(state): State<AppState>) -> Json<Vec<Connection>> {
    Json(state.reference.connections())
}

async fn get_consumer(
    State(state): State<AppState>,
    Path(consumer_id): Path<Uuid>,
) -> Result<Json<Consumer>, ApiError> {
    let consumer = state
        .reference
        .consumer(consumer_id)
        .await?
        .ok_or(GridbillError::Generation(GenerationError::ConsumerNotFound(
            consumer_id,
        )))?;
    Ok(Json(consumer))
}

async fn list_connection_bills(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
) -> Result<Json<Vec<gridbill_common::Bill>>, ApiError> {
    Ok(Json(state.engine.bills_for_connection(connection_id).await?))
}

async fn record_payment(
    State(state): State<AppState>,
    Path(bill_id): Path<Uuid>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<Json<gridbill_common::Bill>, ApiError> {
    Ok(Json(state.engine.record_payment(bill_id, req.amount).await?))
}

// WebSocket handler streaming billing events
async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.engine.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let msg = match serde_json::to_string(&event) {
                Ok(msg) => msg,
                Err(_) => continue,
            };
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}

// ============ DEMO DATA ============

/// Seed reference data and a few unbilled readings so the gateway is usable
/// out of the box
async fn seed_demo_data(state: &AppState) -> anyhow::Result<()> {
    let reference = &state.reference;

    let asha = reference.register_consumer(Consumer::new(
        "Asha Verma",
        "12 Canal Road",
        "asha@example.com",
        "555-0101",
    ));
    let ravi = reference.register_consumer(Consumer::new(
        "Ravi Nair",
        "48 Substation Lane",
        "ravi@example.com",
        "555-0199",
    ));

    let electricity = reference.register_utility_type(UtilityType::new(
        UtilityKind::Electricity,
        "Domestic Electricity",
        1,
    ));
    let water = reference.register_utility_type(UtilityType::new(
        UtilityKind::Water,
        "Municipal Water",
        2,
    ));

    let from = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    reference.register_tariff(
        TariffPlan::new(
            electricity.id,
            "Domestic LT-1 2024",
            dec!(8),
            dec!(50),
            dec!(10),
            dec!(25),
            from,
        )
        .with_slab(Some(dec!(100)), dec!(4))
        .with_slab(Some(dec!(300)), dec!(6))
        .with_slab(None, dec!(8)),
    );
    reference.register_tariff(TariffPlan::new(
        water.id,
        "Municipal Water 2024",
        dec!(2.5),
        dec!(20),
        dec!(5),
        dec!(10),
        from,
    ));

    let conn_a = reference.register_connection(Connection::new(
        asha.id,
        electricity.id,
        "MTR-1001",
        from,
    ));
    let conn_b =
        reference.register_connection(Connection::new(ravi.id, water.id, "MTR-2001", from));

    let reading_date = NaiveDate::from_ymd_opt(2024, 6, 28).expect("valid date");
    state
        .engine
        .record_reading(MeterReading::new(
            conn_a.id,
            dec!(4210),
            dec!(4390),
            reading_date,
            6,
            2024,
        ))
        .await?;
    state
        .engine
        .record_reading(MeterReading::new(
            conn_b.id,
            dec!(880),
            dec!(925),
            reading_date,
            5,
            2024,
        ))
        .await?;

    info!("Seeded demo data: 2 consumers, 2 connections, 2 unbilled readings");
    Ok(())
}

// ============ MAIN ============

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_gateway=info".parse()?)
                .add_directive("gridbill_engine=info".parse()?),
        )
        .json()
        .init();

    dotenvy::dotenv().ok();

    let readings = Arc::new(InMemoryReadingStore::new());
    let bills = Arc::new(InMemoryBillStore::new());
    let reference = Arc::new(InMemoryReferenceProvider::new());

    let engine = Arc::new(BillingEngine::new(
        BillingConfig::from_env(),
        readings as Arc<dyn ReadingStore>,
        bills as Arc<dyn BillStore>,
        reference.clone() as Arc<dyn ReferenceProvider>,
    ));

    let state = AppState { engine, reference };

    // Seed demo data on startup
    seed_demo_data(&state).await?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        // Health
        .route("/health", get(health_check))
        // Readings
        .route("/readings", post(record_reading))
        .route("/readings/unbilled", get(list_unbilled))
        // Billing
        .route("/bills/generate", post(generate_bill))
        .route("/bills/generate-bulk", post(generate_bulk))
        .route("/bills/:bill_id", get(get_bill))
        .route("/bills/:bill_id/payments", post(record_payment))
        // Registry
        .route("/consumers/:consumer_id", get(get_consumer))
        .route("/connections", get(list_connections))
        .route("/connections/:connection_id/bills", get(list_connection_bills))
        // WebSocket
        .route("/ws", get(websocket_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{}", port);
    info!("GridBill API Gateway starting on {}", addr);
    info!("Endpoints: /health, /readings, /bills, /connections, /ws");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
