use std::sync::Arc;

use anyhow::Context;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hrflow_backend::config::Config;
use hrflow_backend::db::{
    postgres_company_repository::PostgresCompanyRepository,
    postgres_execution_repository::PostgresExecutionRepository,
    postgres_notification_repository::PostgresNotificationRepository,
    postgres_payment_repository::PostgresPaymentRepository,
    postgres_plan_repository::PostgresPlanRepository,
    postgres_processed_event_repository::PostgresProcessedEventRepository,
    postgres_settings_repository::PostgresSettingsRepository,
    postgres_subscription_repository::PostgresSubscriptionRepository,
    postgres_user_repository::PostgresUserRepository,
    postgres_webhook_log_repository::PostgresWebhookLogRepository,
};
use hrflow_backend::responses::JsonResponse;
use hrflow_backend::routes::{
    admin, asaas, company, executions, notifications, onboarding, plans, stripe,
};
use hrflow_backend::services::{
    asaas::{AsaasService, LiveAsaasService},
    client_cache::ClientCache,
    settings::SettingsService,
    stripe::{LiveStripeService, StripeService},
};
use hrflow_backend::utils::jwt::JwtKeys;
use hrflow_backend::{worker, AppState};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing();

    let jwt_keys = JwtKeys::from_env().context("invalid JWT secret")?;

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .context("invalid global rate limiter settings")?,
    );

    // Provider retries arrive in bursts; allow them but cap abuse.
    let webhook_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(50)
            .burst_size(100)
            .error_handler(|_err| {
                JsonResponse::too_many_requests("Too many webhook deliveries").into_response()
            })
            .finish()
            .context("invalid webhook rate limiter settings")?,
    );

    let global_limiter = global_governor_conf.limiter().clone();
    let webhook_limiter = webhook_governor_conf.limiter().clone();
    let retainers: [Box<dyn Fn() + Send + Sync>; 2] = [
        Box::new(move || global_limiter.retain_recent()),
        Box::new(move || webhook_limiter.retain_recent()),
    ];
    for retain_recent in retainers {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                ticker.tick().await;
                retain_recent();
            }
        });
    }

    let pg_pool = establish_connection(&config.database_url).await?;
    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("failed to run migrations")?;

    let settings = Arc::new(SettingsService::new(
        Arc::new(PostgresSettingsRepository {
            pool: pg_pool.clone(),
        }),
        config.settings_encryption_key.clone(),
        config.stripe.clone(),
        config.asaas.clone(),
    ));

    let http_client = Client::new();
    let asaas_base_url = config.asaas.base_url.clone();
    let stripe_clients = ClientCache::<dyn StripeService>::new(Arc::new(|secret: &str| {
        Arc::new(LiveStripeService::new(secret)) as Arc<dyn StripeService>
    }));
    let asaas_clients = ClientCache::<dyn AsaasService>::new(Arc::new(move |api_key: &str| {
        Arc::new(LiveAsaasService::new(
            http_client.clone(),
            asaas_base_url.clone(),
            api_key,
        )) as Arc<dyn AsaasService>
    }));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .context("FRONTEND_ORIGIN is not a valid header value")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let bind_addr = config.bind_addr;
    let state = AppState {
        companies: Arc::new(PostgresCompanyRepository {
            pool: pg_pool.clone(),
        }),
        users: Arc::new(PostgresUserRepository {
            pool: pg_pool.clone(),
        }),
        subscriptions: Arc::new(PostgresSubscriptionRepository {
            pool: pg_pool.clone(),
        }),
        payments: Arc::new(PostgresPaymentRepository {
            pool: pg_pool.clone(),
        }),
        plans: Arc::new(PostgresPlanRepository {
            pool: pg_pool.clone(),
        }),
        webhook_logs: Arc::new(PostgresWebhookLogRepository {
            pool: pg_pool.clone(),
        }),
        notifications: Arc::new(PostgresNotificationRepository {
            pool: pg_pool.clone(),
        }),
        processed_events: Arc::new(PostgresProcessedEventRepository {
            pool: pg_pool.clone(),
        }),
        executions: Arc::new(PostgresExecutionRepository {
            pool: pg_pool.clone(),
        }),
        settings,
        stripe: Arc::new(stripe_clients),
        asaas: Arc::new(asaas_clients),
        config: Arc::new(config),
        jwt_keys: Arc::new(jwt_keys),
    };
    let state_for_worker = state.clone();

    // Provider callbacks: authenticated by signature/token, never by session.
    let webhook_routes = Router::new()
        .route("/stripe/webhook", post(stripe::webhook))
        .route("/asaas/webhook", post(asaas::webhook))
        .layer(GovernorLayer {
            config: webhook_governor_conf,
        });

    let billing_routes = Router::new()
        .route("/plans", get(plans::list_plans))
        .route("/stripe/checkout-session", post(stripe::create_checkout_session))
        .route("/asaas/subscriptions", post(asaas::create_subscription))
        .route("/onboarding/company", post(onboarding::create_company))
        .route("/company/access", get(company::access))
        .route("/company/billing", get(company::billing_overview))
        .route("/executions", post(executions::run_execution))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        });

    let admin_routes = Router::new()
        .route("/subscriptions/check-expired", post(admin::check_expired))
        .route(
            "/subscriptions/validate",
            post(admin::validate_subscriptions),
        )
        .route("/companies/{id}/plan", post(admin::set_company_plan))
        .route(
            "/companies/{id}/cancel",
            post(admin::cancel_company_subscription),
        )
        .route("/webhook-logs", get(admin::list_webhook_logs))
        .route(
            "/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        });

    let app = Router::new()
        .route("/", get(root))
        .nest("/api", webhook_routes.merge(billing_routes))
        .nest("/api/admin", admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    worker::start_background_workers(state_for_worker).await;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}

/// Health check.
async fn root() -> Response {
    JsonResponse::success("HR billing backend is running").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    info!("connected to the database");
    Ok(pool)
}
