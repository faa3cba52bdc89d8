use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, StoreBackend};
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::handlers::{protected, public};
use crate::mail::{self, Mailer};
use crate::middleware::session_auth_middleware;
use crate::services::documents::DocumentService;
use crate::services::membership::MembershipService;
use crate::services::messages::MessageService;
use crate::services::news::NewsService;
use crate::services::notifier::Notifier;
use crate::services::organizations::OrganizationService;
use crate::services::reports::ReportService;
use crate::services::sessions::SessionService;
use crate::services::tasks::TaskService;
use crate::services::users::UserService;

/// Shared handles cloned into every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        Self {
            store,
            mailer,
            config: Arc::new(config),
        }
    }

    /// Build the configured store backend and mail transport.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.store {
            StoreBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database)?;
                if config.database.run_migrations {
                    DatabaseManager::migrate(&pool).await?;
                }
                Arc::new(PgStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; all data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };
        let mailer = mail::from_config(&config.mail)?;
        Ok(Self::new(store, mailer, config))
    }

    pub fn sessions(&self) -> SessionService<'_> {
        SessionService::new(self.store.as_ref(), &self.config)
    }

    pub fn membership(&self) -> MembershipService<'_> {
        MembershipService::new(self.store.as_ref(), self.mailer.as_ref(), &self.config)
    }

    pub fn documents(&self) -> DocumentService<'_> {
        DocumentService::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn organizations(&self) -> OrganizationService<'_> {
        OrganizationService::new(self.store.as_ref())
    }

    pub fn users(&self) -> UserService<'_> {
        UserService::new(self.store.as_ref(), self.mailer.as_ref(), &self.config)
    }

    pub fn notifier(&self) -> Notifier<'_> {
        Notifier::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn news(&self) -> NewsService<'_> {
        NewsService::new(self.store.as_ref())
    }

    pub fn tasks(&self) -> TaskService<'_> {
        TaskService::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn messages(&self) -> MessageService<'_> {
        MessageService::new(self.store.as_ref(), self.mailer.as_ref())
    }

    pub fn reports(&self) -> ReportService<'_> {
        ReportService::new(self.store.as_ref())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .merge(auth_public_routes())
        // Session required
        .merge(auth_routes())
        .merge(organization_routes())
        .merge(user_routes())
        .merge(application_routes())
        .merge(document_routes())
        .merge(notification_routes())
        .merge(news_routes())
        .merge(task_routes())
        .merge(message_routes())
        .merge(report_routes())
        .layer(from_fn_with_state(state.clone(), session_auth_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/permissions", get(auth::permissions))
        .route("/api/auth/password", put(auth::change_password))
}

fn organization_routes() -> Router<AppState> {
    use protected::organizations;

    Router::new()
        .route("/api/organizations", get(organizations::list).post(organizations::create))
        .route("/api/organizations/tree", get(organizations::tree))
        .route(
            "/api/organizations/:id",
            get(organizations::show)
                .put(organizations::update)
                .delete(organizations::delete),
        )
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", get(users::show).put(users::update).delete(users::delete))
}

fn application_routes() -> Router<AppState> {
    use protected::applications;

    Router::new()
        .route("/api/applications", get(applications::list).post(applications::create))
        .route(
            "/api/applications/:id",
            get(applications::show)
                .put(applications::update)
                .delete(applications::delete),
        )
        .route("/api/applications/:id/documents", post(applications::add_document))
        .route(
            "/api/applications/:id/documents/:document_id/sign",
            post(applications::sign_document),
        )
        .route(
            "/api/applications/:id/documents/:document_id/send",
            post(applications::send_document),
        )
        .route("/api/applications/:id/validate", post(applications::validate))
        .route("/api/applications/:id/fees", put(applications::set_fees))
}

fn document_routes() -> Router<AppState> {
    use protected::documents;

    Router::new()
        .route("/api/documents", get(documents::list).post(documents::create))
        .route("/api/documents/:id", get(documents::show))
        .route(
            "/api/documents/:id/participants/:user_id",
            put(documents::set_participant_status),
        )
}

fn notification_routes() -> Router<AppState> {
    use protected::notifications;

    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::read_all))
        .route("/api/notifications/:id/read", post(notifications::read))
}

fn news_routes() -> Router<AppState> {
    use protected::news;

    Router::new()
        .route("/api/news", get(news::list).post(news::create))
        .route("/api/news/:id", put(news::update).delete(news::delete))
}

fn task_routes() -> Router<AppState> {
    use protected::tasks;

    Router::new()
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/:id", axum::routing::delete(tasks::delete))
        .route("/api/tasks/:id/status", put(tasks::update_status))
}

fn message_routes() -> Router<AppState> {
    use protected::messages;

    Router::new()
        .route("/api/messages", get(messages::list).post(messages::send))
        .route("/api/messages/:id/read", post(messages::read))
}

fn report_routes() -> Router<AppState> {
    use protected::reports;

    Router::new().route("/api/reports/membership", get(reports::membership))
}
