use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;

use crate::handlers::{
    AnalysisError, AnalyzeMealRequest, GroupInviteHandler, GroupInviteRequest, InviteError,
    MealAnalysisHandler,
};
use crate::models::HealthStatus;

/// Photos arrive as base64 data URLs, so allow generous bodies.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

const ALLOW_METHODS: &str = "GET,OPTIONS,PATCH,DELETE,POST,PUT";
const ALLOW_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, Content-MD5, Content-Type, Date, X-Api-Version";

pub struct AppState {
    pub meal_analysis: Arc<MealAnalysisHandler>,
    pub group_invites: Arc<GroupInviteHandler>,
    /// Include error chains in 500 responses.
    pub dev_mode: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

/// JSON error response. Every failure leaves the server through here.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error,
                message: None,
                stack: None,
            },
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.body.message = Some(message.into());
        self
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    pub fn from_analysis(err: AnalysisError, dev_mode: bool) -> Self {
        match err {
            AnalysisError::MissingImage => {
                Self::new(StatusCode::BAD_REQUEST, "No image data provided")
            }
            AnalysisError::MissingCredential(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
                    .with_message(err.to_string())
            }
            AnalysisError::Provider(_) | AnalysisError::Parse(_) => {
                let message = err.to_string();
                let mut api_error = Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze meal")
                    .with_message(message);
                if dev_mode {
                    api_error.body.stack = Some(format!("{:?}", anyhow::Error::new(err)));
                }
                api_error
            }
        }
    }

    pub fn from_invite(err: InviteError) -> Self {
        match err {
            InviteError::MissingFields => {
                Self::new(StatusCode::BAD_REQUEST, "Missing required fields")
            }
            InviteError::NotConfigured => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error")
                    .with_message(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn create_router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .route("/api/health", get(health_check).fallback(method_not_allowed))
        .route("/api/analyze-meal", post(analyze_meal).fallback(method_not_allowed))
        .route(
            "/api/send-group-invite",
            post(send_group_invite).fallback(method_not_allowed),
        )
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(cors))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Permissive CORS on every response; pre-flight requests stop here.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );

    response
}

/// Lenient body parsing: anything that is not JSON reads as `{}`.
fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        if !body.is_empty() {
            log::warn!("⚠️ Request body is not valid JSON: {}", e);
        }
        Value::Object(Default::default())
    })
}

async fn analyze_meal(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = AnalyzeMealRequest::from_json(&parse_body(&body));

    match state.meal_analysis.analyze(request).await {
        Ok(estimate) => (StatusCode::OK, Json(estimate)).into_response(),
        Err(e) => {
            log::error!("❌ Analysis error: {}", e);
            ApiError::from_analysis(e, state.dev_mode).into_response()
        }
    }
}

async fn send_group_invite(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = GroupInviteRequest::from_json(&parse_body(&body));

    match state.group_invites.send_invites(request).await {
        Ok(report) if report.is_partial() => (StatusCode::MULTI_STATUS, Json(report)).into_response(),
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            log::error!("❌ Invite send error: {}", e);
            ApiError::from_invite(e).into_response()
        }
    }
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        message: "Meal Tracker API is running",
        timestamp: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
    })
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretStore;
    use crate::models::ImagePayload;
    use crate::services::catalog::ModelConfig;
    use crate::services::email::{EmailService, MailerCredentials, OutgoingEmail};
    use crate::services::error::ProviderError;
    use crate::services::{
        build_http_client, ModelCatalog, ProviderClient, ProviderEndpoints, VisionService,
    };
    use axum::body::Body;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CannedVision(Result<&'static str, u16>);

    #[async_trait::async_trait]
    impl VisionService for CannedVision {
        async fn analyze_image(
            &self,
            _model: &ModelConfig,
            _api_key: &str,
            _image: &ImagePayload,
        ) -> Result<String, ProviderError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(ProviderError::Status {
                    provider: "Anthropic",
                    status,
                    body: "overloaded".to_string(),
                }),
            }
        }
    }

    struct BouncingMailer;

    #[async_trait::async_trait]
    impl EmailService for BouncingMailer {
        async fn send_email(
            &self,
            _credentials: &MailerCredentials,
            email: &OutgoingEmail,
        ) -> Result<(), ProviderError> {
            if email.to.starts_with("bounce") {
                Err(ProviderError::Status {
                    provider: "Resend",
                    status: 422,
                    body: "invalid recipient".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    const SALAD_REPLY: &str = "```json\n{\"name\":\"Salad\",\"items\":[\"lettuce\",\"tomato\"],\"calories\":150,\"protein\":3,\"carbs\":10,\"fat\":5,\"fiber\":4}\n```";

    fn app_with(vision: impl VisionService + 'static, secrets: &[(&str, &str)], dev_mode: bool) -> Router {
        let secrets: HashMap<String, String> = secrets
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let secrets: Arc<dyn SecretStore> = Arc::new(secrets);

        let state = Arc::new(AppState {
            meal_analysis: Arc::new(MealAnalysisHandler::new(
                Arc::new(ModelCatalog::default()),
                secrets.clone(),
                Arc::new(vision),
            )),
            group_invites: Arc::new(GroupInviteHandler::new(
                secrets,
                Arc::new(BouncingMailer),
                "CTRL-ALT-FIT".to_string(),
            )),
            dev_mode,
        });

        create_router(state, "public-test-missing")
    }

    fn app() -> Router {
        app_with(
            CannedVision(Ok(SALAD_REPLY)),
            &[
                ("ANTHROPIC_API_KEY", "sk-ant"),
                ("RESEND_API_KEY", "re_test"),
                ("INVITE_FROM_EMAIL", "invites@example.com"),
            ],
            false,
        )
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors_headers(response: &Response) {
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], ALLOW_METHODS);
        assert_eq!(headers["access-control-allow-headers"], ALLOW_HEADERS);
    }

    #[tokio::test]
    async fn test_analyze_meal_sample() {
        let response = app()
            .oneshot(post_json(
                "/api/analyze-meal",
                r#"{"imageData":"data:image/jpeg;base64,AAAA"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors_headers(&response);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({
                "name": "Salad",
                "items": ["lettuce", "tomato"],
                "calories": 150,
                "protein": 3,
                "carbs": 10,
                "fat": 5,
                "fiber": 4
            })
        );
    }

    #[tokio::test]
    async fn test_missing_image_is_bad_request() {
        let response = app()
            .oneshot(post_json("/api/analyze-meal", r#"{"model":"gpt-4o-mini"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({"error": "No image data provided"})
        );
    }

    #[tokio::test]
    async fn test_garbage_body_is_bad_request() {
        let response = app()
            .oneshot(post_json("/api/analyze-meal", "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/api/analyze-meal")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_cors_headers(&response);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({"error": "Method not allowed"})
        );
    }

    #[tokio::test]
    async fn test_preflight_on_any_endpoint() {
        for uri in ["/api/analyze-meal", "/api/health", "/api/send-group-invite", "/anything"] {
            let request = axum::http::Request::builder()
                .method("OPTIONS")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_cors_headers(&response);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let app = app_with(CannedVision(Ok(SALAD_REPLY)), &[], false);
        let response = app
            .oneshot(post_json(
                "/api/analyze-meal",
                r#"{"imageData":"AAAA","model":"gemini-2.5-flash"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({
                "error": "Server configuration error",
                "message": "GEMINI_API_KEY or GOOGLE_API_KEY not configured"
            })
        );
    }

    #[tokio::test]
    async fn test_provider_failure_hides_stack_in_production() {
        let app = app_with(CannedVision(Err(529)), &[("ANTHROPIC_API_KEY", "sk-ant")], false);
        let response = app
            .oneshot(post_json("/api/analyze-meal", r#"{"imageData":"AAAA"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Failed to analyze meal");
        assert_eq!(body["message"], "Anthropic error (529): overloaded");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_provider_timeout_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let http = build_http_client(Duration::from_millis(200)).unwrap();
        let endpoints = ProviderEndpoints {
            anthropic: server.uri(),
            openai: server.uri(),
            gemini: server.uri(),
        };
        let app = app_with(
            ProviderClient::new(http, endpoints),
            &[("ANTHROPIC_API_KEY", "sk-ant")],
            false,
        );
        let response = app
            .oneshot(post_json("/api/analyze-meal", r#"{"imageData":"AAAA"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Failed to analyze meal");
        assert_eq!(body["message"], "Anthropic request timed out");
    }

    #[tokio::test]
    async fn test_parse_failure_includes_stack_in_development() {
        let app = app_with(
            CannedVision(Ok("Sorry, I can't tell what this is.")),
            &[("ANTHROPIC_API_KEY", "sk-ant")],
            true,
        );
        let response = app
            .oneshot(post_json("/api/analyze-meal", r#"{"imageData":"AAAA"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Failed to analyze meal");
        assert!(body["message"].as_str().unwrap().contains("no JSON boundaries found"));
        assert!(body["stack"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Meal Tracker API is running");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_group_invite_full_success() {
        let response = app()
            .oneshot(post_json(
                "/api/send-group-invite",
                r#"{"emails":["a@example.com","b@example.com"],"groupName":"Lifters","inviteUrl":"https://example.com/j"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, serde_json::json!({"sent": 2}));
    }

    #[tokio::test]
    async fn test_group_invite_partial_success() {
        let response = app()
            .oneshot(post_json(
                "/api/send-group-invite",
                r#"{"emails":["a@example.com","bounce@example.com"],"groupName":"Lifters","inviteUrl":"https://example.com/j"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({
                "sent": 1,
                "failed": [{"email": "bounce@example.com", "error": "invalid recipient"}]
            })
        );
    }

    #[tokio::test]
    async fn test_group_invite_validation_and_config() {
        let response = app()
            .oneshot(post_json("/api/send-group-invite", r#"{"emails":[],"groupName":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            serde_json::json!({"error": "Missing required fields"})
        );

        let unconfigured = app_with(CannedVision(Ok("{}")), &[], false);
        let response = unconfigured
            .oneshot(post_json(
                "/api/send-group-invite",
                r#"{"emails":["a@example.com"],"groupName":"Lifters","inviteUrl":"https://example.com/j"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(response).await["error"], "Server configuration error");
    }
}
