use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokengate_core::{OwnershipReport, VerificationCoordinator};
use tokengate_ledger::ChallengeStore;
use tokengate_types::{VerificationError, VERIFICATION_MESSAGE};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<VerificationCoordinator>,
    pub store: Arc<dyn ChallengeStore>,
    pub node_id: String,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    uptime_secs: u64,
    pending_challenges: usize,
    req_total: u64,
}

#[derive(Debug, Deserialize)]
struct VerifyPageParams {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "walletAddress", alias = "wallet_address")]
    wallet_address: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    success: bool,
    message: String,
    /// Redacted wallet form only.
    wallet: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        // User-readable message only; underlying causes stay in the logs.
        let status = match err {
            VerificationError::ExpiredOrInvalidToken
            | VerificationError::SignatureMismatch
            | VerificationError::NoQualifyingAsset
            | VerificationError::MalformedRequest => StatusCode::BAD_REQUEST,
            VerificationError::RoleNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            VerificationError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("verification HTTP server listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("verification HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/verify", get(handle_verify_page))
        .route("/api/verify", post(handle_submit))
        .route("/api/wallet/:address", get(handle_check_wallet))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        uptime_secs: state.uptime_seconds(),
        pending_challenges: state.store.pending(),
        req_total,
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let req_total = state.record_request();
    let uptime = state.uptime_seconds();
    let pending = state.store.pending();

    let mut metrics =
        "# HELP tokengate_http_requests_total Total number of HTTP requests handled\n".to_string();
    metrics.push_str("# TYPE tokengate_http_requests_total counter\n");
    metrics.push_str(&format!("tokengate_http_requests_total {req_total}\n"));
    metrics.push_str("# HELP tokengate_uptime_seconds Uptime of the service in seconds\n");
    metrics.push_str("# TYPE tokengate_uptime_seconds gauge\n");
    metrics.push_str(&format!("tokengate_uptime_seconds {uptime}\n"));
    metrics.push_str("# HELP tokengate_pending_challenges Currently pending challenges\n");
    metrics.push_str("# TYPE tokengate_pending_challenges gauge\n");
    metrics.push_str(&format!("tokengate_pending_challenges {pending}\n"));

    let mut response = Response::new(Body::from(metrics));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

/// Tokens are lowercase hex, fixed width. Anything else never came from the
/// ledger and is not interpolated into the page.
fn is_well_formed_token(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

async fn handle_verify_page(
    State(state): State<SharedState>,
    Query(params): Query<VerifyPageParams>,
) -> Result<Html<String>, ApiError> {
    state.record_request();

    let token = params
        .token
        .filter(|token| is_well_formed_token(token))
        .ok_or_else(|| ApiError::bad_request("verification link is invalid or has expired"))?;

    let message_literal = serde_json::to_string(VERIFICATION_MESSAGE)
        .unwrap_or_else(|_| "\"\"".to_string());

    let page = VERIFY_PAGE_TEMPLATE
        .replace("__TOKEN__", &token)
        .replace("__MESSAGE__", &message_literal);
    Ok(Html(page))
}

async fn handle_submit(
    State(state): State<SharedState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    state.record_request();

    let (token, wallet, signature) = match (
        request.token.as_deref(),
        request.wallet_address.as_deref(),
        request.signature.as_deref(),
    ) {
        (Some(token), Some(wallet), Some(signature))
            if !token.is_empty() && !wallet.is_empty() && !signature.is_empty() =>
        {
            (token, wallet, signature)
        }
        _ => return Err(VerificationError::MalformedRequest.into()),
    };

    let confirmation = state.coordinator.submit(token, wallet, signature).await?;

    Ok(Json(VerifyResponse {
        success: true,
        message: format!(
            "Wallet verified; role {} granted in {}",
            confirmation.role_id, confirmation.community_id
        ),
        wallet: confirmation.wallet,
    }))
}

async fn handle_check_wallet(
    State(state): State<SharedState>,
    AxumPath(address): AxumPath<String>,
) -> Result<Json<OwnershipReport>, ApiError> {
    state.record_request();
    let report = state.coordinator.check_wallet(&address).await?;
    Ok(Json(report))
}

const VERIFY_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Wallet Verification</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {
            font-family: Arial, sans-serif;
            max-width: 520px;
            margin: 60px auto;
            padding: 20px;
            background: #f5f5f5;
        }
        .container {
            background: white;
            padding: 30px;
            border-radius: 8px;
            box-shadow: 0 2px 4px rgba(0,0,0,0.1);
        }
        h1 {
            color: #333;
            border-bottom: 3px solid #4CAF50;
            padding-bottom: 10px;
        }
        button {
            background: #4CAF50;
            color: white;
            border: none;
            padding: 12px 24px;
            border-radius: 4px;
            font-size: 1em;
            cursor: pointer;
        }
        button:disabled { background: #9e9e9e; }
        #status { margin-top: 16px; color: #555; }
        #status.error { color: #c62828; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Verify your wallet</h1>
        <p>Connect your wallet and sign a message to prove ownership.
           The signature costs no gas and triggers no transaction.</p>
        <button id="connect">Connect wallet and sign</button>
        <p id="status"></p>
    </div>
    <script>
        const token = "__TOKEN__";
        const message = __MESSAGE__;
        const button = document.getElementById("connect");
        const status = document.getElementById("status");

        button.addEventListener("click", async () => {
            status.classList.remove("error");
            if (!window.ethereum) {
                status.textContent = "No wallet extension found.";
                status.classList.add("error");
                return;
            }
            button.disabled = true;
            try {
                const accounts = await window.ethereum.request({ method: "eth_requestAccounts" });
                const wallet = accounts[0];
                status.textContent = "Waiting for signature…";
                const signature = await window.ethereum.request({
                    method: "personal_sign",
                    params: [message, wallet],
                });
                status.textContent = "Verifying…";
                const response = await fetch("/api/verify", {
                    method: "POST",
                    headers: { "Content-Type": "application/json" },
                    body: JSON.stringify({ token, walletAddress: wallet, signature }),
                });
                const body = await response.json();
                if (response.ok) {
                    status.textContent = body.message + " (" + body.wallet + ")";
                } else {
                    status.textContent = body.error;
                    status.classList.add("error");
                }
            } catch (err) {
                status.textContent = "Verification was cancelled or failed.";
                status.classList.add("error");
            } finally {
                button.disabled = false;
            }
        });
    </script>
</body>
</html>
"#;

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use k256::ecdsa::SigningKey;
    use parking_lot::RwLock;
    use rand::rngs::OsRng;
    use std::collections::HashMap;
    use tokengate_chain::{ChainError, OwnershipCheck, OwnershipOracle};
    use tokengate_crypto::{address_of_key, sign_personal_message};
    use tokengate_gateway::StubRoleGateway;
    use tokengate_ledger::MemoryChallengeStore;
    use tokengate_types::{CommunityId, IdentityId, RoleId};
    use tower::ServiceExt;

    #[derive(Default)]
    struct ScriptedOracle {
        balances: RwLock<HashMap<String, u128>>,
    }

    #[async_trait]
    impl OwnershipOracle for ScriptedOracle {
        async fn check(&self, address: &str) -> Result<OwnershipCheck, ChainError> {
            let balance = self
                .balances
                .read()
                .get(&address.to_lowercase())
                .copied()
                .unwrap_or(0);
            Ok(OwnershipCheck {
                balance,
                matched_token_ids: Vec::new(),
            })
        }

        fn collection(&self) -> String {
            "0x0123…4567".to_string()
        }
    }

    struct TestContext {
        router: Router,
        store: Arc<MemoryChallengeStore>,
        oracle: Arc<ScriptedOracle>,
    }

    fn test_context() -> TestContext {
        let store = Arc::new(MemoryChallengeStore::new());
        let oracle = Arc::new(ScriptedOracle::default());
        let gateway = Arc::new(StubRoleGateway::new());
        let community = CommunityId::new("G1");
        let role = RoleId::new("holder");
        gateway.define_role(community, role.clone());

        let coordinator = Arc::new(VerificationCoordinator::new(
            store.clone(),
            oracle.clone(),
            gateway,
            role,
        ));

        let state = AppState {
            coordinator,
            store: store.clone(),
            node_id: "test-node".to_string(),
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
        };

        TestContext {
            router: build_router(Arc::new(state)),
            store,
            oracle,
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_verify(payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/verify")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_pending_challenges() {
        let ctx = test_context();
        ctx.store
            .issue(IdentityId::new("u"), CommunityId::new("c"));

        let response = ctx
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pending_challenges"], 1);
    }

    #[tokio::test]
    async fn valid_submission_returns_success_with_redacted_wallet() {
        let ctx = test_context();
        let key = SigningKey::random(&mut OsRng);
        let wallet = address_of_key(key.verifying_key());
        ctx.oracle
            .balances
            .write()
            .insert(wallet.to_lowercase(), 1);

        let token = ctx
            .store
            .issue(IdentityId::new("U1"), CommunityId::new("G1"));
        let signature = sign_personal_message(VERIFICATION_MESSAGE, &key).unwrap();

        let response = ctx
            .router
            .oneshot(post_verify(serde_json::json!({
                "token": token,
                "walletAddress": wallet,
                "signature": signature,
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        let echoed = body["wallet"].as_str().unwrap();
        assert!(echoed.contains('…'));
        assert_ne!(echoed, wallet);
    }

    #[tokio::test]
    async fn unknown_token_maps_to_400() {
        let ctx = test_context();
        let response = ctx
            .router
            .oneshot(post_verify(serde_json::json!({
                "token": "00".repeat(32),
                "walletAddress": "0x0000000000000000000000000000000000000001",
                "signature": "0x00",
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("invalid"));
    }

    #[tokio::test]
    async fn missing_fields_map_to_400() {
        let ctx = test_context();
        let response = ctx
            .router
            .oneshot(post_verify(serde_json::json!({ "token": "abc" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_page_embeds_the_token() {
        let ctx = test_context();
        let token = ctx
            .store
            .issue(IdentityId::new("U1"), CommunityId::new("G1"));

        let response = ctx
            .router
            .oneshot(
                Request::get(format!("/verify?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains(&token));
        assert!(page.contains("personal_sign"));
    }

    #[tokio::test]
    async fn verify_page_rejects_malformed_tokens() {
        let ctx = test_context();
        for uri in ["/verify", "/verify?token=nothex", "/verify?token=abc123"] {
            let response = ctx
                .router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn wallet_check_endpoint_reports_holdings() {
        let ctx = test_context();
        let wallet = "0x00000000000000000000000000000000000000aa";
        ctx.oracle.balances.write().insert(wallet.to_string(), 2);

        let response = ctx
            .router
            .oneshot(
                Request::get(format!("/api/wallet/{wallet}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["holds"], true);
        assert!(body["collection"].as_str().unwrap().contains('…'));
    }
}
