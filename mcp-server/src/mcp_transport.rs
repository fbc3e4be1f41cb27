//! MCP streaming-HTTP surface. Advertises the same tool ids as the HTTP
//! routes and dispatches into the exact same `ops::` functions, so there is
//! one validator and one persistence path for both transports.
//!
//! The factory `StreamableHttpService` takes has no way to see the request
//! that opened the session, so tools that the HTTP route table marks
//! `Auth: yes` expect a `bearer_token` argument alongside their normal
//! parameters; `lint_code`/`graph_query`/`list_prompts`/`get_prompt` don't,
//! matching the route table's own `Auth: no` column for those four.

use std::borrow::Cow;
use std::sync::Arc;

use axum::Router;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorCode, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::{StreamableHttpServerConfig, StreamableHttpService};
use rmcp::ErrorData as McpError;
use serde_json::{json, Value};

use mcp_audit::{AuditEvent, AuditLog, EventType};
use mcp_auth::role::Permission;
use mcp_core::error::AppError;

use crate::middleware::auth::{authenticate, authorize};
use crate::ops;
use crate::state::AppState;

fn app_error_to_mcp(err: AppError) -> McpError {
    let code = match err {
        AppError::InvalidInput { .. } | AppError::NotFound(_) | AppError::Conflict(_) | AppError::TooLarge => {
            ErrorCode::INVALID_PARAMS
        }
        AppError::Unauthenticated(_) | AppError::PermissionDenied(_) | AppError::RateLimited { .. } => {
            ErrorCode::INVALID_REQUEST
        }
        _ => ErrorCode::INTERNAL_ERROR,
    };
    McpError::new(code, err.to_string(), None)
}

fn tool_result(value: Value) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(value.to_string())],
        structured_content: Some(value),
        is_error: Some(false),
        meta: None,
    }
}

fn schema(properties: Value, required: &[&str]) -> Arc<JsonObject> {
    let value = json!({
        "type": "object",
        "properties": properties,
        "required": required,
    });
    Arc::new(serde_json::from_value(value).expect("schema literal is a valid JSON object"))
}

fn bearer_schema_field() -> Value {
    json!({ "type": "string", "description": "bearer token for a permission-gated tool" })
}

fn tools() -> Vec<Tool> {
    vec![
        Tool::new(
            Cow::Borrowed("lint_code"),
            Cow::Borrowed("Structural lint of a source snippet"),
            schema(
                json!({
                    "source": {"type": "string"},
                    "language": {"type": "string"},
                    "analyzer": {"type": "string"},
                }),
                &["source", "language"],
            ),
        ),
        Tool::new(
            Cow::Borrowed("execute_code"),
            Cow::Borrowed("Run a source snippet in the sandbox"),
            schema(
                json!({
                    "source": {"type": "string"},
                    "language": {"type": "string"},
                    "timeout_seconds": {"type": "integer"},
                    "bearer_token": bearer_schema_field(),
                }),
                &["source", "language", "bearer_token"],
            ),
        ),
        Tool::new(
            Cow::Borrowed("run_tests"),
            Cow::Borrowed("Run a test module in the sandbox"),
            schema(
                json!({
                    "test_source": {"type": "string"},
                    "language": {"type": "string"},
                    "timeout_seconds": {"type": "integer"},
                    "bearer_token": bearer_schema_field(),
                }),
                &["test_source", "language", "bearer_token"],
            ),
        ),
        Tool::new(
            Cow::Borrowed("generate_code"),
            Cow::Borrowed("Render a template against a scalar context"),
            schema(
                json!({
                    "template": {"type": "string"},
                    "context": {"type": "object"},
                    "language": {"type": "string"},
                    "bearer_token": bearer_schema_field(),
                }),
                &["template", "context", "language", "bearer_token"],
            ),
        ),
        Tool::new(
            Cow::Borrowed("graph_upsert"),
            Cow::Borrowed("Upsert nodes and relationships into the graph"),
            schema(
                json!({
                    "nodes": {"type": "array"},
                    "relationships": {"type": "array"},
                    "bearer_token": bearer_schema_field(),
                }),
                &["nodes", "relationships", "bearer_token"],
            ),
        ),
        Tool::new(
            Cow::Borrowed("graph_query"),
            Cow::Borrowed("Run a read-only graph query"),
            schema(
                json!({
                    "query": {"type": "string"},
                    "params": {"type": "object"},
                    "row_limit": {"type": "integer"},
                }),
                &["query"],
            ),
        ),
        Tool::new(
            Cow::Borrowed("list_prompts"),
            Cow::Borrowed("List the prompt library"),
            schema(json!({}), &[]),
        ),
        Tool::new(
            Cow::Borrowed("get_prompt"),
            Cow::Borrowed("Fetch a single prompt by id"),
            schema(json!({"id": {"type": "string"}}), &["id"]),
        ),
    ]
}

#[derive(Clone)]
pub struct McpHandler {
    state: AppState,
}

impl McpHandler {
    fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Authenticates and authorizes a `bearer_token` argument against
    /// `permission`, calling the identical [`crate::middleware::auth`]
    /// functions the HTTP pipeline uses, then charges the rate limiter
    /// keyed to the resulting subject — the same auth-then-rate-limit order
    /// `routes::build`'s route layers apply over HTTP.
    async fn require(
        &self,
        request_id: &str,
        arguments: &serde_json::Map<String, Value>,
        permission: Permission,
    ) -> Result<String, McpError> {
        let token = arguments
            .get("bearer_token")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::new(ErrorCode::INVALID_PARAMS, "missing bearer_token", None))?;
        let ctx = authenticate(&self.state, request_id, token)
            .await
            .map_err(app_error_to_mcp)?;
        authorize(&self.state, request_id, &ctx, permission)
            .await
            .map_err(app_error_to_mcp)?;
        let roles: Vec<String> = ctx.roles.iter().map(|r| r.to_string()).collect();
        self.charge_rate_limit(request_id, Some(&ctx.subject), &roles).await?;
        Ok(ctx.subject)
    }

    /// Charges one request against the rate limiter, keyed exactly like
    /// [`crate::middleware::rate_limit::rate_limit_layer`]
    /// (`mcp_ratelimit::limiter_key`) — an authenticated subject, or an
    /// anonymous bucket when the tool needs no bearer token. There is no
    /// per-connection client address over this transport, so anonymous
    /// calls share one `"mcp"` bucket the way the HTTP layer falls back to
    /// `"unknown"` when `ConnectInfo` is absent.
    async fn charge_rate_limit(&self, request_id: &str, user_id: Option<&str>, roles: &[String]) -> Result<(), McpError> {
        let key = mcp_ratelimit::limiter_key(user_id, "mcp");
        match self.state.rate_limiter.charge(&key, roles) {
            Ok(()) => Ok(()),
            Err(limited) => {
                let _ = AuditLog::new(&self.state.graph)
                    .record(
                        AuditEvent::new(EventType::RateLimited, request_id.to_string())
                            .with_attribute("key", key)
                            .with_attribute("retry_after_secs", limited.retry_after_secs),
                    )
                    .await;
                Err(app_error_to_mcp(AppError::RateLimited {
                    retry_after_secs: limited.retry_after_secs,
                }))
            }
        }
    }
}

impl ServerHandler for McpHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .build(),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: tools(),
                next_cursor: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let arguments = request.arguments.clone().unwrap_or_default();
        let value = Value::Object(arguments.clone().into_iter().collect());

        let parse = |v: Value| serde_json::from_value(v).map_err(|e| McpError::new(ErrorCode::INVALID_PARAMS, e.to_string(), None));

        match request.name.as_ref() {
            "lint_code" => {
                self.charge_rate_limit(&request_id, None, &[]).await?;
                let req = parse(value)?;
                let result = ops::lint_code(&self.state, req).await.map_err(app_error_to_mcp)?;
                Ok(tool_result(result))
            }
            "execute_code" => {
                let subject = self.require(&request_id, &arguments, Permission::TOOLS_EXECUTE).await?;
                let req = parse(value)?;
                let result = ops::execute_code(&self.state, &request_id, req, Some(&subject))
                    .await
                    .map_err(app_error_to_mcp)?;
                Ok(tool_result(result))
            }
            "run_tests" => {
                let subject = self.require(&request_id, &arguments, Permission::TOOLS_TEST).await?;
                let req = parse(value)?;
                let result = ops::run_tests(&self.state, &request_id, req, Some(&subject))
                    .await
                    .map_err(app_error_to_mcp)?;
                Ok(tool_result(result))
            }
            "generate_code" => {
                let _subject = self.require(&request_id, &arguments, Permission::TOOLS_GENERATE).await?;
                let req = parse(value)?;
                let result = ops::generate_code(&self.state, req).await.map_err(app_error_to_mcp)?;
                Ok(tool_result(result))
            }
            "graph_upsert" => {
                let subject = self.require(&request_id, &arguments, Permission::GRAPH_UPSERT).await?;
                let req = parse(value)?;
                let result = ops::graph_upsert(&self.state, &request_id, req, Some(&subject))
                    .await
                    .map_err(app_error_to_mcp)?;
                Ok(tool_result(result))
            }
            "graph_query" => {
                self.charge_rate_limit(&request_id, None, &[]).await?;
                let req = parse(value)?;
                let result = ops::graph_query(&self.state, &request_id, req).await.map_err(app_error_to_mcp)?;
                Ok(tool_result(result))
            }
            "list_prompts" => {
                self.charge_rate_limit(&request_id, None, &[]).await?;
                Ok(tool_result(ops::list_prompts(&self.state)))
            }
            "get_prompt" => {
                self.charge_rate_limit(&request_id, None, &[]).await?;
                let id = arguments
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::new(ErrorCode::INVALID_PARAMS, "missing id", None))?;
                let prompt = ops::get_prompt(&self.state, id).map_err(app_error_to_mcp)?;
                Ok(tool_result(serde_json::to_value(prompt).expect("Prompt always serializes")))
            }
            other => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("unknown tool: {other}"),
                None,
            )),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let service = StreamableHttpService::new(
        move || Ok(McpHandler::new(state.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    Router::new().nest_service("/mcp", service)
}
