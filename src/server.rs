use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderValue,
};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{Instrument, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::PipelineError;
#[cfg(feature = "otel")]
use crate::observability::otel::OtlpExporter;
use crate::pipeline::{TaskPipeline, TaskStore};
use crate::readiness::{ProcessClock, Readiness, ReadinessGate, now_seconds};
use crate::tracer::{LogExporter, StageTracer};
use crate::waveform;

const TASKS_PATH: &str = "/api/tasks";
const HEALTH_PATH: &str = "/api/health";
const READY_PATH: &str = "/api/ready";
const METRICS_PATH: &str = "/api/metrics";
const CONFIG_PATH: &str = "/api/config";

/// Shared handles every request handler needs.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<TaskPipeline>,
    readiness: Arc<ReadinessGate>,
    firstname: Arc<str>,
}

impl AppState {
    pub fn new(pipeline: TaskPipeline, readiness: ReadinessGate, firstname: &str) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            readiness: Arc::new(readiness),
            firstname: Arc::from(firstname),
        }
    }

    /// Wires the pipeline, span exporters and readiness gate from `config`.
    pub fn from_config(config: &ServiceConfig, otlp_exporting: bool) -> Self {
        let mut tracer = StageTracer::new().with_exporter(Arc::new(LogExporter));
        #[cfg(feature = "otel")]
        if otlp_exporting {
            tracer = tracer.with_exporter(Arc::new(OtlpExporter::global()));
        }
        #[cfg(not(feature = "otel"))]
        let _ = otlp_exporting;

        let pipeline = TaskPipeline::new(
            Arc::new(TaskStore::new()),
            tracer,
            config.latency_source(),
        );
        let readiness = ReadinessGate::from_clock(ProcessClock::global(), config.ready_after);
        Self::new(pipeline, readiness, &config.firstname)
    }

    pub fn pipeline(&self) -> &TaskPipeline {
        &self.pipeline
    }
}

pub struct TaskServer {
    listener: TcpListener,
    address: SocketAddr,
    state: AppState,
}

impl TaskServer {
    pub fn bind(listen: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(listen)
            .with_context(|| format!("Failed to bind HTTP listener on {listen}"))?;
        let address = listener.local_addr().unwrap_or(listen);
        Ok(Self {
            listener,
            address,
            state,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let state = self.state;
        let make_svc = make_service_fn(move |_| {
            let state = state.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    let state = state.clone();
                    async move { handle_request(req, state).await }
                }))
            }
        });

        let server = hyper::Server::from_tcp(self.listener)
            .context("Failed to adopt HTTP listener")?
            .serve(make_svc)
            .with_graceful_shutdown(shutdown);

        info!(address = %self.address, "Task intake service listening");
        server.await.context("HTTP server error")
    }
}

#[derive(Debug, Default, Deserialize)]
struct TaskBody {
    task: Option<String>,
}

pub async fn handle_request(
    req: Request<Body>,
    state: AppState,
) -> Result<Response<Body>, hyper::Error> {
    let span = tracing::info_span!(
        "http.request",
        method = %req.method(),
        path = req.uri().path(),
        status = tracing::field::Empty,
    );
    let response = route(req, state).instrument(span.clone()).await?;
    span.record("status", response.status().as_u16());
    Ok(with_cors(response))
}

async fn route(req: Request<Body>, state: AppState) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::OPTIONS && path.starts_with("/api/") {
        return Ok(empty(StatusCode::NO_CONTENT));
    }

    let response = match (method, path.as_str()) {
        (Method::GET, TASKS_PATH) => list_tasks(&state),
        (Method::POST, TASKS_PATH) => {
            let body = read_task_body(req).await?;
            add_task(body, &state).await
        }
        (Method::DELETE, TASKS_PATH) => {
            let body = read_task_body(req).await?;
            delete_task(body, &state)
        }
        (Method::GET, HEALTH_PATH) => empty(StatusCode::OK),
        (Method::GET, READY_PATH) => readiness(&state),
        (Method::GET, METRICS_PATH) => metrics(),
        (Method::GET, CONFIG_PATH) => json_response(
            StatusCode::OK,
            &json!({ "firstname": state.firstname.as_ref() }),
        ),
        (_, TASKS_PATH | HEALTH_PATH | READY_PATH | METRICS_PATH | CONFIG_PATH) => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "Method not allowed" }),
        ),
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not found" })),
    };
    Ok(response)
}

/// Malformed or non-object bodies read as "no task".
async fn read_task_body(req: Request<Body>) -> Result<TaskBody, hyper::Error> {
    let bytes = hyper::body::to_bytes(req.into_body()).await?;
    Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        warn!(error = %err, "Ignoring unparseable task body");
        TaskBody::default()
    }))
}

fn list_tasks(state: &AppState) -> Response<Body> {
    match state.pipeline.list() {
        Ok(tasks) => json_response(StatusCode::OK, &json!(tasks)),
        Err(err) => error_response(&err),
    }
}

async fn add_task(body: TaskBody, state: &AppState) -> Response<Body> {
    let pipeline = state.pipeline.clone();
    let span = tracing::Span::current();
    // Stage latencies are blocking sleeps; keep them off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        span.in_scope(|| pipeline.submit(body.task.as_deref()))
    })
    .await;

    match outcome {
        Ok(Ok(receipt)) => {
            info!(task_id = receipt.task_id, "Task added");
            json_response(
                StatusCode::CREATED,
                &json!({ "message": "Task added successfully!" }),
            )
        }
        Ok(Err(err)) => error_response(&err),
        Err(join_err) => {
            error_response(&PipelineError::internal("pipeline", join_err.to_string()))
        }
    }
}

fn delete_task(body: TaskBody, state: &AppState) -> Response<Body> {
    let Some(task) = body.task else {
        return deleted();
    };
    match state.pipeline.delete(&task) {
        Ok(_) => deleted(),
        Err(err) => error_response(&err),
    }
}

fn deleted() -> Response<Body> {
    json_response(
        StatusCode::OK,
        &json!({ "message": "Task deleted successfully!" }),
    )
}

fn readiness(state: &AppState) -> Response<Body> {
    match state.readiness.check(now_seconds()) {
        ready @ Readiness::Ready => {
            json_response(StatusCode::OK, &json!({ "status": ready.message() }))
        }
        not_ready @ Readiness::NotReady { .. } => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "status": not_ready.message() }),
        ),
    }
}

fn metrics() -> Response<Body> {
    let sample = waveform::sample(now_seconds());
    let mut response = Response::new(Body::from(sample.to_prometheus()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn error_response(err: &PipelineError) -> Response<Body> {
    if let PipelineError::Internal { .. } = err {
        error!(error = %err, "Request failed");
    }
    json_response(err.status(), &json!({ "error": err.public_message() }))
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn with_cors(mut response: Response<Body>) -> Response<Body> {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
