use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::auth::Authenticated;
use crate::command::server::route::Route;
use crate::command::server::{ClientIdentity, Error, ServerContext};
use crate::metrics_provider::{IN_FLIGHT_REQUESTS, METRICS_PROVIDER};
use crate::tls::TlsConnectInfo;

const WWW_AUTHENTICATE_CHALLENGE: &str = "ClientCert";

pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    connect_info: TlsConnectInfo,
    timeouts: Arc<[Duration; 2]>,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |mut request| {
            request.extensions_mut().insert(connect_info.clone());
            handle_request(Arc::clone(&context), request)
        }),
    );
    pin!(conn);

    IN_FLIGHT_REQUESTS.fetch_add(1, Ordering::Relaxed);
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(Ordering::Relaxed)).unwrap_or(i64::MAX),
    );

    for (iter, sleep_duration) in timeouts.iter().enumerate() {
        debug!("iter = {iter} sleep_duration = {sleep_duration:?}");
        tokio::select! {
            res = conn.as_mut() => {
                match res {
                    Ok(()) => debug!("after polling conn, no error"),
                    Err(error) =>  debug!("error serving connection: {error}"),
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("iter = {iter} got timeout_interval, calling conn.graceful_shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    IN_FLIGHT_REQUESTS.fetch_sub(1, Ordering::Relaxed);
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(Ordering::Relaxed)).unwrap_or(i64::MAX),
    );
}

#[instrument(skip(context, request))]
async fn handle_request<B>(
    context: Arc<ServerContext>,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let start_time = Instant::now();
    let method = request.method().to_owned();
    let path = request.uri().path().to_owned();
    let route = Route::parse(&method, &path);

    let trace_id = {
        let context = Span::current().context();
        let span = context.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            Some(span_context.trace_id().to_string())
        } else {
            None
        }
    };

    let (parts, _) = request.into_parts();
    let response = match router(&context, route, parts).await {
        Ok(response) => response,
        Err(error) => error_to_response(&error, trace_id.as_ref()),
    };

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER
        .metric_http_request_total
        .with_label_values(&[method.as_str(), route.action_name(), status.as_str()])
        .inc();
    METRICS_PROVIDER
        .metric_http_request_duration
        .with_label_values(&[method.as_str(), route.action_name()])
        .observe(elapsed);

    let log = if let Some(trace_id) = trace_id {
        format!("{trace_id} {elapsed:?} - {status} {method} {path}")
    } else {
        format!("{elapsed:?} - {status} {method} {path}")
    };

    if status.is_server_error() {
        error!("{log}");
    } else {
        info!("{log}");
    }

    Ok(response)
}

#[instrument(skip(context, parts))]
async fn router(
    context: &ServerContext,
    route: Route,
    mut parts: Parts,
) -> Result<Response<Full<Bytes>>, Error> {
    if route.requires_authentication() {
        let identity = context.authenticate_request(&parts).await?;
        parts.extensions.insert(Authenticated(identity));
    }

    match route {
        Route::Healthz => handle_healthz(),
        Route::Metrics => handle_metrics(),
        Route::Whoami => handle_whoami(&parts),
        Route::Unknown => handle_unknown_route(&parts),
    }
}

fn handle_unknown_route(parts: &Parts) -> Result<Response<Full<Bytes>>, Error> {
    if [Method::GET, Method::HEAD].contains(&parts.method) {
        let msg = format!("unknown route: {} {}", parts.method, parts.uri);
        Err(Error::NotFound(msg))
    } else {
        let msg = format!("unsupported route: {} {}", parts.method, parts.uri);
        Err(Error::BadRequest(msg))
    }
}

fn handle_whoami(parts: &Parts) -> Result<Response<Full<Bytes>>, Error> {
    let Some(Authenticated(identity)) = parts.extensions.get::<Authenticated<ClientIdentity>>()
    else {
        return Err(Error::Unauthorized("no authenticated identity".to_string()));
    };

    let body = serde_json::to_vec(identity)
        .map_err(|e| Error::Internal(format!("Failed to serialize identity: {e}")))?;

    json_response(StatusCode::OK, body)
}

fn handle_healthz() -> Result<Response<Full<Bytes>>, Error> {
    json_response(StatusCode::OK, r#"{"status":"ok"}"#)
}

fn handle_metrics() -> Result<Response<Full<Bytes>>, Error> {
    let (content_type, metrics) = METRICS_PROVIDER.gather()?;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(metrics)));

    match response {
        Ok(resp) => Ok(resp),
        Err(e) => {
            let msg = format!("Failed to build metrics response: {e}");
            Err(Error::Internal(msg))
        }
    }
}

fn json_response(
    status: StatusCode,
    body: impl Into<Bytes>,
) -> Result<Response<Full<Bytes>>, Error> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(body.into()))
        .map_err(|e| Error::Internal(format!("Failed to build response: {e}")))
}

pub fn error_to_response(error: &Error, request_id: Option<&String>) -> Response<Full<Bytes>> {
    let status = error.status_code();
    let body = Bytes::from(error.as_json(request_id).to_string());

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Error::Unauthorized(_) = error {
        headers.insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
        );
    }

    response
}
