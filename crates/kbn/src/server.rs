use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use kbn_core::{
    bot::NewsBot,
    http::{HttpRequest, HttpResponse},
    report::ReportMailer,
};

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsBot>,
    pub report: Arc<ReportMailer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/news", any(news))
        .route("/report", any(report))
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    info!("http listening on http://{local_addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn news(State(state): State<AppState>, method: Method, body: String) -> Response {
    let req = HttpRequest::new(method.as_str(), body);
    into_response(state.news.handle(&req).await)
}

async fn report(State(state): State<AppState>, method: Method, body: String) -> Response {
    let req = HttpRequest::new(method.as_str(), body);
    into_response(state.report.handle(&req).await)
}

fn into_response(res: HttpResponse) -> Response {
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &res.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => warn!(%name, "dropping invalid response header"),
        }
    }
    (status, headers, res.body).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kbn_core::fetch::HttpFetcher;
    use kbn_smtp::SmtpMailer;
    use serde_json::{json, Value};

    use super::*;

    fn state() -> AppState {
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        AppState {
            news: Arc::new(NewsBot::new(Arc::new(fetcher))),
            report: Arc::new(ReportMailer::new(None, Arc::new(SmtpMailer::new()))),
        }
    }

    #[test]
    fn response_headers_survive_conversion() {
        let res = into_response(HttpResponse::preflight("POST, OPTIONS"));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()["access-control-allow-methods"],
            "POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn routes_dispatch_to_handlers() {
        let cancel = CancellationToken::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state());
        let stop = cancel.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
        });

        let client = reqwest::Client::new();

        let status: Value = client
            .get(format!("http://{addr}/news"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "ok");

        let res = client
            .post(format!("http://{addr}/report"))
            .body(json!({ "email": "a@b.c", "sessions": [{ "id": 1 }] }).to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 500);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "SMTP configuration incomplete");

        let res = client
            .get(format!("http://{addr}/report"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 405);

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
