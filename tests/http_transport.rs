//! Wire protocol of the reqwest transport against a local axum server

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Multipart, Query, RawQuery, State},
    http::{HeaderMap, StatusCode, header::ACCEPT},
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use scene_finder::config::{Config, RetryConfig, ServiceConfig};
use scene_finder::errors::{SearchError, TransportError};
use scene_finder::models::ImageSource;
use scene_finder::services::SearchService;
use scene_finder::utils::{ReqwestSearchTransport, SearchRequest, SearchTransport};

#[derive(Debug, Clone, Default)]
struct Captured {
    method: String,
    query: Option<String>,
    url_param: Option<String>,
    accept: Option<String>,
    field_name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct MockService {
    captured: Arc<Mutex<Vec<Captured>>>,
    /// Status to answer with, 200 when unset
    status: Arc<Mutex<Option<StatusCode>>>,
}

impl MockService {
    fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    fn respond_with(&self, status: StatusCode) {
        *self.status.lock().unwrap() = Some(status);
    }

    fn reply(&self, captured: Captured) -> impl IntoResponse + use<> {
        self.captured.lock().unwrap().push(captured);
        let status = self.status.lock().unwrap().unwrap_or(StatusCode::OK);
        let body = if status.is_success() {
            json!({
                "frameCount": 1000,
                "error": "",
                "result": [{
                    "anilist": 21034,
                    "filename": "Example - 03.mkv",
                    "episode": 3,
                    "from": 10.5,
                    "to": 13.25,
                    "similarity": 0.9412,
                    "video": "https://media.example/video.mp4",
                    "image": "https://media.example/image.jpg"
                }]
            })
        } else {
            json!({ "error": "Search queue is full" })
        };
        (status, Json(body))
    }
}

fn accept_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn search_by_url(
    State(mock): State<MockService>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    mock.reply(Captured {
        method: "GET".to_string(),
        query,
        url_param: params.get("url").cloned(),
        accept: accept_header(&headers),
        ..Default::default()
    })
}

async fn search_by_file(
    State(mock): State<MockService>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut captured = Captured {
        method: "POST".to_string(),
        query,
        accept: accept_header(&headers),
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        captured.field_name = field.name().map(str::to_string);
        captured.file_name = field.file_name().map(str::to_string);
        captured.content_type = field.content_type().map(str::to_string);
        captured.body = field.bytes().await.unwrap().to_vec();
    }

    mock.reply(captured)
}

async fn start_mock() -> (SocketAddr, MockService) {
    let mock = MockService::default();
    let app = Router::new()
        .route("/search", get(search_by_url).post(search_by_file))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, mock)
}

fn service_config(addr: SocketAddr) -> ServiceConfig {
    ServiceConfig {
        base_url: format!("http://{addr}"),
        ..Default::default()
    }
}

#[tokio::test]
async fn url_search_is_a_get_with_encoded_url() {
    let (addr, mock) = start_mock().await;
    let transport = ReqwestSearchTransport::new(&service_config(addr)).unwrap();
    let image_url = "https://example.com/frames/a b.jpg?size=large&v=2";

    let response = transport
        .search(&SearchRequest::ByUrl {
            url: image_url.to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["result"][0]["similarity"], json!(0.9412));

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url_param.as_deref(), Some(image_url));
    assert_eq!(requests[0].accept.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn file_search_posts_multipart_image_field() {
    let (addr, mock) = start_mock().await;
    let transport = ReqwestSearchTransport::new(&service_config(addr)).unwrap();
    let bytes = Bytes::from_static(b"\x89PNG\r\n\x1a\nnot-really-a-png");

    transport
        .search(&SearchRequest::ByFile {
            bytes: bytes.clone(),
            mime_type: "image/png".to_string(),
            file_name: "frame.png".to_string(),
        })
        .await
        .unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.query, None);
    assert_eq!(request.field_name.as_deref(), Some("image"));
    assert_eq!(request.file_name.as_deref(), Some("frame.png"));
    assert_eq!(request.content_type.as_deref(), Some("image/png"));
    assert_eq!(request.body, bytes.to_vec());
    assert_eq!(request.accept.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn optional_flags_are_sent_as_bare_query_keys() {
    let (addr, mock) = start_mock().await;
    let config = ServiceConfig {
        anilist_info: true,
        cut_borders: true,
        ..service_config(addr)
    };
    let transport = ReqwestSearchTransport::new(&config).unwrap();

    transport
        .search(&SearchRequest::ByFile {
            bytes: Bytes::from_static(b"bytes"),
            mime_type: "image/jpeg".to_string(),
            file_name: "frame.jpg".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        mock.requests()[0].query.as_deref(),
        Some("anilistInfo&cutBorders")
    );
}

#[tokio::test]
async fn non_success_status_is_returned_not_raised() {
    let (addr, mock) = start_mock().await;
    mock.respond_with(StatusCode::SERVICE_UNAVAILABLE);
    let transport = ReqwestSearchTransport::new(&service_config(addr)).unwrap();

    let response = transport
        .search(&SearchRequest::ByUrl {
            url: "https://example.com/a.jpg".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.status, 503);
    assert!(!response.is_success());
}

#[tokio::test]
async fn connection_failure_is_a_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = ReqwestSearchTransport::new(&service_config(addr)).unwrap();
    let err = transport
        .search(&SearchRequest::ByUrl {
            url: "https://example.com/a.jpg".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Request { .. }));
}

#[tokio::test]
async fn full_pipeline_over_http() {
    let (addr, mock) = start_mock().await;
    let config = Config {
        service: service_config(addr),
        ..Default::default()
    };
    let service = SearchService::from_config(&config).unwrap();
    let source = ImageSource::from_url("https://example.com/frame.jpg").unwrap();
    let cancel = CancellationToken::new();

    let outcome = service.search(&source, &cancel).await.unwrap();
    assert_eq!(outcome.ranked.len(), 1);
    let top = &outcome.ranked[0];
    assert_eq!(top.similarity_percent, 94.1);
    assert_eq!(top.episode_label.as_deref(), Some("Episode 3"));
    assert_eq!(top.timestamp_label.as_deref(), Some("0:10 - 0:13"));
    assert_eq!(top.title.as_deref(), Some("Example - 03.mkv"));

    let again = service.search(&source, &cancel).await.unwrap();
    assert!(again.from_cache);
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn full_pipeline_surfaces_service_error_after_retries() {
    let (addr, mock) = start_mock().await;
    mock.respond_with(StatusCode::SERVICE_UNAVAILABLE);
    let config = Config {
        service: service_config(addr),
        retry: RetryConfig::immediate(3),
        ..Default::default()
    };
    let service = SearchService::from_config(&config).unwrap();
    let source = ImageSource::from_url("https://example.com/frame.jpg").unwrap();

    let err = service
        .search(&source, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SearchError::Service {
            attempts: 3,
            status: Some(503),
            ..
        }
    ));
    assert_eq!(mock.requests().len(), 3);
}
