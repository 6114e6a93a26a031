//! Request pipeline tests, driven through the axum router.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tower::ServiceExt;

use storage_gateway::backend::BackendKind;
use storage_gateway::http::response::content_md5;
use storage_gateway::http::{HandlerSet, RouteHandler, Transport};

mod common;

use common::{
    anonymous_request, body_json, gateway, handlers, ready_registry, registry_with, signed_request,
    BinaryHandler, ConflictHandler, PanicHandler, StubBackend,
};

#[tokio::test]
async fn signed_request_reaches_handler() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/notes.txt", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::SERVER], "storage-gateway");
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["route"], "GetStorage");
    assert_eq!(body["account"], "alice");
    assert_eq!(body["caller"], "alice");
    assert_eq!(backend.auth_calls(), 1);

    let records = gw.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "GetStorage");
    assert_eq!(records[0].status, 200);
    assert_eq!(records[0].caller.as_deref(), Some("alice"));
    assert_eq!(records[0].remote_address.as_deref(), Some("10.0.0.7"));
}

#[tokio::test]
async fn unready_backend_short_circuits_before_authentication() {
    let backend = StubBackend::owned_by("alice");
    let registry = registry_with(
        &backend,
        &[BackendKind::Placement, BackendKind::MetadataIndex, BackendKind::JobExecution],
    );
    let gw = gateway(registry, handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/notes.txt", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    let body = body_json(response).await;
    assert_eq!(body["code"], "ServiceUnavailable");
    assert_eq!(backend.auth_calls(), 0);
    assert_eq!(gw.audit.records()[0].status, 503);
}

#[tokio::test]
async fn job_routes_require_job_execution() {
    let backend = StubBackend::owned_by("alice");
    let registry = registry_with(
        &backend,
        &[BackendKind::Placement, BackendKind::MetadataIndex, BackendKind::AuthCache],
    );
    let gw = gateway(registry, handlers());

    let live = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/jobs/live", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::SERVICE_UNAVAILABLE);

    let listed = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/jobs", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
}

#[tokio::test]
async fn live_job_queries_are_rewritten() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    for (uri, expected) in [
        ("/alice/jobs?state=running", "ListLiveJobs"),
        ("/alice/jobs?STATE=running", "ListLiveJobs"),
        ("/alice/jobs?name=nightly", "ListLiveJobs"),
        ("/alice/jobs", "ListJobs"),
        ("/alice/jobs?foo=bar", "ListJobs"),
    ] {
        let response = gw
            .router
            .clone()
            .oneshot(signed_request(Method::GET, uri, Transport::Secure))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["route"], expected, "{uri}");
    }

    let records = gw.audit.records();
    assert_eq!(records[0].path, "/alice/jobs");
    assert_eq!(records[0].raw_path, "/alice/jobs");
}

#[tokio::test]
async fn envelope_carries_integrity_headers() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();

    let md5 = response.headers()["content-md5"].to_str().unwrap().to_string();
    let length: usize = response.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.len(), length);
    assert_eq!(md5, content_md5(&bytes));
}

#[tokio::test]
async fn binary_replies_are_base64_encoded() {
    const PAYLOAD: &[u8] = &[0, 159, 146, 150, 255, 10];
    let backend = StubBackend::owned_by("alice");
    let handler: Arc<dyn RouteHandler> = Arc::new(BinaryHandler(PAYLOAD));
    let gw = gateway(ready_registry(&backend), HandlerSet::new().with("GetStorage", handler));

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/blob", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let decoded = STANDARD.decode(body.as_str().unwrap()).unwrap();
    assert_eq!(decoded, PAYLOAD);
}

#[tokio::test]
async fn panicking_handler_yields_one_500_and_one_audit_record() {
    let backend = StubBackend::owned_by("alice");
    let handler: Arc<dyn RouteHandler> = Arc::new(PanicHandler);
    let gw = gateway(ready_registry(&backend), HandlerSet::new().with("GetStorage", handler));

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "InternalError");
    assert!(!body["message"].as_str().unwrap().contains("blew up"));

    let records = gw.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 500);
    assert!(records[0].error.as_deref().unwrap().contains("handler blew up"));

    // The gateway keeps serving.
    let again = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(gw.audit.records().len(), 2);
}

#[tokio::test]
async fn handler_errors_keep_their_status_and_body() {
    let backend = StubBackend::owned_by("alice");
    let handler: Arc<dyn RouteHandler> = Arc::new(ConflictHandler);
    let gw = gateway(ready_registry(&backend), HandlerSet::new().with("PutObject", handler));

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::PUT, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "EntryExists");
}

#[tokio::test]
async fn insecure_transport_requires_presigned_url() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/a", Transport::Insecure))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "SecureTransportRequired");
    assert_eq!(backend.auth_calls(), 0);

    let expires = SystemTime::now().duration_since(UNIX_EPOCH).unwrap() + Duration::from_secs(300);
    let uri = format!(
        "/alice/stor/a?keyId=%2Falice%2Fkeys%2Fk1&algorithm=rsa-sha256&signature=c2ln&expires={}",
        expires.as_secs()
    );
    let response = gw
        .router
        .clone()
        .oneshot(anonymous_request(Method::GET, &uri, Transport::Insecure))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.auth_calls(), 1);
}

#[tokio::test]
async fn header_credentials_with_presigned_query_are_refused() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(
            Method::GET,
            "/alice/stor/notes.txt?signature=x&expires=1",
            Transport::Insecure,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "InvalidAuthorizationHeader");

    let mut request = anonymous_request(
        Method::GET,
        "/alice/stor/notes.txt?signature=x&expires=1",
        Transport::Insecure,
    );
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
    let response = gw.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(backend.auth_calls(), 0);
}

#[tokio::test]
async fn expired_presigned_url_is_rejected() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(anonymous_request(
            Method::GET,
            "/alice/stor/a?keyId=k&algorithm=rsa-sha256&signature=c2ln&expires=1000",
            Transport::Insecure,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_escape_is_a_bad_request() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/%zz", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "InvalidPath");
    let records = gw.audit.records();
    assert_eq!(records[0].name, "unknown");
    assert_eq!(records[0].raw_path, "/alice/stor/%zz");
}

#[tokio::test]
async fn route_without_handler_is_not_implemented() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::DELETE, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(gw.audit.records()[0].name, "DeleteStorage");
}

#[tokio::test]
async fn unknown_method_lists_allowed_methods() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::PATCH, "/alice", Transport::Secure))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = response.headers()[header::ALLOW].to_str().unwrap().to_string();
    assert!(allow.contains("GET"));
    assert!(allow.contains("DELETE"));
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_access_only_on_public_reads() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let private = gw
        .router
        .clone()
        .oneshot(anonymous_request(Method::GET, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(private.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(private).await["code"], "AuthorizationRequired");

    let public = gw
        .router
        .clone()
        .oneshot(anonymous_request(Method::GET, "/alice/public/a", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(public.status(), StatusCode::OK);
    assert_eq!(backend.auth_calls(), 0);
}

#[tokio::test]
async fn other_accounts_are_refused() {
    let backend = StubBackend::owned_by("bob");
    let gw = gateway(ready_registry(&backend), handlers());

    let response = gw
        .router
        .clone()
        .oneshot(signed_request(Method::GET, "/alice/stor/a", Transport::Secure))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "AuthorizationFailed");
}

#[tokio::test]
async fn stale_date_is_rejected() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let stale = SystemTime::now() - Duration::from_secs(3600);
    let mut request = signed_request(Method::GET, "/alice/stor/a", Transport::Secure);
    request
        .headers_mut()
        .insert(header::DATE, httpdate::fmt_http_date(stale).parse().unwrap());

    let response = gw.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "RequestExpired");
    assert_eq!(backend.auth_calls(), 0);
}

#[tokio::test]
async fn request_body_is_passed_to_handler() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let mut request = signed_request(Method::PUT, "/alice/stor/a", Transport::Secure);
    *request.body_mut() = Body::from("hello world");
    let response = gw.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["route"], "PutObject");
    assert_eq!(body["body_len"], 11);
}

#[tokio::test]
async fn missing_connection_meta_counts_as_insecure() {
    let backend = StubBackend::owned_by("alice");
    let gw = gateway(ready_registry(&backend), handlers());

    let request = Request::builder()
        .uri("/alice/stor/a")
        .body(Body::empty())
        .unwrap();
    let response = gw.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
