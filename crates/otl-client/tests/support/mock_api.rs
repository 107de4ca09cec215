//! wiremock fixtures for the job API.

use std::time::Duration;

use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

use otl_client::{ClientOptions, OtlClient};

pub const COOKIE: &str = "session=abc";

pub fn client_for(server: &MockServer) -> OtlClient {
    let options = ClientOptions::builder()
        .base_address(server.uri())
        .poll_interval(Duration::from_millis(10))
        .max_parallelism(2)
        .build();
    OtlClient::new(&options).expect("client")
}

pub fn login_ok() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("set-cookie", "session=abc; Path=/; HttpOnly")
        .set_body_json(json!({"status": "success"}))
}

pub fn success() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": "success", "timestamp": 1}))
}

pub fn text(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/plain; charset=utf-8")
}

pub async fn mount_login(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_ok())
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_makejob(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/makejob"))
        .and(header("cookie", COOKIE))
        .respond_with(success())
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_checkjob(server: &MockServer, cid: u64) {
    Mock::given(method("GET"))
        .and(path("/api/checkjob"))
        .and(header("cookie", COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "cid": cid})))
        .mount(server)
        .await;
}

pub async fn mount_getresult(server: &MockServer, cid: u64, locations: &[&str], expected: u64) {
    Mock::given(method("GET"))
        .and(path("/api/getresult"))
        .and(query_param("cid", cid.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "data_urls": locations})),
        )
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_shard(server: &MockServer, location: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{location}")))
        .respond_with(text(body))
        .mount(server)
        .await;
}
