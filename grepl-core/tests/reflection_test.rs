use grepl_core::call::transport::{Client, ClientStream};
use grepl_core::descriptor::{DescriptorSource, RpcShape};
use grepl_core::fill::JsonFiller;
use grepl_core::grpc::client::GrpcClient;
use grepl_core::present::JsonPresenter;
use grepl_core::reflection::client::{ReflectionClient, ReflectionError};
use grepl_core::session::Session;
use tokio_util::sync::CancellationToken;
use std::time::Duration;
use tonic::{Code, metadata::MetadataMap};
use tonic_reflection::server::v1::{ServerReflection, ServerReflectionServer};

mod fixtures;

fn reflection_service() -> ServerReflectionServer<impl ServerReflection> {
    tonic_reflection::server::Builder::configure()
        .register_file_descriptor_set(fixtures::file_descriptor_set())
        .build_v1()
        .expect("Failed to setup Reflection Service")
}

#[tokio::test]
async fn test_reflection_lists_services() {
    let mut client = ReflectionClient::new(reflection_service());

    let services = client.list_services().await.unwrap();

    assert!(services.contains(&"api.Example".to_string()));
    assert!(services.contains(&"grpc.reflection.v1.ServerReflection".to_string()));
}

#[tokio::test]
async fn test_reflection_builds_a_source_for_every_service() {
    let mut client = ReflectionClient::new(reflection_service());

    let source = client.pool_source().await.unwrap();

    assert!(source.package_names().contains(&"api".to_string()));
    assert!(
        source
            .package_names()
            .contains(&"grpc.reflection.v1".to_string())
    );
    let rpc = source
        .rpc(Some("api"), Some("Example"), "BidiStream")
        .unwrap();
    assert_eq!(rpc.shape(), RpcShape::Bidirectional);
    assert!(source.find_symbol("api.Person").is_ok());
}

#[tokio::test]
async fn test_reflection_unknown_symbol_is_not_found() {
    let mut client = ReflectionClient::new(reflection_service());

    let result = client.file_descriptor_set("api.Ghost").await;

    assert!(matches!(
        result,
        Err(ReflectionError::Server(status)) if status.code() == Code::NotFound
    ));
}

/// Calls the reflection service itself, through descriptors it reported, as a dynamic
/// bidirectional RPC.
#[tokio::test]
async fn test_grpc_client_bidi_call_against_reflection_service() {
    let source = ReflectionClient::new(reflection_service())
        .pool_source()
        .await
        .unwrap();
    let client = GrpcClient::new(reflection_service());
    let filler = JsonFiller::new(r#"{"listServices": ""}"#.as_bytes());

    let mut session = Session::new(source, client, filler, JsonPresenter::new());
    let token = CancellationToken::new();
    let mut out = Vec::new();

    session
        .call_rpc(
            &token,
            &mut out,
            "grpc.reflection.v1.ServerReflection.ServerReflectionInfo",
        )
        .await
        .unwrap();

    let out = String::from_utf8(out).unwrap();
    let response: serde_json::Value = serde_json::from_str(&out).unwrap();
    let services = response["listServicesResponse"]["service"]
        .as_array()
        .unwrap();
    assert!(services.iter().any(|s| s["name"] == "api.Example"));
}

#[tokio::test]
async fn test_grpc_client_reports_unimplemented_method() {
    let source = fixtures::source();
    let client = GrpcClient::new(reflection_service());
    let filler = JsonFiller::new(r#"{"name": "oumae"}"#.as_bytes());

    let mut session = Session::new(source, client, filler, JsonPresenter::new());
    let token = CancellationToken::new();
    let mut out = Vec::new();

    let err = session
        .call_rpc(&token, &mut out, "api.Example.Unary")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        grepl_core::call::CallError::Transport { source, .. } if source.code() == Code::Unimplemented
    ));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_grpc_client_stream_send_reports_the_server_status() {
    let mut client = GrpcClient::new(reflection_service());
    let mut stream = client
        .open_client_stream(&fixtures::rpc("ClientStream"), MetadataMap::new())
        .await
        .unwrap();

    // The server rejects the call without reading the requests, so sending fails once the
    // request buffer is full at the latest.
    let status = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Err(status) = stream.send(fixtures::hello_request("oumae")).await {
                return status;
            }
        }
    })
    .await
    .expect("sending should fail once the call has ended");

    assert_eq!(status.code(), Code::Unimplemented);
}
