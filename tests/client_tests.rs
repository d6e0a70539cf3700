use pure_a9::{Credentials, DeltaClient, MessageLogMode, WorkMode};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DeltaClient {
    DeltaClient::builder(Credentials::new("user@example.com", "secret"))
        .base_url(server.uri())
        .build()
        .expect("client should build")
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/Users/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": token })))
        .mount(server)
        .await;
}

fn appliance_list() -> serde_json::Value {
    json!([{
        "pncId": "950011538111111115087076",
        "applianceName": "Living room",
        "twin": {
            "deviceId": "950011538111111115087076",
            "connectionState": "Connected",
            "properties": { "reported": { "Workmode": "Auto", "Fanspeed": 4 } }
        }
    }])
}

#[tokio::test]
async fn login_once_then_reuse_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Users/Login"))
        .and(body_json(json!({ "Username": "user@example.com", "Password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "tok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Domains/Appliances"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appliance_list()))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    let first = client.list_appliances().await.expect("list should succeed");
    let second = client.list_appliances().await.expect("list should succeed");
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, "950011538111111115087076");
    assert_eq!(first[0].name.as_deref(), Some("Living room"));
}

#[tokio::test]
async fn rejected_login_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Users/Login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).list_appliances().await.unwrap_err();
    assert!(matches!(err, pure_a9::Error::Auth(_)), "expected Auth, got {err:?}");
}

#[tokio::test]
async fn login_without_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Users/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = client(&server).login().await.unwrap_err();
    assert!(matches!(err, pure_a9::Error::Auth(_)), "expected Auth, got {err:?}");
}

#[tokio::test]
async fn expired_token_logs_in_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Users/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "old" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Users/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "new" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Domains/Appliances"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Domains/Appliances"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appliance_list()))
        .expect(1)
        .mount(&server)
        .await;

    let appliances = client(&server).list_appliances().await.expect("retry should succeed");
    assert_eq!(appliances.len(), 1);
}

#[tokio::test]
async fn server_error_on_list_is_http_error() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/Domains/Appliances"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).list_appliances().await.unwrap_err();
    assert!(matches!(err, pure_a9::Error::Http(_)), "expected Http, got {err:?}");
}

#[tokio::test]
async fn malformed_list_is_protocol_error() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/Domains/Appliances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "appliances": [] })))
        .mount(&server)
        .await;

    let err = client(&server).list_appliances().await.unwrap_err();
    assert!(matches!(err, pure_a9::Error::Protocol(_)), "expected Protocol, got {err:?}");
}

#[tokio::test]
async fn get_appliance_found_and_missing() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/Appliances/9500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pncId": "9500",
            "twin": { "connectionState": "Disconnected" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Appliances/0000"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);
    let found = client.get_appliance("9500").await.unwrap().expect("appliance should exist");
    assert_eq!(found.id, "9500");
    assert!(!found.twin.unwrap().is_connected());
    assert!(client.get_appliance("0000").await.unwrap().is_none());
}

#[tokio::test]
async fn send_command_puts_patch() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    Mock::given(method("PUT"))
        .and(path("/Appliances/9500/Commands"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({ "WorkMode": "PowerOff" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let patch = pure_a9::translate(&pure_a9::CommandIntent::new().power(false));
    assert_eq!(patch.len(), 1);
    assert_eq!(patch[0].get("WorkMode").and_then(|v| v.as_str()), Some(WorkMode::PowerOff.as_remote_str()));
    client(&server)
        .send_command("9500", &patch[0])
        .await
        .expect("command should succeed");
}

#[tokio::test]
async fn rejected_command_is_error() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    Mock::given(method("PUT"))
        .and(path("/Appliances/9500/Commands"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let patch = pure_a9::translate(&pure_a9::CommandIntent::new().light(true));
    let err = client(&server).send_command("9500", &patch[0]).await.unwrap_err();
    assert!(matches!(err, pure_a9::Error::Http(_)), "expected Http, got {err:?}");
}

#[tokio::test]
async fn message_log_captures_traffic() {
    let server = MockServer::start().await;
    mount_login(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/Domains/Appliances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appliance_list()))
        .mount(&server)
        .await;

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let log_path = tmp.path().to_str().unwrap().to_string();
    let client = DeltaClient::builder(Credentials::new("user@example.com", "secret"))
        .base_url(server.uri())
        .message_log(MessageLogMode::Diffed, &log_path)
        .build()
        .unwrap();
    client.list_appliances().await.unwrap();
    client.list_appliances().await.unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let lists: Vec<_> = lines.iter().filter(|l| l["dir"] == "list").collect();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0]["full"], true);
    assert!(lists[0]["body"]["950011538111111115087076"].is_object());
    assert_eq!(lists[1]["changes"].as_array().unwrap().len(), 0);
    assert!(lines.iter().any(|l| l["dir"] == "req" && l["path"] == "/Users/Login"));
}
