use garmin_connect_client::http_client::ReqwestGarminClient;
use garmin_connect_client::{GarminClient, GarminError};
use secrecy::SecretString;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReqwestGarminClient {
    ReqwestGarminClient::new(&server.uri(), Some(SecretString::new("tok".into())))
        .expect("client")
}

async fn mount_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/userprofile-service/socialProfile"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "displayName": "runner42",
            "userProfileId": 9001
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_validates_token_via_social_profile() {
    let server = MockServer::start().await;
    mount_profile(&server).await;

    let client = client(&server);
    client.login(None).await.expect("login");
}

#[tokio::test]
async fn login_rejected_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userprofile-service/socialProfile"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    let err = client(&server).login(None).await.unwrap_err();
    assert!(err.is_auth(), "{err:?}");
}

#[tokio::test]
async fn user_summary_uses_display_name_and_date() {
    let server = MockServer::start().await;
    mount_profile(&server).await;
    Mock::given(method("GET"))
        .and(path("/usersummary-service/usersummary/daily/runner42"))
        .and(query_param("calendarDate", "2025-03-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "totalSteps": 8421,
            "userProfileId": 9001
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client(&server)
        .get_user_summary("2025-03-01")
        .await
        .expect("summary");
    assert_eq!(summary["totalSteps"], 8421);
}

#[tokio::test]
async fn empty_body_decodes_to_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hrv-service/hrv/2025-03-01"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let hrv = client(&server).get_hrv_data("2025-03-01").await.expect("hrv");
    assert!(hrv.is_null());
}

#[tokio::test]
async fn rate_limit_and_server_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/badge-service/badge/earned"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/activity-service/activity/activityTypes"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.get_earned_badges().await.unwrap_err();
    assert!(err.is_rate_limited());

    let err = client.get_activity_types().await.unwrap_err();
    match err {
        GarminError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fitnessage-service/fitnessage/2025-03-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_fitnessage_data("2025-03-01")
        .await
        .unwrap_err();
    assert!(matches!(err, GarminError::Decode { .. }), "{err:?}");
}

#[tokio::test]
async fn device_alarms_are_collected_across_devices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/device-service/deviceregistration/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"deviceId": 11},
            {"deviceId": 12},
            {"displayName": "no id"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device-service/deviceservice/device-info/settings/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "alarms": [{"alarmMode": "ON", "alarmTime": 420, "alarmDays": ["ONCE"]}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/device-service/deviceservice/device-info/settings/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "alarms": null
        })))
        .mount(&server)
        .await;

    let alarms = client(&server).get_device_alarms().await.expect("alarms");
    assert_eq!(alarms.as_array().map(Vec::len), Some(1));
    assert_eq!(alarms[0]["alarmTime"], 420);
}

#[tokio::test]
async fn gear_reads_use_profile_id_and_uuid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gear-service/gear/filterGear"))
        .and(query_param("userProfilePk", "9001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"uuid": "abc", "displayName": "Pegasus"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userstats-service/gears/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "totalDistance": 123456.0,
            "totalActivities": 42
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let gear = client.get_gear("9001").await.expect("gear");
    assert_eq!(gear[0]["uuid"], "abc");
    let stats = client.get_gear_stats("abc").await.expect("stats");
    assert_eq!(stats["totalActivities"], 42);
}
