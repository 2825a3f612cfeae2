use chrono::DateTime;
use garmin_connect_client::http_client::ReqwestGarminClient;
use garmin_connect_client::{BloodPressure, BodyComposition, GarminClient, ManualActivity};
use secrecy::SecretString;
use std::io::Write;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReqwestGarminClient {
    ReqwestGarminClient::new(&server.uri(), Some(SecretString::new("tok".into())))
        .expect("client")
}

#[tokio::test]
async fn set_gear_default_puts_default_flag() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/gear-service/gear/abc/activityType/1/default/true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_gear_default(1, "abc", true)
        .await
        .expect("set default");
}

#[tokio::test]
async fn unset_gear_default_deletes_link() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/gear-service/gear/abc/activityType/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_gear_default(2, "abc", false)
        .await
        .expect("unset default");
}

#[tokio::test]
async fn blood_pressure_sends_local_and_gmt_times() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bloodpressure-service/bloodpressure"))
        .and(body_partial_json(serde_json::json!({
            "measurementTimestampLocal": "2025-03-01T08:30:00.000",
            "measurementTimestampGMT": "2025-03-01T07:30:00.000",
            "systolic": 120,
            "diastolic": 80,
            "pulse": 60,
            "notes": ""
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let entry = BloodPressure {
        timestamp: DateTime::parse_from_rfc3339("2025-03-01T08:30:00+01:00").unwrap(),
        systolic: 120,
        diastolic: 80,
        pulse: 60,
        notes: None,
    };
    client(&server)
        .set_blood_pressure(&entry)
        .await
        .expect("blood pressure");
}

#[tokio::test]
async fn body_composition_includes_only_given_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/weight-service/user-weight"))
        .and(body_partial_json(serde_json::json!({
            "value": 72.4,
            "unitKey": "kg",
            "percentFat": 18.5
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let entry = BodyComposition {
        timestamp: DateTime::parse_from_rfc3339("2025-03-01T07:00:00+00:00").unwrap(),
        weight: 72.4,
        percent_fat: Some(18.5),
        percent_hydration: None,
        visceral_fat_mass: None,
        bone_mass: None,
        muscle_mass: None,
        basal_met: None,
        active_met: None,
        physique_rating: None,
        metabolic_age: None,
        visceral_fat_rating: None,
        bmi: None,
    };
    client(&server)
        .add_body_composition(&entry)
        .await
        .expect("weigh-in");

    let requests = server.received_requests().await.unwrap_or_default();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("bmi").is_none());
}

#[tokio::test]
async fn manual_activity_converts_units() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/activity-service/activity"))
        .and(body_partial_json(serde_json::json!({
            "activityName": "Lunch run",
            "activityTypeDTO": {"typeKey": "running"},
            "timeZoneUnitDTO": {"unitKey": "Europe/Amsterdam"},
            "summaryDTO": {
                "startTimeLocal": "2023-12-02T10:00:00.000",
                "distance": 5000.0,
                "duration": 1800.0
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"activityId": 77})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let activity = ManualActivity {
        activity_name: "Lunch run".into(),
        type_key: "running".into(),
        start_time_local: "2023-12-02T10:00:00.000".into(),
        time_zone: "Europe/Amsterdam".into(),
        duration_min: 30,
        distance_km: 5.0,
    };
    let created = client(&server)
        .create_manual_activity(&activity)
        .await
        .expect("create");
    assert_eq!(created["activityId"], 77);
}

#[tokio::test]
async fn upload_activity_posts_multipart_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload-service/upload"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "detailedImportResult": {"uploadId": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::Builder::new()
        .suffix(".gpx")
        .tempfile()
        .expect("tempfile");
    writeln!(file, "<gpx></gpx>").expect("write");

    let res = client(&server)
        .upload_activity(file.path())
        .await
        .expect("upload");
    assert_eq!(res["detailedImportResult"]["uploadId"], 5);

    let requests = server.received_requests().await.unwrap_or_default();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("<gpx></gpx>"));
}

#[tokio::test]
async fn upload_missing_file_is_io_error() {
    let server = MockServer::start().await;
    let err = client(&server)
        .upload_activity(std::path::Path::new("/definitely/not/here.fit"))
        .await
        .unwrap_err();
    assert!(matches!(err, garmin_connect_client::GarminError::Io(_)));
}

#[tokio::test]
async fn add_gear_to_activity_links_by_uuid() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/gear-service/gear/link/abc/activity/123456"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .add_gear_to_activity("abc", 123456)
        .await
        .expect("link");
}
