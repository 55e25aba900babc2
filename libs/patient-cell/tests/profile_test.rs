use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::handlers::*;
use patient_cell::models::{CreatePatientRequest, UpdatePatientRequest};
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn setup(server: &MockServer, user: &TestUser) -> (Arc<AppConfig>, TypedHeader<Authorization<Bearer>>) {
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let token = JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(1));
    (config, TypedHeader(Authorization::bearer(&token).unwrap()))
}

#[tokio::test]
async fn creates_profile_once_per_account() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("joao@example.com");
    let (config, auth) = setup(&mock_server, &patient);
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "user_id": patient.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id, &patient.id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = CreatePatientRequest {
        full_name: Some("Joao Lima".to_string()),
        ..Default::default()
    };
    let Json(body) = create_patient_profile(
        State(config.clone()),
        auth.clone(),
        Extension(patient.to_user()),
        Json(request.clone()),
    )
    .await
    .unwrap();
    assert_eq!(body["id"], patient_id);

    // Second attempt sees the stored row.
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id, &patient.id)
        ])))
        .mount(&mock_server)
        .await;

    let second = create_patient_profile(
        State(config),
        auth,
        Extension(patient.to_user()),
        Json(request),
    )
    .await;
    assert_matches!(second, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn updates_only_provided_fields() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("joao@example.com");
    let (config, auth) = setup(&mock_server, &patient);
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id, &patient.id)
        ])))
        .mount(&mock_server)
        .await;

    let mut updated = MockSupabaseResponses::patient_row(&patient_id, &patient.id);
    updated["allergies"] = json!("penicillin");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .and(body_partial_json(json!({ "allergies": "penicillin" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdatePatientRequest {
        allergies: Some("penicillin".to_string()),
        ..Default::default()
    };
    let Json(body) = update_patient_profile(
        State(config),
        auth,
        Extension(patient.to_user()),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(body["allergies"], "penicillin");
}

#[tokio::test]
async fn missing_profile_is_not_found_and_doctors_are_forbidden() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("p@example.com");
    let (config, auth) = setup(&mock_server, &patient);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let missing = get_patient_profile(State(config.clone()), auth.clone(), Extension(patient.to_user())).await;
    assert_matches!(missing, Err(AppError::NotFound(_)));

    let doctor = TestUser::doctor("d@example.com");
    let forbidden = get_patient_profile(State(config), auth, Extension(doctor.to_user())).await;
    assert_matches!(forbidden, Err(AppError::Forbidden(_)));
}
