// tests/api_tests.rs

use std::sync::Arc;

use oab_practice::{
    config::{Config, RateLimitConfig},
    engine::{EngineSettings, PracticeEngine},
    routes,
    state::AppState,
    store::memory::MemoryStore,
    utils::{jwt::sign_jwt, rate_limit::Unlimited, retry::RetryConfig},
};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        lookback_days: 90,
        profile_retry_attempts: 5,
        gamification_queue_capacity: 64,
        rate_limits: RateLimitConfig {
            disabled: true,
            ..Default::default()
        },
    };

    let settings = EngineSettings {
        retry: RetryConfig::immediate(5),
        ..EngineSettings::from_config(&config)
    };
    let engine = PracticeEngine::new(Arc::new(MemoryStore::new()), Arc::new(Unlimited), settings);
    let state = AppState {
        engine: Arc::new(engine),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn token(user_id: i64, role: &str) -> String {
    format!("Bearer {}", sign_jwt(user_id, role, SECRET, 600).unwrap())
}

/// `count` CIVIL questions from one exam; "B" is always the key.
fn question_batch(exam_id: &str, count: i32) -> Value {
    let questions: Vec<Value> = (1..=count)
        .map(|n| {
            json!({
                "examId": exam_id,
                "questionNumber": n,
                "subject": "CIVIL",
                "examYear": 2019 + n % 3,
                "examPhase": 1,
                "statement": format!("Enunciado {}", n),
                "difficulty": "MEDIUM",
                "alternatives": [
                    {"label": "A", "text": "primeira", "isCorrect": false},
                    {"label": "B", "text": "segunda", "isCorrect": true},
                    {"label": "C", "text": "terceira", "isCorrect": false},
                    {"label": "D", "text": "quarta", "isCorrect": false}
                ]
            })
        })
        .collect();
    json!({ "questions": questions })
}

async fn seed(client: &reqwest::Client, address: &str, count: i32) {
    let response = client
        .post(format!("{}/api/admin/questions/import", address))
        .header("Authorization", token(1, "admin"))
        .json(&question_batch("OAB-XXXIX", count))
        .send()
        .await
        .expect("Import failed");
    assert_eq!(response.status().as_u16(), 200);
}

fn alternative_id(question: &Value, label: &str) -> i64 {
    question["alternatives"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["label"] == label)
        .and_then(|a| a["id"].as_i64())
        .unwrap()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/questions/next", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/questions/next", address))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn import_requires_admin_and_reports_each_item() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let forbidden = client
        .post(format!("{}/api/admin/questions/import", address))
        .header("Authorization", token(2, "student"))
        .json(&question_batch("OAB-XL", 1))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let mut batch = question_batch("OAB-XL", 3);
    // Second correct alternative makes item 2 invalid.
    batch["questions"][2]["alternatives"][0]["isCorrect"] = json!(true);

    let summary: Value = client
        .post(format!("{}/api/admin/questions/import", address))
        .header("Authorization", token(1, "admin"))
        .json(&batch)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["imported"], 2);
    assert_eq!(summary["rejected"][0]["index"], 2);

    // Re-importing the same exam skips the existing items.
    let again: Value = client
        .post(format!("{}/api/admin/questions/import", address))
        .header("Authorization", token(1, "admin"))
        .json(&question_batch("OAB-XL", 2))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["imported"], 0);
    assert_eq!(again["skipped"], 2);
}

#[tokio::test]
async fn practice_answer_awards_points() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    seed(&client, &address, 5).await;
    let auth = token(10, "student");

    let question: Value = client
        .get(format!("{}/api/questions/next?subject=CIVIL", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(question["alternatives"][0].get("isCorrect").is_none());

    let response = client
        .post(format!("{}/api/questions/answer", address))
        .header("Authorization", &auth)
        .json(&json!({
            "questionId": question["id"],
            "alternativeId": alternative_id(&question, "B"),
            "timeSpent": 20
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["isCorrect"], true);
    assert_eq!(body["progress"]["pointsAwarded"], 150);
    assert_eq!(body["progress"]["streak"], 1);
    assert_eq!(body["statistics"]["successRate"], 100.0);
    assert_eq!(body["newAchievements"][0]["key"], "FIRST_CORRECT");
}

#[tokio::test]
async fn answer_validation_and_unknown_ids() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    seed(&client, &address, 1).await;
    let auth = token(11, "student");

    let too_slow = client
        .post(format!("{}/api/questions/answer", address))
        .header("Authorization", &auth)
        .json(&json!({"questionId": 1, "alternativeId": 2, "timeSpent": 9000}))
        .send()
        .await
        .unwrap();
    assert_eq!(too_slow.status().as_u16(), 400);

    let missing = client
        .post(format!("{}/api/questions/answer", address))
        .header("Authorization", &auth)
        .json(&json!({"questionId": 999, "alternativeId": 2, "timeSpent": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn simulation_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    seed(&client, &address, 8).await;
    let auth = token(20, "student");

    // 1. Create
    let created = client
        .post(format!("{}/api/simulations", address))
        .header("Authorization", &auth)
        .json(&json!({"type": "QUICK_PRACTICE", "questionCount": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let created: Value = created.json().await.unwrap();
    let sim_id = created["simulation"]["id"].as_i64().unwrap();
    assert_eq!(created["simulation"]["totalQuestions"], 5);
    assert_eq!(created["requestedQuestions"], 5);

    // 2. Fetch questions; other users cannot see it
    let detail: Value = client
        .get(format!("{}/api/simulations/{}", address, sim_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = detail["questions"].as_array().unwrap().clone();
    assert_eq!(questions.len(), 5);

    let stranger = client
        .get(format!("{}/api/simulations/{}", address, sim_id))
        .header("Authorization", token(21, "student"))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status().as_u16(), 404);

    // 3. Answer: four right, one wrong
    for (i, view) in questions.iter().enumerate() {
        let question = &view["question"];
        let label = if i == 0 { "A" } else { "B" };
        let body: Value = client
            .post(format!("{}/api/questions/answer", address))
            .header("Authorization", &auth)
            .json(&json!({
                "questionId": question["id"],
                "alternativeId": alternative_id(question, label),
                "timeSpent": 90,
                "simulationId": sim_id
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["deferredJobId"].is_u64());
        assert!(body["progress"].is_null());
    }

    // 4. Finish, then finish again
    let finish: Value = client
        .post(format!("{}/api/simulations/{}/finish", address, sim_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(finish["score"], 80.0);
    assert_eq!(finish["correctAnswers"], 4);
    assert_eq!(finish["timeSpent"], 450);

    let again = client
        .post(format!("{}/api/simulations/{}/finish", address, sim_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    // 5. Analytics
    let analytics: Value = client
        .get(format!("{}/api/simulations/{}/analytics", address, sim_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["simulation"]["answered"], 5);
    assert_eq!(analytics["wrongAnswers"][0]["userAnswer"], "A");
    assert_eq!(analytics["wrongAnswers"][0]["correctAnswer"], "B");
}

#[tokio::test]
async fn by_subject_without_subjects_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/simulations", address))
        .header("Authorization", token(30, "student"))
        .json(&json!({"type": "BY_SUBJECT"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}
