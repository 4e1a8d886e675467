// tests/profile_tests.rs

use std::sync::Arc;

use oab_practice::{
    config::{Config, RateLimitConfig},
    engine::{EngineSettings, PracticeEngine},
    routes,
    state::AppState,
    store::memory::MemoryStore,
    utils::{jwt::sign_jwt, rate_limit::SlidingWindowLimiter, retry::RetryConfig},
};
use serde_json::{Value, json};

const SECRET: &str = "profile_test_secret";

async fn spawn_app(rate_limits: RateLimitConfig) -> String {
    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        lookback_days: 90,
        profile_retry_attempts: 5,
        gamification_queue_capacity: 64,
        rate_limits,
    };

    let settings = EngineSettings {
        retry: RetryConfig::immediate(5),
        ..EngineSettings::from_config(&config)
    };
    let limiter = SlidingWindowLimiter::from_config(&config.rate_limits);
    let engine = PracticeEngine::new(Arc::new(MemoryStore::new()), Arc::new(limiter), settings);
    let state = AppState {
        engine: Arc::new(engine),
        config,
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
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

async fn seed(client: &reqwest::Client, address: &str) {
    let questions: Vec<Value> = [("ETHICS", 1), ("ETHICS", 2), ("TAXES", 3), ("TAXES", 4)]
        .iter()
        .map(|(subject, n)| {
            json!({
                "examId": "OAB-XXXVII",
                "questionNumber": n,
                "subject": subject,
                "examYear": 2022,
                "examPhase": 1,
                "statement": format!("Questão {}", n),
                "alternatives": [
                    {"label": "A", "text": "certa", "isCorrect": true},
                    {"label": "B", "text": "errada", "isCorrect": false}
                ]
            })
        })
        .collect();

    let response = client
        .post(format!("{}/api/admin/questions/import", address))
        .header("Authorization", token(1, "admin"))
        .json(&json!({ "questions": questions }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

/// Answers every question once: ETHICS right, TAXES wrong.
async fn answer_all(client: &reqwest::Client, address: &str, auth: &str) {
    for _ in 0..4 {
        let question: Value = client
            .get(format!("{}/api/questions/next?excludeAnswered=true", address))
            .header("Authorization", auth)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let label = if question["subject"] == "ETHICS" { "A" } else { "B" };
        let alternative = question["alternatives"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["label"] == label)
            .unwrap()["id"]
            .clone();

        let response = client
            .post(format!("{}/api/questions/answer", address))
            .header("Authorization", auth)
            .json(&json!({
                "questionId": question["id"],
                "alternativeId": alternative,
                "timeSpent": 60
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn test_profile_analytics_and_review() {
    // Arrange
    let address = spawn_app(RateLimitConfig::default()).await;
    let client = reqwest::Client::new();
    seed(&client, &address).await;
    let auth = token(40, "student");

    // Act
    answer_all(&client, &address, &auth).await;

    // Profile
    let me: Value = client
        .get(format!("{}/api/profile/me", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["profile"]["totalQuestions"], 4);
    assert_eq!(me["profile"]["correctAnswers"], 2);
    assert_eq!(me["accuracy"], 50);
    assert_eq!(me["levelProgress"]["maxLevel"], 100);
    assert!(me["profile"].get("version").is_none());

    // Dashboard
    let analytics: Value = client
        .get(format!("{}/api/analytics", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["overview"]["successRate"], 50.0);
    assert_eq!(analytics["subjectPerformance"][0]["subject"], "ETHICS");
    assert_eq!(analytics["weakAreas"][0]["subject"], "TAXES");
    assert_eq!(analytics["weakAreas"].as_array().unwrap().len(), 1);

    // Review list
    let review: Value = client
        .get(format!("{}/api/review/wrong-questions", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(review["total"], 2);
    assert_eq!(review["bySubject"]["TAXES"], 2);

    // Leaderboard is public
    let board: Value = client
        .get(format!("{}/api/leaderboard", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(board[0]["userId"], 40);
    assert_eq!(board[0]["rank"], 1);
}

#[tokio::test]
async fn test_simulation_creation_is_rate_limited() {
    let address = spawn_app(RateLimitConfig {
        simulations_per_hour: 1,
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();
    let auth = token(41, "student");

    let first = client
        .post(format!("{}/api/simulations", address))
        .header("Authorization", &auth)
        .json(&json!({"type": "ADAPTIVE"}))
        .send()
        .await
        .unwrap();
    // Empty bank still yields an empty simulation.
    assert_eq!(first.status().as_u16(), 201);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["simulation"]["totalQuestions"], 0);

    let second = client
        .post(format!("{}/api/simulations", address))
        .header("Authorization", &auth)
        .json(&json!({"type": "ADAPTIVE"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 429);

    // Other users keep their own window.
    let other = client
        .post(format!("{}/api/simulations", address))
        .header("Authorization", token(42, "student"))
        .json(&json!({"type": "ADAPTIVE"}))
        .send()
        .await
        .unwrap();
    assert_eq!(other.status().as_u16(), 201);
}
