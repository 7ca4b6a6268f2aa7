use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use crate::controller::{CycleEvent, CycleOutcome};
use crate::database::SchemaInfo;
use crate::server::AppState;
use crate::Error;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub events: Vec<CycleEvent>,
    pub outcome: CycleOutcome,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Events emitted before the cycle stopped
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<CycleEvent>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.provider,
        "exemplars": state.controller.examples().len(),
        "tables": state.controller.schema().tables.len(),
    }))
}

pub async fn schema(State(state): State<Arc<AppState>>) -> Json<SchemaInfo> {
    Json(state.controller.schema().clone())
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "question must not be empty".to_string(),
                events: vec![],
            }),
        ));
    }

    let mut events = Vec::new();
    match state.controller.ask(question, &mut events).await {
        Ok(outcome) => Ok(Json(AskResponse { events, outcome })),
        Err(e) => {
            let status = match e {
                Error::Normalization(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, Json(ErrorResponse { error: e.to_string(), events })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerSettings;
    use crate::database::{Database, SqliteDatabase};
    use crate::exemplar::store::tests::CharEmbedder;
    use crate::exemplar::MemoryExampleStore;
    use crate::llm::{LanguageModel, QueryGenerator};
    use crate::controller::RetryController;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl LanguageModel for Fixed {
        async fn invoke(&self, _prompt: &str) -> crate::Result<String> {
            Ok(self.0.to_string())
        }

        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn state(sql: &'static str) -> Arc<AppState> {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE sales (類別 TEXT, 銷售額 REAL);
             INSERT INTO sales VALUES ('飲料', 10.0), ('飲料', 20.0), ('零食', 5.0);",
        )
        .unwrap();
        let schema = db.describe_schema().unwrap();
        let controller = RetryController::new(
            Arc::new(schema),
            Arc::new(MemoryExampleStore::new(Arc::new(CharEmbedder::new()))),
            QueryGenerator::new(Arc::new(Fixed(sql))),
            Arc::new(db),
            ControllerSettings::default(),
        );
        Arc::new(AppState { controller, provider: "fixed" })
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health(State(state("SELECT 1"))).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "fixed");
        assert_eq!(body["tables"], 1);
        assert_eq!(body["exemplars"], 0);
    }

    #[tokio::test]
    async fn test_schema_lists_tables() {
        let Json(schema) = schema(State(state("SELECT 1"))).await;
        assert_eq!(schema.tables[0].name, "sales");
    }

    #[tokio::test]
    async fn test_ask_answers() {
        let sql = "SELECT 類別, AVG(銷售額) AS 平均 FROM \"sales\" GROUP BY 類別 ORDER BY 平均 DESC";
        let Json(response) = ask(
            State(state(sql)),
            Json(AskRequest { question: "每個類別的平均銷售額是多少？".into() }),
        )
        .await
        .unwrap_or_else(|_| panic!("ask failed"));

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["outcome"]["status"], "answered");
        assert_eq!(body["outcome"]["table"]["columns"][1], "平均");
        assert_eq!(body["outcome"]["table"]["rows"][0][1], 15.0);
        assert_eq!(body["events"][0]["type"], "question");
    }

    #[tokio::test]
    async fn test_ask_exhausted_reports_last_error() {
        let Json(response) = ask(State(state("SELECT nope FROM \"sales\"")), Json(AskRequest { question: "q".into() }))
            .await
            .unwrap_or_else(|_| panic!("ask failed"));

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["outcome"]["status"], "exhausted");
        assert_eq!(body["outcome"]["attempts"], 3);
        assert!(body["outcome"]["last"]["error"].as_str().unwrap().contains("no such column"));
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let err = ask(State(state("SELECT 1")), Json(AskRequest { question: "  ".into() }))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
