//! End-to-end pipeline scenarios against mock embedding and generation models

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use boardrag::corpus::GameChunks;
use boardrag::corpus::GameCorpus;
use boardrag::corpus::RecommendationCorpus;
use boardrag::corpus::VectorIndex;
use boardrag::embeddings::Embedder;
use boardrag::llm::ChatMessage;
use boardrag::llm::ChatModel;
use boardrag::llm::TextGenerator;
use boardrag::rag::generate::GENERATION_FAILED;
use boardrag::rag::Backend;
use boardrag::rag::RagService;
use boardrag::BoardRagError;
use boardrag::Result;

/// Embedder returning one fixed unit vector, so retrieval rank is decided by
/// the corpus vectors alone.
struct FixedEmbedder {
    vector: Vec<f32>,
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

/// Chat model recording every message sequence it was called with
#[derive(Default)]
struct RecordingChatModel {
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    reply: String,
}

impl RecordingChatModel {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        })
    }

    fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for RecordingChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(format!("  {}  ", self.reply))
    }
}

struct FailingChatModel;

#[async_trait]
impl ChatModel for FailingChatModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(BoardRagError::Generation("rate limited".to_string()))
    }
}

/// Local model echoing the prompt plus a marked answer, exercising the
/// post-processing path.
struct EchoingTextGenerator;

#[async_trait]
impl TextGenerator for EchoingTextGenerator {
    async fn generate(&self, prompt: &str, _max_new_tokens: usize) -> Result<String> {
        Ok(format!("{prompt}[|assistant|] local answer "))
    }
}

fn make_game_corpus() -> Arc<GameCorpus> {
    let rules: HashMap<String, String> = [
        ("뱅".to_string(), "Full rules of Bang: the sheriff must eliminate the outlaws.".to_string()),
        ("카탄".to_string(), "Full rules of Catan: trade and build settlements.".to_string()),
        ("빈게임".to_string(), "   ".to_string()),
    ]
    .into_iter()
    .collect();

    let mut chunks = HashMap::new();
    chunks.insert(
        "뱅".to_string(),
        GameChunks {
            texts: vec![
                "The sheriff must eliminate all outlaws.".to_string(),
                "Outlaws win by killing the sheriff.".to_string(),
            ],
            index: VectorIndex::from_vectors(3, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]),
        },
    );
    // 카탄 has a full rule text but no chunk index: the fallback path

    Arc::new(GameCorpus::from_parts(rules, chunks))
}

fn make_recommendation_corpus() -> Arc<RecommendationCorpus> {
    Arc::new(RecommendationCorpus::from_parts(
        vec!["카탄".to_string(), "아줄".to_string(), "스플렌더".to_string()],
        vec![
            "Resource trading strategy game".to_string(),
            "Tile drafting game".to_string(),
            "Engine building card game".to_string(),
        ],
        VectorIndex::from_vectors(
            3,
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.9, 0.1, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        ),
    ))
}

fn make_service(
    chat_model: Arc<dyn ChatModel>,
    local_model: Option<Arc<dyn TextGenerator>>,
) -> RagService {
    RagService::new(
        Arc::new(FixedEmbedder {
            vector: vec![1.0, 0.0, 0.0],
        }),
        chat_model,
        local_model,
        make_game_corpus(),
        make_recommendation_corpus(),
        256,
    )
}

#[tokio::test]
async fn recommend_mints_session_and_reparses_top_k() {
    let recorder = RecordingChatModel::new("카탄: 자원 관리\n아줄: 타일 배치\n스플렌더: 엔진 빌딩");
    let service = make_service(recorder.clone(), None);

    // top_k of 1 is overridden by the explicit "3개" in the query
    let reply = service
        .recommend("전략 게임 3개 추천해줘", "", 1)
        .await
        .unwrap();

    assert!(!reply.session_id.is_empty());
    assert_eq!(reply.text, "카탄: 자원 관리\n아줄: 타일 배치\n스플렌더: 엔진 빌딩");

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    let system = &calls[0][0];
    assert_eq!(system.role, "system");
    assert!(system.content.contains("[카탄]"));
    assert!(system.content.contains("[아줄]"));
    assert!(system.content.contains("[스플렌더]"));
}

#[tokio::test]
async fn recommend_without_count_uses_given_top_k() {
    let recorder = RecordingChatModel::new("카탄: 최고의 전략 게임");
    let service = make_service(recorder.clone(), None);

    let reply = service.recommend("전략 게임 추천해줘", "", 1).await.unwrap();
    assert!(!reply.session_id.is_empty());

    let system = &recorder.calls()[0][0];
    assert!(system.content.contains("[카탄]"));
    assert!(!system.content.contains("[아줄]"));
    assert!(!system.content.contains("[스플렌더]"));
}

#[tokio::test]
async fn recommend_tolerates_oversized_top_k() {
    let recorder = RecordingChatModel::new("ok");
    let service = make_service(recorder.clone(), None);

    let reply = service.recommend("게임 추천해줘", "", 50).await.unwrap();
    assert_eq!(reply.text, "ok");

    // at most corpus-size context blocks
    let system = &recorder.calls()[0][0];
    assert_eq!(system.content.matches("]\n\n").count(), 3);
}

#[tokio::test]
async fn distinct_blank_tokens_mint_distinct_sessions() {
    let recorder = RecordingChatModel::new("answer");
    let service = make_service(recorder.clone(), None);

    let first = service.recommend("추천", "", 3).await.unwrap();
    let second = service.recommend("추천", "", 3).await.unwrap();
    assert_ne!(first.session_id, second.session_id);
}

#[tokio::test]
async fn explain_rule_keeps_conversation_history() {
    let recorder = RecordingChatModel::new("보안관은 무법자를 모두 제거해야 합니다.");
    let service = make_service(recorder.clone(), None);

    let first = service
        .explain_rule("뱅", "보안관의 역할은?", "", Backend::Hosted)
        .await
        .unwrap();
    let token = first.session_id.clone();

    let second = service
        .explain_rule("뱅", "그럼 나는 뭘 해야 해?", &token, Backend::Hosted)
        .await
        .unwrap();
    assert_eq!(second.session_id, token);

    let calls = recorder.calls();
    assert_eq!(calls.len(), 2);

    // The second prompt must carry the first exchange as prior turns
    let second_messages = &calls[1];
    let roles: Vec<&str> = second_messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert_eq!(second_messages[1].content, "보안관의 역할은?");
    assert_eq!(
        second_messages[2].content,
        "보안관은 무법자를 모두 제거해야 합니다."
    );
    assert_eq!(second_messages[3].content, "그럼 나는 뭘 해야 해?");
}

#[tokio::test]
async fn explain_rule_falls_back_to_full_rules_on_chunk_miss() {
    let recorder = RecordingChatModel::new("카탄에서는 정착지를 짓습니다.");
    let service = make_service(recorder.clone(), None);

    // 카탄 has no chunk index, so the full rule text stands in as context
    let reply = service
        .explain_rule("카탄", "어떻게 이기나요?", "", Backend::Hosted)
        .await
        .unwrap();
    assert_eq!(reply.text, "카탄에서는 정착지를 짓습니다.");

    let calls = recorder.calls();
    let human = &calls[0].last().unwrap().content;
    assert!(human.contains("complete rule text"));
    assert!(human.contains("trade and build settlements"));
}

#[tokio::test]
async fn unknown_game_reports_not_found_on_both_backends() {
    let recorder = RecordingChatModel::new("unused");
    let service = make_service(recorder.clone(), Some(Arc::new(EchoingTextGenerator)));

    for backend in [Backend::Hosted, Backend::Local] {
        let reply = service
            .explain_rule("존재하지않는게임", "룰 알려줘", "", backend)
            .await
            .unwrap();
        assert!(reply.text.contains("존재하지않는게임"));
        assert!(reply.text.contains("No rule data"));
    }

    // Neither backend was ever invoked
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn empty_rule_text_counts_as_not_found() {
    let recorder = RecordingChatModel::new("unused");
    let service = make_service(recorder.clone(), None);

    let reply = service
        .explain_rule("빈게임", "룰 알려줘", "", Backend::Hosted)
        .await
        .unwrap();
    assert!(reply.text.contains("No rule data"));
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn local_backend_is_stateless_and_postprocessed() {
    let recorder = RecordingChatModel::new("unused");
    let service = make_service(recorder.clone(), Some(Arc::new(EchoingTextGenerator)));

    let reply = service
        .explain_rule("뱅", "보안관의 역할은?", "", Backend::Local)
        .await
        .unwrap();

    // echoed prompt and role markers stripped
    assert_eq!(reply.text, "local answer");
    // local backend writes no history and never touches the hosted model
    assert!(recorder.calls().is_empty());
    let stores = service.session_stores();
    assert!(stores.iter().all(|s| !s.contains(&reply.session_id)));
}

#[tokio::test]
async fn local_request_falls_back_to_hosted_when_unavailable() {
    let recorder = RecordingChatModel::new("hosted answer");
    let service = make_service(recorder.clone(), None);

    let reply = service
        .explain_rule("뱅", "보안관의 역할은?", "", Backend::Local)
        .await
        .unwrap();

    assert_eq!(reply.text, "hosted answer");
    assert_eq!(recorder.calls().len(), 1);
}

#[tokio::test]
async fn summarize_rule_shares_store_with_explain() {
    let recorder = RecordingChatModel::new("뱅은 서부극 카드 게임입니다.");
    let service = make_service(recorder.clone(), None);

    let summary = service.summarize_rule("뱅", "", Backend::Hosted).await.unwrap();
    let token = summary.session_id.clone();
    assert_eq!(summary.text, "뱅은 서부극 카드 게임입니다.");

    // A follow-up question on the same token sees the summary as history
    let _ = service
        .explain_rule("뱅", "보안관은 뭘 해?", &token, Backend::Hosted)
        .await
        .unwrap();

    let calls = recorder.calls();
    let follow_up = &calls[1];
    assert!(follow_up
        .iter()
        .any(|m| m.role == "assistant" && m.content == "뱅은 서부극 카드 게임입니다."));
}

#[tokio::test]
async fn summarize_unknown_game_reports_not_found() {
    let recorder = RecordingChatModel::new("unused");
    let service = make_service(recorder.clone(), None);

    let reply = service
        .summarize_rule("존재하지않는게임", "", Backend::Hosted)
        .await
        .unwrap();
    assert!(reply.text.contains("No rule data"));
}

#[tokio::test]
async fn generation_failure_yields_user_facing_message() {
    let service = make_service(Arc::new(FailingChatModel), None);

    let reply = service
        .explain_rule("뱅", "보안관의 역할은?", "", Backend::Hosted)
        .await
        .unwrap();
    assert_eq!(reply.text, GENERATION_FAILED);
}

#[tokio::test]
async fn close_session_clears_both_stores() {
    let recorder = RecordingChatModel::new("answer");
    let service = make_service(recorder.clone(), None);

    let rule_reply = service
        .explain_rule("뱅", "질문", "", Backend::Hosted)
        .await
        .unwrap();
    let token = rule_reply.session_id.clone();

    // Same token used for a recommendation, so it lives in both stores
    let _ = service.recommend("추천해줘", &token, 3).await.unwrap();

    assert!(service.close_session(&token));
    assert!(!service.close_session(&token));
}

#[tokio::test]
async fn list_games_prefers_recommendation_corpus() {
    let recorder = RecordingChatModel::new("unused");
    let service = make_service(recorder.clone(), None);

    assert_eq!(service.list_games(), vec!["카탄", "아줄", "스플렌더"]);
}
