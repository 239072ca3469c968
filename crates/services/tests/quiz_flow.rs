use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{
    Catalog, QuestionBankDraft, QuestionDraft, QuestionId, TopicDraft, TopicId, UserId,
};
use quiz_core::time::fixed_clock;
use serde_json::Value;
use services::{
    AccountService, AppConfig, AppServices, DataLoadError, InMemoryAuthProvider, ProgressStore,
    QuizService, RemoteStatus, RemoteTarget, RemoteWrite, SessionState, SignUpForm, UserContext,
};
use storage::content::StaticContent;
use storage::repository::{
    InMemoryRemoteStore, LocalCache, MemoryCache, PROGRESS_KEY, RemoteScoreStore, Storage,
    StorageError,
};

struct UnreachableRemote;

#[async_trait::async_trait]
impl RemoteScoreStore for UnreachableRemote {
    async fn read_score(&self, _: &UserId, _: &TopicId) -> Result<Option<Value>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn read_scores(&self, _: &UserId) -> Result<BTreeMap<String, Value>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn write_score(&self, _: &UserId, _: &TopicId, _: &Value) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn delete_score(&self, _: &UserId, _: &TopicId) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

fn topic(id: &str) -> TopicId {
    TopicId::new(id).unwrap()
}

fn catalog() -> Catalog {
    Catalog::from_drafts(vec![
        TopicDraft {
            id: topic("fractions"),
            title: "Fractions".into(),
            description: "Adding and comparing fractions".into(),
            category: "math".into(),
            icon: String::new(),
            total_questions: 5,
        },
        TopicDraft {
            id: topic("geometry"),
            title: "Geometry".into(),
            description: String::new(),
            category: "math".into(),
            icon: String::new(),
            total_questions: 3,
        },
    ])
    .unwrap()
}

/// Fractions has five questions whose correct answers are `[0, 1, 2, 3, 0]`;
/// geometry has no question bank.
fn content() -> StaticContent {
    let bank = QuestionBankDraft {
        title: "Fractions".into(),
        questions: [0, 1, 2, 3, 0]
            .into_iter()
            .enumerate()
            .map(|(i, correct)| QuestionDraft {
                id: QuestionId::new(format!("q{}", i + 1)).unwrap(),
                prompt: format!("Question {}", i + 1),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer_index: correct,
            })
            .collect(),
    }
    .validate(topic("fractions"))
    .unwrap();
    StaticContent::new(catalog()).with_bank(bank)
}

struct Fixture {
    cache: Arc<MemoryCache>,
    quiz: QuizService,
    store: ProgressStore,
}

fn fixture(context: UserContext) -> Fixture {
    let cache = Arc::new(MemoryCache::new());
    Fixture {
        quiz: QuizService::new(fixed_clock(), Arc::new(content()), cache.clone()),
        store: ProgressStore::new(catalog(), cache.clone(), context),
        cache,
    }
}

#[tokio::test]
async fn submitted_attempt_scores_records_mistakes_and_syncs() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let user = UserId::new("u1").unwrap();
    let mut fx = fixture(UserContext::signed_in(user.clone(), remote.clone()));

    let mut session = fx.quiz.open(Some(topic("fractions")), false, &fx.store).await;
    assert_eq!(session.state(), &SessionState::InProgress);

    for (i, answer) in [Some(0), Some(1), Some(1), Some(3), None].into_iter().enumerate() {
        if let Some(answer) = answer {
            session.select_answer(answer).unwrap();
        }
        if i < 4 {
            assert!(session.next());
        }
    }
    // The last slot is empty; a caller would not offer submit yet.
    assert!(!session.progress().can_submit);

    let (result, sync) = session.submit(&mut fx.store).unwrap();
    assert_eq!((result.score, result.total, result.percentage), (3, 5, 60));
    assert_eq!(sync.settled().await, RemoteWrite::Written);

    let record = fx.store.record(&topic("fractions")).unwrap();
    let mistakes: Vec<_> = record.mistakes().keys().map(QuestionId::as_str).collect();
    assert_eq!(mistakes, vec!["q3", "q5"]);
    assert_eq!(record.mistakes()[&QuestionId::new("q5").unwrap()].selected_answer, None);

    let stored = remote
        .read_score(&user, &topic("fractions"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["score"], 3);
    assert_eq!(stored["completedQuestions"], 5);
    assert!(fx.cache.get(PROGRESS_KEY).unwrap().contains("\"fractions\""));
}

#[tokio::test]
async fn exit_without_answers_writes_nothing() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let mut fx = fixture(UserContext::signed_in(UserId::new("u1").unwrap(), remote.clone()));

    let mut session = fx.quiz.open(Some(topic("fractions")), false, &fx.store).await;
    session.next();
    let sync = session.exit(&mut fx.store).unwrap();

    assert!(sync.is_none());
    assert_eq!(session.state(), &SessionState::Exited { saved: false });
    assert_eq!(fx.cache.get(PROGRESS_KEY), None);
    assert!(remote.documents().unwrap().is_empty());
}

#[tokio::test]
async fn exit_saves_partial_record_and_next_open_resumes() {
    let mut fx = fixture(UserContext::anonymous());

    let mut session = fx.quiz.open(Some(topic("fractions")), false, &fx.store).await;
    for answer in [0, 1, 2] {
        session.select_answer(answer).unwrap();
        session.next();
    }
    let sync = session.exit(&mut fx.store).unwrap().expect("partial save");
    assert_eq!(sync.settled().await, RemoteWrite::Skipped);

    let record = fx.store.record(&topic("fractions")).unwrap();
    assert_eq!((record.score(), record.completed_questions()), (0, 3));
    assert!(record.completed_at().is_none() && record.last_saved().is_some());
    assert!(record.mistakes().is_empty());

    let resumed = fx.quiz.open(Some(topic("fractions")), false, &fx.store).await;
    assert_eq!(resumed.current_index(), 3);
    assert_eq!(resumed.answers()[..3], [Some(0), Some(1), Some(2)]);

    let retake = fx.quiz.open(Some(topic("fractions")), true, &fx.store).await;
    assert_eq!(retake.current_index(), 0);
    assert!(retake.answers().iter().all(Option::is_none));
}

#[tokio::test]
async fn unreachable_remote_degrades_to_local_only() {
    let mut fx = fixture(UserContext::signed_in(
        UserId::new("u1").unwrap(),
        Arc::new(UnreachableRemote),
    ));

    let outcome = fx.store.load().await;
    assert!(matches!(outcome.remote, RemoteStatus::Failed(_)));

    let mut session = fx.quiz.open(Some(topic("fractions")), false, &fx.store).await;
    session.select_answer(0).unwrap();
    let (_, sync) = session.submit(&mut fx.store).unwrap();

    assert_eq!(sync.settled().await, RemoteWrite::Failed);
    assert_eq!(fx.store.record(&topic("fractions")).unwrap().score(), 1);
    assert!(fx.cache.get(PROGRESS_KEY).is_some());
}

#[tokio::test]
async fn retake_after_a_finished_attempt_starts_over() {
    let mut fx = fixture(UserContext::anonymous());

    let mut session = fx.quiz.open(Some(topic("fractions")), false, &fx.store).await;
    for answer in [0, 1, 2, 3, 0] {
        session.select_answer(answer).unwrap();
        session.next();
    }
    drop(session.submit(&mut fx.store).unwrap());
    let record = fx.store.record(&topic("fractions")).unwrap();
    assert!(record.completed_at().is_some());
    assert_eq!(record.completed_questions(), 5);

    let retake = fx.quiz.open(Some(topic("fractions")), true, &fx.store).await;
    assert_eq!(retake.state(), &SessionState::InProgress);
    assert_eq!(retake.current_index(), 0);
    assert!(retake.answers().iter().all(Option::is_none));
}

#[tokio::test]
async fn topic_outside_the_catalog_does_not_open() {
    let bank = QuestionBankDraft {
        title: "Stray".into(),
        questions: vec![QuestionDraft {
            id: QuestionId::new("q1").unwrap(),
            prompt: "Orphan question".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer_index: 0,
        }],
    }
    .validate(topic("stray"))
    .unwrap();
    let content = content().with_bank(bank);
    let cache = Arc::new(MemoryCache::new());
    let quiz = QuizService::new(fixed_clock(), Arc::new(content), cache.clone());
    let store = ProgressStore::new(catalog(), cache, UserContext::anonymous());

    let session = quiz.open(Some(topic("stray")), false, &store).await;
    assert_eq!(
        session.state(),
        &SessionState::LoadFailed(
            DataLoadError::UnknownTopic(topic("stray")).user_message().into()
        )
    );
    assert!(session.questions().is_empty());
}

#[tokio::test]
async fn remote_that_cannot_be_opened_leaves_progress_local() {
    let cache_path = std::env::temp_dir().join(format!(
        "quiz-flow-unopenable-remote-{}.json",
        std::process::id()
    ));
    let config = AppConfig {
        content_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/../../data").into(),
        cache_path: cache_path.clone(),
        remote: Some(RemoteTarget::Sqlite(
            "sqlite:///nonexistent-dir/quiz/scores.db".into(),
        )),
        user: Some(UserId::new("u1").unwrap()),
    };

    let services = AppServices::from_config(&config, fixed_clock()).await;
    assert!(services.storage().remote.is_none());

    let (mut store, outcome) = services.progress_store().await.unwrap();
    assert!(matches!(outcome.remote, RemoteStatus::Failed(_)));

    let mut session = services
        .quiz()
        .open(Some(topic("fractions")), false, &store)
        .await;
    session.select_answer(0).unwrap();
    let (_, sync) = session.submit(&mut store).unwrap();
    assert_eq!(sync.settled().await, RemoteWrite::Skipped);
    assert!(store.record(&topic("fractions")).is_some());

    let _ = std::fs::remove_file(cache_path);
}

#[tokio::test]
async fn remembered_topic_is_used_when_none_is_given() {
    let fx = fixture(UserContext::anonymous());

    let session = fx.quiz.open(None, false, &fx.store).await;
    assert_eq!(
        session.state(),
        &SessionState::LoadFailed(DataLoadError::NoTopicSelected.user_message().into())
    );

    fx.cache
        .set(storage::repository::CURRENT_TOPIC_KEY, "fractions".into());
    let session = fx.quiz.open(None, false, &fx.store).await;
    assert_eq!(session.topic_id(), Some(&topic("fractions")));
    assert_eq!(session.state(), &SessionState::InProgress);
}

#[tokio::test]
async fn missing_bank_fails_without_panicking() {
    let fx = fixture(UserContext::anonymous());
    let session = fx.quiz.open(Some(topic("geometry")), false, &fx.store).await;
    assert!(matches!(session.state(), SessionState::LoadFailed(_)));
    assert!(session.questions().is_empty());
}

#[tokio::test]
async fn later_attempt_on_another_device_wins_after_reload() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let user = UserId::new("u1").unwrap();
    let content = Arc::new(content());

    let services_at = |clock| {
        let storage = Storage::new(Arc::new(MemoryCache::new())).with_remote(remote.clone());
        AppServices::new(storage, content.clone(), clock, Some(user.clone()))
    };

    // First device finishes with everything right.
    let first = services_at(fixed_clock());
    let (mut store, _) = first.progress_store().await.unwrap();
    let mut session = first.quiz().open(Some(topic("fractions")), false, &store).await;
    for answer in [0, 1, 2, 3, 0] {
        session.select_answer(answer).unwrap();
        session.next();
    }
    let (_, sync) = session.submit(&mut store).unwrap();
    assert_eq!(sync.settled().await, RemoteWrite::Written);

    // Second device, a minute later, scores lower but is newer.
    let mut later = fixed_clock();
    later.advance(Duration::minutes(1));
    let second = services_at(later);
    let (mut store, _) = second.progress_store().await.unwrap();
    let mut session = second.quiz().open(Some(topic("fractions")), true, &store).await;
    session.select_answer(0).unwrap();
    let (_, sync) = session.submit(&mut store).unwrap();
    assert_eq!(sync.settled().await, RemoteWrite::Written);

    let (store, outcome) = first.progress_store().await.unwrap();
    assert_eq!(
        outcome.remote,
        RemoteStatus::Merged {
            adopted: vec![topic("fractions")],
            rejected: 0,
        }
    );
    assert_eq!(store.record(&topic("fractions")).unwrap().score(), 1);
    assert_eq!(store.overall_stats().average_accuracy, 20);
}

#[tokio::test]
async fn signed_in_account_owns_the_synced_progress() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let storage = Storage::new(Arc::new(MemoryCache::new())).with_remote(remote.clone());
    let mut services = AppServices::new(storage, Arc::new(content()), fixed_clock(), None);

    let accounts = AccountService::new(Arc::new(InMemoryAuthProvider::new()));
    let account = accounts
        .sign_up(&SignUpForm {
            name: "Ana".into(),
            email: "ana@example.test".into(),
            password: "secret1".into(),
        })
        .await
        .unwrap();
    services.follow_account(&accounts);

    let (mut store, outcome) = services.progress_store().await.unwrap();
    assert_eq!(
        outcome.remote,
        RemoteStatus::Merged {
            adopted: Vec::new(),
            rejected: 0,
        }
    );
    let mut session = services
        .quiz()
        .open(Some(topic("fractions")), false, &store)
        .await;
    session.select_answer(0).unwrap();
    let (_, sync) = session.submit(&mut store).unwrap();
    assert_eq!(sync.settled().await, RemoteWrite::Written);

    let stored = remote
        .read_score(&account.user_id, &topic("fractions"))
        .await
        .unwrap();
    assert!(stored.is_some());
}
