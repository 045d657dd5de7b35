//! End-to-end scenarios for scorm-engine
//!
//! These tests drive the public API the way a SCO and its packaging tools do.

use scorm_engine::{
    host_ref, validate_manifest, validate_package, Answer, ApiAdapter, CacheStore, ConnectionMode,
    DirectHost, EngineConfig, Error, ErrorCode, FrameTree, Manifest, MemoryArchive, MemoryCache,
    MockLms, ProgressTracker, Question, QuestionType, QuizConfig, QuizEngine, ScormEngine,
    ScormVersion, SessionState, Standalone, Status, SuspendState, WindowLocator,
    MAX_DISCOVERY_HOPS,
};
use std::rc::Rc;

const T0: u64 = 1_706_745_600_000;

fn connected(version: ScormVersion) -> (Rc<std::cell::RefCell<MockLms>>, ScormEngine) {
    let (lms, host) = host_ref(MockLms::seeded(version));
    let mut engine = ScormEngine::new(
        EngineConfig::new(version),
        DirectHost(host),
        MemoryCache::new(),
    );
    assert!(engine.initialize(T0));
    (lms, engine)
}

fn two_question_quiz() -> QuizConfig {
    let question = |id: &str, key: &str| Question {
        id: id.into(),
        kind: QuestionType::MultipleChoice,
        text: format!("Question {id}"),
        options: vec!["a".into(), "b".into(), "c".into()],
        correct_answer: Answer::from(key),
        feedback: None,
        points: 10,
    };
    QuizConfig {
        id: "final".into(),
        title: "Final check".into(),
        description: None,
        passing_score: 70,
        randomize: false,
        max_attempts: Some(2),
        time_limit: None,
        questions: vec![question("q1", "a"), question("q2", "b")],
    }
}

// ============================================================================
// Offline Sessions
// ============================================================================

#[test]
fn offline_location_survives_restart() {
    let cache = MemoryCache::new();

    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm12),
        Standalone,
        cache.reopen(),
    );
    assert!(engine.initialize(T0));
    assert_eq!(engine.mode(), Some(ConnectionMode::LocalCache));
    engine
        .set_value("cmi.core.lesson_location", "page2")
        .unwrap();
    assert!(engine.terminate());

    let mut restarted = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm12),
        Standalone,
        cache.reopen(),
    );
    assert!(restarted.initialize(T0 + 60_000));
    assert_eq!(
        restarted.get_value("cmi.core.lesson_location").as_deref(),
        Ok("page2")
    );
}

#[test]
fn offline_session_still_validates() {
    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm12),
        Standalone,
        MemoryCache::new(),
    );
    assert!(engine.initialize(T0));

    assert_eq!(
        engine.set_value("cmi.core.no_such_thing", "x"),
        Err(ErrorCode::InvalidArgument)
    );
    assert_eq!(engine.get_last_error(), ErrorCode::InvalidArgument);
    assert_eq!(
        engine.set_value("cmi.core.score.raw", "lots"),
        Err(ErrorCode::InvalidSetValue)
    );
    assert!(engine.set_value("cmi.core.score.raw", "42").is_ok());
    assert_eq!(engine.get_last_error(), ErrorCode::NoError);
}

#[test]
fn uncommitted_offline_writes_are_lost() {
    let cache = MemoryCache::new();
    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm2004),
        Standalone,
        cache.reopen(),
    );
    engine.initialize(T0);
    engine.set_value("cmi.location", "p7").unwrap();

    // No commit, no terminate: a reopened store has nothing.
    assert_eq!(cache.reopen().get_value("cmi.location"), "");

    engine.commit().unwrap();
    assert_eq!(cache.durable_value("cmi.location").as_deref(), Some("p7"));
}

// ============================================================================
// Host Discovery
// ============================================================================

#[test]
fn api_beyond_hop_limit_falls_back_to_cache() {
    let (lms, api) = host_ref(MockLms::seeded(ScormVersion::Scorm12));
    let mut tree = FrameTree::new();
    let mut current = tree.add_top();
    tree.install(current, ScormVersion::Scorm12, api);
    for _ in 0..=MAX_DISCOVERY_HOPS {
        current = tree.add_child(current);
    }
    let tree = Rc::new(tree);

    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm12),
        WindowLocator::new(tree.frame(current)),
        MemoryCache::new(),
    );
    assert!(engine.initialize(T0));
    assert!(!engine.is_connected());
    assert!(!lms.borrow().is_initialized());
}

#[test]
fn api_in_ancestor_frame_is_used() {
    let (lms, api) = host_ref(MockLms::seeded(ScormVersion::Scorm2004));
    let mut tree = FrameTree::new();
    let top = tree.add_top();
    tree.install(top, ScormVersion::Scorm2004, api);
    let player = tree.add_child(top);
    let sco = tree.add_child(player);
    let tree = Rc::new(tree);

    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm2004),
        WindowLocator::new(tree.frame(sco)),
        MemoryCache::new(),
    );
    assert!(engine.initialize(T0));
    assert!(engine.is_connected());
    assert_eq!(engine.get_value("cmi.learner_id").as_deref(), Ok("12345"));
    assert!(lms.borrow().is_initialized());
}

#[test]
fn wrong_version_api_is_ignored() {
    let (_lms, api) = host_ref(MockLms::seeded(ScormVersion::Scorm12));
    let mut tree = FrameTree::new();
    let top = tree.add_top();
    tree.install(top, ScormVersion::Scorm12, api);
    let tree = Rc::new(tree);

    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm2004),
        WindowLocator::new(tree.frame(top)),
        MemoryCache::new(),
    );
    assert!(engine.initialize(T0));
    assert_eq!(engine.mode(), Some(ConnectionMode::LocalCache));
}

// ============================================================================
// Session State Machine
// ============================================================================

#[test]
fn calls_before_initialize_are_rejected() {
    let (lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm12));
    let mut adapter = ApiAdapter::new(ScormVersion::Scorm12);

    assert_eq!(
        adapter.get_value("cmi.core.student_id"),
        Err(ErrorCode::NotInitialized)
    );
    assert_eq!(
        adapter.set_value("cmi.core.lesson_location", "p1"),
        Err(ErrorCode::NotInitialized)
    );
    assert_eq!(adapter.commit(), Err(ErrorCode::NotInitialized));
    assert_eq!(adapter.state(), SessionState::Uninitialized);
    assert_eq!(adapter.get_last_error(), ErrorCode::NotInitialized);

    adapter.initialize(&DirectHost(host)).unwrap();
    assert_eq!(adapter.state(), SessionState::Initialized);
    assert_eq!(adapter.get_last_error(), ErrorCode::NoError);
    assert!(lms.borrow().is_initialized());
}

#[test]
fn calls_after_terminate_are_rejected() {
    let (lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm2004));
    let locator = DirectHost(host);
    let mut adapter = ApiAdapter::new(ScormVersion::Scorm2004);
    adapter.initialize(&locator).unwrap();
    adapter.set_value("cmi.location", "p3").unwrap();
    adapter.terminate().unwrap();
    assert!(lms.borrow().is_terminated());

    assert_eq!(
        adapter.get_value("cmi.location"),
        Err(ErrorCode::NotInitialized)
    );
    assert_eq!(adapter.commit(), Err(ErrorCode::NotInitialized));
    assert_eq!(adapter.terminate(), Err(ErrorCode::NotInitialized));
    assert_eq!(adapter.state(), SessionState::Terminated);

    // A terminated session cannot be reopened.
    assert_eq!(
        adapter.initialize(&locator),
        Err(ErrorCode::GeneralException)
    );
    assert_eq!(adapter.state(), SessionState::Terminated);
}

#[test]
fn engine_data_calls_need_a_session() {
    let mut engine = ScormEngine::new(
        EngineConfig::new(ScormVersion::Scorm2004),
        Standalone,
        MemoryCache::new(),
    );
    assert_eq!(
        engine.get_value("cmi.location"),
        Err(ErrorCode::NotInitialized)
    );
    assert!(!engine.terminate());
    assert!(!engine.tick(T0 + 3_600_000));
}

#[test]
fn auto_commit_runs_once_per_period() {
    let (lms, mut engine) = connected(ScormVersion::Scorm2004);
    let interval = engine.config().auto_commit_interval;

    assert!(!engine.tick(T0 + interval - 1));
    assert!(engine.tick(T0 + interval));
    assert!(!engine.tick(T0 + interval + 1));
    // Several missed periods collapse into one commit.
    assert!(engine.tick(T0 + interval * 5));
    assert_eq!(lms.borrow().commit_count(), 2);

    assert!(engine.terminate());
    assert!(!engine.tick(T0 + interval * 10));
    assert_eq!(lms.borrow().commit_count(), 2);
}

// ============================================================================
// Quizzes
// ============================================================================

#[test]
fn half_right_quiz_fails_and_reports_score() {
    let (lms, engine) = connected(ScormVersion::Scorm2004);
    let mut tracker = ProgressTracker::new(engine, T0);
    let mut quiz = QuizEngine::load(two_question_quiz(), &mut tracker);

    quiz.start_attempt(T0).unwrap();
    quiz.answer_question("q1", Answer::from("a")).unwrap();
    quiz.answer_question("q2", Answer::from("c")).unwrap();
    let attempt = quiz.submit_attempt(&mut tracker, T0 + 30_000).unwrap();

    assert_eq!(attempt.score, Some(50));
    assert_eq!(attempt.passed, Some(false));
    assert_eq!(attempt.end_time, Some(T0 + 30_000));
    assert_eq!(quiz.attempts_remaining(), Some(1));

    let lms = lms.borrow();
    assert_eq!(lms.value("cmi.score.raw"), Some("50"));
    assert_eq!(lms.value("cmi.score.scaled"), Some("0.5"));
    // One attempt left, so no failure is recorded yet.
    assert_ne!(lms.value("cmi.success_status"), Some("failed"));
}

#[test]
fn quiz_history_resumes_from_suspend_data() {
    let (lms, engine) = connected(ScormVersion::Scorm12);
    let mut tracker = ProgressTracker::new(engine, T0);
    let mut quiz = QuizEngine::load(two_question_quiz(), &mut tracker);
    quiz.start_attempt(T0).unwrap();
    quiz.answer_question("q1", Answer::from("a")).unwrap();
    quiz.answer_question("q2", Answer::from("b")).unwrap();
    quiz.submit_attempt(&mut tracker, T0 + 1_000).unwrap();

    assert_eq!(lms.borrow().value("cmi.core.lesson_status"), Some("passed"));
    let raw = tracker.suspend_data();
    let state = SuspendState::decode(&raw, "final").unwrap();
    assert!(!state.is_legacy());
    assert_eq!(state.attempts("final").len(), 1);

    let reloaded = QuizEngine::load(two_question_quiz(), &mut tracker);
    assert_eq!(reloaded.attempts().len(), 1);
    assert_eq!(reloaded.attempts()[0].score, Some(100));
}

#[test]
fn exhausting_attempts_marks_failure() {
    let (lms, engine) = connected(ScormVersion::Scorm2004);
    let mut tracker = ProgressTracker::new(engine, T0);
    let mut quiz = QuizEngine::load(two_question_quiz(), &mut tracker);

    for i in 0..2 {
        quiz.start_attempt(T0 + i).unwrap();
        quiz.submit_attempt(&mut tracker, T0 + i + 1).unwrap();
    }
    assert!(quiz.start_attempt(T0 + 10).is_err());
    assert_eq!(lms.borrow().value("cmi.success_status"), Some("failed"));
    assert_eq!(lms.borrow().value("cmi.completion_status"), Some("completed"));
}

fn long_fill_in_quiz() -> QuizConfig {
    let questions = (0..60)
        .map(|i| Question {
            id: format!("q{i:02}"),
            kind: QuestionType::FillIn,
            text: format!("Describe step {i}"),
            options: Vec::new(),
            correct_answer: Answer::from("expected"),
            feedback: None,
            points: 1,
        })
        .collect();
    QuizConfig {
        id: "essay".into(),
        title: "Written check".into(),
        description: None,
        passing_score: 70,
        randomize: false,
        max_attempts: Some(2),
        time_limit: None,
        questions,
    }
}

#[test]
fn attempt_history_survives_suspend_data_limit() {
    let (_lms, engine) = connected(ScormVersion::Scorm12);
    let mut tracker = ProgressTracker::new(engine, T0);
    let mut quiz = QuizEngine::load(long_fill_in_quiz(), &mut tracker);

    for attempt in 0..2u64 {
        quiz.start_attempt(T0 + attempt * 10).unwrap();
        for i in 0..60 {
            let answer = format!("a free-text answer to step {i} written at some length");
            quiz.answer_question(&format!("q{i:02}"), Answer::Single(answer))
                .unwrap();
        }
        quiz.submit_attempt(&mut tracker, T0 + attempt * 10 + 5)
            .unwrap();
    }
    assert!(tracker.suspend_data().len() <= 4096);

    let mut reloaded = QuizEngine::load(long_fill_in_quiz(), &mut tracker);
    assert_eq!(reloaded.attempts().len(), 2);
    assert!(reloaded.attempts().iter().all(|a| a.score == Some(0)));
    assert_eq!(reloaded.attempts_remaining(), Some(0));
    assert!(reloaded.start_attempt(T0 + 100).is_err());
}

#[test]
fn unsaveable_history_is_reported() {
    let (lms, engine) = connected(ScormVersion::Scorm12);
    let mut tracker = ProgressTracker::new(engine, T0);
    let mut config = two_question_quiz();
    config.max_attempts = None;
    let mut quiz = QuizEngine::load(config, &mut tracker);

    let mut failed = None;
    for i in 0..200u64 {
        quiz.start_attempt(T0 + i * 10).unwrap();
        quiz.answer_question("q1", Answer::from("a")).unwrap();
        if let Err(e) = quiz.submit_attempt(&mut tracker, T0 + i * 10 + 5) {
            failed = Some((i, e));
            break;
        }
    }

    let (index, error) = failed.expect("history should outgrow suspend data");
    assert!(matches!(error, Error::InvalidSuspendData(_)));
    // The attempt still counts and its score still reaches the LMS.
    assert_eq!(quiz.attempts().len() as u64, index + 1);
    assert_eq!(lms.borrow().value("cmi.core.score.raw"), Some("50"));
}

#[test]
fn completing_with_score_uses_configured_pass_mark() {
    let (lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm12));
    let config = EngineConfig::new(ScormVersion::Scorm12).with_passing_score(80.0);
    let mut engine = ScormEngine::new(config, DirectHost(host), MemoryCache::new());
    engine.initialize(T0);
    let mut tracker = ProgressTracker::new(engine, T0);

    tracker.complete(Some(75.0), T0 + 90_000).unwrap();

    let lms = lms.borrow();
    assert_eq!(lms.value("cmi.core.lesson_status"), Some("failed"));
    assert_eq!(lms.value("cmi.core.score.raw"), Some("75"));
    assert_eq!(lms.value("cmi.core.session_time"), Some("00:01:30"));
    assert!(lms.commit_count() >= 1);
}

#[test]
fn tracker_status_round_trips_through_lms() {
    let (_lms, engine) = connected(ScormVersion::Scorm2004);
    let mut tracker = ProgressTracker::new(engine, T0);
    tracker.set_status(Status::Incomplete).unwrap();
    tracker.set_progress(0.25).unwrap();
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.status, Status::Incomplete.as_str());
    assert_eq!(snapshot.progress, 0.25);
}

// ============================================================================
// Packages
// ============================================================================

const UNDECLARED_RESOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="course" version="1.0"
          xmlns="http://www.imsglobal.org/xsd/imscp_v1p1">
  <organizations default="org">
    <organization identifier="org">
      <title>Course</title>
      <item identifier="i1" identifierref="R1">
        <title>Lesson</title>
      </item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="R0" type="webcontent" href="index.html">
      <file href="index.html"/>
    </resource>
  </resources>
</manifest>"#;

#[test]
fn item_with_undeclared_resource_fails_validation() {
    let manifest = Manifest::from_xml(UNDECLARED_RESOURCE).unwrap();
    let archive = MemoryArchive::from_paths(["imsmanifest.xml", "index.html"]);

    assert!(!validate_package(&manifest, &archive));
    let report = validate_manifest(&manifest, &archive);
    assert_eq!(report.errors, vec!["Resource not found: R1".to_string()]);
}
