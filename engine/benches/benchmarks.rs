//! Performance benchmarks for scorm-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scorm_engine::{
    host_ref, normalize_path, validate_manifest, Answer, DataModelSchema, DirectHost,
    EngineConfig, Manifest, MemoryCache, MockLms, PackageBuilder, Question, QuestionType,
    QuizConfig, ScormEngine, ScormVersion,
};
use std::collections::BTreeMap;

fn create_quiz(size: u32) -> (QuizConfig, BTreeMap<String, Answer>) {
    let questions: Vec<Question> = (0..size)
        .map(|i| Question {
            id: format!("q{i}"),
            kind: if i % 2 == 0 {
                QuestionType::MultipleChoice
            } else {
                QuestionType::MultipleResponse
            },
            text: format!("Question {i}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: if i % 2 == 0 {
                Answer::from("a")
            } else {
                Answer::from(vec!["b", "d"])
            },
            feedback: None,
            points: 1 + i % 5,
        })
        .collect();
    let answers = questions
        .iter()
        .map(|q| (q.id.clone(), q.correct_answer.clone()))
        .collect();
    let quiz = QuizConfig {
        id: "bench".into(),
        title: "Bench".into(),
        description: None,
        passing_score: 70,
        randomize: false,
        max_attempts: None,
        time_limit: None,
        questions,
    };
    (quiz, answers)
}

fn bench_data_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_model");

    group.bench_function("normalize_path", |b| {
        b.iter(|| normalize_path(black_box("cmi.interactions.12.objectives.3.id")))
    });

    for version in [ScormVersion::Scorm12, ScormVersion::Scorm2004] {
        let schema = DataModelSchema::for_version(version);
        let element = match version {
            ScormVersion::Scorm12 => "cmi.core.score.raw",
            ScormVersion::Scorm2004 => "cmi.score.raw",
        };
        group.bench_with_input(
            BenchmarkId::new("check_set", version),
            &schema,
            |b, schema| b.iter(|| schema.check_set(black_box(element), black_box("87.5"))),
        );
    }

    group.finish();
}

fn bench_runtime(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime");

    group.bench_function("set_value_through_mock_lms", |b| {
        let (_lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm2004));
        let mut engine = ScormEngine::new(
            EngineConfig::new(ScormVersion::Scorm2004),
            DirectHost(host),
            MemoryCache::new(),
        );
        engine.initialize(0);
        b.iter(|| engine.set_value(black_box("cmi.location"), black_box("page-12")))
    });

    group.finish();
}

fn bench_quiz(c: &mut Criterion) {
    let mut group = c.benchmark_group("quiz");

    for size in [10u32, 100, 1000].iter() {
        let (quiz, answers) = create_quiz(*size);
        group.bench_with_input(BenchmarkId::new("score", size), &answers, |b, answers| {
            b.iter(|| quiz.score(black_box(answers)))
        });
    }

    group.finish();
}

fn bench_manifest(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest");

    for version in [ScormVersion::Scorm12, ScormVersion::Scorm2004] {
        let package = PackageBuilder::new("bench-course", "Bench Course", version)
            .file("index.html", b"<html></html>".to_vec())
            .file("js/app.js", b"".to_vec())
            .file("css/app.css", b"".to_vec())
            .mastery_score(80)
            .build();
        let Ok(package) = package else {
            continue;
        };
        let xml = package.manifest().to_xml(version);

        group.bench_with_input(BenchmarkId::new("parse", version), &xml, |b, xml| {
            b.iter(|| Manifest::from_xml(black_box(xml)))
        });
        group.bench_with_input(
            BenchmarkId::new("validate", version),
            &package,
            |b, package| b.iter(|| validate_manifest(package.manifest(), package.archive())),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_data_model,
    bench_runtime,
    bench_quiz,
    bench_manifest,
);
criterion_main!(benches);
