use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use question_pipeline::services::segmenter::{split_by_delimiter, DELIMITER};
use question_pipeline::services::{normalize, CleanPaths};
use question_pipeline::{
    AppError, AppResult, BlobStore, Config, Dispatcher, ExplanationGenerator, ExtractionFlow,
    ExtractionOutcome, FieldExtractor, FsBlobStore, MemoryBlobStore, Outcome, QuestionBlock,
    QuestionRecord, RecordValidator, StreamingChunkReader,
};

/// 按调用顺序返回解释，题干含 "offline" 时失败
#[derive(Default)]
struct FakeGenerator {
    calls: Mutex<usize>,
}

#[async_trait]
impl ExplanationGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if prompt.contains("offline") {
            return Err(AppError::Other("generator offline".to_string()));
        }
        Ok(format!("  Explanation body {}  ", calls))
    }
}

fn config(bucket: &str) -> Config {
    Config {
        bucket: bucket.to_string(),
        batch_size: 2,
        chunk_size: 64,
        streaming_threshold: 1 << 20,
        connect_retries: 1,
        connect_backoff_ms: 0,
        ..Config::default()
    }
}

fn raw_dump(count: usize) -> String {
    (1..=count)
        .map(|i| {
            format!(
                "## Topic 1 Question {i} discussion\n\n\
                 Actual exam question from Microsoft's AZ-900\n\
                 Question #: {i}\n\
                 Topic #: 1\n\
                 [All AZ-900 Questions]\n\
                 Which Azure service runs event-driven code, case {i}?\n\
                 A. Azure Functions\n\
                 B. Azure Virtual Machines\n\
                 C. Azure Files\n\
                 Suggested Answer: A\n\n\
                 Community vote distribution\n"
            )
        })
        .collect()
}

fn text_block(s: &str) -> QuestionBlock {
    QuestionBlock::Text(s.to_string())
}

fn dispatcher(store: Arc<dyn BlobStore>, config: Config) -> Dispatcher {
    Dispatcher::new(config, store, Box::new(FakeGenerator::default()))
}

#[test]
fn test_normalize_is_total_and_idempotent() {
    assert_eq!(normalize(""), "");
    assert_eq!(normalize("日本語テキスト"), "");
    for input in ["  a\t\tb  ", "Why\u{a0}is  the\nsky blue?", "💡 tip: A, C"] {
        let once = normalize(input);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn test_delimited_sections_are_numbered_in_order() {
    let sections: Vec<String> = (1..=4)
        .map(|i| {
            format!(
                "Question {i}:\nWhich storage tier is cheapest for scenario {i}?\n\nOptions:\nA. Hot\nB. Archive\n\nSuggested Answer: B\n"
            )
        })
        .collect();
    let raw = sections.join(&format!("{}\n", DELIMITER));

    let blocks = split_by_delimiter(&raw);
    assert_eq!(blocks.len(), 4);

    let extractor = FieldExtractor::new("Not found");
    let mut validator = RecordValidator::new();
    let records: Vec<QuestionRecord> = blocks
        .iter()
        .filter_map(|block| validator.accept(extractor.extract(block)))
        .collect();

    let numbers: Vec<usize> = records.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert!(records[2].question_text.contains("scenario 3"));
}

#[test]
fn test_question_length_floor() {
    let extractor = FieldExtractor::new("N/A");

    let short = extractor.extract(&text_block(
        "Question 1:\nWhat is Azure?\nA. Cloud\nB. Color\nSuggested Answer: A\n",
    ));
    assert_eq!(short.question_text.chars().count(), 14);
    assert!(!RecordValidator::is_acceptable(&short));

    let long = extractor.extract(&text_block(
        "Question 1:\nWhat is Azures?\nA. Cloud\nB. Color\nSuggested Answer: A\n",
    ));
    assert_eq!(long.question_text.chars().count(), 15);
    assert!(RecordValidator::is_acceptable(&long));
}

#[test]
fn test_option_count_floor() {
    let extractor = FieldExtractor::new("N/A");

    let one = extractor.extract(&text_block(
        "Question 1:\nWhich region hosts the resource group?\nA. East US\nSuggested Answer: A\n",
    ));
    assert_eq!(one.options.len(), 1);
    assert!(!RecordValidator::is_acceptable(&one));

    let two = extractor.extract(&text_block(
        "Question 1:\nWhich region hosts the resource group?\nA. East US\nB. West US\nSuggested Answer: A\n",
    ));
    assert_eq!(two.options.len(), 2);
    assert!(RecordValidator::is_acceptable(&two));
}

#[test]
fn test_structured_list_document() {
    let store = MemoryBlobStore::new("mem");
    store.put_text(
        "clean/sky.json",
        r#"{"questions":[{"question":"Why is the sky blue?","answer":"A","options":{"A":"Rayleigh scattering","B":"Refraction"}}]}"#,
    );
    let config = config("mem");

    let (_, stream) =
        question_pipeline::workflow::explanation_records(&store, "clean/sky.json", &config)
            .unwrap();
    let records: Vec<QuestionRecord> = stream.collect::<AppResult<_>>().unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.number, 1);
    assert_eq!(record.question_text, "Why is the sky blue?");
    assert_eq!(record.suggested_answer, "A");
    assert_eq!(record.options.len(), 2);
    assert_eq!(record.options[&'A'], "Rayleigh scattering");
    assert_eq!(record.options[&'B'], "Refraction");
}

#[test]
fn test_streaming_delimiter_on_chunk_boundary() {
    let first = format!("Question 1:\n{}\nA. yes\nB. no\n", "x".repeat(60));
    let second = format!("Question 2:\n{}\nA. yes\nB. no\n", "y".repeat(120));
    let third = format!("Question 3:\n{}\nA. yes\nB. no\n", "z".repeat(120));
    let raw = format!("{first}{DELIMITER}{second}{DELIMITER}{third}");

    // 第一条分隔线恰好从第二个块的起点开始
    let chunk_size = first.len();
    assert!(raw.len() > 3 * chunk_size);

    let store = MemoryBlobStore::new("mem");
    store.put_text("clean/boundary.txt", &raw);

    let reader = StreamingChunkReader::new(&store, "clean/boundary.txt", chunk_size).unwrap();
    let blocks: Vec<QuestionBlock> = reader.collect::<AppResult<_>>().unwrap();

    assert_eq!(blocks, split_by_delimiter(&raw));
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0], QuestionBlock::Text(first));
    assert_eq!(blocks[1], QuestionBlock::Text(second));
    assert_eq!(blocks[2], QuestionBlock::Text(third));
}

#[test]
fn test_answer_forms() {
    let extractor = FieldExtractor::new("N/A");
    let answer = |tail: &str| {
        let block = format!(
            "Question 1:\nWhich services are serverless offerings?\nA. Functions\nB. Logic Apps\nC. VMs\n{tail}\n"
        );
        extractor.extract(&text_block(&block)).suggested_answer
    };

    assert_eq!(answer("Suggested Answer: B"), "B");
    assert_eq!(answer("**Answer: B**"), "B");
    assert_eq!(answer("Suggested Answer: A, C"), "A,C");
    assert_eq!(answer(""), "N/A");
}

#[test]
fn test_records_json_round_trip() {
    let store = MemoryBlobStore::new("mem");
    store.put_text("input/az900.txt", &raw_dump(3));
    let config = config("mem");

    let flow = ExtractionFlow::new(&store, &config);
    let outcome = flow.run("input/az900.txt").unwrap();
    let ExtractionOutcome::Parsed { json_path, questions, .. } = outcome else {
        panic!("expected parsed outcome");
    };
    assert_eq!(json_path, "clean/az900.json");
    assert_eq!(questions, 3);

    let written: Vec<QuestionRecord> =
        serde_json::from_str(&store.read_text(&json_path).unwrap()).unwrap();
    assert_eq!(written.len(), 3);
    for (i, record) in written.iter().enumerate() {
        assert_eq!(record.number, i + 1);
        assert_eq!(
            record.question_text,
            format!("Which Azure service runs event-driven code, case {}?", i + 1)
        );
        assert_eq!(record.suggested_answer, "A");
        assert_eq!(record.options[&'C'], "Azure Files");
    }

    // 阶段 B 重新读取 JSON 产物，得到相同的字段
    let (_, stream) =
        question_pipeline::workflow::explanation_records(&store, &json_path, &config).unwrap();
    let reparsed: Vec<QuestionRecord> = stream.collect::<AppResult<_>>().unwrap();
    let fields = |r: &QuestionRecord| {
        (
            r.number,
            r.question_text.clone(),
            r.options.clone(),
            r.suggested_answer.clone(),
        )
    };
    assert_eq!(
        reparsed.iter().map(fields).collect::<Vec<_>>(),
        written.iter().map(fields).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_no_questions_writes_error_marker() {
    let store = Arc::new(MemoryBlobStore::new("mem"));
    store.put_text("input/empty.txt", "Nothing useful was scraped from this page.\n");
    let config = config("mem");
    let paths = CleanPaths::for_input("input/empty.txt", &config);

    let outcome = dispatcher(store.clone(), config)
        .parse_object("input/empty.txt")
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Completed {
            input_file: "input/empty.txt".to_string(),
            questions: 0,
            error: "No questions parsed".to_string(),
        }
    );
    assert_eq!(
        store.read_text(&paths.error_marker).unwrap(),
        "No questions parsed"
    );
    assert!(!store.exists(&paths.json).unwrap());
}

#[tokio::test]
async fn test_event_pipeline_on_local_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = dir.path().display().to_string();
    let store = Arc::new(FsBlobStore::new(dir.path()));
    store
        .write("input/az900.txt", raw_dump(3).as_bytes(), "text/plain")
        .unwrap();

    let dispatcher = dispatcher(store.clone(), config(&bucket));
    assert_eq!(dispatcher.health().status, "healthy");

    // 阶段 A：Audit Log 事件
    let audit = json!({
        "protoPayload": {
            "resourceName": "projects/_/buckets/exam-dumps/objects/input/az900.txt"
        },
        "resource": { "labels": { "bucket_name": "exam-dumps" } }
    });
    let outcome = dispatcher.handle_payload(&audit.to_string()).await.unwrap();
    let Outcome::Success { outputs, questions, .. } = outcome else {
        panic!("expected success");
    };
    assert_eq!(questions, 3);
    assert_eq!(outputs[0], "clean/az900.json");
    let clean_text = store.read_text(&outputs[1]).unwrap();
    assert!(clean_text.contains("Question 3:"));
    assert!(clean_text.contains("Suggested Answer: A"));

    // 重复投递：输出已存在
    let again = dispatcher.handle_payload(&audit.to_string()).await.unwrap();
    assert!(matches!(again, Outcome::Skipped { .. }));

    // 整理稿本身不再触发解释
    let clean_path = outputs[1].clone();
    let clean_event = json!({
        "message": { "attributes": { "bucketId": "exam-dumps", "objectId": clean_path } }
    });
    let ignored = dispatcher.handle_event(&clean_event).await.unwrap();
    assert!(matches!(ignored, Outcome::Ignored { .. }));

    // 阶段 B：Pub/Sub 事件
    let pubsub = json!({
        "message": { "attributes": { "bucketId": "exam-dumps", "objectId": "clean/az900.json" } }
    });
    let outcome = dispatcher.handle_event(&pubsub).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Success {
            input_file: "clean/az900.json".to_string(),
            outputs: vec!["explained/az900.json.txt".to_string()],
            questions: 3,
        }
    );

    let explained = store.read_text("explained/az900.json.txt").unwrap();
    assert!(explained.contains("Source: clean/az900.json"));
    assert!(explained.contains("Explanation:\nExplanation body 1\n"));
    assert!(explained.contains("Explanation body 3"));
    let first = explained.find("Question 1:").unwrap();
    let third = explained.find("Question 3:").unwrap();
    assert!(first < third);
}

#[test]
fn test_failed_generation_keeps_batch() {
    let store = Arc::new(MemoryBlobStore::new("mem"));
    store.put_text(
        "clean/mixed.json",
        r#"[
            {"question": "Which service is offline-first?", "answer": "B", "options": ["A. Cosmos", "B. Sync"]},
            {"question": "Which service stores blobs?", "answer": "A", "options": ["A. Storage", "B. Queue"]}
        ]"#,
    );
    let dispatcher = dispatcher(store.clone(), config("mem"));

    let outcome = tokio_test::block_on(dispatcher.explain_object("clean/mixed.json")).unwrap();
    assert!(matches!(outcome, Outcome::Success { questions: 2, .. }));

    let explained = store.read_text("explained/mixed.json.txt").unwrap();
    assert!(explained.contains("[Explanation unavailable: 错误: generator offline]"));
    assert!(explained.contains("Explanation body 2"));
}

#[tokio::test]
async fn test_irrelevant_and_malformed_events() {
    let store = Arc::new(MemoryBlobStore::new("mem"));
    let dispatcher = dispatcher(store.clone(), config("mem"));

    let outcome = dispatcher.handle_payload("not json at all").await.unwrap();
    assert!(matches!(outcome, Outcome::Ignored { .. }));

    let outside = json!({
        "message": { "attributes": { "bucketId": "b", "objectId": "archive/old.txt" } }
    });
    let outcome = dispatcher.handle_event(&outside).await.unwrap();
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({ "status": "ignored", "reason": "Not in input or clean folder" })
    );

    let err = dispatcher.parse_object("input/missing.txt").unwrap_err();
    assert!(err.is_not_found());
    assert!(store.paths().is_empty());
}
