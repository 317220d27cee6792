//! Integration tests for full processing passes against a mock lookup service.

use std::sync::Arc;
use std::time::Duration;

use hyperlink_core::{
    Category, HttpLookupService, HyperlinkRecord, LookupClient, PassControl, PassInput,
    PassOptions, RepairPipeline, ReplacementRule, RetryExecutor, RetryPolicy, TargetSettings,
    TitleMode,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE_URL: &str = "https://docs.example.com/portal";

async fn setup_lookup_server() -> MockServer {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "Version": "2.0",
        "Results": [
            {"Lookup_ID": "TSRC-ABC-123456", "Document_ID": "TSRC-ABC-123456",
             "Content_ID": "123456", "Title": "Policy Document", "Status": "Released"},
            {"Lookup_ID": "TSRC-OPS-200200", "Document_ID": "TSRC-OPS-200200",
             "Content_ID": "200200", "Title": "Operations Guide", "Status": "Released"},
            {"Lookup_ID": "TSRC-ABC-654321", "Title": "Old Manual", "Status": "Expired"}
        ]
    });
    Mock::given(method("POST"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn pipeline(server: &MockServer, title_mode: TitleMode) -> RepairPipeline {
    let service = HttpLookupService::new(format!("{}/lookup", server.uri()), Duration::from_secs(5))
        .expect("valid service url");
    let executor = RetryExecutor::new(RetryPolicy::new(
        1,
        Duration::from_millis(1),
        Duration::from_millis(1),
        false,
    ));
    let options = PassOptions {
        target: TargetSettings::new(BASE_URL, "view/"),
        replacements: vec![ReplacementRule::new("Draft", "Final", "TSRC-ABC-000111")],
        title_mode,
    };
    RepairPipeline::new(options).with_lookup(LookupClient::new(Arc::new(service), executor))
}

fn document() -> PassInput {
    PassInput {
        records: vec![
            HyperlinkRecord::new(BASE_URL, "view/TSRC-ABC-123456", "Policy Doc (123456)").at(3, 12),
            HyperlinkRecord::new("https://legacy.example.com/files?docid=x", "TSRC-OPS-200200", "Operations Guide").at(4, 1),
            HyperlinkRecord::new("https://legacy.example.com/TSRC-ABC-654321", "", "Manual").at(4, 2),
            HyperlinkRecord::new("https://legacy.example.com/TSRC-ABC-777777", "", "Gone").at(4, 3),
            HyperlinkRecord::new("https://legacy.example.com/other", "", "").at(5, 1),
            HyperlinkRecord::new("", "_INTRO", "Introduction").at(6, 1),
            HyperlinkRecord::new("", "zzz", "Appendix").at(6, 2),
            HyperlinkRecord::new("", "", "Plain text").at(7, 1),
        ],
        bookmarks: Some(vec!["_intro".to_string(), "_summary".to_string()]),
    }
}

#[tokio::test]
async fn test_pass_reconciles_document() {
    let server = setup_lookup_server().await;
    let output = pipeline(&server, TitleMode::Apply).run(document()).await;

    let records = &output.records;
    assert_eq!(output.removed.len(), 1);
    assert_eq!(records.len(), 7);

    assert_eq!(records[0].display_text, "Policy Document (123456)");

    assert_eq!(records[1].address, BASE_URL);
    assert_eq!(records[1].anchor, "view/TSRC-OPS-200200");
    assert_eq!(records[1].display_text, "Operations Guide (200200)");

    assert_eq!(records[2].display_text, "Manual - Expired");
    assert_eq!(records[3].display_text, "Gone - Not Found");
    assert_eq!(records[4].anchor, "_intro");
    assert_eq!(records[5].display_text, "Appendix - Broken");
    assert_eq!(records[6].display_text, "Plain text");

    let updated: Vec<_> = output
        .changelog
        .iter_category(Category::Updated)
        .map(|entry| entry.note.as_str())
        .collect();
    assert_eq!(
        updated,
        vec!["Updated URL and Appended Content ID", "Updated Title"]
    );

    assert!(output.report.contains("Page:3 | Line:12 | Updated Title"));
    assert!(output.report.contains("Expired (1):"));
    assert!(output.report.contains("Not Found (1):"));
    assert!(output.report.contains("Error (1):"));
    assert!(output.report.contains("Internal Hyperlink Issues (2):"));
    assert!(!output.report.contains("Replaced ("));
}

#[tokio::test]
async fn test_repeated_pass_is_stable() {
    let server = setup_lookup_server().await;
    let pipeline = pipeline(&server, TitleMode::Apply);

    let first = pipeline.run(document()).await;
    let second = pipeline
        .run(PassInput {
            records: first.records.clone(),
            bookmarks: document().bookmarks,
        })
        .await;

    assert!(second.changelog.is_empty(), "unexpected changes:\n{}", second.report);
    assert_eq!(second.records, first.records);
    assert!(second.removed.is_empty());
}

#[tokio::test]
async fn test_detect_only_reports_without_changing_titles() {
    let server = setup_lookup_server().await;
    let output = pipeline(&server, TitleMode::DetectOnly).run(document()).await;

    assert_eq!(output.records[0].display_text, "Policy Doc (123456)");
    assert_eq!(output.counts[&Category::TitleMismatch], 1);
    assert!(output.report.contains("Title Mismatch (1):"));
    assert!(output.report.contains("Authoritative Title: Policy Document"));
}

#[tokio::test]
async fn test_unreachable_service_still_repairs_locally() {
    let service = HttpLookupService::new("http://127.0.0.1:9/lookup", Duration::from_secs(2))
        .expect("valid service url");
    let executor = RetryExecutor::new(RetryPolicy::new(
        0,
        Duration::from_millis(1),
        Duration::from_millis(1),
        false,
    ));
    let pipeline = RepairPipeline::new(PassOptions {
        target: TargetSettings::new(BASE_URL, "view/"),
        ..PassOptions::default()
    })
    .with_lookup(LookupClient::new(Arc::new(service), executor));

    let output = pipeline.run(document()).await;

    assert_eq!(output.counts[&Category::Error], 2);
    assert_eq!(output.counts[&Category::NotFound], 0);
    assert_eq!(output.records[4].anchor, "_intro");
    assert_eq!(output.records[2].display_text, "Manual (654321)");
}

#[tokio::test]
async fn test_progress_events_are_published() {
    let server = setup_lookup_server().await;
    let (control, progress) = PassControl::new().with_progress_channel();
    let pipeline = pipeline(&server, TitleMode::Apply).with_control(control);

    let output = pipeline.run(document()).await;

    assert!(!output.cancelled);
    let last = *progress.borrow();
    assert_eq!(last.percent, 100);
    assert_eq!(last.total, output.records.len());
}

#[tokio::test]
async fn test_opaque_document_id_keeps_record_reconcilable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Version": "2.0",
            "Results": [{"Lookup_ID": "TSRC-ABC-123456", "Document_ID": "a1b2c3d4",
                         "Title": "Policy Document", "Status": "Released"}]
        })))
        .mount(&server)
        .await;
    let pipeline = pipeline(&server, TitleMode::Apply);
    let input = PassInput {
        records: vec![
            HyperlinkRecord::new("https://legacy.example.com/TSRC-ABC-123456", "", "Policy Doc").at(1, 1),
        ],
        bookmarks: None,
    };

    let first = pipeline.run(input).await;

    let record = &first.records[0];
    assert_eq!(record.address, BASE_URL);
    assert_eq!(record.anchor, "view/TSRC-ABC-123456");
    assert_eq!(record.display_text, "Policy Document (123456)");
    assert_eq!(first.counts[&Category::NotFound], 0);
    assert!(first.report.contains("Old Title: Policy Doc"));

    let second = pipeline
        .run(PassInput {
            records: first.records.clone(),
            bookmarks: None,
        })
        .await;
    assert!(second.changelog.is_empty(), "unexpected changes:\n{}", second.report);
    assert_eq!(second.records, first.records);
}
