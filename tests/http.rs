//! End-to-end tests of the HTTP surface against fake pipeline stages and a
//! recording summarizer, so no LibreOffice, pdfium, Tesseract, or network
//! access is required.

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::Value;
use slides2text::config::{AppConfig, SummaryMode};
use slides2text::error::{PipelineError, SlideError};
use slides2text::job::JobStore;
use slides2text::pipeline::DocumentPipeline;
use slides2text::server::{router, AppState};
use slides2text::summarize::{Provider, SummarizationBackend, SummarizerFactory};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fake document pipeline with scriptable failures.
#[derive(Default)]
struct FakePipeline {
    pages: usize,
    fail_convert: bool,
    /// 1-based slide whose OCR call fails.
    ocr_fails_on: Option<usize>,
    /// 1-based slide whose OCR returns empty text.
    empty_text_on: Option<usize>,
    /// Conversion out_dirs seen, for temp-dir cleanup assertions.
    seen_dirs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl DocumentPipeline for FakePipeline {
    async fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, PipelineError> {
        self.seen_dirs.lock().unwrap().push(out_dir.to_path_buf());
        if self.fail_convert {
            return Err(PipelineError::ConversionFailed {
                path: input.to_path_buf(),
                stderr: "source file could not be loaded".into(),
            });
        }
        Ok(out_dir.join("deck.pdf"))
    }

    async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        Ok((1..=self.pages)
            .map(|n| out_dir.join(format!("page_{n:03}.png")))
            .collect())
    }

    async fn extract_text(&self, slide: usize, _image: &Path) -> Result<String, SlideError> {
        if self.ocr_fails_on == Some(slide) {
            return Err(SlideError::OcrFailed {
                slide,
                detail: "unreadable image".into(),
            });
        }
        if self.empty_text_on == Some(slide) {
            return Ok(String::new());
        }
        Ok(format!("Slide {slide} content"))
    }
}

/// Recording backend: counts calls and can fail per slide.
struct CountingBackend {
    api_key: String,
    calls: Arc<AtomicUsize>,
    fail_on: Option<usize>,
}

#[async_trait]
impl SummarizationBackend for CountingBackend {
    async fn summarize_text(&self, slide: usize, _text: &str) -> Result<String, SlideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(slide) {
            return Err(SlideError::SummaryFailed {
                slide,
                detail: "rate limited".into(),
            });
        }
        Ok(format!("Summary {slide} via {}", self.api_key))
    }

    async fn summarize_image(&self, slide: usize, _image: &Path) -> Result<String, SlideError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Vision summary {slide}"))
    }
}

/// Factory that records the key each job was created with.
#[derive(Default)]
struct CountingFactory {
    calls: Arc<AtomicUsize>,
    keys: Mutex<Vec<String>>,
    fail_on: Option<usize>,
}

impl SummarizerFactory for CountingFactory {
    fn create(&self, _provider: Provider, api_key: String) -> Arc<dyn SummarizationBackend> {
        self.keys.lock().unwrap().push(api_key.clone());
        Arc::new(CountingBackend {
            api_key,
            calls: Arc::clone(&self.calls),
            fail_on: self.fail_on,
        })
    }
}

struct Harness {
    server: TestServer,
    store: JobStore,
    pipeline: Arc<FakePipeline>,
    factory: Arc<CountingFactory>,
}

fn harness(pipeline: FakePipeline, factory: CountingFactory) -> Harness {
    harness_with_config(
        pipeline,
        factory,
        AppConfig {
            openai_api_key: Some("server-openai-key".into()),
            processing_delay_ms: 0,
            ..AppConfig::default()
        },
    )
}

fn harness_with_config(
    pipeline: FakePipeline,
    factory: CountingFactory,
    config: AppConfig,
) -> Harness {
    let store = JobStore::new();
    let pipeline = Arc::new(pipeline);
    let factory = Arc::new(factory);
    let state = AppState {
        store: store.clone(),
        pipeline: pipeline.clone(),
        summarizers: factory.clone(),
        config: Arc::new(config),
    };
    Harness {
        server: TestServer::new(router(state)).expect("test server"),
        store,
        pipeline,
        factory,
    }
}

fn deck_form(filename: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(b"PK\x03\x04 fake deck".to_vec())
            .file_name(filename)
            .mime_type("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    )
}

async fn upload_deck(server: &TestServer, form: MultipartForm) -> String {
    let res = server.post("/upload").multipart(form).await;
    res.assert_status_ok();
    res.json::<Value>()["job_id"]
        .as_str()
        .expect("job_id in response")
        .to_string()
}

/// Poll /status until the job reaches a terminal state.
async fn wait_for_terminal(server: &TestServer, job_id: &str) -> Value {
    for _ in 0..200 {
        let res = server.get(&format!("/status/{job_id}")).await;
        res.assert_status_ok();
        let job: Value = res.json();
        match job["status"].as_str() {
            Some("completed") | Some("error") => return job,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("job {job_id} did not reach a terminal state");
}

#[tokio::test]
async fn root_reports_liveness() {
    let h = harness(FakePipeline::default(), CountingFactory::default());
    let res = h.server.get("/").await;
    res.assert_status_ok();
    assert!(res.json::<Value>()["message"]
        .as_str()
        .unwrap()
        .contains("running"));
}

#[tokio::test]
async fn upload_rejects_non_powerpoint_files() {
    let h = harness(FakePipeline::default(), CountingFactory::default());
    let res = h.server.post("/upload").multipart(deck_form("notes.pdf")).await;
    res.assert_status_bad_request();
    assert_eq!(
        res.json::<Value>()["detail"],
        "Only PowerPoint files (.ppt, .pptx) are allowed"
    );
}

#[tokio::test]
async fn upload_rejects_unknown_provider() {
    let h = harness(FakePipeline::default(), CountingFactory::default());
    let form = deck_form("deck.pptx").add_text("provider", "claude");
    let res = h.server.post("/upload").multipart(form).await;
    res.assert_status_bad_request();
    assert!(res.json::<Value>()["detail"]
        .as_str()
        .unwrap()
        .contains("Unknown provider"));
}

#[tokio::test]
async fn upload_rejects_missing_api_key() {
    // Gemini has no server-side key in the harness config.
    let h = harness(FakePipeline::default(), CountingFactory::default());
    let form = deck_form("deck.pptx").add_text("provider", "gemini");
    let res = h.server.post("/upload").multipart(form).await;
    res.assert_status_bad_request();
    assert!(res.json::<Value>()["detail"]
        .as_str()
        .unwrap()
        .contains("gemini"));
}

#[tokio::test]
async fn three_slide_deck_completes_with_all_results() {
    let h = harness(
        FakePipeline {
            pages: 3,
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;

    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["message"], "Processing complete!");
    let results = job["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r["slide"], i as u64 + 1);
        assert_eq!(r["text"], format!("Slide {} content", i + 1));
        assert!(r["summary"].as_str().unwrap().starts_with("Summary"));
    }
    assert_eq!(h.factory.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn summary_failure_degrades_one_slide_only() {
    let h = harness(
        FakePipeline {
            pages: 3,
            ..FakePipeline::default()
        },
        CountingFactory {
            fail_on: Some(2),
            ..CountingFactory::default()
        },
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;

    assert_eq!(job["status"], "completed");
    let results = job["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0]["summary"].as_str().unwrap().starts_with("Summary"));
    assert!(results[1]["summary"].as_str().unwrap().starts_with("Error:"));
    assert!(results[2]["summary"].as_str().unwrap().starts_with("Summary"));
}

#[tokio::test]
async fn ocr_failure_records_placeholder_text() {
    let h = harness(
        FakePipeline {
            pages: 2,
            ocr_fails_on: Some(1),
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;

    assert_eq!(job["status"], "completed");
    let results = job["results"].as_array().unwrap();
    assert_eq!(results[0]["text"], "[Error extracting text]");
    assert!(results[0]["summary"].as_str().unwrap().starts_with("Error:"));
    assert!(results[1]["summary"].as_str().unwrap().starts_with("Summary"));
    // The failed slide never reaches the backend.
    assert_eq!(h.factory.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_slide_skips_the_backend() {
    let h = harness(
        FakePipeline {
            pages: 2,
            empty_text_on: Some(1),
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;

    let results = job["results"].as_array().unwrap();
    assert_eq!(results[0]["text"], "");
    assert_eq!(results[0]["summary"], "No text detected on this slide.");
    assert_eq!(h.factory.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vision_mode_summarizes_blank_slides_from_the_image() {
    // A chart-only slide yields empty OCR text; the image summary must
    // still be produced, so the backend is called once per slide.
    let h = harness_with_config(
        FakePipeline {
            pages: 2,
            empty_text_on: Some(1),
            ..FakePipeline::default()
        },
        CountingFactory::default(),
        AppConfig {
            openai_api_key: Some("server-openai-key".into()),
            processing_delay_ms: 0,
            summary_mode: SummaryMode::Vision,
            ..AppConfig::default()
        },
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;

    assert_eq!(job["status"], "completed");
    let results = job["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["text"], "");
    assert!(results[0]["summary"]
        .as_str()
        .unwrap()
        .starts_with("Vision summary"));
    assert!(results[1]["summary"]
        .as_str()
        .unwrap()
        .starts_with("Vision summary"));
    assert_eq!(h.factory.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn conversion_failure_is_a_terminal_error() {
    let h = harness(
        FakePipeline {
            fail_convert: true,
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;

    assert_eq!(job["status"], "error");
    assert!(job["message"]
        .as_str()
        .unwrap()
        .contains("source file could not be loaded"));
    assert!(job["results"].as_array().unwrap().is_empty());
    assert_eq!(h.factory.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn work_dir_is_removed_after_completion_and_failure() {
    for fail_convert in [false, true] {
        let h = harness(
            FakePipeline {
                pages: 1,
                fail_convert,
                ..FakePipeline::default()
            },
            CountingFactory::default(),
        );
        let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
        wait_for_terminal(&h.server, &job_id).await;

        let dirs = h.pipeline.seen_dirs.lock().unwrap().clone();
        assert_eq!(dirs.len(), 1);
        // out_dir lives inside the per-job temp dir; its parent must be gone.
        let work_dir = dirs[0].parent().unwrap();
        assert!(
            !work_dir.exists(),
            "work dir must be removed (fail_convert={fail_convert})"
        );
    }
}

#[tokio::test]
async fn status_of_unknown_job_is_not_found() {
    let h = harness(FakePipeline::default(), CountingFactory::default());
    let res = h.server.get("/status/no-such-job").await;
    res.assert_status_not_found();
    assert_eq!(res.json::<Value>()["detail"], "Job not found");
}

#[tokio::test]
async fn stream_emits_slide_events_then_done() {
    let h = harness(
        FakePipeline {
            pages: 3,
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    wait_for_terminal(&h.server, &job_id).await;

    let res = h.server.get(&format!("/stream/{job_id}")).await;
    res.assert_status_ok();
    let body = res.text();
    assert_eq!(body.matches("event: slide").count(), 3);
    assert_eq!(body.matches("event: done").count(), 1);
    assert!(body.contains("\"slide\":1"));
    assert!(body.contains("\"slide\":3"));
}

#[tokio::test]
async fn stream_is_single_consumer() {
    let h = harness(
        FakePipeline {
            pages: 1,
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("deck.pptx")).await;
    wait_for_terminal(&h.server, &job_id).await;

    h.server
        .get(&format!("/stream/{job_id}"))
        .await
        .assert_status_ok();
    let second = h.server.get(&format!("/stream/{job_id}")).await;
    second.assert_status(axum::http::StatusCode::CONFLICT);

    let unknown = h.server.get("/stream/no-such-job").await;
    unknown.assert_status_not_found();
}

#[tokio::test]
async fn request_key_overrides_server_key() {
    let h = harness(
        FakePipeline {
            pages: 1,
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );

    let form = deck_form("deck.pptx").add_text("openai_api_key", "caller-key");
    let job_id = upload_deck(&h.server, form).await;
    wait_for_terminal(&h.server, &job_id).await;

    let job_id2 = upload_deck(&h.server, deck_form("deck.pptx")).await;
    wait_for_terminal(&h.server, &job_id2).await;

    let keys = h.factory.keys.lock().unwrap().clone();
    assert_eq!(keys, vec!["caller-key", "server-openai-key"]);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn rejected_uploads_leave_no_job_behind() {
    let h = harness(FakePipeline::default(), CountingFactory::default());

    h.server
        .post("/upload")
        .multipart(deck_form("notes.pdf"))
        .await
        .assert_status_bad_request();
    h.server
        .post("/upload")
        .multipart(deck_form("deck.pptx").add_text("provider", "claude"))
        .await
        .assert_status_bad_request();
    h.server
        .post("/upload")
        .multipart(deck_form("deck.pptx").add_text("provider", "gemini"))
        .await
        .assert_status_bad_request();

    assert!(h.store.is_empty().await, "no job entry for failed uploads");
}

#[tokio::test]
async fn uppercase_extension_is_accepted() {
    let h = harness(
        FakePipeline {
            pages: 1,
            ..FakePipeline::default()
        },
        CountingFactory::default(),
    );
    let job_id = upload_deck(&h.server, deck_form("DECK.PPTX")).await;
    let job = wait_for_terminal(&h.server, &job_id).await;
    assert_eq!(job["status"], "completed");
}
