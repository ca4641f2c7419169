use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use treasure_hunter_bot::gateway::{ChatTransport, Gateway, Outcome};
use treasure_hunter_bot::llm::{InferenceClient, InferenceProvider, InferenceRequest, LlmError};
use treasure_hunter_bot::preprocessor::ImagePreprocessor;
use treasure_hunter_bot::rate_limiter::RateLimiter;
use treasure_hunter_bot::router::{Command, Event, QuickAction};

/// Records every outgoing message and serves a fixed photo
struct StubChat {
    photo: Vec<u8>,
    sent: Mutex<Vec<Sent>>,
}

#[derive(Debug, Clone)]
struct Sent {
    html: String,
    keyboard: Option<&'static [QuickAction]>,
}

impl StubChat {
    fn new(photo: Vec<u8>) -> Self {
        Self {
            photo,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for StubChat {
    async fn send_typing(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_html(
        &self,
        html: &str,
        keyboard: Option<&'static [QuickAction]>,
    ) -> anyhow::Result<()> {
        self.sent.lock().expect("lock").push(Sent {
            html: html.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn download_photo(&self, _file_id: &str) -> anyhow::Result<Vec<u8>> {
        Ok(self.photo.clone())
    }
}

/// Answers after an optional delay and counts calls
struct StubModel {
    calls: AtomicUsize,
    delay: Duration,
    answer: String,
    last_had_image: Mutex<Option<bool>>,
}

impl StubModel {
    fn new(answer: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            answer: answer.to_string(),
            last_had_image: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InferenceProvider for StubModel {
    async fn complete(&self, request: &InferenceRequest, _model: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_had_image.lock().expect("lock") = Some(request.image.is_some());
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }
}

fn gateway(model: Arc<StubModel>, limit: usize) -> Gateway {
    Gateway::new(
        RateLimiter::new(limit, Duration::from_secs(60), 1_000),
        InferenceClient::with_provider(model, "gpt-4o", Duration::from_secs(60)),
        ImagePreprocessor::new(10 * 1024 * 1024, 1024, 85),
    )
}

fn ask(question: &str) -> Event {
    Event::Command(Command::Ask(question.to_string()))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([120u8, 90, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

#[tokio::test]
async fn eleventh_question_within_a_minute_is_throttled() {
    let model = StubModel::new("Check the beach after storms.", Duration::ZERO);
    let gw = gateway(Arc::clone(&model), 10);
    let chat = StubChat::new(Vec::new());

    for i in 0..10 {
        let outcome = gw.handle(&chat, 42, ask(&format!("question {i}?"))).await;
        assert_eq!(outcome, Outcome::Answered { chunks: 1 }, "request {i}");
    }
    let outcome = gw.handle(&chat, 42, ask("one more?")).await;

    assert!(matches!(outcome, Outcome::Throttled { retry_after_secs } if (1..=60).contains(&retry_after_secs)));
    assert_eq!(model.calls(), 10);
    let last = chat.sent().pop().expect("notice");
    assert!(last.html.contains("Please wait"));

    // Another user is unaffected
    assert_eq!(
        gw.handle(&chat, 43, ask("mine?")).await,
        Outcome::Answered { chunks: 1 }
    );
}

#[tokio::test]
async fn unsupported_image_gets_format_hint_without_inference() {
    let model = StubModel::new("unused", Duration::ZERO);
    let gw = gateway(Arc::clone(&model), 10);
    // TIFF header: recognized, but not accepted
    let chat = StubChat::new(b"II*\x00\x08\x00\x00\x00garbage".to_vec());

    let outcome = gw
        .handle(
            &chat,
            7,
            Event::Photo {
                file_id: "file".to_string(),
                caption: Some("What is this?".to_string()),
            },
        )
        .await;

    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(model.calls(), 0);
    let sent = chat.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("supported format"));
    assert!(sent[0].html.contains("10MB"));
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out_with_apology() {
    let model = StubModel::new("too late", Duration::from_secs(120));
    let gw = gateway(Arc::clone(&model), 10);
    let chat = StubChat::new(Vec::new());

    let outcome = gw
        .handle(&chat, 9, Event::Command(Command::Signal("faint, jumpy, 8 inches".to_string())))
        .await;

    assert_eq!(outcome, Outcome::Unavailable);
    assert_eq!(model.calls(), 1);
    let sent = chat.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("Sorry"));

    // The gateway keeps serving afterwards
    let outcome = gw
        .handle(&chat, 9, Event::Command(Command::Help))
        .await;
    assert_eq!(outcome, Outcome::Replied);
}

#[tokio::test]
async fn photo_analysis_is_followed_by_keyboard() {
    let model = StubModel::new("Looks like a **bronze buckle**.", Duration::ZERO);
    let gw = gateway(Arc::clone(&model), 10);
    let chat = StubChat::new(png(2048, 1536));

    let outcome = gw
        .handle(
            &chat,
            5,
            Event::Photo {
                file_id: "file".to_string(),
                caption: None,
            },
        )
        .await;

    assert_eq!(outcome, Outcome::Answered { chunks: 1 });
    assert_eq!(*model.last_had_image.lock().expect("lock"), Some(true));

    let sent = chat.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].html.starts_with("🔍 <b>Image Analysis:</b>"));
    assert!(sent[0].html.contains("<b>bronze buckle</b>"));
    let keyboard = sent[1].keyboard.expect("follow-up keyboard");
    assert_eq!(keyboard[0], QuickAction::HelpAsk);
}

#[tokio::test]
async fn long_answers_are_split() {
    let paragraph = "Sweep slowly and overlap each pass by half a coil width. ".repeat(30);
    let answer = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
    let model = StubModel::new(&answer, Duration::ZERO);
    let gw = gateway(model, 10).with_chunk_limit(2000);
    let chat = StubChat::new(Vec::new());

    let outcome = gw.handle(&chat, 1, ask("How should I sweep?")).await;

    let Outcome::Answered { chunks } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(chunks >= 3);
    assert!(chat.sent().iter().all(|m| m.html.chars().count() <= 2000));
}

#[tokio::test]
async fn guides_and_usage_do_not_consume_quota() {
    let model = StubModel::new("answer", Duration::ZERO);
    let gw = gateway(Arc::clone(&model), 1);
    let chat = StubChat::new(Vec::new());

    for event in [
        Event::Command(Command::Tips(String::new())),
        Event::Command(Command::Ask(String::new())),
        Event::Callback("help_signal".to_string()),
        Event::Text("hello there".to_string()),
    ] {
        assert_eq!(gw.handle(&chat, 1, event).await, Outcome::Replied);
    }

    assert_eq!(
        gw.handle(&chat, 1, ask("still allowed?")).await,
        Outcome::Answered { chunks: 1 }
    );
    assert_eq!(model.calls(), 1);
}
