use std::collections::HashMap;
use std::io::Cursor;

use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::json;

use dog_spotter::detect::coco::COCO_DOG;
use dog_spotter::detect::{share, StubModel};
use dog_spotter::telegram::types::Message;
use dog_spotter::telegram::{
    BotHandler, FileTooLarge, Messenger, FAILURE_REPLY, FALLBACK_REPLY, START_REPLY,
    TOO_LARGE_REPLY,
};
use dog_spotter::{AnnotationStyle, Annotator, Detector, Pipeline, RawDetection};

const CHAT: i64 = 4242;
const LIMIT: u64 = 1024 * 1024;

#[derive(Debug, PartialEq)]
enum Sent {
    Text(String),
    Photo {
        bytes: Vec<u8>,
        file_name: String,
        caption: String,
    },
}

#[derive(Default)]
struct FakeMessenger {
    files: HashMap<String, Vec<u8>>,
    fetched: Vec<String>,
    sent: Vec<(i64, Sent)>,
    reject_photos: bool,
}

impl Messenger for FakeMessenger {
    fn send_text(&mut self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.push((chat_id, Sent::Text(text.to_string())));
        Ok(())
    }

    fn send_photo(
        &mut self,
        chat_id: i64,
        photo: &[u8],
        file_name: &str,
        caption: &str,
    ) -> Result<()> {
        if self.reject_photos {
            return Err(anyhow!("sendPhoto rejected (400): Bad Request: IMAGE_PROCESS_FAILED"));
        }
        self.sent.push((
            chat_id,
            Sent::Photo {
                bytes: photo.to_vec(),
                file_name: file_name.to_string(),
                caption: caption.to_string(),
            },
        ));
        Ok(())
    }

    fn fetch_file(&mut self, file_id: &str, max_bytes: u64) -> Result<Vec<u8>> {
        self.fetched.push(file_id.to_string());
        let bytes = self
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("file {} not found", file_id))?;
        if bytes.len() as u64 > max_bytes {
            return Err(FileTooLarge { limit: max_bytes }.into());
        }
        Ok(bytes)
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

fn handler(candidates: Vec<RawDetection>, max_bytes: u64) -> BotHandler {
    let model = share(StubModel::coco().with_candidates(candidates));
    let annotator = Annotator::new(AnnotationStyle::default()).expect("bundled font");
    let pipeline = Pipeline::new(Detector::new(model), annotator);
    BotHandler::new(pipeline, max_bytes)
}

fn dog_handler() -> BotHandler {
    handler(
        vec![RawDetection::new(COCO_DOG, 0.91, [20.0, 20.0, 120.0, 100.0])],
        LIMIT,
    )
}

fn message(body: serde_json::Value) -> Message {
    let mut value = json!({ "message_id": 1, "chat": { "id": CHAT, "type": "private" } });
    if let (Some(target), Some(extra)) = (value.as_object_mut(), body.as_object()) {
        for (key, field) in extra {
            target.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).expect("message json")
}

fn photo_message(file_size: Option<u64>) -> Message {
    message(json!({
        "photo": [
            { "file_id": "thumb", "width": 90, "height": 60 },
            { "file_id": "full", "width": 160, "height": 120, "file_size": file_size },
            { "file_id": "medium", "width": 120, "height": 90 }
        ]
    }))
}

#[test]
fn start_command_gets_greeting() {
    let mut messenger = FakeMessenger::default();
    dog_handler()
        .handle(&mut messenger, &message(json!({ "text": "/start" })))
        .unwrap();
    assert_eq!(messenger.sent, vec![(CHAT, Sent::Text(START_REPLY.into()))]);
}

#[test]
fn text_and_stickers_get_fallback() {
    let mut messenger = FakeMessenger::default();
    let handler = dog_handler();
    handler
        .handle(&mut messenger, &message(json!({ "text": "is there a dog?" })))
        .unwrap();
    handler.handle(&mut messenger, &message(json!({}))).unwrap();
    assert_eq!(
        messenger.sent,
        vec![
            (CHAT, Sent::Text(FALLBACK_REPLY.into())),
            (CHAT, Sent::Text(FALLBACK_REPLY.into())),
        ]
    );
    assert!(messenger.fetched.is_empty());
}

#[test]
fn photo_with_dog_is_answered_with_annotated_image() {
    let input = png(160, 120);
    let mut messenger = FakeMessenger::default();
    messenger.files.insert("full".into(), input.clone());

    dog_handler()
        .handle(&mut messenger, &photo_message(None))
        .unwrap();

    assert_eq!(messenger.fetched, vec!["full".to_string()]);
    match &messenger.sent[..] {
        [(chat, Sent::Photo { bytes, file_name, caption })] => {
            assert_eq!(*chat, CHAT);
            assert_eq!(caption, "Found a dog! Confidence: 91%");
            assert_eq!(file_name, "result.png");
            assert_ne!(bytes, &input);
        }
        other => panic!("unexpected replies {:?}", other),
    }
}

#[test]
fn photo_without_dog_is_returned_unchanged() {
    let input = png(160, 120);
    let mut messenger = FakeMessenger::default();
    messenger.files.insert("full".into(), input.clone());

    handler(Vec::new(), LIMIT)
        .handle(&mut messenger, &photo_message(None))
        .unwrap();

    assert_eq!(
        messenger.sent,
        vec![(
            CHAT,
            Sent::Photo {
                bytes: input,
                file_name: "result.png".into(),
                caption: "No dog found in this photo.".into(),
            }
        )]
    );
}

#[test]
fn image_document_is_processed() {
    let mut messenger = FakeMessenger::default();
    messenger.files.insert("doc-1".into(), png(64, 64));

    let msg = message(json!({
        "document": { "file_id": "doc-1", "file_name": "dog.png", "mime_type": "image/png" }
    }));
    dog_handler().handle(&mut messenger, &msg).unwrap();

    assert_eq!(messenger.fetched, vec!["doc-1".to_string()]);
    assert!(matches!(messenger.sent[..], [(CHAT, Sent::Photo { .. })]));
}

#[test]
fn oversized_photo_is_rejected_before_download() {
    let mut messenger = FakeMessenger::default();
    dog_handler()
        .handle(&mut messenger, &photo_message(Some(LIMIT + 1)))
        .unwrap();

    assert!(messenger.fetched.is_empty());
    assert_eq!(messenger.sent, vec![(CHAT, Sent::Text(TOO_LARGE_REPLY.into()))]);
}

#[test]
fn oversized_download_is_rejected() {
    let input = png(160, 120);
    let limit = input.len() as u64 - 1;
    let mut messenger = FakeMessenger::default();
    messenger.files.insert("full".into(), input);

    handler(Vec::new(), limit)
        .handle(&mut messenger, &photo_message(None))
        .unwrap();

    assert_eq!(messenger.sent, vec![(CHAT, Sent::Text(TOO_LARGE_REPLY.into()))]);
}

#[test]
fn broken_image_gets_failure_reply() {
    let mut messenger = FakeMessenger::default();
    messenger.files.insert("full".into(), b"not an image".to_vec());

    dog_handler()
        .handle(&mut messenger, &photo_message(None))
        .unwrap();

    assert_eq!(messenger.sent, vec![(CHAT, Sent::Text(FAILURE_REPLY.into()))]);
}

#[test]
fn fetch_failure_gets_failure_reply() {
    let mut messenger = FakeMessenger::default();

    dog_handler()
        .handle(&mut messenger, &photo_message(None))
        .unwrap();

    assert_eq!(messenger.fetched, vec!["full".to_string()]);
    assert_eq!(messenger.sent, vec![(CHAT, Sent::Text(FAILURE_REPLY.into()))]);
}

#[test]
fn failed_upload_gets_failure_reply() {
    let mut messenger = FakeMessenger {
        reject_photos: true,
        ..FakeMessenger::default()
    };
    messenger.files.insert("full".into(), png(160, 120));

    dog_handler()
        .handle(&mut messenger, &photo_message(None))
        .unwrap();

    assert_eq!(messenger.sent, vec![(CHAT, Sent::Text(FAILURE_REPLY.into()))]);
}
