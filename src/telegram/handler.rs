use anyhow::{anyhow, Result};

use super::client::{FileTooLarge, TelegramClient};
use super::types::{Document, Message, PhotoSize};
use crate::pipeline::{Outcome, Pipeline};

pub const START_REPLY: &str = "Hi! Send me a photo and I will look for a dog on it.";
pub const FALLBACK_REPLY: &str = "I can only look for dogs in photos. Send me a picture!";
pub const TOO_LARGE_REPLY: &str = "This image is too large.";
pub const FAILURE_REPLY: &str =
    "Something went wrong while processing the photo. Please try again.";

/// Outbound side of the chat platform.
pub trait Messenger {
    fn send_text(&mut self, chat_id: i64, text: &str) -> Result<()>;

    fn send_photo(&mut self, chat_id: i64, photo: &[u8], file_name: &str, caption: &str)
        -> Result<()>;

    /// Fetch an uploaded file. Fails with `FileTooLarge` past `max_bytes`.
    fn fetch_file(&mut self, file_id: &str, max_bytes: u64) -> Result<Vec<u8>>;
}

impl Messenger for TelegramClient {
    fn send_text(&mut self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text)
    }

    fn send_photo(
        &mut self,
        chat_id: i64,
        photo: &[u8],
        file_name: &str,
        caption: &str,
    ) -> Result<()> {
        TelegramClient::send_photo(self, chat_id, photo, file_name, caption)
    }

    fn fetch_file(&mut self, file_id: &str, max_bytes: u64) -> Result<Vec<u8>> {
        let file = self.get_file(file_id)?;
        if file.file_size.is_some_and(|size| size > max_bytes) {
            return Err(FileTooLarge { limit: max_bytes }.into());
        }
        let path = file
            .file_path
            .ok_or_else(|| anyhow!("getFile returned no file_path for {}", file_id))?;
        self.download(&path, max_bytes)
    }
}

/// What an incoming message asks for.
#[derive(Debug, PartialEq)]
pub enum Route<'a> {
    Start,
    Photo(&'a PhotoSize),
    Document(&'a Document),
    Fallback,
}

impl<'a> Route<'a> {
    pub fn classify(message: &'a Message) -> Self {
        if let Some(text) = message.text.as_deref() {
            if is_start_command(text) {
                return Route::Start;
            }
        }
        if let Some(largest) = message
            .photo
            .as_ref()
            .and_then(|sizes| sizes.iter().max_by_key(|size| size.area()))
        {
            return Route::Photo(largest);
        }
        match &message.document {
            Some(document) if document.is_image() => Route::Document(document),
            _ => Route::Fallback,
        }
    }
}

fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or("");
    let command = command.split('@').next().unwrap_or("");
    command == "/start"
}

/// Routes messages and runs the pipeline on images.
pub struct BotHandler {
    pipeline: Pipeline,
    max_image_bytes: u64,
}

impl BotHandler {
    pub fn new(pipeline: Pipeline, max_image_bytes: u64) -> Self {
        Self {
            pipeline,
            max_image_bytes,
        }
    }

    /// Handle one message. Pipeline, download and upload failures are
    /// answered in chat; only a failed text reply is returned.
    pub fn handle<M: Messenger>(&self, messenger: &mut M, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;
        match Route::classify(message) {
            Route::Start => messenger.send_text(chat_id, START_REPLY),
            Route::Fallback => messenger.send_text(chat_id, FALLBACK_REPLY),
            Route::Photo(photo) => {
                self.handle_image(messenger, chat_id, &photo.file_id, photo.file_size)
            }
            Route::Document(document) => {
                self.handle_image(messenger, chat_id, &document.file_id, document.file_size)
            }
        }
    }

    fn handle_image<M: Messenger>(
        &self,
        messenger: &mut M,
        chat_id: i64,
        file_id: &str,
        declared_size: Option<u64>,
    ) -> Result<()> {
        if declared_size.is_some_and(|size| size > self.max_image_bytes) {
            log::info!("chat {}: rejected image of {:?} bytes", chat_id, declared_size);
            return messenger.send_text(chat_id, TOO_LARGE_REPLY);
        }

        let bytes = match messenger.fetch_file(file_id, self.max_image_bytes) {
            Ok(bytes) => bytes,
            Err(e) if e.downcast_ref::<FileTooLarge>().is_some() => {
                log::info!("chat {}: {}", chat_id, e);
                return messenger.send_text(chat_id, TOO_LARGE_REPLY);
            }
            Err(e) => {
                log::error!("chat {}: failed to fetch image: {:#}", chat_id, e);
                return messenger.send_text(chat_id, FAILURE_REPLY);
            }
        };

        match self.pipeline.run(&bytes) {
            Ok(outcome) => {
                log::info!(
                    "chat {}: processed {} bytes, found={} confidence={:?}",
                    chat_id,
                    bytes.len(),
                    outcome.found(),
                    outcome.annotated.confidence
                );
                let caption = self.caption(&outcome);
                let sent = messenger.send_photo(
                    chat_id,
                    &outcome.annotated.image,
                    &outcome.annotated.file_name(),
                    &caption,
                );
                if let Err(e) = sent {
                    log::error!("chat {}: failed to send photo: {:#}", chat_id, e);
                    return messenger.send_text(chat_id, FAILURE_REPLY);
                }
                Ok(())
            }
            Err(e) => {
                log::error!("chat {}: pipeline failed: {}", chat_id, e);
                messenger.send_text(chat_id, FAILURE_REPLY)
            }
        }
    }

    fn caption(&self, outcome: &Outcome) -> String {
        let class = self.pipeline.detector().target_class();
        match outcome.annotated.confidence {
            Some(confidence) if outcome.found() => format!(
                "Found a {}! Confidence: {:.0}%",
                class,
                f64::from(confidence) * 100.0
            ),
            _ => format!("No {} found in this photo.", class),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::types::Chat;

    fn message(text: Option<&str>) -> Message {
        Message {
            message_id: 1,
            chat: Chat {
                id: 9,
                kind: None,
            },
            from: None,
            text: text.map(str::to_string),
            caption: None,
            photo: None,
            document: None,
        }
    }

    fn size(file_id: &str, width: u32, height: u32) -> PhotoSize {
        PhotoSize {
            file_id: file_id.to_string(),
            file_unique_id: String::new(),
            width,
            height,
            file_size: None,
        }
    }

    #[test]
    fn start_command_variants() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("  /start payload"));
        assert!(is_start_command("/start@dog_spotter_bot"));
        assert!(!is_start_command("/started"));
        assert!(!is_start_command("start"));
    }

    #[test]
    fn classify_routes() {
        assert_eq!(Route::classify(&message(Some("/start"))), Route::Start);
        assert_eq!(Route::classify(&message(Some("hello"))), Route::Fallback);
        assert_eq!(Route::classify(&message(None)), Route::Fallback);
    }

    #[test]
    fn classify_picks_largest_photo() {
        let mut msg = message(None);
        msg.photo = Some(vec![size("mid", 320, 240), size("big", 1280, 960), size("small", 90, 60)]);
        match Route::classify(&msg) {
            Route::Photo(photo) => assert_eq!(photo.file_id, "big"),
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn classify_image_documents_only() {
        let mut msg = message(None);
        msg.document = Some(Document {
            file_id: "doc".to_string(),
            file_name: Some("notes.txt".to_string()),
            mime_type: Some("text/plain".to_string()),
            file_size: Some(10),
        });
        assert_eq!(Route::classify(&msg), Route::Fallback);

        msg.document.as_mut().unwrap().mime_type = Some("image/jpeg".to_string());
        assert!(matches!(Route::classify(&msg), Route::Document(_)));
    }
}
