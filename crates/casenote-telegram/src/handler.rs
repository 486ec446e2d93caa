// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of Telegram messages onto channel-agnostic inbound content.
//!
//! [`extract`] is pure: it decides what a message is without touching the
//! network. File ids are turned into download URLs afterwards by
//! [`crate::media::resolve_file_url`].

use casenote_core::types::{
    ConversationId, InboundContent, InboundMessage, MediaKind, MessageId,
};
use teloxide::prelude::*;
use teloxide::types::FileId;

const PDF_MIME: &str = "application/pdf";

/// What a Telegram message carries, before file links are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Text(String),
    File {
        kind: MediaKind,
        file_id: FileId,
        mime_type: String,
        caption: Option<String>,
    },
    Unsupported(String),
}

/// Classifies a message. Returns `None` for updates the pipeline ignores
/// entirely (stickers, locations, service messages).
pub fn extract(msg: &Message) -> Option<Extracted> {
    if let Some(text) = msg.text() {
        return Some(Extracted::Text(text.to_string()));
    }

    let caption = msg.caption().map(str::to_string);
    let file = |kind, file_id: &FileId, mime_type: String| Extracted::File {
        kind,
        file_id: file_id.clone(),
        mime_type,
        caption: caption.clone(),
    };

    // Telegram lists photo sizes smallest first.
    if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(file(MediaKind::Image, &largest.file.id, "image/jpeg".into()));
    }

    if let Some(doc) = msg.document() {
        let mime = doc.mime_type.as_ref().map(|m| m.essence_str().to_string());
        let named_pdf = doc
            .file_name
            .as_deref()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".pdf"));
        return Some(match mime.as_deref() {
            Some(PDF_MIME) => file(MediaKind::Pdf, &doc.file.id, PDF_MIME.into()),
            None if named_pdf => file(MediaKind::Pdf, &doc.file.id, PDF_MIME.into()),
            Some(other) => Extracted::Unsupported(format!(
                "documents of type {other} (only PDF documents are accepted)"
            )),
            None => Extracted::Unsupported(
                "documents without a type (only PDF documents are accepted)".into(),
            ),
        });
    }

    if let Some(voice) = msg.voice() {
        let mime = voice
            .mime_type
            .as_ref()
            .map_or_else(|| "audio/ogg".to_string(), |m| m.essence_str().to_string());
        return Some(file(MediaKind::Audio, &voice.file.id, mime));
    }

    if let Some(audio) = msg.audio() {
        let mime = audio
            .mime_type
            .as_ref()
            .map_or_else(|| "audio/mpeg".to_string(), |m| m.essence_str().to_string());
        return Some(file(MediaKind::Audio, &audio.file.id, mime));
    }

    if let Some(video) = msg.video() {
        let mime = video
            .mime_type
            .as_ref()
            .map_or_else(|| "video/mp4".to_string(), |m| m.essence_str().to_string());
        return Some(file(MediaKind::Video, &video.file.id, mime));
    }

    if let Some(note) = msg.video_note() {
        return Some(file(MediaKind::Video, &note.file.id, "video/mp4".into()));
    }

    if msg.sticker().is_some() || msg.animation().is_some() {
        return Some(Extracted::Unsupported("stickers and animations".into()));
    }

    None
}

/// Builds the inbound message for `msg` with already-resolved content.
pub fn to_inbound_message(msg: &Message, content: InboundContent) -> InboundMessage {
    InboundMessage {
        id: MessageId(msg.id.0.to_string()),
        conversation_id: ConversationId(msg.chat.id.0.to_string()),
        sender_id: msg.from.as_ref().map(|u| u.id.0.to_string()),
        content,
        reply_to: msg
            .reply_to_message()
            .map(|replied| MessageId(replied.id.0.to_string())),
        timestamp: msg.date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(extra: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 10,
            "date": 1700000000i64,
            "chat": {
                "id": 4242i64,
                "type": "private",
                "first_name": "Test",
            },
            "from": {
                "id": 777,
                "is_bot": false,
                "first_name": "Test",
            },
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(json).expect("failed to deserialize mock message")
    }

    fn file_json(id: &str) -> serde_json::Value {
        serde_json::json!({"file_id": id, "file_unique_id": format!("u-{id}"), "file_size": 100})
    }

    #[test]
    fn text_is_extracted_verbatim() {
        let msg = make_message(serde_json::json!({"text": "..2"}));
        assert_eq!(extract(&msg), Some(Extracted::Text("..2".into())));
    }

    #[test]
    fn photo_uses_largest_size_and_caption() {
        let msg = make_message(serde_json::json!({
            "photo": [
                {"file_id": "small", "file_unique_id": "us", "width": 90, "height": 90},
                {"file_id": "large", "file_unique_id": "ul", "width": 1280, "height": 960},
            ],
            "caption": "left forearm",
        }));
        match extract(&msg) {
            Some(Extracted::File {
                kind,
                file_id,
                mime_type,
                caption,
            }) => {
                assert_eq!(kind, MediaKind::Image);
                assert_eq!(file_id.0, "large");
                assert_eq!(mime_type, "image/jpeg");
                assert_eq!(caption.as_deref(), Some("left forearm"));
            }
            other => panic!("expected photo file, got {other:?}"),
        }
    }

    #[test]
    fn pdf_document_is_accepted() {
        let mut doc = file_json("doc-1");
        doc["mime_type"] = "application/pdf".into();
        doc["file_name"] = "labs.pdf".into();
        let msg = make_message(serde_json::json!({"document": doc}));
        assert!(matches!(
            extract(&msg),
            Some(Extracted::File { kind: MediaKind::Pdf, .. })
        ));
    }

    #[test]
    fn untyped_document_named_pdf_is_accepted() {
        let mut doc = file_json("doc-2");
        doc["file_name"] = "Discharge.PDF".into();
        let msg = make_message(serde_json::json!({"document": doc}));
        match extract(&msg) {
            Some(Extracted::File { mime_type, .. }) => assert_eq!(mime_type, "application/pdf"),
            other => panic!("expected pdf file, got {other:?}"),
        }
    }

    #[test]
    fn other_documents_are_unsupported() {
        let mut doc = file_json("doc-3");
        doc["mime_type"] = "application/zip".into();
        doc["file_name"] = "scans.zip".into();
        let msg = make_message(serde_json::json!({"document": doc}));
        match extract(&msg) {
            Some(Extracted::Unsupported(description)) => {
                assert!(description.contains("application/zip"))
            }
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[test]
    fn voice_defaults_to_ogg() {
        let mut voice = file_json("v-1");
        voice["duration"] = 4.into();
        let msg = make_message(serde_json::json!({"voice": voice}));
        match extract(&msg) {
            Some(Extracted::File {
                kind, mime_type, ..
            }) => {
                assert_eq!(kind, MediaKind::Audio);
                assert_eq!(mime_type, "audio/ogg");
            }
            other => panic!("expected voice file, got {other:?}"),
        }
    }

    #[test]
    fn video_note_is_a_video() {
        let mut note = file_json("vn-1");
        note["length"] = 240.into();
        note["duration"] = 5.into();
        let msg = make_message(serde_json::json!({"video_note": note}));
        match extract(&msg) {
            Some(Extracted::File {
                kind, mime_type, ..
            }) => {
                assert_eq!(kind, MediaKind::Video);
                assert_eq!(mime_type, "video/mp4");
            }
            other => panic!("expected video file, got {other:?}"),
        }
    }

    #[test]
    fn location_is_ignored() {
        let msg = make_message(serde_json::json!({
            "location": {"latitude": 51.5, "longitude": -0.12}
        }));
        assert_eq!(extract(&msg), None);
    }

    #[test]
    fn inbound_message_carries_reply_linkage() {
        let msg = make_message(serde_json::json!({
            "text": "Is this serious?",
            "reply_to_message": {
                "message_id": 9,
                "date": 1699999990i64,
                "chat": {"id": 4242i64, "type": "private", "first_name": "Test"},
                "from": {"id": 1, "is_bot": true, "first_name": "casenote"},
                "text": "Assessment: ...",
            },
        }));
        let inbound = to_inbound_message(&msg, InboundContent::Text("Is this serious?".into()));

        assert_eq!(inbound.id, MessageId::from("10"));
        assert_eq!(inbound.conversation_id, ConversationId::from("4242"));
        assert_eq!(inbound.sender_id.as_deref(), Some("777"));
        assert_eq!(inbound.reply_to, Some(MessageId::from("9")));
    }

    #[test]
    fn inbound_message_without_reply() {
        let msg = make_message(serde_json::json!({"text": "note"}));
        let inbound = to_inbound_message(&msg, InboundContent::Text("note".into()));
        assert!(inbound.reply_to.is_none());
    }
}
