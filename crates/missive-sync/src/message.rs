//! Message model and flat-record codec
//!
//! A `Message` is the typed, in-memory shape; a `MessageRecord` is what the
//! document store persists (string fields only, one record per log entry).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::error::SyncError;
use crate::identity::UserKey;

/// Payload of a chat message.
///
/// A closed set: these are the only variants this layer constructs. New
/// payload kinds get a new variant plus a codec arm; decoding stays lenient
/// toward `type` values it does not know (they come back as `Text`).
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Text(String),
    Photo(Url),
    Video(Url),
    Location { longitude: f64, latitude: f64 },
}

impl MessageKind {
    /// Wire name of this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageKind::Text(_) => "text",
            MessageKind::Photo(_) => "photo",
            MessageKind::Video(_) => "video",
            MessageKind::Location { .. } => "location",
        }
    }

    /// Flat `content` field for this kind; doubles as the rendered text
    /// cached on conversation summaries
    pub fn content(&self) -> String {
        match self {
            MessageKind::Text(text) => text.clone(),
            MessageKind::Photo(url) | MessageKind::Video(url) => url.to_string(),
            MessageKind::Location {
                longitude,
                latitude,
            } => format!("{},{}", longitude, latitude),
        }
    }
}

/// One chat event
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender_key: UserKey,
    pub sender_display_name: String,
    pub sent_at: DateTime<Utc>,
    pub kind: MessageKind,
    pub is_read: bool,
}

impl Message {
    /// Build a message from the sender's side. The id embeds both
    /// participants and the send time, plus a random suffix so two sends in
    /// the same millisecond cannot collide.
    pub fn new(
        sender: &UserKey,
        recipient: &UserKey,
        sender_display_name: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        let sent_at = Utc::now();
        Self {
            id: generate_id(recipient, sender, sent_at),
            sender_key: sender.clone(),
            sender_display_name: sender_display_name.into(),
            sent_at,
            kind,
            is_read: false,
        }
    }
}

fn generate_id(other: &UserKey, sender: &UserKey, sent_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}_{}",
        other,
        sender,
        sent_at.timestamp_millis(),
        &suffix[..8]
    )
}

/// Storage-persisted representation of a message: primitive fields only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub date: String,
    pub sender_email: String,
    pub name: String,
    // Not required on decode; a record without it reads as unread
    #[serde(default)]
    pub is_read: bool,
}

/// Flatten a message for storage
pub fn encode(message: &Message) -> MessageRecord {
    MessageRecord {
        id: message.id.clone(),
        kind: message.kind.type_name().to_string(),
        content: message.kind.content(),
        date: message.sent_at.to_rfc3339(),
        sender_email: message.sender_key.as_str().to_string(),
        name: message.sender_display_name.clone(),
        is_read: message.is_read,
    }
}

/// Rebuild a message from its flat record
pub fn decode(record: &MessageRecord) -> Result<Message, SyncError> {
    let sent_at = DateTime::parse_from_rfc3339(&record.date)
        .map_err(|e| SyncError::Decode(format!("message {}: bad date: {}", record.id, e)))?
        .with_timezone(&Utc);

    let kind = match record.kind.as_str() {
        "text" => MessageKind::Text(record.content.clone()),
        "photo" => MessageKind::Photo(parse_url(record)?),
        "video" => MessageKind::Video(parse_url(record)?),
        "location" => {
            let (longitude, latitude) = parse_location(record)?;
            MessageKind::Location {
                longitude,
                latitude,
            }
        }
        // Unknown kinds stay readable as plain text
        _ => MessageKind::Text(record.content.clone()),
    };

    Ok(Message {
        id: record.id.clone(),
        sender_key: UserKey::canonicalize(&record.sender_email),
        sender_display_name: record.name.clone(),
        sent_at,
        kind,
        is_read: record.is_read,
    })
}

/// Decode one raw log entry, reporting missing fields as a decode failure
pub fn decode_value(value: &Value) -> Result<Message, SyncError> {
    let record: MessageRecord = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::Decode(format!("message record: {}", e)))?;
    decode(&record)
}

/// Decode a whole log, skipping records that fail to decode. Availability
/// over completeness: one bad record must not take down the conversation.
pub fn decode_log(values: &[Value]) -> Vec<Message> {
    values
        .iter()
        .filter_map(|value| match decode_value(value) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("[Messages] Skipping undecodable record: {}", e);
                None
            }
        })
        .collect()
}

fn parse_url(record: &MessageRecord) -> Result<Url, SyncError> {
    Url::parse(&record.content).map_err(|e| {
        SyncError::Decode(format!(
            "message {}: {} content is not a URL: {}",
            record.id, record.kind, e
        ))
    })
}

fn parse_location(record: &MessageRecord) -> Result<(f64, f64), SyncError> {
    let mut parts = record.content.split(',');
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(SyncError::Decode(format!(
            "message {}: location content must be \"longitude,latitude\"",
            record.id
        )));
    };
    let longitude: f64 = lon.trim().parse().map_err(|_| {
        SyncError::Decode(format!("message {}: bad longitude {:?}", record.id, lon))
    })?;
    let latitude: f64 = lat.trim().parse().map_err(|_| {
        SyncError::Decode(format!("message {}: bad latitude {:?}", record.id, lat))
    })?;
    Ok((longitude, latitude))
}
