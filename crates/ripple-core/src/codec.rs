//! Wire codec
//!
//! Content changes are encoded as UTF-8 text with four `|`-separated fields:
//!
//! ```text
//! sender|contentKindCode|updateKindCode|id1,id2,...
//! ```
//!
//! Every other notification is encoded as a JSON object tagged with `"type"`.
//! [`decode`] accepts both forms and never panics.

use crate::error::{DecodeError, FieldParseError, WireField};
use crate::notification::{clean_sender, ContentKind, DataChange, Notification, UpdateKind};
use std::collections::BTreeSet;
use uuid::Uuid;

const FIELD_SEPARATOR: char = '|';
const ID_SEPARATOR: char = ',';

/// Encode a content change.
pub fn encode(
    sender: &str,
    content_kind: ContentKind,
    update_kind: UpdateKind,
    content_ids: &BTreeSet<Uuid>,
) -> Vec<u8> {
    let ids = content_ids
        .iter()
        .map(|id| id.hyphenated().to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
        clean_sender(sender),
        content_kind.code(),
        update_kind.code(),
        ids
    )
    .into_bytes()
}

/// Encode any notification.
///
/// Content changes use the pipe-delimited form, everything else JSON.
pub fn encode_notification(notification: &Notification) -> Vec<u8> {
    match notification {
        Notification::DataChange(change) => encode(
            &change.sender,
            change.content_kind,
            change.update_kind,
            &change.content_ids,
        ),
        // Plain strings, uuids and unit enums cannot fail to serialize
        other => serde_json::to_vec(other).unwrap_or_default(),
    }
}

/// Decode a payload produced by [`encode`] or [`encode_notification`].
pub fn decode(bytes: &[u8]) -> Result<Notification, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let text =
        std::str::from_utf8(bytes).map_err(|e| DecodeError::malformed(WireField::Payload, e))?;
    if text.trim().is_empty() {
        return Err(DecodeError::Blank);
    }

    let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();

    // A sender may itself start with `{`, so JSON only wins when it parses
    if text.trim_start().starts_with('{') {
        match decode_json(text) {
            Ok(notification) => return Ok(notification),
            Err(e) if fields.len() != 4 => return Err(e),
            Err(_) => {}
        }
    }

    if fields.len() != 4 {
        return Err(DecodeError::MalformedFieldCount {
            found: fields.len(),
        });
    }

    decode_fields(&fields).map(Notification::DataChange)
}

fn decode_json(text: &str) -> Result<Notification, DecodeError> {
    let notification: Notification =
        serde_json::from_str(text).map_err(|e| DecodeError::malformed(WireField::Body, e))?;
    if matches!(notification, Notification::DataChange(_)) {
        return Err(DecodeError::malformed(
            WireField::Body,
            FieldParseError::ContentChangeAsJson,
        ));
    }
    Ok(notification)
}

fn decode_fields(fields: &[&str]) -> Result<DataChange, DecodeError> {
    let sender = fields[0].to_string();

    let content_code: u32 = fields[1]
        .trim()
        .parse()
        .map_err(|e| DecodeError::malformed(WireField::ContentKind, e))?;
    let content_kind = ContentKind::from_code(content_code);

    let update_code: u32 = fields[2]
        .trim()
        .parse()
        .map_err(|e| DecodeError::malformed(WireField::UpdateKind, e))?;
    let update_kind = UpdateKind::from_code(update_code).ok_or_else(|| {
        DecodeError::malformed(WireField::UpdateKind, FieldParseError::UnknownCode(update_code))
    })?;

    let content_ids = parse_ids(fields[3])?;

    Ok(DataChange {
        sender,
        content_kind,
        update_kind,
        content_ids,
    })
}

fn parse_ids(field: &str) -> Result<BTreeSet<Uuid>, DecodeError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(BTreeSet::new());
    }

    field
        .split(ID_SEPARATOR)
        .map(|raw| {
            Uuid::parse_str(raw.trim()).map_err(|e| DecodeError::malformed(WireField::ContentIds, e))
        })
        .collect()
}
