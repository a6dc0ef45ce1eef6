use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::message::{TimelineItem, TimelineMessage};
use crate::model::ChatMessage;

/// Derive rows from messages ordered newest first. The result is newest
/// first as well; each day's date separator follows that day's messages.
pub fn build_rows(messages: &[ChatMessage], translation_language: Option<&str>) -> Vec<TimelineItem> {
    let mut items = Vec::with_capacity(messages.len() + 4);
    let mut last_date: Option<NaiveDate> = None;

    for message in messages.iter().rev() {
        if let Some(date) = message.ts.map(local_date) {
            if last_date != Some(date) {
                items.push(TimelineItem::DateSeparator(format_date_label(date)));
                last_date = Some(date);
            }
        }
        items.push(TimelineItem::Message(convert_message(message, translation_language)));
    }

    apply_continuation_markers(&mut items);
    items.reverse();
    items
}

fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

fn convert_message(message: &ChatMessage, translation_language: Option<&str>) -> TimelineMessage {
    let (sender, sender_display) = match &message.author {
        Some(author) => (author.id.clone(), author.username.clone()),
        None => (String::new(), "unknown".to_owned()),
    };

    let raw_body = match translation_language {
        Some(lang) if message.auto_translate => {
            message.translation(lang).unwrap_or(message.body.as_str())
        }
        _ => message.body.as_str(),
    };
    let (reply_ctx, body) = strip_reply_fallback(raw_body);
    let (reply_to_sender, reply_to_body) = match reply_ctx {
        Some((id, preview)) => (Some(id), Some(preview)),
        None => (None, None),
    };

    let timestamp = message
        .ts
        .map(|ts| ts.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default();

    TimelineMessage {
        id: message.id.clone(),
        sender,
        sender_display,
        body,
        timestamp,
        is_continuation: false,
        reply_to_sender,
        reply_to_body,
        edited: message.edited_at.is_some(),
        starred: message.starred,
        pinned: message.pinned,
    }
}

/// Quote block prepended to replies: `> <@sender> preview` and a blank line.
pub fn quote_fallback(sender: &str, body: &str) -> String {
    let first_line = body.lines().next().unwrap_or("");
    let preview: String = first_line.chars().take(80).collect();
    format!("> <@{sender}> {preview}\n\n")
}

/// Split a body carrying a quote fallback into ((sender, preview), body).
pub fn strip_reply_fallback(body: &str) -> (Option<(String, String)>, String) {
    if !body.starts_with("> <@") {
        return (None, body.to_owned());
    }
    let (quote_block, real_body) = match body.find("\n\n") {
        Some(pos) => (&body[..pos], body[pos + 2..].to_owned()),
        None => return (None, body.to_owned()),
    };
    let first_line = quote_block.lines().next().unwrap_or("");
    let after_prefix = first_line.strip_prefix("> ").unwrap_or(first_line);

    let sender_id = after_prefix
        .strip_prefix('<')
        .and_then(|s| s.find('>').map(|i| s[..i].to_owned()))
        .unwrap_or_else(|| "@unknown".to_owned());

    let quoted_text = after_prefix
        .find('>')
        .map(|i| after_prefix[i + 1..].trim())
        .unwrap_or("");
    let preview: String = quoted_text.chars().take(80).collect();

    (Some((sender_id, preview)), real_body)
}

pub fn format_date_label(date: NaiveDate) -> String {
    let today = Local::now().date_naive();
    if date == today {
        "Today".to_string()
    } else if date == today - chrono::Duration::days(1) {
        "Yesterday".to_string()
    } else {
        date.format("%B %d, %Y").to_string()
    }
}

/// Set `is_continuation = true` on consecutive messages from the same sender.
/// A DateSeparator resets the grouping. Expects chronological order.
pub fn apply_continuation_markers(items: &mut [TimelineItem]) {
    let mut last_sender: Option<String> = None;
    for item in items.iter_mut() {
        match item {
            TimelineItem::Message(msg) => {
                msg.is_continuation =
                    !msg.sender.is_empty() && last_sender.as_deref() == Some(&msg.sender);
                last_sender = Some(msg.sender.clone());
            }
            TimelineItem::DateSeparator(_) => {
                last_sender = None;
            }
        }
    }
}
