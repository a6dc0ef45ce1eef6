use crate::state::timeline::{ComposerMode, Footer};

pub fn composer_view(footer: &Footer<'_>) -> String {
    let state = match footer {
        Footer::Preview { joining: true } => return "You are in preview mode. Joining...".into(),
        Footer::Preview { joining: false } => {
            return "You are in preview mode. Type /join to join this room.".into()
        }
        Footer::Composer(state) => state,
    };

    let mut out = String::new();
    match &state.mode {
        ComposerMode::Message => {}
        ComposerMode::Reply {
            sender,
            preview,
            mention,
            ..
        } => {
            let preview = if preview.is_empty() {
                String::new()
            } else {
                format!(": {preview}")
            };
            let verb = if *mention { "Replying to" } else { "Quoting" };
            out.push_str(&format!("↩ {verb} {sender}{preview} (/cancel)\n"));
        }
        ComposerMode::Edit { .. } => out.push_str("✎ Editing message (/cancel)\n"),
    }

    if state.sending {
        out.push_str("> …");
    } else if state.text.is_empty() {
        out.push_str("> Send a message...");
    } else {
        out.push_str(&format!("> {}", state.text));
    }
    out
}
