use crate::message::{TimelineItem, TimelineMessage};
use crate::state::timeline::TimelineView;
use crate::ui::composer::composer_view;

/// Render the screen top to bottom: oldest rows first, newest just above the footer.
///
/// Messages are numbered from the newest (`1`) so `/menu <n>` stays stable
/// while older history is prepended.
pub fn timeline_view(view: &TimelineView<'_>) -> String {
    let mut lines = Vec::new();

    if let Some(banner) = view.banner {
        lines.push(format!("[{banner}]"));
    }
    if let Some(header) = view.header {
        lines.push(format!("  -- {header} --"));
    }

    let total = view
        .rows
        .iter()
        .filter(|r| matches!(r, TimelineItem::Message(_)))
        .count();
    if total == 0 {
        lines.push("  No messages yet".to_string());
    }

    let mut number = total;
    for item in view.rows.iter().rev() {
        match item {
            TimelineItem::Message(msg) => {
                lines.push(render_message(number, msg));
                number -= 1;
            }
            TimelineItem::DateSeparator(date) => lines.push(format!("  ---- {date} ----")),
        }
    }

    lines.push(composer_view(&view.footer));
    lines.join("\n")
}

fn render_message(number: usize, msg: &TimelineMessage) -> String {
    let mut out = String::new();
    if let (Some(sender), Some(body)) = (&msg.reply_to_sender, &msg.reply_to_body) {
        out.push_str(&format!("        ↩ {sender}: {body}\n"));
    }

    let mut flags = String::new();
    if msg.starred {
        flags.push('★');
    }
    if msg.pinned {
        flags.push('📌');
    }
    if msg.edited {
        flags.push_str(" (edited)");
    }

    if msg.is_continuation {
        out.push_str(&format!("{number:>4}        {}{flags}", msg.body));
    } else {
        out.push_str(&format!(
            "{number:>4} {} {}: {}{flags}",
            msg.timestamp, msg.sender_display, msg.body
        ));
    }
    out
}
