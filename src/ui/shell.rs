use std::io::Write;
use std::sync::{Arc, Mutex};

use arboard::Clipboard;
use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;

use crate::message::Message;
use crate::model::ChatMessage;
use crate::shell::{ActionSheet, Confirmation, Haptic, Route, SheetChoice, Shell};

/// Lines typed by the user, shared between the app loop and open prompts.
pub type InputLines = Arc<AsyncMutex<UnboundedReceiver<String>>>;

/// `Shell` for a line-oriented terminal. Requests aimed at the timeline
/// screen are sent back to the app loop as `Message`s.
pub struct TerminalShell {
    input: InputLines,
    output: UnboundedSender<Message>,
    /// Opened on first copy; stays `None` without a display server.
    clipboard: Mutex<Option<Clipboard>>,
}

impl TerminalShell {
    pub fn new(input: InputLines, output: UnboundedSender<Message>) -> Self {
        Self {
            input,
            output,
            clipboard: Mutex::new(None),
        }
    }

    async fn read_line(&self) -> Option<String> {
        self.input.lock().await.recv().await
    }

    fn prompt(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write!(stdout, "{text}").and_then(|()| stdout.flush()) {
            tracing::warn!("Failed to write prompt: {e}");
        }
    }

    fn copy(&self, text: &str) -> Result<(), String> {
        let mut slot = self.clipboard.lock().map_err(|e| e.to_string())?;
        let mut clipboard = match slot.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new().map_err(|e| e.to_string())?,
        };
        if clipboard.set_text(text.to_owned()).is_err() {
            // The backend may have gone stale; retry once with a fresh handle.
            clipboard = Clipboard::new().map_err(|e| e.to_string())?;
            clipboard.set_text(text.to_owned()).map_err(|e| e.to_string())?;
        }
        *slot = Some(clipboard);
        Ok(())
    }

    fn send(&self, message: Message) {
        if self.output.send(message).is_err() {
            tracing::warn!("App loop is gone; dropping shell request");
        }
    }
}

pub fn sheet_view(sheet: &ActionSheet) -> String {
    let mut out = String::new();
    let reactions: Vec<String> = sheet
        .reactions
        .iter()
        .enumerate()
        .map(|(i, r)| format!("r{}:{r}", i + 1))
        .collect();
    out.push_str(&format!("  {}  +:more\n", reactions.join("  ")));
    for (i, option) in sheet.options.iter().enumerate() {
        let marker = if option.danger { "!" } else { " " };
        out.push_str(&format!("{marker}{:>2}. {}\n", i + 1, option.label));
    }
    out.push_str("Choose (empty to cancel): ");
    out
}

/// Interpret one typed line against the sheet that was shown.
pub fn parse_choice(sheet: &ActionSheet, line: &str) -> SheetChoice {
    let line = line.trim();
    if line == "+" {
        return SheetChoice::OpenReactionPicker;
    }
    if let Some(n) = line.strip_prefix('r') {
        return n
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| sheet.reactions.get(i))
            .map(|r| SheetChoice::React(r.clone()))
            .unwrap_or(SheetChoice::Cancelled);
    }
    line.parse::<isize>()
        .ok()
        .and_then(|n| sheet.options.action_at(n - 1))
        .map(SheetChoice::Action)
        .unwrap_or(SheetChoice::Cancelled)
}

/// What gets printed when there is no system clipboard to copy into.
pub fn clipboard_fallback(text: &str) -> String {
    format!("Copy this:\n{text}")
}

pub fn is_confirmation(prompt: &Confirmation, line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case(&prompt.call_to_action) || line.eq_ignore_ascii_case("y")
}

#[async_trait]
impl Shell for TerminalShell {
    fn show(&self, sheet: &ActionSheet) {
        self.prompt(&sheet_view(sheet));
    }

    async fn choice(&self, sheet: &ActionSheet) -> SheetChoice {
        match self.read_line().await {
            Some(line) => parse_choice(sheet, &line),
            None => SheetChoice::Cancelled,
        }
    }

    async fn confirm(&self, prompt: Confirmation) -> bool {
        self.prompt(&format!(
            "{} Type '{}' to confirm: ",
            prompt.message, prompt.call_to_action
        ));
        match self.read_line().await {
            Some(line) => is_confirmation(&prompt, &line),
            None => false,
        }
    }

    fn haptic(&self, feedback: Haptic) {
        tracing::trace!("haptic {feedback:?}");
    }

    fn set_clipboard(&self, text: &str) {
        if let Err(e) = self.copy(text) {
            tracing::warn!("Clipboard unavailable: {e}");
            println!("{}", clipboard_fallback(text));
        }
    }

    fn toast(&self, text: &str) {
        println!("-- {text}");
    }

    fn share(&self, text: &str) {
        println!("Share:\n{text}");
    }

    fn alert(&self, text: &str) {
        println!("!! {text}");
    }

    fn navigate(&self, route: Route) {
        self.send(Message::Navigate(route));
    }

    fn reply_init(&self, message: &ChatMessage, mention: bool) {
        self.send(Message::ReplyTo {
            message: message.clone(),
            mention,
        });
    }

    fn edit_init(&self, message: &ChatMessage) {
        self.send(Message::EditMessage(message.clone()));
    }

    fn reaction_init(&self, message: &ChatMessage) {
        self.send(Message::PickReaction(message.clone()));
    }

    fn dismiss(&self) {
        tracing::trace!("action sheet dismissed");
    }
}
