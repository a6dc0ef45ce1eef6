use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::actions::{ActionMenu, MenuContext};
use crate::api::ChatApi;
use crate::config::AppSettings;
use crate::error::StoreError;
use crate::message::Message;
use crate::model::{ChatMessage, Room, User};
use crate::shell::{Route, Shell};
use crate::state::timeline::{RoomTarget, RoomTimeline};
use crate::store::Database;
use crate::ui::shell::InputLines;
use crate::ui::timeline::timeline_view;

const HELP: &str = "\
Commands:
  <text>         send a message (or the reply/edit being composed)
  /menu <n>      actions for message n (1 = newest)
  /react <emoji> react to the message picked with \"Add Reaction\"
  /more          load older messages
  /join          join the room you are previewing
  /cancel        leave reply or edit mode
  /quit          close the room";

/// One line typed at the room prompt.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Say(String),
    Timeline(Message),
    Menu(usize),
    React(String),
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_owned());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "quit" | "q" => Command::Quit,
        "help" | "h" => Command::Help,
        "more" => Command::Timeline(Message::EndReached),
        "join" => Command::Timeline(Message::JoinRoom),
        "cancel" => Command::Timeline(Message::CancelComposerMode),
        "menu" => match arg.parse() {
            Ok(n) if n > 0 => Command::Menu(n),
            _ => Command::Unknown(line.to_owned()),
        },
        "react" if !arg.is_empty() => Command::React(arg.to_owned()),
        _ => Command::Unknown(line.to_owned()),
    }
}

/// Terminal host for a single room screen.
pub struct App {
    timeline: RoomTimeline,
    menu: ActionMenu,
    user: User,
    settings: AppSettings,
    input: InputLines,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
    /// Message picked through "Add Reaction", awaiting `/react`.
    reaction_target: Option<ChatMessage>,
    last_frame: String,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        target: RoomTarget,
        api: Arc<dyn ChatApi>,
        db: Database,
        shell: Arc<dyn Shell>,
        user: User,
        settings: AppSettings,
        input: InputLines,
        (tx, rx): (UnboundedSender<Message>, UnboundedReceiver<Message>),
    ) -> Result<Self, StoreError> {
        let (timeline, task) =
            RoomTimeline::mount(target, api.clone(), db.clone(), settings.timeline.clone())?;
        task.spawn(&tx);
        Ok(Self {
            timeline,
            menu: ActionMenu::new(api, db, shell),
            user,
            settings,
            input,
            tx,
            rx,
            reaction_target: None,
            last_frame: String::new(),
        })
    }

    pub async fn run(mut self) {
        let input = self.input.clone();
        self.render();
        loop {
            let keep_going = tokio::select! {
                Some(message) = self.rx.recv() => self.handle(message),
                line = async { input.lock().await.recv().await } => match line {
                    Some(line) => self.handle_line(&line).await,
                    None => false,
                },
            };
            if !keep_going {
                break;
            }
            self.render();
        }
        self.timeline.unmount();
    }

    fn render(&mut self) {
        let frame = timeline_view(&self.timeline.view());
        if frame != self.last_frame {
            println!("\n{frame}");
            self.last_frame = frame;
        }
    }

    /// Returns `false` once the room screen should close.
    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Navigate(route) => {
                tracing::info!("Navigating to {}", route.screen_name());
                if route == Route::RoomsList {
                    return false;
                }
                println!("-> {}", route.screen_name());
            }
            Message::PickReaction(message) => {
                println!("Type /react <emoji> to react to message {}", message.id);
                self.reaction_target = Some(message);
            }
            other => self.timeline.update(other).spawn(&self.tx),
        }
        true
    }

    /// Returns `false` once the room screen should close.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        match parse_command(line) {
            Command::Quit => return false,
            Command::Help => println!("{HELP}"),
            Command::Unknown(line) => println!("Unknown command: {line} (try /help)"),
            Command::Say(text) => {
                if text.is_empty() {
                    return true;
                }
                self.timeline.update(Message::ComposerChanged(text)).spawn(&self.tx);
                self.timeline.update(Message::SendMessage).spawn(&self.tx);
            }
            Command::Timeline(message) => self.timeline.update(message).spawn(&self.tx),
            Command::Menu(n) => self.open_menu(n).await,
            Command::React(emoji) => match self.reaction_target.take() {
                Some(message) => self.menu.react(&message, &emoji).await,
                None => println!("Pick a message with /menu first"),
            },
        }
        true
    }

    async fn open_menu(&mut self, n: usize) {
        let Some(message) = self.timeline.messages().get(n - 1).cloned() else {
            println!("No message {n}");
            return;
        };
        let room = self.timeline.room().cloned().unwrap_or_else(|| Room {
            id: self.timeline.room_id().to_owned(),
            ..Default::default()
        });
        let ctx = MenuContext {
            thread_id: None,
            message,
            room,
            user: self.user.clone(),
            settings: self.settings.server.clone(),
        };
        self.menu.present(ctx).await;
    }
}
