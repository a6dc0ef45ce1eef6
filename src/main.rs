use std::sync::Arc;

use clap::{Parser, Subcommand};
use matrix_sdk::ruma::RoomId;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use chatroom::app::App;
use chatroom::config;
use chatroom::matrix::{self, api::MatrixChatApi};
use chatroom::state::timeline::RoomTarget;
use chatroom::store::Database;
use chatroom::ui::shell::TerminalShell;

#[derive(Parser, Debug)]
#[command(name = "chatroom", about = "Terminal room view with a message action menu")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session for later runs.
    Login {
        homeserver: String,
        username: String,
        password: String,
    },
    /// Open a room by id.
    Open {
        room_id: String,
        /// Look at the room without joining it.
        #[arg(long)]
        preview: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("chatroom=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Login {
            homeserver,
            username,
            password,
        } => {
            let client = matrix::client::create_client(&homeserver).await?;
            matrix::client::login(&client, &username, &password).await?;
            matrix::client::save_session_from_client(&client, &homeserver)?;
            println!("Logged in as {}", client.user_id().map(|u| u.to_string()).unwrap_or(username));
        }
        Command::Open { room_id, preview } => open(room_id, preview).await?,
    }
    Ok(())
}

async fn open(room_id: String, preview: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load_settings();
    let stored = config::load_session()?;
    let client = matrix::client::restore_session(&stored).await?;
    let user = matrix::client::current_user(&client).await?;

    let db = Database::new();
    let joined = client
        .get_room(&RoomId::parse(room_id.as_str())?)
        .filter(|room| room.state() == matrix_sdk::RoomState::Joined);
    let target = match joined {
        Some(room) if !preview => {
            let record = matrix::sync::room_record(&room, client.user_id().ok_or("not logged in")?).await;
            let subscription = matrix::sync::subscription_record(&room);
            let target = RoomTarget::Subscription(subscription.id.clone());
            db.write(|t| {
                t.merge_remote_room(record);
                t.upsert_subscription(subscription);
                Ok(())
            })?;
            target
        }
        _ => RoomTarget::Room(room_id),
    };

    let token = CancellationToken::new();
    let sync = tokio::spawn(matrix::sync::run(client.clone(), db.clone(), token.clone()));

    let (lines_tx, lines_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });
    let input = Arc::new(Mutex::new(lines_rx));
    let (tx, rx) = mpsc::unbounded_channel();
    let shell = Arc::new(TerminalShell::new(input.clone(), tx.clone()));
    let api = Arc::new(MatrixChatApi::new(client, db.clone()));

    let app = App::open(target, api, db, shell, user, settings, input, (tx, rx))?;
    app.run().await;

    token.cancel();
    let _ = sync.await;
    Ok(())
}
