//! Terminal front end for the support chat API.
//!
//! Usage: `support-chat-cli [API_URL]` (default `$CHAT_API_URL` or
//! `http://localhost:5000/api`). Type a message and press enter; `/clear`
//! resets the conversation and `/quit` deletes the session and exits.

use support_chat::client::{ChatApi, ChatController, ChatState, HttpChatApi};
use support_chat::models::MessageRole;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .init();

    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CHAT_API_URL").ok())
        .unwrap_or_else(|| "http://localhost:5000/api".to_string());

    let controller = ChatController::new(HttpChatApi::new(base_url)?);
    let mut rendered = 0;

    controller.initialize_session().await;
    render(&controller.state(), &mut rendered);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                controller.clear_chat().await;
                rendered = 0;
                println!("--- conversation cleared ---");
            }
            text => {
                controller.dismiss_error();
                controller.send_message(text).await;
            }
        }
        render(&controller.state(), &mut rendered);
    }

    if let Some(session_id) = controller.state().session_id {
        if let Err(e) = controller.api().delete_session(session_id).await {
            eprintln!("could not delete session {}: {}", session_id, e);
        }
    }
    Ok(())
}

/// Prints messages that have not been shown yet, then any error.
fn render(state: &ChatState, rendered: &mut usize) {
    for message in state.messages.iter().skip(*rendered) {
        let who = match message.role {
            MessageRole::Assistant => "support",
            MessageRole::User => "you",
            MessageRole::System => "system",
        };
        println!("{}> {}", who, message.content);
    }
    *rendered = state.messages.len();

    if let Some(error) = state.error() {
        eprintln!("! {}", error);
    }
}
