//! negotiator-chat - terminal client for a negotiation service
//!
//! Plain lines are sent as messages. Commands:
//! `/list`, `/select <n>`, `/reset <message-id>`, `/quit`.

use negotiator_client::config::ClientConfig;
use negotiator_client::conversation::{Message, MessageId};
use negotiator_client::runtime::{ConversationHandle, ConversationRuntime, ControllerError};
use negotiator_client::service::{HttpNegotiationService, LoggingNegotiationService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands: /list, /select <n>, /reset <message-id>, /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr, the transcript owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "negotiator_client=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let negotiation = config.load_negotiation()?;
    let http = HttpNegotiationService::new(&config.base_url, config.request_timeout)?;
    tracing::info!(
        negotiation_id = %negotiation.id,
        base_url = %http.base_url(),
        messages = negotiation.messages.len(),
        "Loaded negotiation"
    );

    let handle = ConversationRuntime::spawn(negotiation, LoggingNegotiationService::new(http))?;

    println!("Negotiation {}. {HELP}", handle.negotiation_id());
    print_transcript(&handle.current_messages());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(&handle, parse_line(&line)).await {
                    break;
                }
            }
        }
    }

    handle.shutdown();
    tracing::info!("Shutting down");
    Ok(())
}

/// One line of terminal input
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Quit,
    List,
    Reset(MessageId),
    Select(usize),
    Send(String),
    Usage(&'static str),
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if !line.starts_with('/') {
        return if line.is_empty() {
            Input::Empty
        } else {
            Input::Send(line.to_string())
        };
    }

    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));

    match command {
        "/quit" => Input::Quit,
        "/list" => Input::List,
        "/reset" if arg.is_empty() => Input::Usage("Usage: /reset <message-id>"),
        "/reset" => Input::Reset(MessageId::new(arg)),
        "/select" => match arg.parse::<usize>() {
            Ok(position) if position > 0 => Input::Select(position),
            _ => Input::Usage("Usage: /select <n> (1-based position in /list)"),
        },
        _ => Input::Usage(HELP),
    }
}

/// Returns false when the user asked to quit
async fn handle_input(handle: &ConversationHandle, input: Input) -> bool {
    match input {
        Input::Empty => {}
        Input::Quit => return false,
        Input::List => print_transcript(&handle.current_messages()),
        Input::Usage(usage) => eprintln!("{usage}"),
        Input::Reset(message_id) => spawn_reset(handle.clone(), message_id),
        Input::Select(position) => match handle.current_messages().get(position - 1) {
            Some(message) => spawn_select(handle.clone(), message.id.clone()),
            None => eprintln!("No message at position {position}"),
        },
        Input::Send(text) => {
            let handle = handle.clone();
            // Background so the prompt stays responsive and a second line can
            // be rejected while the first is in flight
            tokio::spawn(async move {
                match send_line(&handle, text).await {
                    Ok(reply) => print_message(handle.current_messages().len(), &reply),
                    Err(ControllerError::SubmissionFailed(e)) => {
                        eprintln!(
                            "! Message not sent ({e}); it was removed, type it again to retry"
                        );
                    }
                    Err(e) => eprintln!("! {e}"),
                }
            });
        }
    }
    true
}

/// Mirror the line into the draft, then submit it. A rejected submission
/// never started, so the draft is cleared again.
async fn send_line(handle: &ConversationHandle, text: String) -> Result<Message, ControllerError> {
    handle.update_draft(text.as_str()).await?;
    let result = handle.submit(text).await;
    if matches!(
        result,
        Err(ControllerError::SubmissionInProgress | ControllerError::EmptyMessage)
    ) {
        handle.update_draft("").await?;
    }
    result
}

fn spawn_reset(handle: ConversationHandle, message_id: MessageId) {
    tokio::spawn(async move {
        match handle.reset_to(message_id).await {
            Ok(()) => print_transcript(&handle.current_messages()),
            Err(e) => eprintln!("! {e}"),
        }
    });
}

fn spawn_select(handle: ConversationHandle, message_id: MessageId) {
    tokio::spawn(async move {
        match handle.select_message(message_id).await {
            Ok(true) => print_transcript(&handle.current_messages()),
            Ok(false) => {}
            Err(e) => eprintln!("! {e}"),
        }
    });
}

fn print_transcript(messages: &[Message]) {
    println!("--- {} messages ---", messages.len());
    for (i, message) in messages.iter().enumerate() {
        print_message(i + 1, message);
    }
}

fn print_message(position: usize, message: &Message) {
    println!(
        "[{position}] {:>9}: {}  ({})",
        message.role.as_str(),
        message.content,
        message.id
    );
}
