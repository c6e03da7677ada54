// src/repl.rs

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::functions::truncate_at;
use crate::models::find_model;
use crate::session::{ChatSession, SessionEvent};
use crate::state::AppState;

const FUNCTION_PREVIEW_CHARS: i64 = 300;

enum Command<'a> {
    Quit,
    Models,
    Model(&'a str),
    Help,
    Send(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match line {
        "/quit" | "/exit" => Command::Quit,
        "/models" => Command::Models,
        "/help" => Command::Help,
        _ => match line.strip_prefix("/model ") {
            Some(name) => Command::Model(name.trim()),
            None => Command::Send(line),
        },
    })
}

fn render(event: SessionEvent) {
    match event {
        SessionEvent::Progress(line) => eprintln!("… {}", line),
        SessionEvent::Delta(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        SessionEvent::FunctionInvoked(entry) => println!(
            "[{}] {}",
            entry.function_name.as_deref().unwrap_or("function"),
            truncate_at(&entry.content, FUNCTION_PREVIEW_CHARS)
        ),
        SessionEvent::Failed(message) => println!("\nError: {}", message),
        SessionEvent::Warning(message) => eprintln!("Warning: {}", message),
        SessionEvent::Completed(_) => println!(),
    }
}

/// Forwards every Ctrl-C for the rest of the process.
///
/// The first `ctrl_c()` call replaces the default handler for good, so one
/// listener feeds both the prompt and running turns.
fn spawn_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Next input line, or `None` on end of input or an interrupt at the prompt.
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => line,
        Some(()) = interrupts.recv() => Ok(None),
    }
}

async fn run_turn(
    session: &mut ChatSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
    text: &str,
) {
    let cancel = CancellationToken::new();

    let turn = session.send_message(text, &cancel);
    tokio::pin!(turn);
    loop {
        tokio::select! {
            _ = &mut turn => break,
            Some(event) = events.recv() => render(event),
            Some(()) = interrupts.recv() => cancel.cancel(),
        }
    }
    while let Ok(event) = events.try_recv() {
        render(event);
    }
    // presses that raced the end of the turn
    while interrupts.try_recv().is_ok() {}
}

fn print_models(state: &AppState, session: &ChatSession) {
    for model in &state.models {
        let marker = if model.name() == session.model().name() { "*" } else { " " };
        println!("{} {}", marker, model.label());
    }
}

/// Line-oriented chat loop on stdin/stdout.
pub async fn run_repl(state: AppState) -> Result<(), AppError> {
    let session = state.new_session().ok_or(AppError::NoModels)?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut session = session.with_events(tx);

    println!(
        "Model: {}. Type /help for commands; Ctrl-C stops a reply, or exits at the prompt.",
        session.model().label()
    );

    let mut interrupts = spawn_interrupts();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = next_input(&mut lines, &mut interrupts).await? else {
            println!();
            break;
        };
        match parse_command(&line) {
            None => {}
            Some(Command::Quit) => break,
            Some(Command::Help) => {
                println!("/models          list models");
                println!("/model <name>    switch model");
                println!("/quit            exit");
            }
            Some(Command::Models) => print_models(&state, &session),
            Some(Command::Model(name)) => match find_model(&state.models, name) {
                Some(model) => {
                    println!("Model: {}", model.label());
                    session.set_model(model);
                }
                None => println!("Unknown model: {}", name),
            },
            Some(Command::Send(text)) => {
                run_turn(&mut session, &mut events, &mut interrupts, text).await
            }
        }
    }

    info!("Bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use tokio::io::AsyncWriteExt;

    use crate::chat_log::ChatLogRepository;
    use crate::engine::{CompletionEngine, CompletionStream, CompletionStreamItem, Progress};
    use crate::tokenizer::CharCounter;
    use crate::types::{AIModel, ChatEntry, ChatMessage, ChatRole, OpenAIModel};

    /// Streams one delta, then waits forever.
    struct Stalled;

    #[async_trait]
    impl CompletionEngine for Stalled {
        async fn generate(
            &self,
            _: &AIModel,
            _: &str,
            _: &[ChatMessage],
            _: Progress<'_>,
        ) -> CompletionStream {
            stream::iter([CompletionStreamItem::TextDelta("partial".to_string())])
                .chain(stream::pending())
                .boxed()
        }
    }

    #[test]
    fn test_parse_command() {
        assert!(parse_command("   ").is_none());
        assert!(matches!(parse_command("/quit"), Some(Command::Quit)));
        assert!(matches!(parse_command("/models"), Some(Command::Models)));
        assert!(matches!(parse_command("/model  gpt-4 "), Some(Command::Model("gpt-4"))));
        assert!(matches!(parse_command(" hello "), Some(Command::Send("hello"))));
        assert!(matches!(parse_command("/modelx"), Some(Command::Send("/modelx"))));
    }

    #[tokio::test]
    async fn test_interrupt_at_prompt_ends_input() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();
        let (tx, mut interrupts) = mpsc::unbounded_channel();
        tx.send(()).unwrap();

        assert_eq!(next_input(&mut lines, &mut interrupts).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prompt_reads_lines_between_interrupts() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"hello\n").await.unwrap();
        let mut lines = BufReader::new(reader).lines();
        let (_tx, mut interrupts) = mpsc::unbounded_channel();

        assert_eq!(
            next_input(&mut lines, &mut interrupts).await.unwrap(),
            Some("hello".to_string())
        );
    }

    #[tokio::test]
    async fn test_every_interrupt_reaches_the_running_turn() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ChatLogRepository::new(dir.path()));
        let model = AIModel::OpenAI(OpenAIModel::with_counter("gpt-test", 1000, Arc::new(CharCounter)));
        let (tx, mut events) = mpsc::unbounded_channel();
        let mut session = ChatSession::new(Arc::new(Stalled), store, model, "SYS").with_events(tx);
        let (interrupt, mut interrupts) = mpsc::unbounded_channel();

        for text in ["first", "second"] {
            interrupt.send(()).unwrap();
            run_turn(&mut session, &mut events, &mut interrupts, text).await;
        }

        let replies: Vec<&ChatEntry> = session
            .conversation()
            .iter()
            .filter(|e| e.role == ChatRole::Assistant)
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|e| !e.in_progress));
        assert!(interrupts.try_recv().is_err());
    }
}
