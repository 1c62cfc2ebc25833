//! Terminal presenter: stdin/stdout REPL over a [`SessionOrchestrator`].

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::catalog::{Choice, InputKind};
use crate::onboarding::{EventKind, SessionOrchestrator, Turn};
use crate::progress::AnswerValue;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer(String),
    Skip,
    Delete(String),
    Status,
    Retry,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Answer(line.to_string());
        };
        let (name, arg) = rest
            .split_once(char::is_whitespace)
            .map_or((rest, ""), |(n, a)| (n, a.trim()));
        match name {
            "skip" => Self::Skip,
            "delete" if !arg.is_empty() => Self::Delete(arg.to_string()),
            "status" => Self::Status,
            "retry" => Self::Retry,
            "quit" | "exit" => Self::Quit,
            _ => Self::Help,
        }
    }
}

const HELP: &str = "Commands: /skip, /delete <question_id>, /status, /retry, /quit";

/// Match a typed choice by id, label (case-insensitive), or 1-based number.
fn resolve_choice(choices: &[Choice], input: &str) -> String {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>()
        && let Some(choice) = n.checked_sub(1).and_then(|i| choices.get(i))
    {
        return choice.id.clone();
    }
    choices
        .iter()
        .find(|c| c.id == input || c.label.eq_ignore_ascii_case(input))
        .map_or_else(|| input.to_string(), |c| c.id.clone())
}

fn split_list(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Turn a typed line into the answer shape the input kind expects.
/// Unknown choices pass through unchanged so validation can reject them.
pub fn parse_answer(input: &InputKind, line: &str) -> AnswerValue {
    let line = line.trim();
    match input {
        InputKind::ShortText | InputKind::LongText | InputKind::FreeFormStory => {
            AnswerValue::text(line)
        }
        InputKind::SingleSelect { options } => AnswerValue::text(resolve_choice(options, line)),
        InputKind::MultiSelectCards { cards } => {
            AnswerValue::list(split_list(line).map(|item| resolve_choice(cards, item)))
        }
        InputKind::Image => AnswerValue::media(line),
        InputKind::MultiImage { .. } => AnswerValue::list(split_list(line)),
        InputKind::Date { .. } => AnswerValue::date(line),
    }
}

/// Run the session in the terminal until EOF or `/quit`.
pub async fn run(orchestrator: Arc<SessionOrchestrator>) -> anyhow::Result<()> {
    let mut rx = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let EventKind::SystemPrompt { text, .. } = &event.kind {
                        println!("\n{text}\n");
                        eprint!("> ");
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "Terminal fell behind the event log");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    orchestrator.start().await?;
    eprintln!("   {HELP}\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            eprint!("> ");
            continue;
        }

        let result = match Command::parse(&line) {
            Command::Quit => break,
            Command::Help => {
                eprintln!("{HELP}");
                continue;
            }
            Command::Status => {
                let snapshot = orchestrator.snapshot().await;
                println!(
                    "\n{}% complete, {} points ({}), {} of {} answered, {} writes pending\n",
                    snapshot.percentage,
                    snapshot.total_points,
                    snapshot.tier.reward_name,
                    snapshot.answered,
                    snapshot.total_questions,
                    snapshot.pending_writes,
                );
                continue;
            }
            Command::Retry => {
                match orchestrator.retry_pending().await {
                    Ok(report) => println!(
                        "\nDelivered {} queued writes, {} still pending\n",
                        report.delivered, report.remaining
                    ),
                    Err(e) => eprintln!("{e}"),
                }
                continue;
            }
            Command::Skip => orchestrator.skip_current().await,
            Command::Delete(id) => orchestrator.delete_answer(&id).await,
            Command::Answer(text) => match orchestrator.current_prompt().await {
                Some(prompt) => {
                    let answer = parse_answer(&prompt.input, &text);
                    orchestrator.submit_answer(&prompt.question_id, answer).await
                }
                None => {
                    eprintln!("Nothing to answer right now. {HELP}");
                    continue;
                }
            },
        };

        match result {
            Ok(Turn::Completed(summary)) if !summary.finalized => {
                eprintln!("   Finalization is queued and will be retried in the background.");
            }
            Ok(_) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<Choice> {
        vec![
            Choice::new("friendship", "New friends"),
            Choice::new("dating", "Something romantic"),
        ]
    }

    #[test]
    fn commands_parse() {
        assert_eq!(Command::parse("/skip"), Command::Skip);
        assert_eq!(Command::parse(" /delete bio "), Command::Delete("bio".into()));
        assert_eq!(Command::parse("/delete"), Command::Help);
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/what"), Command::Help);
        assert_eq!(Command::parse("hello there"), Command::Answer("hello there".into()));
    }

    #[test]
    fn single_select_accepts_id_label_or_number() {
        let input = InputKind::SingleSelect { options: options() };
        assert_eq!(parse_answer(&input, "dating"), AnswerValue::text("dating"));
        assert_eq!(parse_answer(&input, "new FRIENDS"), AnswerValue::text("friendship"));
        assert_eq!(parse_answer(&input, "2"), AnswerValue::text("dating"));
        assert_eq!(parse_answer(&input, "9"), AnswerValue::text("9"));
    }

    #[test]
    fn cards_are_comma_separated() {
        let input = InputKind::MultiSelectCards { cards: options() };
        assert_eq!(
            parse_answer(&input, "1, Something romantic,,"),
            AnswerValue::list(["friendship", "dating"])
        );
    }

    #[test]
    fn media_and_dates_keep_their_shape() {
        assert_eq!(
            parse_answer(&InputKind::Image, " img://a "),
            AnswerValue::media("img://a")
        );
        assert_eq!(
            parse_answer(&InputKind::MultiImage { max_images: 3 }, "img://a,img://b"),
            AnswerValue::list(["img://a", "img://b"])
        );
        assert_eq!(
            parse_answer(&InputKind::Date { range: None }, "2031-05-01"),
            AnswerValue::date("2031-05-01")
        );
    }
}
