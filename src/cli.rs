//! Stdin/stdout REPL over a chat session.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::agent::{ChatSession, Command, NextStep, Reply, SessionOutcome};

const BANNER: &str = "\
Commands: /confirm, /cancel, /tool NAME {json}, /reset, /quit";

/// Format a reply for the terminal.
fn render(reply: &Reply) -> String {
    let mut out = reply.text.clone();
    if reply.is_degraded() {
        out.push_str("\n(remote model unavailable, local fallback used)");
    }
    if reply.next == NextStep::AwaitingConfirmation {
        out.push_str("\nType /confirm to proceed or /cancel to abort.");
    }
    out
}

/// Run the REPL until EOF or `/quit`.
pub async fn run_repl(session: &mut ChatSession) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    eprintln!("{BANNER}");
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            eprint!("> ");
            continue;
        }
        match session.submit(Command::parse(&line)).await {
            SessionOutcome::Reply(reply) => {
                write_reply(&mut stdout, &reply).await?;
            }
            SessionOutcome::Quit => break,
        }
        eprint!("> ");
    }
    Ok(())
}

/// One canned turn, printed to stdout.
pub async fn run_demo(session: &mut ChatSession) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    let prompt = "Good evening, Alfred. What can you do for me?";
    stdout
        .write_all(format!("You: {prompt}\n").as_bytes())
        .await?;
    let reply = session.message(prompt).await;
    write_reply(&mut stdout, &reply).await
}

async fn write_reply<W: AsyncWrite + Unpin>(out: &mut W, reply: &Reply) -> std::io::Result<()> {
    out.write_all(format!("\n{}\n\n", render(reply)).as_bytes())
        .await?;
    out.flush().await
}
