use crate::App;
use anyhow::Result;
use colored::Colorize;
use weav_core::session::{Message, Role, Session, SessionKind};

/// Renders an ISO-8601 timestamp as a short form, leaving unparseable
/// values as-is.
pub fn short_time(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

fn print_message(message: &Message) {
    let speaker = match message.role {
        Role::User => "you:".bright_green().bold(),
        Role::Assistant => "assistant:".bright_blue().bold(),
    };
    println!("{speaker} {}", message.content);
}

pub async fn list(app: &App, kind: Option<SessionKind>) -> Result<()> {
    app.directory.load_sessions().await?;
    let sessions = app.directory.sessions();
    let filtered: Vec<&Session> = sessions
        .iter()
        .filter(|s| kind.is_none_or(|k| s.kind == k))
        .collect();

    if filtered.is_empty() {
        println!("{}", "no sessions".dimmed());
        return Ok(());
    }
    for session in filtered {
        println!(
            "{:>6}  {:<6}  {}  {}",
            session.id.to_string().bright_cyan(),
            session.kind.as_str(),
            short_time(&session.updated_at).dimmed(),
            session.title
        );
    }
    Ok(())
}

pub async fn create(app: &App, kind: SessionKind, title: Option<String>) -> Result<()> {
    let session = app.directory.create(kind, title).await?;
    println!(
        "created session {} ({})",
        session.id.to_string().bright_cyan(),
        session.kind
    );
    Ok(())
}

pub async fn rename(app: &App, session_id: i64, title: &str) -> Result<()> {
    app.directory.rename(session_id, title).await?;
    println!("renamed session {session_id}");
    Ok(())
}

pub async fn delete(app: &App, session_id: i64) -> Result<()> {
    app.directory.remove(session_id).await?;
    println!("deleted session {session_id}");
    Ok(())
}

pub async fn show(app: &App, session_id: i64) -> Result<()> {
    app.directory.select(Some(session_id)).await?;
    let session = app
        .directory
        .current()
        .expect("select succeeded, current is set");
    print_session(&session);
    Ok(())
}

pub fn print_session(session: &Session) {
    println!("{} ({})", session.title.bold(), session.kind);
    match session.kind {
        SessionKind::Chat => {
            for message in &session.messages {
                print_message(message);
            }
        }
        SessionKind::Image => {
            for record in &session.image_records {
                println!(
                    "{:>6}  {}  {}",
                    record.id.to_string().bright_cyan(),
                    record.prompt,
                    record.image_url.underline()
                );
            }
        }
        SessionKind::Studio => {}
    }
}

/// Prints the tail of a chat session after a generation.
pub fn print_last_exchange(session: &Session) {
    let tail = session.messages.iter().rev().take(2).collect::<Vec<_>>();
    for message in tail.into_iter().rev() {
        print_message(message);
    }
}

/// Prints the most recent image records after a generation.
pub fn print_latest_images(session: &Session, count: usize) {
    for record in session.image_records.iter().rev().take(count.max(1)) {
        println!("{}", record.image_url.underline());
    }
}
