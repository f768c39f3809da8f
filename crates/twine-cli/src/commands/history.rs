//! `twine history` — inspect stored conversations.

use chrono::{Local, TimeZone};
use twine_core::config;
use twine_core::{ConversationStore, Database};

fn store() -> Result<ConversationStore, String> {
    let db = Database::open(config::history_db_path()).map_err(|e| e.to_string())?;
    Ok(ConversationStore::new(db))
}

fn format_ts(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

/// List stored conversations.
pub async fn list() -> Result<(), String> {
    let conversations = store()?.list().await.map_err(|e| e.to_string())?;
    if conversations.is_empty() {
        println!("No stored conversations.");
        return Ok(());
    }

    println!("\nConversations ({} total):", conversations.len());
    println!(
        "{:<38} {:<20} {:<20} {:>8}",
        "ID", "Prompt", "Updated", "Messages"
    );
    println!("{}", "-".repeat(90));
    for conversation in conversations {
        println!(
            "{:<38} {:<20} {:<20} {:>8}",
            conversation.id,
            conversation.prompt_name,
            format_ts(conversation.updated_at),
            conversation.message_count
        );
    }
    Ok(())
}

/// Print the messages of one conversation.
pub async fn show(id: &str) -> Result<(), String> {
    let store = store()?;
    if !store.exists(id).await.map_err(|e| e.to_string())? {
        return Err(format!("conversation not found: {}", id));
    }

    let messages = store.messages(id, None).await.map_err(|e| e.to_string())?;
    for message in messages {
        println!(
            "[{}] {}: {}",
            format_ts(message.timestamp),
            message.role,
            message.content
        );
    }
    Ok(())
}

/// Delete a conversation and its messages.
pub async fn delete(id: &str) -> Result<(), String> {
    store()?.delete(id).await.map_err(|e| e.to_string())?;
    println!("Deleted conversation {}", id);
    Ok(())
}
