//! Database statistics.
//!
//! Summarises what is stored: documents, chunks, embedding dimensionality,
//! and answered questions per user. Used by `lrag stats`.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    crate::migrate::apply(&pool).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;
    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;
    let total_answers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qa_records")
        .fetch_one(&pool)
        .await?;
    // Every vector in one index shares a dimension; report what is stored.
    let dims: Option<i64> = sqlx::query_scalar("SELECT LENGTH(embedding) / 4 FROM chunks LIMIT 1")
        .fetch_optional(&pool)
        .await?;
    let last_upload: Option<i64> = sqlx::query_scalar("SELECT MAX(updated_at) FROM documents")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Lecture RAG Database Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    match dims {
        Some(d) => println!("  Dimensions:  {} ({})", d, config.embedding.model),
        None => println!("  Dimensions:  -"),
    }
    println!(
        "  Last upload: {}",
        last_upload
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Answers:     {}", total_answers);

    let user_rows = sqlx::query(
        r#"
        SELECT user_id, COUNT(*) AS answer_count, MAX(created_at) AS last_asked
        FROM qa_records
        GROUP BY user_id
        ORDER BY answer_count DESC
        LIMIT 20
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !user_rows.is_empty() {
        println!();
        println!("  By user:");
        println!("  {:<10} {:>8}   {}", "USER", "ANSWERS", "LAST ASKED");
        println!("  {}", "-".repeat(40));
        for row in &user_rows {
            let user_id: i64 = row.get("user_id");
            let count: i64 = row.get("answer_count");
            let last: i64 = row.get("last_asked");
            println!("  {:<10} {:>8}   {}", user_id, count, format_ts_relative(last));
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_date(ts);
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_date(ts)
    }
}

fn format_ts_date(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
