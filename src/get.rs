//! CLI record retrieval by id.

use anyhow::Result;

use crate::app;
use crate::config::Config;

pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let index = app::open_index(config).await?;

    let record = match index.record(id).await? {
        Some(record) => record,
        None => {
            eprintln!("Error: record not found: {}", id);
            std::process::exit(1);
        }
    };

    println!("--- Record ---");
    println!("id:        {}", record.id);
    println!("key:       {}", record.key);
    println!("type:      {}", record.kind);
    println!(
        "title:     {}",
        if record.title.is_empty() {
            "(untitled)"
        } else {
            &record.title
        }
    );
    if let Some(date) = &record.date {
        println!("date:      {}", date);
    }
    if record.year != 0 {
        println!("year:      {}", record.year);
    }
    println!("modified:  {}", record.modified);

    if !record.creators.is_empty() {
        println!();
        println!("--- Creators ---");
        for c in &record.creators {
            println!(
                "{:10} {} {}",
                c.kind,
                c.given.as_deref().unwrap_or(""),
                c.family.as_deref().unwrap_or("")
            );
        }
    }

    if !record.tags.is_empty() {
        println!();
        println!("tags: {}", record.tags.join(", "));
    }

    if !record.collections.is_empty() {
        println!();
        println!("--- Collections ---");
        for coll in &record.collections {
            println!("[{}] {}", coll.key, coll.name);
        }
    }

    if !record.attachments.is_empty() {
        println!();
        println!("--- Attachments ---");
        for a in &record.attachments {
            let target = a.path.as_deref().or(a.url.as_deref()).unwrap_or("");
            println!("{}: {}", a.name.as_deref().unwrap_or("(unnamed)"), target);
        }
    }

    if !record.abstract_.is_empty() {
        println!();
        println!("--- Abstract ---");
        println!("{}", record.abstract_);
    }

    for note in &record.notes {
        println!();
        println!("--- Note ---");
        println!("{}", note);
    }

    index.close().await;
    Ok(())
}
