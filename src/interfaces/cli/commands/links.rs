//! Link commands

use colored::Colorize;
use serde::Deserialize;

use crate::errors::{LinkvaultError, Result};
use crate::services::{BatchEntry, LinkService};
use crate::utils::generate_owner_token;

/// One element of an import file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportItem {
    pub correlation_id: String,
    pub original_url: String,
}

pub fn print_token() {
    println!("{}", generate_owner_token());
}

pub async fn add_link(service: &LinkService, url: String, owner: Option<String>) -> Result<()> {
    let owner = match owner {
        Some(owner) => owner,
        None => {
            let token = generate_owner_token();
            println!("{} Generated owner token: {}", "ℹ".bold().blue(), token.magenta());
            token
        }
    };

    let result = service.add(&url, &owner).await?;
    if result.was_existing {
        println!(
            "{} Already shortened: {} -> {}",
            "!".bold().yellow(),
            result.id.cyan(),
            url.blue().underline()
        );
    } else {
        println!(
            "{} Added short link: {} -> {}",
            "✓".bold().green(),
            result.id.cyan(),
            url.blue().underline()
        );
    }
    Ok(())
}

pub async fn get_link(service: &LinkService, id: String) -> Result<()> {
    let url = service.get(&id).await?;
    println!("{} -> {}", id.cyan(), url.blue().underline());
    Ok(())
}

pub async fn list_links(service: &LinkService, owner: String) -> Result<()> {
    let links = match service.get_all(&owner).await {
        Ok(links) => links,
        Err(LinkvaultError::EmptyResult(_)) => {
            println!("{}", "No links for this owner".dimmed());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for link in &links {
        println!("  {} -> {}", link.id.cyan(), link.base_url.blue().underline());
    }
    println!("{} {} links", "Total:".bold(), links.len());
    Ok(())
}

pub async fn delete_links(service: &LinkService, owner: String, ids: Vec<String>) -> Result<()> {
    let queued = service.delete_batch(&ids, &owner).await?;
    println!(
        "{} Queued {} of {} links for deletion",
        "✓".bold().green(),
        queued,
        ids.len()
    );
    Ok(())
}

pub fn parse_import(content: &str) -> Result<Vec<ImportItem>> {
    serde_json::from_str(content)
        .map_err(|e| LinkvaultError::validation(format!("invalid import file: {}", e)))
}

pub async fn import_links(service: &LinkService, file_path: String, owner: String) -> Result<()> {
    let content = std::fs::read_to_string(&file_path)
        .map_err(|e| LinkvaultError::validation(format!("cannot read {}: {}", file_path, e)))?;

    let entries = parse_import(&content)?
        .into_iter()
        .map(|item| BatchEntry {
            correlation_id: item.correlation_id,
            base_url: item.original_url,
            owner_hash: owner.clone(),
        })
        .collect();

    for assignment in service.add_batch(entries).await? {
        println!(
            "  {} -> {}",
            assignment.correlation_id.dimmed(),
            assignment.id.cyan()
        );
    }
    Ok(())
}

pub async fn ping(service: &LinkService) -> Result<()> {
    service.ping().await?;
    println!("{} Storage backend is reachable", "✓".bold().green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let items = parse_import(
            r#"[{"correlation_id":"c1","original_url":"https://a.example"},
                {"correlation_id":"c2","original_url":"https://b.example"}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].original_url, "https://b.example");

        assert!(matches!(
            parse_import("{}"),
            Err(LinkvaultError::Validation(_))
        ));
    }
}
