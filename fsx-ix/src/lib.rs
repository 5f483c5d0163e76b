//! fsx-ix library - index administration operations
//!
//! One function per subcommand of the `fsx-ix` binary: upload JSON document
//! files, check the index, delete documents or the index itself, and export
//! everything to CSV. Each is a one-shot operation over
//! [`fsx_common::search::SearchClient`].

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use fsx_common::error::{Error, Result};
use fsx_common::search::{SearchClient, SCROLL_PAGE_SIZE};

/// Expand upload arguments into JSON files: files pass through, directories
/// contribute their `.json` entries sorted by name.
pub fn gather_upload_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            if entries.is_empty() {
                warn!(dir = %path.display(), "no .json files in directory");
            }
            files.extend(entries);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(Error::NotFound(path.to_string_lossy().into_owned()));
        }
    }
    Ok(files)
}

/// Read one pipeline output file: a JSON array of documents.
pub fn read_docs(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&content)?;
    match parsed {
        Value::Array(docs) => Ok(docs),
        _ => Err(Error::InvalidInput(format!(
            "{}: expected a JSON array of documents",
            path.display()
        ))),
    }
}

/// Bulk-upload document files. Returns the total number of failed documents
/// across all files.
pub async fn upload(
    client: &SearchClient,
    index: &str,
    paths: &[PathBuf],
    batch_size: usize,
) -> Result<u64> {
    let files = gather_upload_paths(paths)?;
    if files.is_empty() {
        return Err(Error::InvalidInput("nothing to upload".to_string()));
    }

    let mut failed_total = 0u64;
    for file in &files {
        let docs = read_docs(file)?;
        info!(file = %file.display(), docs = docs.len(), "uploading");
        let summary = client.bulk_index(index, &docs, batch_size).await?;
        println!(
            "{}: indexed {} documents, {} failed",
            file.display(),
            summary.indexed,
            summary.failed
        );
        for reason in &summary.errors {
            println!("  error: {reason}");
        }
        failed_total += summary.failed;
    }
    Ok(failed_total)
}

/// Report whether the index exists, its document count, and its first two
/// documents.
pub async fn check(client: &SearchClient, index: &str) -> Result<()> {
    if !client.index_exists(index).await? {
        println!("The index '{index}' does not exist.");
        return Ok(());
    }
    println!("The index '{index}' exists.");

    let count = client.count(index).await?;
    let sample = client
        .search(index, &serde_json::json!({"query": {"match_all": {}}, "size": 2}))
        .await?;
    println!("First documents in the index '{index}':");
    for hit in &sample.hits.hits {
        println!("{}", serde_json::to_string_pretty(&hit.source)?);
    }
    println!("Total number of documents in the index '{index}': {count}");
    Ok(())
}

/// Delete every document, keeping the index.
pub async fn delete_docs(client: &SearchClient, index: &str) -> Result<()> {
    if !client.index_exists(index).await? {
        println!("The index '{index}' does not exist.");
        return Ok(());
    }
    let deleted = client.delete_all_docs(index).await?;
    println!("Deleted {deleted} documents from the index '{index}'.");
    Ok(())
}

/// Delete the index itself. A missing index is not an error.
pub async fn delete_index(client: &SearchClient, index: &str) -> Result<()> {
    if !client.index_exists(index).await? {
        println!("The index '{index}' does not exist.");
        return Ok(());
    }
    client.delete_index(index).await?;
    println!("Deleted the index '{index}'.");
    Ok(())
}

/// Export every document to CSV. The header is the sorted union of `_source`
/// keys across all documents; nested values serialize as JSON strings.
pub async fn export(client: &SearchClient, index: &str, out: &Path) -> Result<()> {
    let mut docs: Vec<Value> = Vec::new();
    let fetched = client
        .scroll_all(index, SCROLL_PAGE_SIZE, |hits| {
            docs.extend(hits.iter().map(|hit| Value::Object(hit.source.clone())));
            print!("\rFetched {} documents so far...", docs.len());
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();
    info!(fetched, "scroll complete");

    let mut fieldnames: Vec<String> = Vec::new();
    for doc in &docs {
        if let Value::Object(source) = doc {
            for key in source.keys() {
                if !fieldnames.contains(key) {
                    fieldnames.push(key.clone());
                }
            }
        }
    }
    fieldnames.sort();

    let mut writer = csv::Writer::from_path(out)?;
    writer.write_record(&fieldnames)?;
    for doc in &docs {
        writer.write_record(csv_row(&fieldnames, doc))?;
    }
    writer.flush()?;
    println!("Wrote {} rows to {}", docs.len(), out.display());
    Ok(())
}

/// One CSV row in header order. Missing fields and nulls are empty cells.
fn csv_row(fieldnames: &[String], doc: &Value) -> Vec<String> {
    fieldnames
        .iter()
        .map(|name| match doc.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
        .collect()
}
