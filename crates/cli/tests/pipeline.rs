//! End-to-end pipeline behavior through the public core API, on real
//! temporary directory trees.

use sorter_core::config::AppConfig;
use sorter_core::pipeline::Pipeline;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn test_config(base: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.base_dir = base.join("sorted").to_string_lossy().into_owned();
    cfg.processing.settle_delay_ms = 0;
    cfg
}

fn drop_file(cfg: &AppConfig, name: &str, contents: &str) -> PathBuf {
    let path = cfg.drop_dir().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn tax_document_lands_in_taxes_and_is_indexed() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    let file = drop_file(
        &cfg,
        "scan001.txt",
        "Annual Tax Return Documents\nIRS form W-2 and 1099, deduction summary.",
    );
    pipeline.process_file(&file).await.unwrap();

    assert!(!file.exists());
    let placed = files_in(&cfg.category_dir("taxes"));
    assert_eq!(placed.len(), 1);
    assert!(placed[0].ends_with(".txt"));
    assert!(placed[0].starts_with("Annual_Tax_Return_Documents"));

    let index = storage::HashIndex::open(&cfg.hash_index_path(), usize::MAX).unwrap();
    assert_eq!(index.len(), 1);
    let record = index.values().next().unwrap();
    assert_eq!(record.category, "taxes");
}

#[tokio::test]
async fn duplicate_content_is_moved_aside() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    let contents = "Receipt for purchase, payment confirmed, order 8841.";
    let first = drop_file(&cfg, "receipt.txt", contents);
    pipeline.process_file(&first).await.unwrap();
    let second = drop_file(&cfg, "receipt_copy.txt", contents);
    pipeline.process_file(&second).await.unwrap();

    assert_eq!(files_in(&cfg.category_dir("receipts")).len(), 1);
    let duplicates = files_in(&cfg.duplicates_dir());
    assert_eq!(duplicates.len(), 1);
    assert!(duplicates[0].starts_with("duplicate_"));
    assert!(duplicates[0].ends_with("receipt_copy.txt"));

    // The original record stays canonical.
    let index = storage::HashIndex::open(&cfg.hash_index_path(), usize::MAX).unwrap();
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn empty_file_becomes_unprocessed_in_fallback() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    let file = drop_file(&cfg, "mystery.bin", "");
    pipeline.process_file(&file).await.unwrap();

    let placed = files_in(&cfg.category_dir("other"));
    assert_eq!(placed.len(), 1);
    assert!(placed[0].starts_with("unprocessed_"));
    assert!(placed[0].ends_with(".bin"));
}

#[tokio::test]
async fn same_title_files_never_overwrite_each_other() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    let title = "Medical Insurance Statement\n";
    let a = drop_file(
        &cfg,
        "a.txt",
        &format!("{}doctor visit, hospital invoice A", title),
    );
    let b = drop_file(
        &cfg,
        "b.txt",
        &format!("{}doctor visit, hospital invoice B", title),
    );
    pipeline.process_file(&a).await.unwrap();
    pipeline.process_file(&b).await.unwrap();

    assert_eq!(files_in(&cfg.category_dir("medical")).len(), 2);
}

#[tokio::test]
async fn placement_leaves_a_recent_preview_link() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    let file = drop_file(&cfg, "note.txt", "bank statement, account balance and savings");
    pipeline.process_file(&file).await.unwrap();

    let recent = files_in(&cfg.feedback_recent_dir());
    assert_eq!(recent.len(), 1);
    assert!(recent[0].starts_with("financial--"));
}

#[tokio::test]
async fn correction_refiles_and_teaches_keywords() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    // User says: this was filed under taxes but belongs in receipts.
    fs::write(
        cfg.feedback_dir().join("receipts").join("taxes--coffee.txt"),
        "espresso espresso espresso roastery",
    )
    .unwrap();
    assert_eq!(pipeline.feedback_sweep().unwrap(), 1);
    assert!(cfg.category_dir("receipts").join("coffee.txt").exists());

    let log: serde_json::Value =
        serde_json::from_slice(&fs::read(cfg.corrections_path()).unwrap()).unwrap();
    let corrections = log["corrections"].as_array().unwrap();
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0]["original_category"], "taxes");
    assert_eq!(corrections[0]["corrected_category"], "receipts");

    // The learned keyword now drives classification of similar content.
    let file = drop_file(&cfg, "next.txt", "another espresso delivery note");
    pipeline.process_file(&file).await.unwrap();
    let placed = files_in(&cfg.category_dir("receipts"));
    assert_eq!(placed.len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn read_only_file_is_still_organized() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    let file = drop_file(&cfg, "archived.txt", "tax return and irs deduction");
    fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();

    assert_eq!(pipeline.enqueue_backlog().unwrap(), 1);
    pipeline.close();
    pipeline.worker().await;

    assert!(files_in(&cfg.drop_dir()).is_empty());
    assert_eq!(files_in(&cfg.category_dir("taxes")).len(), 1);
}

#[tokio::test]
async fn closed_queue_drains_like_a_single_pass() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path())).unwrap();
    let cfg = pipeline.config().clone();

    drop_file(&cfg, "one.txt", "tax return and irs deduction");
    drop_file(&cfg, "two.txt", "receipt for a purchase payment");
    drop_file(&cfg, "three.txt", "passport and birth certificate copies");

    assert_eq!(pipeline.enqueue_backlog().unwrap(), 3);
    pipeline.close();
    pipeline.worker().await;

    assert!(files_in(&cfg.drop_dir()).is_empty());
    assert_eq!(files_in(&cfg.category_dir("taxes")).len(), 1);
    assert_eq!(files_in(&cfg.category_dir("receipts")).len(), 1);
    assert_eq!(files_in(&cfg.category_dir("personal_id")).len(), 1);
}
