use assert_cmd::prelude::*;
use command_extra::CommandExtra;
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tempfile::{tempdir, TempDir};
use text_block_macros::text_block_fnl;

/// Write an `.npmrc` that points harvest at `registry` and keeps the test fast.
pub fn create_npmrc(workspace: &Path, registry: &str) {
    let content = text_block_fnl! {
        "fetch-concurrency=8"
        "network-concurrency=4"
        "fetch-timeout=10000"
    };
    fs::write(workspace.join(".npmrc"), format!("registry={registry}\n{content}"))
        .expect("write to .npmrc");
}

/// Create a `harvest` command running inside a fresh temporary workspace.
pub fn harvest_with_temp_cwd() -> (Command, TempDir, PathBuf) {
    let root = tempdir().expect("create temporary directory");
    let workspace = root.path().join("workspace");
    fs::create_dir(&workspace).expect("create temporary workspace for harvest");
    let command = Command::cargo_bin("harvest")
        .expect("find the harvest binary")
        .with_current_dir(&workspace);
    (command, root, workspace)
}
