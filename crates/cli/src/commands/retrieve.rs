use std::fs;
use std::path::Path;

use chatorder_core::domain::menu::{CanonicalMenuExport, MenuCandidate};
use chatorder_core::menu::{retrieve, MenuIndex};
use serde::Serialize;

use crate::commands::CommandResult;

const COMMAND: &str = "retrieve";

#[derive(Debug, Serialize)]
struct RetrievalReport<'a> {
    command: &'static str,
    status: &'static str,
    tenant_id: &'a str,
    menu_version: u64,
    utterance: &'a str,
    candidates: Vec<MenuCandidate>,
}

/// Ranks menu candidates for `utterance` against an exported menu, without a database or model.
pub fn run(menu_path: &Path, utterance: &str, top_k: usize) -> CommandResult {
    let raw = match fs::read_to_string(menu_path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "menu_read",
                format!("could not read `{}`: {error}", menu_path.display()),
                2,
            );
        }
    };

    let export: CanonicalMenuExport = match serde_json::from_str(&raw) {
        Ok(export) => export,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "menu_parse",
                format!("`{}` is not a canonical menu export: {error}", menu_path.display()),
                2,
            );
        }
    };

    let index = match MenuIndex::build(export) {
        Ok(index) => index,
        Err(error) => {
            return CommandResult::failure(COMMAND, "menu_invalid", error.to_string(), 2);
        }
    };

    let report = RetrievalReport {
        command: COMMAND,
        status: "ok",
        tenant_id: &index.tenant_id().0,
        menu_version: index.version(),
        utterance,
        candidates: retrieve(utterance, &index, top_k),
    };

    match serde_json::to_string(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 3),
    }
}
