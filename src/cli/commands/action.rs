use std::path::Path;

use anyhow::Result;

use super::util::resolve_db_path;
use crate::cli::ActionCommand;
use clipserve::{
    DataValue, clear_payload, list_action_ids, load_payload, open_or_create_store, open_store,
    save_payload,
};

pub(crate) fn cmd_action(store: &Path, command: ActionCommand) -> Result<()> {
    let store = resolve_db_path(store);
    match command {
        ActionCommand::List => {
            let conn = open_store(&store)?;
            let ids = list_action_ids(&conn)?;
            if ids.is_empty() {
                println!("no action data stored");
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        ActionCommand::Show { id, json } => {
            let conn = open_store(&store)?;
            let payload = load_payload(&conn, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if payload.is_empty() {
                println!("(empty)");
            } else {
                for (key, value) in payload.iter() {
                    println!("{key} = {value}");
                }
            }
        }
        ActionCommand::Set { id, key, value } => {
            let conn = open_or_create_store(&store)?;
            let mut payload = load_payload(&conn, id)?;
            payload.insert(key.clone(), DataValue::Text(value));
            save_payload(&conn, id, &payload)?;
            println!("stored `{key}` for action {id}");
        }
        ActionCommand::Clear { id } => {
            let conn = open_store(&store)?;
            if clear_payload(&conn, id)? {
                println!("cleared data for action {id}");
            } else {
                println!("action {id} has no stored data");
            }
        }
    }
    Ok(())
}
