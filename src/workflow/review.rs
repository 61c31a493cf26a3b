//! Review steps: list documents, report conflicts, merge, edit and show data.
use super::context::SessionContext;
use super::print_json;
use crate::cli::{ConflictsArgs, DocumentsArgs, EditArgs, MergeArgs, ShowArgs};
use crate::conflicts::detect_conflicts;
use crate::fieldpath::{apply_edit, as_append, lookup, parse_set_arg, parse_unset_arg, value_text, Edit};
use crate::merge::{build_merged, load_merged_optional, write_merged, MergedData};
use crate::session::load_documents;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;

pub fn run_documents(args: &DocumentsArgs) -> Result<()> {
    let ctx = SessionContext::load(&args.session)?;
    let docs = load_documents(&ctx.paths)?;
    if args.json {
        return print_json(&docs);
    }
    if docs.is_empty() {
        println!("no documents extracted yet");
        return Ok(());
    }
    for doc in &docs {
        let state = match doc.error.as_deref() {
            Some(error) => format!("failed: {error}"),
            None => format!("{} fields", doc.fields.len()),
        };
        println!(
            "{}  {:<18}  {}  ({} chars, {})",
            doc.id, doc.kind, doc.source.original_name, doc.source.chars, state
        );
    }
    Ok(())
}

pub fn run_conflicts(args: &ConflictsArgs) -> Result<()> {
    let ctx = SessionContext::load(&args.session)?;
    let docs = load_documents(&ctx.paths)?;
    let conflicts = detect_conflicts(&docs);
    if args.json {
        return print_json(&conflicts);
    }
    if conflicts.is_empty() {
        println!("no conflicts");
        return Ok(());
    }
    for conflict in &conflicts {
        println!("{}:", conflict.field);
        for value in &conflict.values {
            println!("  - {}: {}", value.document_id, value.value);
        }
    }
    println!(
        "choose the winning document with `verbale merge --session {} --prefer <DOC_ID>`",
        ctx.session_flag()
    );
    Ok(())
}

pub fn run_merge(args: &MergeArgs) -> Result<()> {
    let ctx = SessionContext::load(&args.session)?;
    let docs = load_documents(&ctx.paths)?;
    let previous = load_merged_optional(&ctx.paths)?;
    let (preferred, edits) = match previous {
        Some(previous) if args.prefer.is_empty() => (previous.preferred, previous.edits),
        Some(previous) => (args.prefer.clone(), previous.edits),
        None => (args.prefer.clone(), Vec::new()),
    };
    let merged = build_merged(&docs, &preferred, &edits)?;
    write_merged(&ctx.paths, &merged)?;

    println!(
        "merged {} document(s) into {}",
        merged.documents.len(),
        ctx.paths.data_path().display()
    );
    if !merged.edits.is_empty() {
        println!("re-applied {} edit(s)", merged.edits.len());
    }
    for conflict in detect_conflicts(&docs) {
        let winner = merged
            .provenance
            .get(&conflict.field)
            .map(String::as_str)
            .unwrap_or("none");
        println!("conflict on {}: using {winner}", conflict.field);
    }
    Ok(())
}

pub fn run_edit(args: &EditArgs) -> Result<()> {
    if args.set.is_empty() && args.unset.is_empty() && !args.reset {
        return Err(anyhow!("nothing to do: pass --set, --unset or --reset"));
    }
    let ctx = SessionContext::load(&args.session)?;
    let mut new_edits = Vec::new();
    for raw in &args.set {
        new_edits.push(parse_set_arg(raw)?);
    }
    for raw in &args.unset {
        new_edits.push(parse_unset_arg(raw)?);
    }

    let previous = load_merged_optional(&ctx.paths)?;
    let mut merged = match previous {
        Some(previous) if !args.reset => previous,
        previous => {
            let preferred = previous.map(|data| data.preferred).unwrap_or_default();
            build_merged(&load_documents(&ctx.paths)?, &preferred, &[])?
        }
    };
    for edit in new_edits {
        let edit = as_append(&merged.fields, edit);
        apply_edit(&mut merged.fields, &edit)
            .with_context(|| format!("apply edit to {}", edit.path()))?;
        print_edit(&edit);
        merged.edits.push(edit);
    }
    write_merged(&ctx.paths, &merged)?;
    println!("{} stored edit(s)", merged.edits.len());
    Ok(())
}

fn print_edit(edit: &Edit) {
    match edit {
        Edit::Set { path, value } => println!("set {path} = {value}"),
        Edit::Unset { path } => println!("unset {path}"),
    }
}

pub fn run_show(args: &ShowArgs) -> Result<()> {
    let ctx = SessionContext::load(&args.session)?;
    let merged = load_merged_optional(&ctx.paths)?.ok_or_else(|| {
        anyhow!(
            "no merged data yet (run `verbale merge --session {}`)",
            ctx.session_flag()
        )
    })?;

    if let Some(path) = args.path.as_deref() {
        let value = lookup(&merged.fields, path)
            .ok_or_else(|| anyhow!("no field at {path:?}"))?;
        if args.json || matches!(value, Value::Object(_) | Value::Array(_)) {
            return print_json(value);
        }
        println!("{}", value_text(value));
        return Ok(());
    }
    if args.json {
        return print_json(&merged);
    }
    let mut lines = Vec::new();
    flatten("", &Value::Object(merged.fields.clone()), &mut lines);
    for (path, text) in lines {
        match source_of(&merged, &path) {
            Some(doc) => println!("{path} = {text}  [{doc}]"),
            None => println!("{path} = {text}"),
        }
    }
    if !merged.edits.is_empty() {
        println!("({} stored edit(s))", merged.edits.len());
    }
    Ok(())
}

/// Dotted path and display text for every leaf.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten(&join(key), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten(&join(&index.to_string()), child, out);
            }
        }
        Value::Object(_) => out.push((prefix.to_string(), "{}".to_string())),
        Value::Array(_) => out.push((prefix.to_string(), "[]".to_string())),
        other => out.push((prefix.to_string(), value_text(other))),
    }
}

/// Provenance of a path or of its closest recorded ancestor.
fn source_of<'a>(merged: &'a MergedData, path: &str) -> Option<&'a str> {
    let mut candidate = path;
    loop {
        if let Some(doc) = merged.provenance.get(candidate) {
            return Some(doc);
        }
        let (parent, _) = candidate.rsplit_once('.')?;
        candidate = parent;
    }
}
