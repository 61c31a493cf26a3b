//! Workflow generate step.
use super::context::SessionContext;
use super::print_json;
use crate::cli::{GenerateArgs, TemplatesArgs};
use crate::merge::load_merged_optional;
use crate::templates::{
    default_output_name, missing_fields, render_blocks, write_docx, MeetingType, TemplateId,
};
use anyhow::{anyhow, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TemplateInfo {
    id: TemplateId,
    title: &'static str,
    meeting_type: MeetingType,
    required_fields: Vec<&'static str>,
    default_agenda: Vec<String>,
}

/// List the available templates.
pub fn run_templates(args: &TemplatesArgs) -> Result<()> {
    let infos: Vec<TemplateInfo> = TemplateId::ALL
        .into_iter()
        .map(|id| TemplateInfo {
            id,
            title: id.title(),
            meeting_type: id.meeting_type(),
            required_fields: id.required_fields(),
            default_agenda: id.default_agenda(),
        })
        .collect();
    if args.json {
        return print_json(&infos);
    }
    for info in &infos {
        println!(
            "{:<26} {} ({})",
            info.id.as_str(),
            info.title,
            info.meeting_type.label()
        );
        println!("  requires: {}", info.required_fields.join(", "));
    }
    Ok(())
}

/// Render the merged data through one template into a `.docx` file.
pub fn run_generate(args: &GenerateArgs) -> Result<()> {
    let ctx = SessionContext::load(&args.session)?;
    let merged = load_merged_optional(&ctx.paths)?.ok_or_else(|| {
        anyhow!(
            "no merged data yet (run `verbale merge --session {}`)",
            ctx.session_flag()
        )
    })?;

    let blocks = render_blocks(args.template, &merged.fields, args.allow_missing)?;
    if args.preview {
        for block in &blocks {
            println!("{}", block.text());
        }
        return Ok(());
    }
    let out = match &args.out {
        Some(out) => out.clone(),
        None => ctx
            .paths
            .output_dir(&ctx.config.output_dir)
            .join(default_output_name(args.template, &merged.fields)),
    };
    write_docx(&out, &blocks)?;
    println!("wrote {}", out.display());

    let missing = missing_fields(args.template, &merged.fields);
    if !missing.is_empty() {
        println!("warnings: placeholders for {}", missing.join(", "));
    }
    Ok(())
}
