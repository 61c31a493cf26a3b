//! `.docx` output for rendered blocks.
use super::Block;
use anyhow::{anyhow, Context, Result};
use docx_rs::{AlignmentType, Docx, Paragraph, Run};
use std::fs;
use std::io::Cursor;
use std::path::Path;

// Font sizes in half-points.
const TITLE_SIZE: usize = 32;
const HEADING_SIZE: usize = 26;
const BODY_SIZE: usize = 22;

const SIGNATURE_LINE: &str = "______________________________";

/// Serialize blocks into an in-memory `.docx` package.
fn render_docx_bytes(blocks: &[Block]) -> Result<Vec<u8>> {
    let mut docx = Docx::new();
    for block in blocks {
        for paragraph in paragraphs(block) {
            docx = docx.add_paragraph(paragraph);
        }
    }
    let mut cursor = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut cursor)
        .map_err(|err| anyhow!("pack docx: {err}"))?;
    Ok(cursor.into_inner())
}

/// Write blocks to `path`, creating parent directories.
pub fn write_docx(path: &Path, blocks: &[Block]) -> Result<()> {
    let bytes = render_docx_bytes(blocks)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote docx");
    Ok(())
}

fn paragraphs(block: &Block) -> Vec<Paragraph> {
    match block {
        Block::Title { text } => vec![Paragraph::new()
            .add_run(Run::new().add_text(text.as_str()).bold().size(TITLE_SIZE))
            .align(AlignmentType::Center)],
        Block::Heading { text } => vec![Paragraph::new()
            .add_run(Run::new().add_text(text.as_str()).bold().size(HEADING_SIZE))
            .align(AlignmentType::Center)],
        Block::Paragraph { text } => vec![Paragraph::new()
            .add_run(Run::new().add_text(text.as_str()).size(BODY_SIZE))
            .align(AlignmentType::Both)],
        Block::ListItem { text } => vec![Paragraph::new()
            .add_run(Run::new().add_tab().add_text(text.as_str()).size(BODY_SIZE))
            .align(AlignmentType::Both)],
        Block::Signature { role, name } => vec![
            Paragraph::new(),
            Paragraph::new()
                .add_run(Run::new().add_text(role.as_str()).bold().size(BODY_SIZE))
                .align(AlignmentType::Right),
            Paragraph::new()
                .add_run(Run::new().add_text(name.as_str()).size(BODY_SIZE))
                .align(AlignmentType::Right),
            Paragraph::new()
                .add_run(Run::new().add_text(SIGNATURE_LINE).size(BODY_SIZE))
                .align(AlignmentType::Right),
        ],
    }
}
