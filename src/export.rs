use crate::core::composer::line;
use crate::core::form::PromptForm;
use crate::core::versions::PromptVersion;
use crate::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use serde_json::json;

const PDF_PAGE_WIDTH: i64 = 595;
const PDF_PAGE_HEIGHT: i64 = 842;
const PDF_MARGIN: i64 = 50;
const PDF_FONT_SIZE: i64 = 10;
const PDF_LEADING: i64 = 13;
const PDF_COLUMNS: usize = 92;
const PDF_LINES_PER_PAGE: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
    Pdf,
}

impl ExportFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Json => "application/json",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
        }
    }
}

pub fn render(format: ExportFormat, title: &str, version: &PromptVersion, form: Option<&PromptForm>) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Markdown => Ok(to_markdown(title, version, form).into_bytes()),
        ExportFormat::Json => Ok(to_json(title, version, form)?.into_bytes()),
        ExportFormat::Pdf => to_pdf(title, version, form),
    }
}

pub fn to_markdown(title: &str, version: &PromptVersion, form: Option<&PromptForm>) -> String {
    let mut out = String::new();
    let title = if title.trim().is_empty() { "Untitled prompt" } else { title.trim() };
    line(&mut out, format!("# {title}\n"));
    line(
        &mut out,
        format!(
            "_Version {} ({:?}), {} tokens, {}_\n",
            version.number,
            version.source,
            version.tokens,
            version.created_at.format("%Y-%m-%d %H:%M UTC")
        ),
    );
    line(&mut out, format!("## System prompt\n\n{}\n", version.content.trim()));

    if let Some(form) = form {
        line(&mut out, "## Brief\n");
        if !form.objective.trim().is_empty() {
            line(&mut out, format!("- **Objective:** {}", form.objective.trim()));
        }
        if !form.persona.role.trim().is_empty() {
            line(&mut out, format!("- **Persona:** {}", form.persona.role.trim()));
        }
        line(
            &mut out,
            format!(
                "- **Rules:** {}  \n- **Examples:** {}  \n- **Tools:** {}  \n- **Flows:** {}",
                form.rules.len(),
                form.few_shot_examples.len(),
                form.tools.len(),
                form.flows.len()
            ),
        );
    }
    out.trim_end().to_string() + "\n"
}

pub fn to_json(title: &str, version: &PromptVersion, form: Option<&PromptForm>) -> Result<String> {
    let doc = json!({
        "title": title,
        "version": version,
        "form": form,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Lays the Markdown export out as plain text pages. Headings use a bold
/// face, everything else is monospaced.
pub fn to_pdf(title: &str, version: &PromptVersion, form: Option<&PromptForm>) -> Result<Vec<u8>> {
    let lines: Vec<String> = to_markdown(title, version, form)
        .lines()
        .flat_map(|l| wrap(l, PDF_COLUMNS))
        .collect();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let heading_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => body_font, "F2" => heading_font },
    });

    let mut kids: Vec<ObjectId> = Vec::new();
    for chunk in lines.chunks(PDF_LINES_PER_PAGE) {
        let content = page_content(chunk);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        kids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids.into_iter().map(Object::from).collect::<Vec<Object>>(),
        "Resources" => resources_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(PDF_PAGE_WIDTH), Object::Integer(PDF_PAGE_HEIGHT)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn page_content(lines: &[String]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("TL", vec![PDF_LEADING.into()]),
        Operation::new("Td", vec![PDF_MARGIN.into(), (PDF_PAGE_HEIGHT - PDF_MARGIN).into()]),
    ];
    for text in lines {
        let font = if text.starts_with('#') { "F2" } else { "F1" };
        operations.push(Operation::new("Tf", vec![font.into(), PDF_FONT_SIZE.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

/// Standard Type1 fonts only cover Latin-1; anything else becomes '?'.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}
