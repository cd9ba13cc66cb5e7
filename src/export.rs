use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use std::{
    fmt,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

use crate::{
    models::GenerationResult,
    render::{render_tab, Section, Tab},
};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const TOP: f32 = 280.0;
const WRAP_COLUMNS: usize = 95;

/// Fonts with CJK coverage, tried in order when no font is configured.
pub const CJK_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansSC-Regular.ttf",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/usr/share/fonts/truetype/arphic/uming.ttc",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
    #[error("cannot use font {path}: {reason}")]
    Font { path: PathBuf, reason: String },
}

/// Typeface for exported sections.
#[derive(Clone, Default)]
pub enum ExportFont {
    /// PDF base-14 Helvetica. Covers Latin-1 only.
    #[default]
    Builtin,
    /// A TrueType/OpenType font embedded in every export.
    Embedded { path: PathBuf, data: Arc<Vec<u8>> },
}

impl fmt::Debug for ExportFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFont::Builtin => f.write_str("Builtin"),
            ExportFont::Embedded { path, data } => f
                .debug_struct("Embedded")
                .field("path", path)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

impl ExportFont {
    /// Reads a font file and checks that printpdf can parse it.
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let font_error = |reason: String| ExportError::Font {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
        PdfDocument::empty("font check")
            .add_external_font(data.as_slice())
            .map_err(|e| font_error(format!("{e:?}")))?;
        Ok(ExportFont::Embedded {
            path: path.to_path_buf(),
            data: Arc::new(data),
        })
    }

    /// Uses the configured font if there is one, otherwise the first usable
    /// CJK candidate, otherwise the builtin Latin-1 font.
    pub fn discover(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::load(path) {
                Ok(font) => {
                    tracing::info!("📄 Export font: {}", path.display());
                    return font;
                }
                Err(e) => tracing::warn!("{}; falling back to font discovery", e),
            }
        }
        for candidate in CJK_FONT_CANDIDATES.iter().map(Path::new) {
            if !candidate.exists() {
                continue;
            }
            match Self::load(candidate) {
                Ok(font) => {
                    tracing::info!("📄 Export font: {}", candidate.display());
                    return font;
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
        tracing::warn!("No CJK-capable font found; set EXPORT_FONT or exported Chinese text becomes '?'");
        ExportFont::Builtin
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, ExportFont::Embedded { .. })
    }

    fn encode(&self, text: &str) -> String {
        match self {
            ExportFont::Builtin => latin1(text),
            ExportFont::Embedded { .. } => text.to_string(),
        }
    }

    /// Registers the font with `doc`, returning (regular, bold) handles.
    fn register(&self, doc: &PdfDocumentReference) -> Result<(IndirectFontRef, IndirectFontRef), ExportError> {
        let pdf_error = |e: printpdf::Error| ExportError::Pdf(format!("{e:?}"));
        match self {
            ExportFont::Builtin => Ok((
                doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
            )),
            ExportFont::Embedded { data, .. } => {
                let face = doc.add_external_font(data.as_slice()).map_err(pdf_error)?;
                Ok((face.clone(), face))
            }
        }
    }
}

/// A rendered section ready to be offered as a download.
#[derive(Debug, Clone)]
pub struct ExportedSection {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn export_file_name(tab: Tab, now: DateTime<Utc>) -> String {
    format!("{}_{}.pdf", tab.export_stem(), now.timestamp_millis())
}

/// Renders one result tab to a paginated, text-only PDF.
pub fn export_section(
    result: &GenerationResult,
    tab: Tab,
    now: DateTime<Utc>,
    font: &ExportFont,
) -> Result<ExportedSection, ExportError> {
    let section = render_tab(result, tab);
    let bytes = render_pdf(&section, &result.listing.main_title, font)?;
    Ok(ExportedSection {
        file_name: export_file_name(tab, now),
        content_type: "application/pdf",
        bytes,
    })
}

#[derive(Debug, PartialEq)]
enum Line {
    Title(String),
    Heading(String),
    Body(String),
    Gap,
}

impl Line {
    fn size(&self) -> (f32, f32) {
        // (font size in pt, advance in mm)
        match self {
            Line::Title(_) => (18.0, 10.0),
            Line::Heading(_) => (12.0, 7.0),
            Line::Body(_) => (9.0, 4.5),
            Line::Gap => (0.0, 3.0),
        }
    }
}

fn layout(section: &Section, product: &str, font: &ExportFont) -> Vec<Line> {
    let mut lines = vec![
        Line::Title(font.encode(&section.title)),
        Line::Body(font.encode(&truncate(product, 140))),
        Line::Gap,
    ];
    for block in &section.blocks {
        lines.push(Line::Heading(font.encode(&block.heading)));
        for text in &block.lines {
            lines.extend(
                wrap(text, WRAP_COLUMNS)
                    .into_iter()
                    .map(|line| Line::Body(font.encode(&line))),
            );
        }
        lines.push(Line::Gap);
    }
    lines
}

fn render_pdf(section: &Section, product: &str, font: &ExportFont) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        format!("{}: {}", section.title, truncate(product, 48)),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let (regular, bold) = font.register(&doc)?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = TOP;
    let mut page_no = 1;
    for line in layout(section, product, font) {
        let (size, advance) = line.size();
        if y - advance < MARGIN {
            page_no += 1;
            let (page, layer_idx) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Page {page_no}"));
            layer = doc.get_page(page).get_layer(layer_idx);
            y = TOP;
        }
        y -= advance;
        match line {
            Line::Title(text) | Line::Heading(text) => layer.use_text(text, size, Mm(MARGIN), Mm(y), &bold),
            Line::Body(text) => layer.use_text(text, size, Mm(MARGIN), Mm(y), &regular),
            Line::Gap => {}
        }
    }

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buf);
        doc.save(&mut writer).map_err(|e| ExportError::Pdf(format!("{e:?}")))?;
    }
    Ok(buf)
}

// East Asian scripts take roughly two Latin columns.
fn char_width(c: char) -> usize {
    if c as u32 >= 0x2E80 {
        2
    } else {
        1
    }
}

/// Greedy wrap on display columns. Runs without spaces (Chinese text) are
/// broken wherever the column limit falls.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    fn flush(lines: &mut Vec<String>, current: &mut String, width: &mut usize) {
        lines.push(current.trim_end().to_string());
        current.clear();
        *width = 0;
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut width = 0;
    for word in text.split_whitespace() {
        let word_width: usize = word.chars().map(char_width).sum();
        if width > 0 && width + 1 + word_width > columns {
            flush(&mut lines, &mut current, &mut width);
        }
        if width > 0 {
            current.push(' ');
            width += 1;
        }
        for c in word.chars() {
            let w = char_width(c);
            if width > 0 && width + w > columns {
                flush(&mut lines, &mut current, &mut width);
            }
            current.push(c);
            width += w;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// Builtin PDF fonts only cover Latin-1; anything else collapses to a single '?'.
fn latin1(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut replaced = false;
    for c in text.chars() {
        if (c as u32) < 0x100 {
            out.push(c);
            replaced = false;
        } else if !replaced {
            out.push('?');
            replaced = true;
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}
