use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MediaError, Result};
use crate::files;
use crate::imaging::primitives::{self, Anchor, RectStyle, SaveOptions, BLACK, WHITE};
use crate::imaging::qr::qr_code;
use crate::imaging::text::TextPainter;
use crate::video::types::Frame;

const MM_PER_INCH: f64 = 25.4;
const A4_MM: (f64, f64) = (210.0, 297.0);
const LABEL_MM: (f64, f64) = (80.0, 30.0);
const LABEL_OUTLINE_WIDTH: u32 = 2;

/// Share of the label width reserved for text
const TEXT_WIDTH_FRACTION: f32 = 0.75;

/// Distance of the text from the label corner, as a share of the label width
const MARGIN_FRACTION: f32 = 0.02;

/// Share of the space right of the text taken by the QR code
const QR_FILL_FRACTION: f32 = 0.8;

/// One product in the label input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub model: String,
    pub serial_number: String,
}

impl Product {
    pub fn label_text(&self) -> String {
        format!("{}\n\nModel: {}\nSN: {}", self.name, self.model, self.serial_number)
    }
}

fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm / MM_PER_INCH * dpi as f64) as u32
}

/// Label grid on an A4 page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub page_width: u32,
    pub page_height: u32,
    pub label_width: u32,
    pub label_height: u32,
    pub rows: u32,
    pub columns: u32,
}

/// Where one label goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSlot {
    pub sheet: usize,
    pub row: u32,
    pub column: u32,
}

impl SheetLayout {
    /// 8 x 3 cm labels on A4 at `dpi`
    pub fn a4(dpi: u32) -> Result<Self> {
        let layout = Self {
            page_width: mm_to_px(A4_MM.0, dpi),
            page_height: mm_to_px(A4_MM.1, dpi),
            label_width: mm_to_px(LABEL_MM.0, dpi),
            label_height: mm_to_px(LABEL_MM.1, dpi),
            rows: 0,
            columns: 0,
        };
        if layout.label_width == 0 || layout.label_height == 0 {
            return Err(MediaError::InvalidParameters {
                details: format!("{} dpi is too low for a label sheet", dpi),
            }.into());
        }
        Ok(Self {
            rows: layout.page_height / layout.label_height,
            columns: layout.page_width / layout.label_width,
            ..layout
        })
    }

    pub fn labels_per_sheet(&self) -> usize {
        (self.rows * self.columns) as usize
    }

    /// Labels fill a column top to bottom before moving right; a full page
    /// starts a new sheet
    pub fn slot(&self, index: usize) -> LabelSlot {
        let per_sheet = self.labels_per_sheet().max(1);
        let on_sheet = (index % per_sheet) as u32;
        LabelSlot {
            sheet: index / per_sheet,
            row: on_sheet % self.rows.max(1),
            column: on_sheet / self.rows.max(1),
        }
    }

    pub fn sheet_count(&self, labels: usize) -> usize {
        labels.div_ceil(self.labels_per_sheet().max(1))
    }
}

/// Read the product list (a JSON array of `{name, model, serial_number}`)
pub fn load_products<P: AsRef<Path>>(path: P) -> Result<Vec<Product>> {
    files::load_json(path)
}

/// Draw one label with its top-left corner at `(x, y)`
fn draw_label(sheet: &mut Frame, product: &Product, x: f32, y: f32, layout: &SheetLayout, painter: &TextPainter) -> Result<()> {
    let (label_width, label_height) = (layout.label_width, layout.label_height);
    primitives::draw_rectangle(
        sheet,
        (x, y),
        label_width,
        label_height,
        Anchor::TopLeft,
        RectStyle {
            fill: Some(WHITE),
            outline: Some(BLACK),
            outline_width: LABEL_OUTLINE_WIDTH,
        },
    );

    let margin = label_width as f32 * MARGIN_FRACTION;
    let text_width = label_width as f32 * TEXT_WIDTH_FRACTION;
    painter.draw_fitted(
        sheet,
        &product.label_text(),
        (x + margin, y + margin),
        text_width - margin,
        label_height as f32 - 2.0 * margin,
        BLACK,
        Anchor::TopLeft,
    )?;

    let qr = qr_code(&product.serial_number, 1)?;
    let qr_size = ((label_width as f32 - text_width) * QR_FILL_FRACTION).min(label_height as f32 - 2.0 * margin);
    let center = (
        x + text_width + margin + qr_size / 2.0,
        y + label_height as f32 / 2.0,
    );
    primitives::paste(sheet, &qr, center, Anchor::Center, qr_size / qr.width() as f32)
}

/// Lay `products` out on as many A4 sheets as needed and save them as
/// `<target_dir>/<name>_<n>.png` (n from 1).
///
/// Returns the sheet paths in order.
pub fn render_label_sheets(
    products: &[Product],
    painter: &TextPainter,
    dpi: u32,
    target_dir: &Path,
    name: &str,
) -> Result<Vec<PathBuf>> {
    if products.is_empty() {
        return Err(MediaError::InvalidParameters {
            details: "no products to label".to_string(),
        }.into());
    }
    let layout = SheetLayout::a4(dpi)?;
    if layout.labels_per_sheet() == 0 {
        return Err(MediaError::InvalidParameters {
            details: "a label does not fit on the page".to_string(),
        }.into());
    }

    info!(
        "Rendering {} labels on {} sheet(s), {} per sheet",
        products.len(),
        layout.sheet_count(products.len()),
        layout.labels_per_sheet()
    );

    let save_options = SaveOptions {
        dpi: Some(dpi),
        overwrite: false,
    };
    let mut written = Vec::new();
    for (sheet_index, chunk) in products.chunks(layout.labels_per_sheet()).enumerate() {
        let mut sheet = primitives::blank(layout.page_width, layout.page_height);
        for (offset, product) in chunk.iter().enumerate() {
            let slot = layout.slot(offset);
            let x = (slot.column * layout.label_width) as f32;
            let y = (slot.row * layout.label_height) as f32;
            draw_label(&mut sheet, product, x, y, &layout, painter)?;
        }
        let path = target_dir.join(format!("{}_{}.png", name, sheet_index + 1));
        written.push(primitives::save(&sheet, &path, &save_options)?);
    }

    Ok(written)
}
