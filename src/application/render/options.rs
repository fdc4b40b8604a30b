use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;

const MM_PER_INCH: f64 = 25.4;

/// Physical paper size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PaperSize {
    pub const A4: PaperSize = PaperSize {
        width_mm: 210.0,
        height_mm: 297.0,
    };
}

/// Page geometry and print flags used for every export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfOptions {
    pub paper: PaperSize,
    pub margin_mm: f64,
    pub scale: f64,
    pub landscape: bool,
    pub print_background: bool,
    pub display_header_footer: bool,
    /// When false, `@page { size }` in the document is ignored in favour of `paper`.
    pub prefer_css_page_size: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            paper: PaperSize::A4,
            margin_mm: 12.0,
            scale: 1.0,
            landscape: false,
            print_background: true,
            display_header_footer: false,
            prefer_css_page_size: false,
        }
    }
}

impl PdfOptions {
    pub fn to_print_params(&self) -> PrintToPdfParams {
        let margin = mm_to_inches(self.margin_mm);
        PrintToPdfParams::builder()
            .landscape(self.landscape)
            .display_header_footer(self.display_header_footer)
            .print_background(self.print_background)
            .scale(self.scale)
            .paper_width(mm_to_inches(self.paper.width_mm))
            .paper_height(mm_to_inches(self.paper.height_mm))
            .margin_top(margin)
            .margin_bottom(margin)
            .margin_left(margin)
            .margin_right(margin)
            .prefer_css_page_size(self.prefer_css_page_size)
            .build()
    }
}

fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}
