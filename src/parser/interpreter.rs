//! Content stream interpretation into positioned glyphs and image placements.
//!
//! Tracks the graphics state (`q`/`Q`/`cm`), the text state and text matrices,
//! and emits one [`Glyph`] per decoded character plus one placement per image
//! XObject drawn with `Do`. Form XObjects are interpreted recursively.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};
use crate::model::{BBox, Glyph};

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// Glyph ascent and descent as a fraction of the font size.
const ASCENT: f32 = 0.75;
const DESCENT: f32 = -0.25;

/// Width used when a font carries no metrics, in glyph space (1/1000 em).
const FALLBACK_WIDTH: f32 = 500.0;

/// An image XObject as drawn on the page, before clipping.
#[derive(Debug, Clone)]
pub(crate) struct PlacedImage {
    /// The image stream
    pub id: ObjectId,
    /// Placement bounds in top-left page coordinates
    pub bbox: BBox,
}

/// Everything drawn on one page.
#[derive(Debug, Default)]
pub(crate) struct PageContent {
    pub glyphs: Vec<Glyph>,
    pub images: Vec<PlacedImage>,
}

/// 2D affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }
}

impl Matrix {
    pub(crate) fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub(crate) fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub(crate) fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounds of the image of the rectangle `[x0, x1] × [y0, y1]`.
    fn bounds(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> (f32, f32, f32, f32) {
        let corners = [
            self.apply(x0, y0),
            self.apply(x1, y0),
            self.apply(x0, y1),
            self.apply(x1, y1),
        ];
        let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
        (min_x, min_y, max_x, max_y)
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Text state parameters (PDF 9.3).
#[derive(Debug, Clone)]
struct TextState {
    font: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scaling: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Widths and code length of one font.
#[derive(Debug, Clone)]
struct FontMetrics {
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
}

impl FontMetrics {
    fn load(doc: &LopdfDocument, font: &Dictionary) -> Self {
        let subtype = font
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"");

        if subtype == b"Type0" {
            return Self::load_type0(doc, font);
        }

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0)
            .max(0) as u32;
        let widths = font
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| arr.iter().map(|w| number(resolve(doc, w)).unwrap_or(0.0)).collect())
            .unwrap_or_default();
        let default_width = font
            .get(b"FontDescriptor")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(number)
            .filter(|w| *w > 0.0)
            .unwrap_or(FALLBACK_WIDTH);

        Self {
            two_byte: false,
            first_char,
            widths,
            cid_widths: HashMap::new(),
            default_width,
        }
    }

    fn load_type0(doc: &LopdfDocument, font: &Dictionary) -> Self {
        let descendant = font
            .get(b"DescendantFonts")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| arr.first())
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok());

        let mut metrics = Self {
            two_byte: true,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: 1000.0,
        };

        let Some(descendant) = descendant else {
            return metrics;
        };
        if let Some(dw) = descendant.get(b"DW").ok().and_then(number) {
            metrics.default_width = dw;
        }
        if let Some(w) = descendant
            .get(b"W")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        {
            metrics.cid_widths = parse_cid_widths(doc, w);
        }
        metrics
    }

    fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    fn default_simple() -> Self {
        Self {
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
        }
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
/// Largest CID a two-byte code can select.
const MAX_CID: u32 = 0xFFFF;

fn cid(value: f32) -> Option<u32> {
    (0.0..=MAX_CID as f32).contains(&value).then_some(value as u32)
}

fn parse_cid_widths(doc: &LopdfDocument, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(start) = number(resolve(doc, &w[i])) else {
            break;
        };
        let start = cid(start);
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                if let Some(start) = start {
                    for (offset, width) in list.iter().enumerate() {
                        let code = start + offset as u32;
                        if code > MAX_CID {
                            break;
                        }
                        if let Some(width) = number(resolve(doc, width)) {
                            widths.insert(code, width);
                        }
                    }
                }
                i += 2;
            }
            Some(end) => {
                let (Some(end), Some(width)) =
                    (number(end), w.get(i + 2).and_then(|o| number(resolve(doc, o))))
                else {
                    break;
                };
                // Out-of-range entries are skipped, the rest of /W still applies
                if let (Some(start), Some(end)) = (start, cid(end)) {
                    for code in start..=end {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Interprets one page's content into glyphs and image placements.
pub(crate) struct Interpreter<'a> {
    doc: &'a LopdfDocument,
    /// Page-space → top-left transform: flips y and removes the MediaBox origin
    to_top_left: Matrix,
    metrics: HashMap<(ObjectId, Vec<u8>), FontMetrics>,
    out: PageContent,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter for a page with the given MediaBox.
    pub(crate) fn new(doc: &'a LopdfDocument, media_box: [f32; 4]) -> Self {
        let [x0, _y0, _x1, y1] = media_box;
        Self {
            doc,
            to_top_left: Matrix::new(1.0, 0.0, 0.0, -1.0, -x0, y1),
            metrics: HashMap::new(),
            out: PageContent::default(),
        }
    }

    /// Interpret a page content stream with its resources.
    pub(crate) fn run(
        mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        resources_id: ObjectId,
    ) -> Result<PageContent> {
        let mut gs = GraphicsState::default();
        self.interpret(content, resources, resources_id, &mut gs, 0)?;
        Ok(self.out)
    }

    fn interpret(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        resources_id: ObjectId,
        gs: &mut GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let content = lopdf::content::Content::decode(content)
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let fonts = resources.map(|r| font_map(self.doc, r)).unwrap_or_default();

        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::default();
        let mut tlm = Matrix::default();

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number);

            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        *gs = saved;
                    }
                }
                "cm" => {
                    if let (Some(a), Some(b), Some(c), Some(d), Some(e), Some(f)) =
                        (num(0), num(1), num(2), num(3), num(4), num(5))
                    {
                        gs.ctm = Matrix::new(a, b, c, d, e, f).then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::default();
                    tlm = Matrix::default();
                }
                "ET" => {}
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        gs.text.font = name.clone();
                    }
                    if let Some(size) = num(1) {
                        gs.text.font_size = size;
                    }
                }
                "Tc" => gs.text.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => gs.text.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => gs.text.h_scaling = num(0).unwrap_or(100.0) / 100.0,
                "TL" => gs.text.leading = num(0).unwrap_or(0.0),
                "Ts" => gs.text.rise = num(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let tx = num(0).unwrap_or(0.0);
                    let ty = num(1).unwrap_or(0.0);
                    if op.operator == "TD" {
                        gs.text.leading = -ty;
                    }
                    tlm = Matrix::translation(tx, ty).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let (Some(a), Some(b), Some(c), Some(d), Some(e), Some(f)) =
                        (num(0), num(1), num(2), num(3), num(4), num(5))
                    {
                        tlm = Matrix::new(a, b, c, d, e, f);
                        tm = tlm;
                    }
                }
                "T*" => {
                    tlm = Matrix::translation(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, &fonts, resources_id, gs, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show(bytes, &fonts, resources_id, gs, &mut tm)
                                }
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * gs.text.font_size
                                            * gs.text.h_scaling;
                                        tm = Matrix::translation(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        gs.text.word_spacing = num(0).unwrap_or(gs.text.word_spacing);
                        gs.text.char_spacing = num(1).unwrap_or(gs.text.char_spacing);
                    }
                    tlm = Matrix::translation(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.last() {
                        self.show(bytes, &fonts, resources_id, gs, &mut tm);
                    }
                }
                "Do" => {
                    if let (Some(Object::Name(name)), Some(res)) = (operands.first(), resources) {
                        if let Err(e) = self.draw_xobject(name, res, gs, depth) {
                            log::debug!(
                                "Skipping XObject /{}: {}",
                                String::from_utf8_lossy(name),
                                e
                            );
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Show a string: emit glyphs and advance the text matrix.
    fn show(
        &mut self,
        bytes: &[u8],
        fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
        resources_id: ObjectId,
        gs: &GraphicsState,
        tm: &mut Matrix,
    ) {
        let doc = self.doc;
        let ts = &gs.text;
        let font = fonts.get(&ts.font).copied();
        let encoding = font.and_then(|f| f.get_font_encoding(doc).ok());

        let key = (resources_id, ts.font.clone());
        let metrics = self
            .metrics
            .entry(key)
            .or_insert_with(|| match font {
                Some(f) => FontMetrics::load(doc, f),
                None => FontMetrics::default_simple(),
            })
            .clone();

        let code_len = if metrics.two_byte { 2 } else { 1 };
        for code_bytes in bytes.chunks(code_len) {
            let code = code_bytes
                .iter()
                .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            let w0 = metrics.width(code) / 1000.0;

            let decoded = match &encoding {
                Some(enc) => LopdfDocument::decode_text(enc, code_bytes).unwrap_or_default(),
                None => decode_text_simple(code_bytes),
            };

            let trm = Matrix::new(
                ts.font_size * ts.h_scaling,
                0.0,
                0.0,
                ts.font_size,
                0.0,
                ts.rise,
            )
            .then(tm)
            .then(&gs.ctm);
            self.emit_glyphs(&decoded, w0, &trm);

            let word_spacing = if code_len == 1 && code == 32 {
                ts.word_spacing
            } else {
                0.0
            };
            let tx = (w0 * ts.font_size + ts.char_spacing + word_spacing) * ts.h_scaling;
            *tm = Matrix::translation(tx, 0.0).then(tm);
        }
    }

    /// Emit one glyph per decoded character, splitting the advance evenly.
    fn emit_glyphs(&mut self, decoded: &str, w0: f32, trm: &Matrix) {
        let count = decoded.chars().count();
        if count == 0 {
            return;
        }
        let size = trm.vertical_scale();
        let step = w0 / count as f32;
        let device = trm.then(&self.to_top_left);

        for (i, c) in decoded.chars().enumerate() {
            let start = step * i as f32;
            let (x0, top, x1, bottom) = device.bounds(start, DESCENT, start + step, ASCENT);
            self.out.glyphs.push(Glyph::new(c, x0, x1, top, bottom, size));
        }
    }

    fn draw_xobject(
        &mut self,
        name: &[u8],
        resources: &'a Dictionary,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let xobjects = resources
            .get(b"XObject")
            .map(|o| resolve(self.doc, o))
            .and_then(|o| o.as_dict())
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let id = xobjects
            .get(name)
            .and_then(|o| o.as_reference())
            .map_err(|e| Error::PdfParse(e.to_string()))?;
        let stream = self
            .doc
            .get_object(id)
            .and_then(|o| o.as_stream())
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"");

        match subtype {
            b"Image" => {
                let device = gs.ctm.then(&self.to_top_left);
                let (x0, top, x1, bottom) = device.bounds(0.0, 0.0, 1.0, 1.0);
                self.out.images.push(PlacedImage {
                    id,
                    bbox: BBox::new(x0, top, x1, bottom),
                });
                Ok(())
            }
            b"Form" if depth < MAX_FORM_DEPTH => {
                let mut form_gs = gs.clone();
                if let Some(m) = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| o.as_array().ok())
                    .filter(|arr| arr.len() == 6)
                {
                    let v: Vec<f32> = m.iter().map(|o| number(o).unwrap_or(0.0)).collect();
                    form_gs.ctm = Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]).then(&gs.ctm);
                }
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .map(|o| resolve(self.doc, o))
                    .and_then(|o| o.as_dict().ok())
                    .unwrap_or(resources);
                let data = stream_data(stream)?;
                self.interpret(&data, Some(form_resources), id, &mut form_gs, depth + 1)
            }
            _ => Ok(()),
        }
    }
}

/// Resolve an indirect reference, returning the object itself otherwise.
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Stream bytes with filters applied.
pub(crate) fn stream_data(stream: &lopdf::Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| Error::PdfParse(e.to_string()))
}

/// Extract a number from a PDF object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Font resource name → font dictionary for a resources dictionary.
fn font_map<'a>(doc: &'a LopdfDocument, resources: &'a Dictionary) -> BTreeMap<Vec<u8>, &'a Dictionary> {
    let mut fonts = BTreeMap::new();
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
    else {
        return fonts;
    };
    for (name, obj) in font_dict.iter() {
        if let Ok(dict) = resolve(doc, obj).as_dict() {
            fonts.insert(name.clone(), dict);
        }
    }
    fonts
}

/// Simple text decoding fallback when no encoding is available.
pub(crate) fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }
    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
