//! Content-stream text interpreter
//!
//! Walks the decoded operators of a page content stream and emits one
//! [`RawTextItem`] per text-showing operator, carrying the text rendering
//! matrix at the moment the text was shown. Glyph advances use the supplied
//! [`TextMeasure`], so positions of consecutive items stay consistent with the
//! widths the layout step measures later.

use crate::layout::TextMeasure;
use crate::matrix::{self, Matrix, IDENTITY};
use crate::RawTextItem;
use lopdf::content::Operation;
use lopdf::Object;

/// `TJ` displacements at or beyond this many thousandths of an em read as a
/// word break.
const TJ_SPACE_THRESHOLD: f32 = 250.0;

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font: Option<String>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: IDENTITY,
            tlm: IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

pub(crate) struct TextInterpreter<'m, M: TextMeasure + ?Sized> {
    measure: &'m M,
    ctm: Matrix,
    text: TextState,
    stack: Vec<(Matrix, TextState)>,
    items: Vec<RawTextItem>,
}

impl<'m, M: TextMeasure + ?Sized> TextInterpreter<'m, M> {
    pub(crate) fn new(measure: &'m M) -> Self {
        Self {
            measure,
            ctm: IDENTITY,
            text: TextState::default(),
            stack: Vec::new(),
            items: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, operations: &[Operation]) -> Vec<RawTextItem> {
        for operation in operations {
            self.apply(operation);
        }

        self.items
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = operation.operands.as_slice();

        match operation.operator.as_str() {
            "q" => self.stack.push((self.ctm, self.text.clone())),
            "Q" => {
                if let Some((ctm, text)) = self.stack.pop() {
                    let tm = self.text.tm;
                    let tlm = self.text.tlm;
                    self.ctm = ctm;
                    self.text = TextState { tm, tlm, ..text };
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.ctm = matrix::multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.text.tm = IDENTITY;
                self.text.tlm = IDENTITY;
            }
            "Tf" => {
                if let [Object::Name(name), size] = operands {
                    self.text.font = Some(String::from_utf8_lossy(name).into_owned());
                    if let Some(size) = number(size) {
                        self.text.font_size = size;
                    }
                }
            }
            "Tc" => set_number(operands, &mut self.text.char_spacing),
            "Tw" => set_number(operands, &mut self.text.word_spacing),
            "TL" => set_number(operands, &mut self.text.leading),
            "Ts" => set_number(operands, &mut self.text.rise),
            "Tz" => {
                if let Some(scale) = operands.first().and_then(number) {
                    self.text.horizontal_scale = scale / 100.0;
                }
            }
            "Td" => {
                if let [tx, ty] = operands {
                    if let (Some(tx), Some(ty)) = (number(tx), number(ty)) {
                        self.move_line(tx, ty);
                    }
                }
            }
            "TD" => {
                if let [tx, ty] = operands {
                    if let (Some(tx), Some(ty)) = (number(tx), number(ty)) {
                        self.text.leading = -ty;
                        self.move_line(tx, ty);
                    }
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.text.tm = m;
                    self.text.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(decode_string(bytes));
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(decode_string(bytes));
                }
            }
            "\"" => {
                if let [aw, ac, Object::String(bytes, _)] = operands {
                    if let (Some(aw), Some(ac)) = (number(aw), number(ac)) {
                        self.text.word_spacing = aw;
                        self.text.char_spacing = ac;
                    }
                    self.next_line();
                    self.show(decode_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = operands.first() {
                    self.show_array(elements);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text.tlm = matrix::multiply(&matrix::translate(tx, ty), &self.text.tlm);
        self.text.tm = self.text.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.text.leading);
    }

    fn rendering_matrix(&self) -> Matrix {
        let text = &self.text;
        let params = [
            text.font_size * text.horizontal_scale,
            0.0,
            0.0,
            text.font_size,
            0.0,
            text.rise,
        ];

        matrix::multiply(&params, &matrix::multiply(&text.tm, &self.ctm))
    }

    fn advance(&mut self, text: &str) {
        let state = &self.text;
        let glyphs = text.chars().count() as f32;
        let spaces = text.chars().filter(|c| *c == ' ').count() as f32;
        let tx = (self.measure.advance_em(text) * state.font_size
            + state.char_spacing * glyphs
            + state.word_spacing * spaces)
            * state.horizontal_scale;

        self.text.tm = matrix::multiply(&matrix::translate(tx, 0.0), &self.text.tm);
    }

    fn show(&mut self, text: String) {
        let transform = self.rendering_matrix();
        self.advance(&text);
        self.push_item(text, transform);
    }

    fn show_array(&mut self, elements: &[Object]) {
        let transform = self.rendering_matrix();
        let mut text = String::new();

        for element in elements {
            match element {
                Object::String(bytes, _) => {
                    let piece = decode_string(bytes);
                    self.advance(&piece);
                    text.push_str(&piece);
                }
                other => {
                    let Some(displacement) = number(other) else {
                        continue;
                    };

                    let tx = -displacement / 1000.0
                        * self.text.font_size
                        * self.text.horizontal_scale;
                    self.text.tm = matrix::multiply(&matrix::translate(tx, 0.0), &self.text.tm);

                    if displacement <= -TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ')
                    {
                        text.push(' ');
                    }
                }
            }
        }

        self.push_item(text, transform);
    }

    fn push_item(&mut self, text: String, transform: Matrix) {
        self.items.push(RawTextItem {
            text,
            transform,
            font_size: self.text.font_size,
            font: self.text.font.clone(),
        });
    }
}

fn number(object: &Object) -> Option<f32> {
    object.as_float().ok()
}

fn set_number(operands: &[Object], target: &mut f32) {
    if let Some(value) = operands.first().and_then(number) {
        *target = value;
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }

    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }

    Some(m)
}

/// UTF-16BE when BOM-prefixed, Latin-1 otherwise.
pub(crate) fn decode_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|&byte| char::from(byte)).collect()
}
