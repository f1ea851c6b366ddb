//! Editing state for an annotation's text card plus the notifications the
//! host persists. Rendering of the text itself (markdown or otherwise) is the
//! host's concern; this only hands the text back unchanged.

use crate::anchor::Anchor;

pub const EMPTY_TEXT_PLACEHOLDER: &str = "Marked";

type AnchorCallback = Box<dyn FnMut(&Anchor)>;
type IndexCallback = Box<dyn FnMut(usize)>;

#[derive(Default)]
pub struct AnnotationEvents {
    on_saved: Option<AnchorCallback>,
    on_deleted: Option<AnchorCallback>,
    on_clicked: Option<IndexCallback>,
}

impl AnnotationEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_saved(mut self, callback: impl FnMut(&Anchor) + 'static) -> Self {
        self.on_saved = Some(Box::new(callback));
        self
    }

    pub fn on_deleted(mut self, callback: impl FnMut(&Anchor) + 'static) -> Self {
        self.on_deleted = Some(Box::new(callback));
        self
    }

    pub fn on_clicked(mut self, callback: impl FnMut(usize) + 'static) -> Self {
        self.on_clicked = Some(Box::new(callback));
        self
    }
}

pub struct AnnotationCard {
    index: usize,
    editable: bool,
    active: bool,
    edit_mode: bool,
    events: AnnotationEvents,
}

impl AnnotationCard {
    /// New anchors (no text yet) open straight into edit mode.
    pub fn new(index: usize, anchor: &Anchor, editable: bool, events: AnnotationEvents) -> Self {
        Self {
            index,
            editable,
            active: false,
            edit_mode: anchor.text.is_none(),
            events,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based number shown in the marker glyph.
    pub fn label(&self) -> String {
        (self.index + 1).to_string()
    }

    pub fn is_editing(&self) -> bool {
        self.edit_mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Returns whether edit mode was entered.
    pub fn begin_edit(&mut self) -> bool {
        if self.editable {
            self.edit_mode = true;
        }
        self.edit_mode
    }

    pub fn save(&mut self, anchor: &mut Anchor) {
        self.edit_mode = false;
        anchor.text.get_or_insert_with(String::new);
        if let Some(callback) = self.events.on_saved.as_mut() {
            callback(anchor);
        }
    }

    pub fn delete(&mut self, anchor: &Anchor) {
        if let Some(callback) = self.events.on_deleted.as_mut() {
            callback(anchor);
        }
    }

    pub fn click(&mut self) {
        let index = self.index;
        if let Some(callback) = self.events.on_clicked.as_mut() {
            callback(index);
        }
    }

    pub fn display_text<'a>(&self, anchor: &'a Anchor) -> &'a str {
        match anchor.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => EMPTY_TEXT_PLACEHOLDER,
        }
    }
}
