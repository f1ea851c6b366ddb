use std::{cell::RefCell, rc::Rc};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A point of interest on the mesh. The caller owns anchors; the overlay only
/// keeps a weak reference so dropping the anchor hides its marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: u32,
    pub position: DVec3,
    #[serde(default)]
    pub text: Option<String>,
}

pub type SharedAnchor = Rc<RefCell<Anchor>>;

impl Anchor {
    pub fn new(id: u32, position: DVec3) -> Self {
        Self {
            id,
            position,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn shared(self) -> SharedAnchor {
        Rc::new(RefCell::new(self))
    }
}
