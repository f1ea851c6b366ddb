//! The marker's screen-space element. The frame path writes style properties
//! straight onto it at render rate; nothing here goes through a UI framework's
//! state or diffing.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleProperty {
    Visibility,
    Left,
    Top,
    Opacity,
    /// Stacking order of the marker glyph.
    ZIndex,
}

impl StyleProperty {
    pub fn css_name(self) -> &'static str {
        match self {
            StyleProperty::Visibility => "visibility",
            StyleProperty::Left => "left",
            StyleProperty::Top => "top",
            StyleProperty::Opacity => "opacity",
            StyleProperty::ZIndex => "z-index",
        }
    }
}

impl fmt::Display for StyleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

pub trait DisplaySurface {
    fn set_style(&mut self, property: StyleProperty, value: String);
}

/// In-memory style block, usable as a headless surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InlineStyle {
    properties: BTreeMap<StyleProperty, String>,
    #[serde(skip)]
    writes: u64,
}

impl InlineStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: StyleProperty) -> Option<&str> {
        self.properties.get(&property).map(String::as_str)
    }

    pub fn is_hidden(&self) -> bool {
        self.get(StyleProperty::Visibility) == Some("hidden")
    }

    /// Total number of property writes, for probing frame activity.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn properties(&self) -> &BTreeMap<StyleProperty, String> {
        &self.properties
    }
}

impl DisplaySurface for InlineStyle {
    fn set_style(&mut self, property: StyleProperty, value: String) {
        self.writes += 1;
        self.properties.insert(property, value);
    }
}

#[cfg(test)]
mod surface_tests {
    use super::*;

    #[test]
    fn later_writes_replace_earlier_values() {
        let mut style = InlineStyle::new();
        style.set_style(StyleProperty::Visibility, "visible".into());
        style.set_style(StyleProperty::Visibility, "hidden".into());
        assert!(style.is_hidden());
        assert_eq!(style.writes(), 2);
        assert_eq!(style.properties().len(), 1);
    }

    #[test]
    fn property_names_match_css() {
        assert_eq!(StyleProperty::ZIndex.to_string(), "z-index");
        assert_eq!(
            serde_json::to_string(&StyleProperty::ZIndex).expect("serialize"),
            "\"z-index\""
        );
    }
}
