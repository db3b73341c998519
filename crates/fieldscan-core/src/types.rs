// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the fieldscan pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Axis-aligned bounding box in page pixel coordinates, `(x1, y1, x2, y2)`.
///
/// `(0, 0, 0, 0)` is the sentinel for "whole page, no geometry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Build a box from two corners, normalising so that `x1 <= x2` and
    /// `y1 <= y2` always hold.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// The whole-page sentinel.
    pub const fn full_page() -> Self {
        Self { x1: 0, y1: 0, x2: 0, y2: 0 }
    }

    pub fn is_full_page(&self) -> bool {
        *self == Self::full_page()
    }

    /// Zero for a box whose corners are out of order.
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// The same box with its corners in order.
    pub fn normalized(self) -> Self {
        Self::new(self.x1, self.y1, self.x2, self.y2)
    }

    /// Reading-order sort key: top edge first, left edge as tie-break.
    pub fn reading_order_key(&self) -> (u32, u32) {
        (self.y1, self.x1)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Layout category of a text-bearing region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    Text,
    Title,
    List,
    Table,
    /// Whole-page fallback when no layout regions are available.
    FullPage,
}

impl RegionKind {
    /// Map a layout detector label to a text-bearing region kind.
    ///
    /// Labels for non-text content (figures, images, etc.) return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "title" => Some(Self::Title),
            "list" => Some(Self::List),
            "table" => Some(Self::Table),
            _ => None,
        }
    }

    /// Name used in metadata (`"Text"`, `"FullPage"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Title => "Title",
            Self::List => "List",
            Self::Table => "Table",
            Self::FullPage => "FullPage",
        }
    }

    /// Name embedded in a [`StructuralMarker`].
    pub fn marker_label(&self) -> &'static str {
        match self {
            Self::FullPage => "FULL_PAGE",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline token recording a region's type, index and geometry:
/// `[REGION:<type>|<index>|bbox:<x1>,<y1>,<x2>,<y2>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralMarker {
    pub kind: RegionKind,
    /// 1-based region index.
    pub index: usize,
    pub bbox: BoundingBox,
}

impl StructuralMarker {
    /// Prefix `text` with this marker and a newline, leaving `text` untouched.
    pub fn annotate(&self, text: &str) -> String {
        format!("{self}\n{text}")
    }
}

impl fmt::Display for StructuralMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[REGION:{}|{}|bbox:{}]",
            self.kind.marker_label(),
            self.index,
            self.bbox
        )
    }
}

/// A recognised region of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// 1-based index in reading order.
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: RegionKind,
    pub bbox: BoundingBox,
    /// Raw recognised text, newlines preserved, capped in length.
    pub text: String,
    /// Character count of the full (uncapped) recognised text.
    pub char_count: usize,
    /// Recognition failure for this region, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Region {
    /// Record a region, keeping at most `text_cap` characters of its text.
    pub fn new(
        index: usize,
        kind: RegionKind,
        bbox: BoundingBox,
        text: &str,
        text_cap: usize,
    ) -> Self {
        Self {
            index,
            kind,
            bbox,
            text: text.chars().take(text_cap).collect(),
            char_count: text.chars().count(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn marker(&self) -> StructuralMarker {
        StructuralMarker {
            kind: self.kind,
            index: self.index,
            bbox: self.bbox,
        }
    }
}

/// OCR recognition strategy hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionMode {
    /// Sparse / short text (labels, single lines).
    Text,
    /// Dense full-document recognition.
    Document,
}

impl fmt::Display for RecognitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Document => f.write_str("doc"),
        }
    }
}

/// Result of extracting one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub raw_text: String,
    pub cleaned_text: String,
    /// Number of non-empty text blocks in `raw_text`.
    pub blocks_processed: usize,
    pub regions: Vec<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    /// Empty result recording why the page could not be extracted.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn has_text(&self) -> bool {
        !self.cleaned_text.is_empty()
    }
}

/// Deterministically extracted field values, keyed by field name.
pub type PrefillMap = BTreeMap<String, String>;

/// One requested field and its reconciled value (`""` when unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResult {
    pub field_name: String,
    pub value: String,
}

/// Flat field → value mapping, in the order the fields were requested.
///
/// Serialises as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<FieldResult>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field, keeping its first insertion position.
    pub fn insert(&mut self, field_name: impl Into<String>, value: impl Into<String>) {
        let field_name = field_name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.field_name == field_name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(FieldResult { field_name, value }),
        }
    }

    pub fn get(&self, field_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field_name == field_name)
            .map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldResult> {
        self.entries.iter()
    }

    pub fn into_results(self) -> Vec<FieldResult> {
        self.entries
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.field_name, &entry.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_renders_exact_shape() {
        let marker = StructuralMarker {
            kind: RegionKind::Text,
            index: 2,
            bbox: BoundingBox::new(10, 20, 300, 80),
        };
        assert_eq!(marker.to_string(), "[REGION:Text|2|bbox:10,20,300,80]");
        assert_eq!(
            marker.annotate("line one\nline two"),
            "[REGION:Text|2|bbox:10,20,300,80]\nline one\nline two"
        );
    }

    #[test]
    fn full_page_marker_uses_sentinel_bbox() {
        let region = Region::new(
            1,
            RegionKind::FullPage,
            BoundingBox::full_page(),
            "hello",
            3000,
        );
        assert_eq!(region.marker().to_string(), "[REGION:FULL_PAGE|1|bbox:0,0,0,0]");
        assert!(region.bbox.is_full_page());
    }

    #[test]
    fn bbox_normalises_corner_order() {
        let bbox = BoundingBox::new(50, 40, 10, 5);
        assert_eq!(bbox, BoundingBox { x1: 10, y1: 5, x2: 50, y2: 40 });
        assert_eq!(bbox.width(), 40);
        assert_eq!(bbox.height(), 35);
    }

    #[test]
    fn inverted_literal_box_has_no_extent_until_normalized() {
        let inverted = BoundingBox { x1: 300, y1: 100, x2: 50, y2: 150 };
        assert_eq!(inverted.width(), 0);
        assert_eq!(inverted.height(), 50);
        assert_eq!(inverted.normalized(), BoundingBox::new(50, 100, 300, 150));
    }

    #[test]
    fn region_text_is_capped_but_count_is_full() {
        let text = "a".repeat(3500);
        let region = Region::new(1, RegionKind::Text, BoundingBox::new(0, 0, 5, 5), &text, 3000);
        assert_eq!(region.text.len(), 3000);
        assert_eq!(region.char_count, 3500);
    }

    #[test]
    fn detector_labels_filter_non_text() {
        assert_eq!(RegionKind::from_label("Title"), Some(RegionKind::Title));
        assert_eq!(RegionKind::from_label("table"), Some(RegionKind::Table));
        assert_eq!(RegionKind::from_label("Figure"), None);
    }

    #[test]
    fn field_map_serialises_in_request_order() {
        let mut map = FieldMap::new();
        map.insert("RFI No", "0000220949");
        map.insert("Span ID", "");
        map.insert("RFI No", "0000220950");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"RFI No":"0000220950","Span ID":""}"#);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn region_serialises_kind_as_type() {
        let region = Region::new(3, RegionKind::List, BoundingBox::new(1, 2, 3, 4), "x", 10);
        let value = serde_json::to_value(&region).unwrap();
        assert_eq!(value["type"], "List");
        assert_eq!(value["bbox"]["x2"], 3);
        assert!(value.get("error").is_none());
    }
}
