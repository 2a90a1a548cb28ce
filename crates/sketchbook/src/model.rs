use serde::{Deserialize, Serialize};

/// An active sketch. `id` is both the directory name and the main source stem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Sketch {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A staged snapshot of a sketch's main source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variant {
    pub id: String,
    pub name: String,
    /// Epoch milliseconds at staging time.
    pub timestamp: u64,
}

/// Contents of `<sketch>/.variants.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VariantIndex {
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// Next sequence number to hand out; absent in files written before ids became monotonic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_seq: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BinItemKind {
    Sketch,
    Variant,
}

impl BinItemKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinItemKind::Sketch => "sketch",
            BinItemKind::Variant => "variant",
        }
    }
}

impl std::fmt::Display for BinItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BinItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BinItemKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sketch_id: Option<String>,
    pub deleted_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_timestamp: Option<u64>,
}

impl BinItem {
    pub fn key(&self) -> BinItemKey {
        BinItemKey {
            id: self.id.clone(),
            kind: self.kind,
            sketch_id: self.sketch_id.clone(),
        }
    }

    pub(crate) fn matches(&self, key: &BinItemKey) -> bool {
        self.id == key.id
            && self.kind == key.kind
            && match (&key.sketch_id, self.kind) {
                (Some(sketch_id), BinItemKind::Variant) => {
                    self.sketch_id.as_deref() == Some(sketch_id.as_str())
                }
                _ => true,
            }
    }
}

/// Contents of `.bin/metadata.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct BinIndex {
    #[serde(default)]
    pub items: Vec<BinItem>,
}

/// Addresses one bin entry. Variant ids are only unique per sketch, so
/// `sketch_id` narrows variant lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinItemKey {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BinItemKind,
    /// Also accepted as `sketchId`, the spelling `BinItem` is listed with.
    #[serde(default, alias = "sketchId", skip_serializing_if = "Option::is_none")]
    pub sketch_id: Option<String>,
}

impl BinItemKey {
    pub fn sketch(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BinItemKind::Sketch,
            sketch_id: None,
        }
    }

    pub fn variant(sketch_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BinItemKind::Variant,
            sketch_id: Some(sketch_id.into()),
        }
    }
}
