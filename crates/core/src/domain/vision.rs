use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

/// Platform handle for an inbound image, resolved to bytes by a [`crate::MediaSource`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub String);

impl MediaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw image bytes as downloaded from the messaging platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClothingAttributes {
    pub garment_type: String,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub style_keywords: Vec<String>,
}

impl ClothingAttributes {
    /// Garment type first, then colors, patterns and style words; blanks dropped.
    pub fn search_terms(&self) -> Vec<String> {
        std::iter::once(&self.garment_type)
            .chain(&self.colors)
            .chain(&self.patterns)
            .chain(&self.style_keywords)
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect()
    }

    /// Number of search terms found in the product's name, description or colors.
    /// The garment type counts double so a red dress outranks a red scarf.
    pub fn match_score(&self, product: &Product) -> usize {
        let haystack = format!(
            "{} {} {}",
            product.name,
            product.description.as_deref().unwrap_or_default(),
            product.colors.join(" ")
        )
        .to_lowercase();

        let garment = self.garment_type.trim().to_lowercase();
        self.search_terms()
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .map(|term| if *term == garment { 2 } else { 1 })
            .sum()
    }

    /// Products with at least one matching term, best score first. Ties keep
    /// the incoming order, so callers pass newest arrivals first.
    pub fn rank(&self, products: Vec<Product>, limit: usize) -> Vec<Product> {
        let mut scored = products
            .into_iter()
            .map(|product| (self.match_score(&product), product))
            .filter(|(score, _)| *score > 0)
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.cmp(&left.0));
        scored.into_iter().take(limit).map(|(_, product)| product).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageAnalysis {
    Clothing(ClothingAttributes),
    NotClothing { reason: String },
}
