//! Product field definitions
//!
//! A `FieldSet` holds the eight recognized product fields. Every field is
//! optional: a field that could not be located on a page is simply `None`.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// The fixed set of fields extracted from a product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Price,
    Description,
    Specifications,
    Teaser,
    Images,
    Documents,
    SwatchVariants,
}

impl Field {
    /// All fields, in output column order
    pub const ALL: [Field; 8] = [
        Field::Title,
        Field::Price,
        Field::Description,
        Field::Specifications,
        Field::Teaser,
        Field::Images,
        Field::Documents,
        Field::SwatchVariants,
    ];

    /// Column / key name of the field
    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Price => "price",
            Self::Description => "description",
            Self::Specifications => "specifications",
            Self::Teaser => "teaser",
            Self::Images => "images",
            Self::Documents => "documents",
            Self::SwatchVariants => "swatch_variants",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A support document link (manual, quick start guide, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub text: String,
    pub href: String,
}

/// One variant sub-page discovered during expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Address of the variant page
    pub address: Url,

    /// Swatch label (usually the colour name)
    pub label: Option<String>,

    /// Fields extracted from the variant page itself
    pub fields: FieldSet,
}

/// Borrowed view of a single field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Images(&'a [String]),
    Documents(&'a [DocumentLink]),
    Variants(&'a [Variant]),
}

/// Extracted product fields, each possibly absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub specifications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub teaser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub documents: Option<Vec<DocumentLink>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub swatch_variants: Option<Vec<Variant>>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `field`, if present
    pub fn get(&self, field: Field) -> Option<FieldValue<'_>> {
        match field {
            Field::Title => self.title.as_deref().map(FieldValue::Text),
            Field::Price => self.price.as_deref().map(FieldValue::Text),
            Field::Description => self.description.as_deref().map(FieldValue::Text),
            Field::Specifications => self.specifications.as_deref().map(FieldValue::Text),
            Field::Teaser => self.teaser.as_deref().map(FieldValue::Text),
            Field::Images => self.images.as_deref().map(FieldValue::Images),
            Field::Documents => self.documents.as_deref().map(FieldValue::Documents),
            Field::SwatchVariants => self.swatch_variants.as_deref().map(FieldValue::Variants),
        }
    }

    pub fn has(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    /// Fields that were located, in column order
    pub fn present_fields(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }

    /// Fields that were not located, in column order
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| !self.has(*f)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }

    /// Number of variants carried in `swatch_variants`
    pub fn variant_count(&self) -> usize {
        self.swatch_variants.as_ref().map_or(0, Vec::len)
    }
}
