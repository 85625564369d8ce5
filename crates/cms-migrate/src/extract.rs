//! Image candidate extraction.
//!
//! Walks a [`SourceItem`]'s field bag through the mapping table and emits one
//! [`ImageReference`] per usable image, in mapping order and gallery index
//! order. Anything that is not a usable URL is counted as missing.

use serde_json::Value;
use std::sync::LazyLock;

use crate::model::{FieldKind, FieldMapping, ImageReference, ImageValue, SourceItem};

static URL_SHAPE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)^https?://\S+$").expect("static url pattern"));

const PLACEHOLDERS: &[&str] = &["n/a", "na", "null", "none", "undefined", "-"];

/// Images found in one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Usable references, in field then index order.
    pub references: Vec<ImageReference>,
    /// Mapped image slots that were absent, empty, placeholders or malformed.
    pub missing: usize,
}

/// True for `http(s)://` strings without whitespace.
pub fn is_url_shaped(candidate: &str) -> bool {
    URL_SHAPE.is_match(candidate)
}

fn usable_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return None;
    }
    is_url_shaped(trimmed).then(|| trimmed.to_string())
}

/// Normalizes an image-bearing field value.
///
/// Accepts a bare URL string or an object with `url` (or `src`) and an
/// optional `alt` (or `altText`). Everything else is [`ImageValue::Missing`].
pub fn normalize_image_value(value: &Value) -> ImageValue {
    match value {
        Value::String(s) => usable_url(s).map_or(ImageValue::Missing, ImageValue::Url),
        Value::Object(obj) => {
            let url = obj
                .get("url")
                .or_else(|| obj.get("src"))
                .and_then(Value::as_str)
                .and_then(usable_url);
            let alt = obj
                .get("alt")
                .or_else(|| obj.get("altText"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            url.map_or(ImageValue::Missing, |url| ImageValue::UrlWithAlt { url, alt })
        }
        _ => ImageValue::Missing,
    }
}

fn reference(field_name: &str, index: Option<usize>, value: ImageValue) -> Option<ImageReference> {
    let (original_url, alt_text) = match value {
        ImageValue::Url(url) => (url, String::new()),
        ImageValue::UrlWithAlt { url, alt } => (url, alt),
        ImageValue::Missing => return None,
    };
    Some(ImageReference {
        field_name: field_name.to_string(),
        index,
        original_url,
        alt_text,
    })
}

/// Extracts image references from `item`.
///
/// References are keyed by the mapping's destination key so the reconciler
/// can address the projected field directly.
pub fn extract(item: &SourceItem, mappings: &[FieldMapping]) -> Extraction {
    let mut out = Extraction::default();

    for mapping in mappings {
        let field = mapping.destination_key.as_str();
        match mapping.kind {
            FieldKind::Image => {
                let found = mapping
                    .resolve(item)
                    .and_then(|(_, value)| reference(field, None, normalize_image_value(value)));
                match found {
                    Some(r) => out.references.push(r),
                    None => out.missing += 1,
                }
            }
            FieldKind::ImageArray => match mapping.resolve(item).map(|(_, v)| v) {
                Some(Value::Array(entries)) => {
                    for (index, entry) in entries.iter().enumerate() {
                        match reference(field, Some(index), normalize_image_value(entry)) {
                            Some(r) => out.references.push(r),
                            None => out.missing += 1,
                        }
                    }
                }
                Some(_) => out.missing += 1,
                // An absent gallery is simply empty.
                None => {}
            },
            FieldKind::Scalar | FieldKind::RichText => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mappings() -> Vec<FieldMapping> {
        let mut hero = FieldMapping::new("main-image", "heroImage", FieldKind::Image);
        hero.fallback_keys = vec!["hero-image".to_string()];
        vec![
            FieldMapping::new("name", "title", FieldKind::Scalar),
            hero,
            FieldMapping::new("thumbnail", "thumbnail", FieldKind::Image),
            FieldMapping::new("gallery", "gallery", FieldKind::ImageArray),
            FieldMapping::new("post-body", "body", FieldKind::RichText),
        ]
    }

    fn item(fields: Value) -> SourceItem {
        serde_json::from_value(json!({"id": "1", "fieldData": fields})).unwrap()
    }

    #[test]
    fn test_url_shape() {
        assert!(is_url_shaped("https://cdn.legacy.com/a.jpg"));
        assert!(is_url_shaped("HTTP://cdn.legacy.com/a.jpg"));
        assert!(!is_url_shaped("cdn.legacy.com/a.jpg"));
        assert!(!is_url_shaped("https://cdn.legacy.com/a b.jpg"));
        assert!(!is_url_shaped("https://"));
    }

    #[test]
    fn test_normalize_image_value() {
        assert_eq!(
            normalize_image_value(&json!("https://a/x.jpg")),
            ImageValue::Url("https://a/x.jpg".into())
        );
        assert_eq!(
            normalize_image_value(&json!({"url": "https://a/x.jpg", "alt": "Reef"})),
            ImageValue::UrlWithAlt {
                url: "https://a/x.jpg".into(),
                alt: "Reef".into()
            }
        );
        assert_eq!(normalize_image_value(&json!("N/A")), ImageValue::Missing);
        assert_eq!(normalize_image_value(&json!("  none ")), ImageValue::Missing);
        assert_eq!(normalize_image_value(&json!({"alt": "x"})), ImageValue::Missing);
        assert_eq!(normalize_image_value(&json!(42)), ImageValue::Missing);
    }

    #[test]
    fn test_extract_single_and_gallery() {
        let item = item(json!({
            "name": "Post",
            "main-image": {"url": "https://a/hero.jpg", "alt": "Hero"},
            "gallery": ["https://a/1.jpg", "N/A", {"url": "https://a/3.png"}]
        }));

        let extraction = extract(&item, &mappings());

        let urls: Vec<&str> = extraction
            .references
            .iter()
            .map(|r| r.original_url.as_str())
            .collect();
        assert_eq!(urls, vec!["https://a/hero.jpg", "https://a/1.jpg", "https://a/3.png"]);
        assert_eq!(extraction.references[0].alt_text, "Hero");
        assert_eq!(extraction.references[0].field_name, "heroImage");
        assert_eq!(extraction.references[2].index, Some(2));
        // thumbnail absent + gallery placeholder
        assert_eq!(extraction.missing, 2);
    }

    #[test]
    fn test_extract_uses_fallback_key() {
        let item = item(json!({"hero-image": "https://a/h.jpg", "thumbnail": "https://a/t.jpg"}));

        let extraction = extract(&item, &mappings());

        assert_eq!(extraction.references.len(), 2);
        assert_eq!(extraction.references[0].original_url, "https://a/h.jpg");
        assert_eq!(extraction.missing, 0);
    }

    #[test]
    fn test_extract_skips_placeholder_primary() {
        let item = item(json!({
            "main-image": "N/A",
            "hero-image": "https://a/h.jpg",
            "thumbnail": "https://a/t.jpg"
        }));

        let extraction = extract(&item, &mappings());

        assert_eq!(extraction.references.len(), 2);
        assert_eq!(extraction.references[0].field_name, "heroImage");
        assert_eq!(extraction.references[0].original_url, "https://a/h.jpg");
        assert_eq!(extraction.missing, 0);
    }

    #[test]
    fn test_extract_malformed_gallery_counts_missing() {
        let item = item(json!({"gallery": "https://a/not-an-array.jpg", "thumbnail": "x"}));

        let extraction = extract(&item, &mappings());

        assert!(extraction.references.is_empty());
        // hero absent, thumbnail malformed, gallery malformed
        assert_eq!(extraction.missing, 3);
    }

    #[test]
    fn test_extract_ignores_rich_text() {
        let item = item(json!({
            "post-body": "<img src=\"https://a/inline.jpg\">",
            "main-image": "https://a/h.jpg",
            "thumbnail": "https://a/t.jpg"
        }));

        let extraction = extract(&item, &mappings());

        assert!(extraction
            .references
            .iter()
            .all(|r| r.original_url != "https://a/inline.jpg"));
    }
}
