//! URL map application.
//!
//! Successful transfers become an `original -> new` map. Structured image
//! fields are rewritten in place (shape, length and order preserved) and
//! rich-text fields get a literal substring pass. URLs without an entry,
//! failed and preserved transfers included, are left untouched.

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

use crate::config::CollectionConfig;
use crate::model::{FieldKind, FieldMapping, MigrationRecord, SourceItem, TransferResult};

/// `original_url -> new_url` for successful transfers.
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
    map: HashMap<String, String>,
    /// Escaped alternation of every original URL, longest first.
    pattern: Option<Regex>,
}

impl UrlMap {
    /// Builds the map from transfer results. Unsuccessful results are
    /// skipped; the first successful result wins for a repeated URL.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TransferResult>) -> Self {
        let mut map = HashMap::new();
        for result in results {
            if result.success() && result.new_url() != result.original_url() {
                map.entry(result.original_url().to_string())
                    .or_insert_with(|| result.new_url().to_string());
            }
        }

        let mut originals: Vec<&str> = map.keys().map(String::as_str).collect();
        originals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let pattern = if originals.is_empty() {
            None
        } else {
            let alternation = originals
                .iter()
                .map(|url| regex::escape(url))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&alternation) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("URL map too large for a single pattern, rich text left as-is: {}", e);
                    None
                }
            }
        };

        Self { map, pattern }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing was transferred successfully.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// New URL for `original`, if it was transferred.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.map.get(original.trim()).map(String::as_str)
    }

    /// Replaces every literal occurrence of a mapped URL in `text`.
    ///
    /// One left-to-right pass; at each position the longest mapped URL wins,
    /// and replaced text is never rescanned.
    pub fn rewrite_text(&self, text: &str) -> String {
        match &self.pattern {
            Some(re) => re
                .replace_all(text, |caps: &Captures<'_>| {
                    self.map
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    fn rewrite_image(&self, value: &mut Value) {
        match value {
            Value::String(url) => {
                if let Some(new_url) = self.get(url) {
                    *url = new_url.to_string();
                }
            }
            Value::Object(obj) => {
                for key in ["url", "src"] {
                    if let Some(Value::String(url)) = obj.get_mut(key) {
                        if let Some(new_url) = self.get(url) {
                            *url = new_url.to_string();
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Rewrites one projected field according to its kind.
    pub fn rewrite_field(&self, kind: FieldKind, value: &mut Value) {
        match (kind, value) {
            (FieldKind::Image, value) => self.rewrite_image(value),
            (FieldKind::ImageArray, Value::Array(entries)) => {
                entries.iter_mut().for_each(|entry| self.rewrite_image(entry));
            }
            (FieldKind::RichText, Value::String(text)) => {
                let rewritten = self.rewrite_text(text);
                *text = rewritten;
            }
            _ => {}
        }
    }
}

/// Copies every mapped field into a destination-shaped map, honouring
/// fallback keys. Absent fields are omitted.
pub fn project(item: &SourceItem, mappings: &[FieldMapping]) -> Map<String, Value> {
    mappings
        .iter()
        .filter_map(|mapping| {
            mapping
                .resolve(item)
                .map(|(_, value)| (mapping.destination_key.clone(), value.clone()))
        })
        .collect()
}

/// Projects `item` and applies the URL map built from `results`.
pub fn reconcile(
    item: &SourceItem,
    mappings: &[FieldMapping],
    results: &[TransferResult],
) -> Map<String, Value> {
    let urls = UrlMap::from_results(results);
    let mut data = project(item, mappings);

    if !urls.is_empty() {
        for mapping in mappings {
            if let Some(value) = data.get_mut(&mapping.destination_key) {
                urls.rewrite_field(mapping.kind, value);
            }
        }
    }

    data
}

/// Builds the destination record for `item`, stamping `sourceId` and
/// `sourceLastUpdated` into `data`.
pub fn build_record(
    item: &SourceItem,
    collection: &CollectionConfig,
    results: &[TransferResult],
) -> MigrationRecord {
    let mut data = reconcile(item, &collection.fields, results);
    data.insert("sourceId".to_string(), Value::String(item.id.clone()));
    if let Some(updated) = &item.last_updated {
        data.insert(
            "sourceLastUpdated".to_string(),
            Value::String(updated.clone()),
        );
    }

    MigrationRecord {
        id: item.id.clone(),
        title: item.title(&collection.title_field),
        slug: item.resolved_slug(&collection.title_field),
        record_type: collection.record_type().to_string(),
        status: item.record_status(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FailureReason;
    use serde_json::json;

    fn mappings() -> Vec<FieldMapping> {
        vec![
            FieldMapping::new("name", "title", FieldKind::Scalar),
            FieldMapping::new("main-image", "heroImage", FieldKind::Image),
            FieldMapping::new("gallery", "gallery", FieldKind::ImageArray),
            FieldMapping::new("post-body", "body", FieldKind::RichText),
        ]
    }

    fn item(fields: Value) -> SourceItem {
        serde_json::from_value(json!({"id": "src-1", "fieldData": fields})).unwrap()
    }

    #[test]
    fn test_placeholder_hero_never_lands_in_data() {
        let mut hero = FieldMapping::new("main-image", "heroImage", FieldKind::Image);
        hero.fallback_keys = vec!["hero-image".to_string()];
        let mappings = vec![hero];
        let results = vec![TransferResult::uploaded(
            "https://a/h.jpg",
            "https://cdn/hero.webp".into(),
            1,
        )];

        let with_fallback = item(json!({"main-image": "N/A", "hero-image": "https://a/h.jpg"}));
        let data = reconcile(&with_fallback, &mappings, &results);
        assert_eq!(data["heroImage"], "https://cdn/hero.webp");

        let placeholder_only = item(json!({"main-image": "N/A"}));
        let data = reconcile(&placeholder_only, &mappings, &[]);
        assert!(!data.contains_key("heroImage"));
    }

    #[test]
    fn test_failed_results_are_not_mapped() {
        let results = vec![
            TransferResult::uploaded("https://old/a.jpg", "https://cdn/a.webp".into(), 1),
            TransferResult::failed("https://old/b.jpg", FailureReason::Http(404)),
            TransferResult::preserved("https://old/c.jpg"),
        ];

        let urls = UrlMap::from_results(&results);

        assert_eq!(urls.len(), 1);
        assert_eq!(urls.get("https://old/a.jpg"), Some("https://cdn/a.webp"));
        assert_eq!(urls.get("https://old/b.jpg"), None);
    }

    #[test]
    fn test_gallery_keeps_length_order_and_failed_entry() {
        let item = item(json!({
            "gallery": ["https://old/a.jpg", "https://old/b.jpg", "https://old/c.jpg"]
        }));
        let results = vec![
            TransferResult::uploaded("https://old/a.jpg", "https://cdn/gallery-0.webp".into(), 1),
            TransferResult::failed("https://old/b.jpg", FailureReason::Http(404)),
            TransferResult::uploaded("https://old/c.jpg", "https://cdn/gallery-2.webp".into(), 1),
        ];

        let data = reconcile(&item, &mappings(), &results);

        assert_eq!(
            data["gallery"],
            json!(["https://cdn/gallery-0.webp", "https://old/b.jpg", "https://cdn/gallery-2.webp"])
        );
    }

    #[test]
    fn test_object_shape_preserved() {
        let item = item(json!({"main-image": {"url": "https://old/h.jpg", "alt": "Reef", "fileId": "f1"}}));
        let results = vec![TransferResult::uploaded(
            "https://old/h.jpg",
            "https://cdn/hero.webp".into(),
            1,
        )];

        let data = reconcile(&item, &mappings(), &results);

        assert_eq!(
            data["heroImage"],
            json!({"url": "https://cdn/hero.webp", "alt": "Reef", "fileId": "f1"})
        );
    }

    #[test]
    fn test_rich_text_literal_replacement() {
        let item = item(json!({
            "main-image": "https://old/img.jpg?w=100",
            "post-body": "<img src=\"https://old/img.jpg?w=100\"><p>a.b</p><img src=\"https://old/img.jpg\">"
        }));
        let results = vec![
            TransferResult::uploaded("https://old/img.jpg?w=100", "https://cdn/x.webp".into(), 1),
            TransferResult::uploaded("https://old/img.jpg", "https://cdn/y.webp".into(), 1),
        ];

        let data = reconcile(&item, &mappings(), &results);

        // '?' and '.' are literal; the longer URL wins where both match.
        assert_eq!(
            data["body"],
            "<img src=\"https://cdn/x.webp\"><p>a.b</p><img src=\"https://cdn/y.webp\">"
        );
    }

    #[test]
    fn test_rewrite_text_does_not_rescan() {
        let results = vec![
            TransferResult::uploaded("https://a/1", "https://a/2".into(), 1),
            TransferResult::uploaded("https://a/2", "https://a/3".into(), 1),
        ];
        let urls = UrlMap::from_results(&results);
        assert_eq!(urls.rewrite_text("x https://a/1 y"), "x https://a/2 y");
    }

    #[test]
    fn test_no_results_leaves_data_untouched() {
        let fields = json!({"name": "T", "main-image": "https://old/h.jpg", "post-body": "hi"});
        let item = item(fields);

        let data = reconcile(&item, &mappings(), &[]);

        assert_eq!(data["heroImage"], "https://old/h.jpg");
        assert_eq!(data["title"], "T");
        assert!(!data.contains_key("gallery"));
    }

    #[test]
    fn test_build_record_stamps_source_metadata() {
        let item: SourceItem = serde_json::from_value(json!({
            "id": "src-9",
            "isArchived": true,
            "lastUpdated": "2024-05-01T00:00:00Z",
            "fieldData": {"name": "Annual Conference 2024"}
        }))
        .unwrap();
        let collection = CollectionConfig {
            name: "events".into(),
            record_type: Some("event".into()),
            title_field: "name".into(),
            fields: mappings(),
        };

        let record = build_record(&item, &collection, &[]);

        assert_eq!(record.slug, "annual-conference-2024");
        assert_eq!(record.record_type, "event");
        assert_eq!(record.status, crate::model::RecordStatus::Archived);
        assert_eq!(record.data["sourceId"], "src-9");
        assert_eq!(record.data["sourceLastUpdated"], "2024-05-01T00:00:00Z");
    }
}
