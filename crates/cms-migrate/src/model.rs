//! Data model shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

use crate::error::Error;
use crate::extract::normalize_image_value;

static NON_SLUG_CHARS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));

/// Lowercases `input` and collapses every run of non-alphanumerics into `-`.
pub fn slugify(input: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&input.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

// ---------------------------------------------------------------------------
// Source side
// ---------------------------------------------------------------------------

/// One record from the legacy CMS. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    /// Source-system id.
    pub id: String,
    /// Top-level slug, when the source exposes one outside the field bag.
    #[serde(default)]
    pub slug: Option<String>,
    /// Draft flag.
    #[serde(default)]
    pub is_draft: bool,
    /// Archived flag.
    #[serde(default)]
    pub is_archived: bool,
    /// Last modification timestamp as reported by the source.
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Untyped field bag.
    #[serde(default, alias = "fields")]
    pub field_data: Map<String, Value>,
}

impl SourceItem {
    /// Looks up a field in the bag.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.field_data.get(key)
    }

    /// True unless the item is a draft or archived.
    pub fn is_published(&self) -> bool {
        !self.is_draft && !self.is_archived
    }

    /// Title from `title_key`, falling back to the id.
    pub fn title(&self, title_key: &str) -> String {
        self.field(title_key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| self.id.clone(), str::to_string)
    }

    /// Slug from the field bag, then the top-level slug, then derived from
    /// the title, then from the id.
    pub fn resolved_slug(&self, title_key: &str) -> String {
        let explicit = self
            .field("slug")
            .and_then(Value::as_str)
            .or(self.slug.as_deref())
            .map(slugify)
            .filter(|s| !s.is_empty());

        explicit.unwrap_or_else(|| {
            let derived = slugify(&self.title(title_key));
            if derived.is_empty() {
                slugify(&self.id)
            } else {
                derived
            }
        })
    }

    /// Destination status derived from the source flags.
    pub fn record_status(&self) -> RecordStatus {
        if self.is_archived {
            RecordStatus::Archived
        } else if self.is_draft {
            RecordStatus::Draft
        } else {
            RecordStatus::Published
        }
    }
}

// ---------------------------------------------------------------------------
// Field mappings
// ---------------------------------------------------------------------------

/// How a mapped field is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Copied as-is.
    Scalar,
    /// Single image (URL string or `{url, alt}` object).
    Image,
    /// Gallery of images, index preserved.
    ImageArray,
    /// Free text / HTML; copied, then inline image URLs are rewritten.
    RichText,
}

/// One row of a collection's declarative field-mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Key in the source field bag.
    pub source_key: String,
    /// Key in the destination record's `data`.
    pub destination_key: String,
    /// Projection kind.
    pub kind: FieldKind,
    /// Keys consulted in order when `source_key` is absent or empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_keys: Vec<String>,
}

impl FieldMapping {
    /// Convenience constructor without fallbacks.
    pub fn new(source_key: &str, destination_key: &str, kind: FieldKind) -> Self {
        Self {
            source_key: source_key.to_string(),
            destination_key: destination_key.to_string(),
            kind,
            fallback_keys: Vec::new(),
        }
    }

    /// Returns the first usable value among the source key and its
    /// fallbacks, along with the key it came from.
    ///
    /// For single-image fields a value is usable only when it normalizes to
    /// a URL, so a placeholder in the primary key yields to a fallback.
    pub fn resolve<'a>(&'a self, item: &'a SourceItem) -> Option<(&'a str, &'a Value)> {
        std::iter::once(&self.source_key)
            .chain(&self.fallback_keys)
            .find_map(|key| {
                item.field(key)
                    .filter(|v| self.accepts(v))
                    .map(|v| (key.as_str(), v))
            })
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.kind {
            FieldKind::Image => normalize_image_value(value) != ImageValue::Missing,
            _ => !is_empty_value(value),
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Normalized shape of an image-bearing field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageValue {
    /// Bare URL string.
    Url(String),
    /// Object carrying a URL and alt text.
    UrlWithAlt {
        /// Image URL.
        url: String,
        /// Alt text (may be empty).
        alt: String,
    },
    /// Absent, empty, placeholder or malformed.
    Missing,
}

/// An image found in a source item. Derived per run, never persisted alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Destination field the image belongs to.
    pub field_name: String,
    /// Position inside a gallery field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// URL on the legacy host.
    pub original_url: String,
    /// Alt text carried over from the source.
    #[serde(default)]
    pub alt_text: String,
}

/// Stable failure codes reported for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Download exceeded its deadline.
    Timeout,
    /// Non-success HTTP status from the image host.
    Http(u16),
    /// Asset above the byte ceiling.
    TooLarge,
    /// Connection-level failure.
    NetworkError,
    /// Response was not an image.
    InvalidContentType,
    /// Redirect chain exceeded the hop guard.
    TooManyRedirects,
    /// Every storage attempt failed.
    UploadFailed,
}

impl FailureReason {
    /// Stable string code written to the report.
    pub fn code(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::Http(status) => format!("http_{status}"),
            Self::TooLarge => "too_large".to_string(),
            Self::NetworkError => "network_error".to_string(),
            Self::InvalidContentType => "invalid_content_type".to_string(),
            Self::TooManyRedirects => "too_many_redirects".to_string(),
            Self::UploadFailed => "upload_failed".to_string(),
        }
    }

    /// Classifies a download failure.
    pub fn from_download_error(error: &Error) -> Self {
        if let Some(status) = error.status() {
            return Self::Http(status);
        }
        match error {
            Error::Timeout(_) => Self::Timeout,
            Error::TooLarge { .. } => Self::TooLarge,
            Error::InvalidContentType(_) => Self::InvalidContentType,
            Error::TooManyRedirects(_) => Self::TooManyRedirects,
            Error::Authentication(msg) => Self::Http(if msg.contains("403") { 403 } else { 401 }),
            _ => Self::NetworkError,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<FailureReason> for String {
    fn from(reason: FailureReason) -> Self {
        reason.code()
    }
}

impl TryFrom<String> for FailureReason {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        match code.as_str() {
            "timeout" => Ok(Self::Timeout),
            "too_large" => Ok(Self::TooLarge),
            "network_error" => Ok(Self::NetworkError),
            "invalid_content_type" => Ok(Self::InvalidContentType),
            "too_many_redirects" => Ok(Self::TooManyRedirects),
            "upload_failed" => Ok(Self::UploadFailed),
            other => other
                .strip_prefix("http_")
                .and_then(|s| s.parse().ok())
                .map(Self::Http)
                .ok_or_else(|| format!("unknown failure reason '{other}'")),
        }
    }
}

impl Serialize for FailureReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for FailureReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Self::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// What happened to one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Bytes stored; `new_url` points at the CDN.
    Uploaded,
    /// Dry run; `new_url` is the predicted CDN URL.
    Planned,
    /// Upload disabled; original URL kept on purpose.
    Preserved,
    /// Transfer failed; original URL kept as fallback.
    Failed,
}

/// Outcome of transferring one [`ImageReference`].
///
/// Constructed only through the associated functions, which uphold
/// `!success => new_url == original_url`. Deserialization (reading a past
/// report back) checks the same rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTransferResult")]
pub struct TransferResult {
    original_url: String,
    new_url: String,
    success: bool,
    byte_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<FailureReason>,
    status: TransferStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransferResult {
    original_url: String,
    new_url: String,
    success: bool,
    #[serde(default)]
    byte_size: u64,
    #[serde(default)]
    failure_reason: Option<FailureReason>,
    status: TransferStatus,
}

impl TryFrom<RawTransferResult> for TransferResult {
    type Error = String;

    fn try_from(raw: RawTransferResult) -> Result<Self, Self::Error> {
        let expected_success = matches!(raw.status, TransferStatus::Uploaded | TransferStatus::Planned);
        if raw.success != expected_success {
            return Err(format!("status {:?} contradicts success={}", raw.status, raw.success));
        }
        if !raw.success && raw.new_url != raw.original_url {
            return Err(format!(
                "unsuccessful transfer of {} must keep its original URL",
                raw.original_url
            ));
        }
        if (raw.status == TransferStatus::Failed) != raw.failure_reason.is_some() {
            return Err("failureReason must be present exactly when status is failed".to_string());
        }

        Ok(Self {
            original_url: raw.original_url,
            new_url: raw.new_url,
            success: raw.success,
            byte_size: raw.byte_size,
            failure_reason: raw.failure_reason,
            status: raw.status,
        })
    }
}

impl TransferResult {
    /// Stored at `new_url`.
    pub fn uploaded(original_url: &str, new_url: String, byte_size: u64) -> Self {
        Self {
            original_url: original_url.to_string(),
            new_url,
            success: true,
            byte_size,
            failure_reason: None,
            status: TransferStatus::Uploaded,
        }
    }

    /// Dry-run prediction.
    pub fn planned(original_url: &str, predicted_url: String) -> Self {
        Self {
            original_url: original_url.to_string(),
            new_url: predicted_url,
            success: true,
            byte_size: 0,
            failure_reason: None,
            status: TransferStatus::Planned,
        }
    }

    /// Upload disabled.
    pub fn preserved(original_url: &str) -> Self {
        Self {
            original_url: original_url.to_string(),
            new_url: original_url.to_string(),
            success: false,
            byte_size: 0,
            failure_reason: None,
            status: TransferStatus::Preserved,
        }
    }

    /// Failed; falls back to the original URL.
    pub fn failed(original_url: &str, reason: FailureReason) -> Self {
        Self {
            original_url: original_url.to_string(),
            new_url: original_url.to_string(),
            success: false,
            byte_size: 0,
            failure_reason: Some(reason),
            status: TransferStatus::Failed,
        }
    }

    /// URL on the legacy host.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// URL to use from now on.
    pub fn new_url(&self) -> &str {
        &self.new_url
    }

    /// Whether `new_url` differs from the legacy location on purpose.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Bytes written to storage.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Failure code, if the transfer failed.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    /// Outcome class.
    pub fn status(&self) -> TransferStatus {
        self.status
    }
}

// ---------------------------------------------------------------------------
// Destination side
// ---------------------------------------------------------------------------

/// Publication status written to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Live.
    Published,
    /// Not yet published in the source.
    Draft,
    /// Archived in the source.
    Archived,
}

/// Destination-shaped record, created once per item that passes the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Source id, reused as the destination's logical id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Unique slug within `type`.
    pub slug: String,
    /// Destination collection type.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Publication status.
    pub status: RecordStatus,
    /// Projected fields with image URLs already rewritten.
    pub data: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Item lifecycle
// ---------------------------------------------------------------------------

/// Per-item state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Fetched from the source.
    Discovered,
    /// Destination consulted.
    ExistenceChecked,
    /// Terminal: already present, duplicate, or conflict.
    Skipped,
    /// Images in flight.
    ImagesTransferring,
    /// URL map applied.
    Reconciled,
    /// Terminal: written to the destination.
    Created,
    /// Terminal: could not be written.
    Failed,
}

impl ItemState {
    /// True for `Skipped`, `Created` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Created | Self::Failed)
    }

    /// Allowed forward edges. Nothing re-enters an earlier state.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Discovered, ExistenceChecked)
                | (Discovered, Failed)
                | (ExistenceChecked, Skipped)
                | (ExistenceChecked, ImagesTransferring)
                | (ExistenceChecked, Failed)
                | (ImagesTransferring, Reconciled)
                | (ImagesTransferring, Failed)
                | (Reconciled, Created)
                | (Reconciled, Skipped)
                | (Reconciled, Failed)
        )
    }
}

/// Rejected state-machine edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid item transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// Current state.
    pub from: ItemState,
    /// Requested state.
    pub to: ItemState,
}

/// Tracks an item's walk through the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLifecycle {
    trail: Vec<ItemState>,
}

impl Default for ItemLifecycle {
    fn default() -> Self {
        Self {
            trail: vec![ItemState::Discovered],
        }
    }
}

impl ItemLifecycle {
    /// Current state.
    pub fn current(&self) -> ItemState {
        self.trail.last().copied().unwrap_or(ItemState::Discovered)
    }

    /// Moves to `next` if the edge is allowed.
    pub fn advance(&mut self, next: ItemState) -> Result<(), InvalidTransition> {
        let from = self.current();
        if from.can_transition_to(next) {
            self.trail.push(next);
            Ok(())
        } else {
            Err(InvalidTransition { from, to: next })
        }
    }

    /// Every state visited, in order.
    pub fn trail(&self) -> &[ItemState] {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> SourceItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ocean Champions!"), "ocean-champions");
        assert_eq!(slugify("  Annual -- Conference 2024 "), "annual-conference-2024");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_source_item_deserializes_field_data() {
        let item = item(json!({
            "id": "abc",
            "isDraft": true,
            "lastUpdated": "2024-03-01T10:00:00Z",
            "fieldData": {"name": "Hello", "slug": "hello"}
        }));

        assert!(item.is_draft);
        assert!(!item.is_published());
        assert_eq!(item.resolved_slug("name"), "hello");
        assert_eq!(item.record_status(), RecordStatus::Draft);
    }

    #[test]
    fn test_source_item_accepts_fields_alias() {
        let item = item(json!({"id": "abc", "fields": {"name": "Hello"}}));
        assert_eq!(item.title("name"), "Hello");
    }

    #[test]
    fn test_slug_derived_from_title_when_absent() {
        let item = item(json!({"id": "abc", "fieldData": {"name": "Ocean Champions"}}));
        assert_eq!(item.resolved_slug("name"), "ocean-champions");
    }

    #[test]
    fn test_slug_falls_back_to_id() {
        let item = item(json!({"id": "Item_42", "fieldData": {}}));
        assert_eq!(item.resolved_slug("name"), "item-42");
    }

    #[test]
    fn test_field_mapping_fallback_precedence() {
        let mut mapping = FieldMapping::new("main-image", "heroImage", FieldKind::Image);
        mapping.fallback_keys = vec!["hero-image".to_string()];

        let only_hero = item(json!({"id": "1", "fieldData": {"main-image": "", "hero-image": "https://a/h.jpg"}}));
        let (key, value) = mapping.resolve(&only_hero).unwrap();
        assert_eq!(key, "hero-image");
        assert_eq!(value, "https://a/h.jpg");

        let both = item(json!({"id": "1", "fieldData": {"main-image": "https://a/m.jpg", "hero-image": "https://a/h.jpg"}}));
        assert_eq!(mapping.resolve(&both).unwrap().0, "main-image");
    }

    #[test]
    fn test_placeholder_image_yields_to_fallback() {
        let mut mapping = FieldMapping::new("main-image", "heroImage", FieldKind::Image);
        mapping.fallback_keys = vec!["hero-image".to_string()];

        let placeholder = item(json!({"id": "1", "fieldData": {"main-image": "N/A", "hero-image": "https://a/h.jpg"}}));
        let (key, value) = mapping.resolve(&placeholder).unwrap();
        assert_eq!(key, "hero-image");
        assert_eq!(value, "https://a/h.jpg");

        let nothing_usable = item(json!({"id": "1", "fieldData": {"main-image": "N/A", "hero-image": {"alt": "x"}}}));
        assert!(mapping.resolve(&nothing_usable).is_none());
    }

    #[test]
    fn test_scalar_placeholder_is_kept() {
        let mapping = FieldMapping::new("summary", "summary", FieldKind::Scalar);
        let item = item(json!({"id": "1", "fieldData": {"summary": "N/A"}}));
        assert_eq!(mapping.resolve(&item).unwrap().1, "N/A");
    }

    #[test]
    fn test_failure_reason_codes() {
        assert_eq!(FailureReason::Http(404).code(), "http_404");
        assert_eq!(FailureReason::TooLarge.code(), "too_large");
        assert_eq!(
            FailureReason::try_from("http_503".to_string()),
            Ok(FailureReason::Http(503))
        );
        assert!(FailureReason::try_from("bogus".to_string()).is_err());
    }

    #[test]
    fn test_failure_reason_from_download_error() {
        let err = Error::HttpStatus {
            status: 404,
            url: "u".into(),
            body: String::new(),
        };
        assert_eq!(FailureReason::from_download_error(&err), FailureReason::Http(404));
        assert_eq!(
            FailureReason::from_download_error(&Error::RateLimit { retry_after: Some(3) }),
            FailureReason::Http(429)
        );
        assert_eq!(
            FailureReason::from_download_error(&Error::Timeout("t".into())),
            FailureReason::Timeout
        );
        assert_eq!(
            FailureReason::from_download_error(&Error::Network("reset".into())),
            FailureReason::NetworkError
        );
    }

    #[test]
    fn test_transfer_result_fallback_invariant() {
        let results = [
            TransferResult::uploaded("https://old/a.jpg", "https://cdn/a.webp".into(), 10),
            TransferResult::planned("https://old/b.jpg", "https://cdn/b.jpg".into()),
            TransferResult::preserved("https://old/c.jpg"),
            TransferResult::failed("https://old/d.jpg", FailureReason::Http(404)),
        ];

        for result in &results {
            if !result.success() {
                assert_eq!(result.new_url(), result.original_url());
            }
        }
    }

    #[test]
    fn test_transfer_result_serializes_reason_code() {
        let result = TransferResult::failed("https://old/a.jpg", FailureReason::Http(404));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failureReason"], "http_404");
        assert_eq!(json["newUrl"], "https://old/a.jpg");
        assert_eq!(json["status"], "failed");
    }

    #[test]
    fn test_transfer_result_reads_back_from_report() {
        let result = TransferResult::failed("https://old/a.jpg", FailureReason::Timeout);
        let json = serde_json::to_value(&result).unwrap();
        let back: TransferResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_transfer_result_rejects_broken_fallback() {
        let moved_failure = json!({
            "originalUrl": "https://old/a.jpg",
            "newUrl": "https://cdn/a.webp",
            "success": false,
            "byteSize": 0,
            "failureReason": "http_404",
            "status": "failed"
        });
        let err = serde_json::from_value::<TransferResult>(moved_failure).unwrap_err();
        assert!(err.to_string().contains("original URL"));

        let reasonless = json!({
            "originalUrl": "https://old/a.jpg",
            "newUrl": "https://old/a.jpg",
            "success": false,
            "status": "failed"
        });
        assert!(serde_json::from_value::<TransferResult>(reasonless).is_err());

        let lying_success = json!({
            "originalUrl": "https://old/a.jpg",
            "newUrl": "https://old/a.jpg",
            "success": true,
            "status": "preserved"
        });
        assert!(serde_json::from_value::<TransferResult>(lying_success).is_err());
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut lifecycle = ItemLifecycle::default();
        lifecycle.advance(ItemState::ExistenceChecked).unwrap();
        lifecycle.advance(ItemState::ImagesTransferring).unwrap();
        lifecycle.advance(ItemState::Reconciled).unwrap();
        lifecycle.advance(ItemState::Created).unwrap();

        assert!(lifecycle.current().is_terminal());
        assert_eq!(lifecycle.trail().len(), 5);
    }

    #[test]
    fn test_lifecycle_rejects_reentry() {
        let mut lifecycle = ItemLifecycle::default();
        lifecycle.advance(ItemState::ExistenceChecked).unwrap();
        lifecycle.advance(ItemState::Skipped).unwrap();

        let err = lifecycle.advance(ItemState::ImagesTransferring).unwrap_err();
        assert_eq!(err.from, ItemState::Skipped);
        assert_eq!(lifecycle.current(), ItemState::Skipped);
    }

    #[test]
    fn test_record_serializes_type_key() {
        let record = MigrationRecord {
            id: "1".into(),
            title: "T".into(),
            slug: "t".into(),
            record_type: "posts".into(),
            status: RecordStatus::Published,
            data: Map::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "posts");
        assert_eq!(json["status"], "published");
    }
}
