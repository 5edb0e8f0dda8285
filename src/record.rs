use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema field names. An extra attribute may never take one of these.
pub const FIELD_NAMES: &[&str] = &[
    "item_id",
    "title",
    "price",
    "description",
    "image_url",
    "created_at",
    "updated_at",
    "category_id",
    "platform_category_id",
    "item_type",
    "seller_id",
    "seller_nickname",
    "seller_avatar_url",
    "seller_review_count",
    "seller_rating_label",
    "want_count",
    "is_free_shipping",
    "location",
    "original_price",
    "current_price",
    "keyword",
    "search_session_id",
    "business_type",
    "publish_time",
];

/// One marketplace listing, flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub item_id: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub platform_category_id: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,

    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub seller_nickname: Option<String>,
    #[serde(default)]
    pub seller_avatar_url: Option<String>,
    #[serde(default)]
    pub seller_review_count: Option<i64>,
    #[serde(default)]
    pub seller_rating_label: Option<String>,

    #[serde(default)]
    pub want_count: Option<String>,
    #[serde(default)]
    pub is_free_shipping: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub original_price: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,

    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub search_session_id: Option<String>,
    #[serde(default)]
    pub business_type: Option<String>,
    #[serde(default)]
    pub publish_time: Option<i64>,

    // Never holds a key from FIELD_NAMES; see `insert_extra`.
    #[serde(flatten)]
    extra_attributes: Map<String, Value>,
}

impl NormalizedRecord {
    pub fn new(item_id: impl Into<String>, title: impl Into<String>, price: f64) -> Self {
        let now = Utc::now();
        NormalizedRecord {
            item_id: item_id.into(),
            title: title.into(),
            price,
            description: None,
            image_url: None,
            created_at: now,
            updated_at: now,
            category_id: None,
            platform_category_id: None,
            item_type: None,
            seller_id: None,
            seller_nickname: None,
            seller_avatar_url: None,
            seller_review_count: Some(0),
            seller_rating_label: None,
            want_count: None,
            is_free_shipping: false,
            location: None,
            original_price: None,
            current_price: None,
            keyword: String::new(),
            search_session_id: None,
            business_type: None,
            publish_time: Some(0),
            extra_attributes: Map::new(),
        }
    }

    /// Applies a batch of field assignments and refreshes `updated_at`.
    pub fn update(mut self, apply: impl FnOnce(&mut Self)) -> Self {
        apply(&mut self);
        self.touch();
        self
    }

    /// Stores an attribute the schema has no field for. Returns `false`
    /// (and stores nothing) when `key` names a schema field.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if is_field_name(&key) {
            return false;
        }
        self.extra_attributes.insert(key, value);
        self.touch();
        true
    }

    pub fn extra_attributes(&self) -> &Map<String, Value> {
        &self.extra_attributes
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }

    /// Flat key→value form: every named field plus the extras at top level.
    pub fn to_flat(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Every field serializes infallibly into a JSON object.
            _ => Map::new(),
        }
    }

    /// Rebuilds a record from its flat form; unknown keys land in the extras.
    pub fn from_flat(map: Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(map))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn is_field_name(key: &str) -> bool {
    FIELD_NAMES.contains(&key)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> NormalizedRecord {
        let mut r = NormalizedRecord::new("7101", "二手 iPhone 13", 2999.0).update(|r| {
            r.location = Some("杭州".into());
            r.category_id = Some("126862528".into());
            r.seller_review_count = Some(42);
            r.seller_rating_label = Some("100%".into());
            r.want_count = Some("128".into());
            r.is_free_shipping = true;
            r.current_price = Some(2999.0);
            r.keyword = "iphone".into();
            r.publish_time = Some(1_700_000_000_000);
        });
        r.insert_extra("serviceUtParams", json!({"a": [1, 2]}));
        r.insert_extra("p_csid", json!("abc"));
        r
    }

    #[test]
    fn flat_round_trip_keeps_fields_and_extras() {
        let rec = sample();
        let flat = rec.to_flat();
        assert_eq!(flat["item_id"], "7101");
        assert_eq!(flat["p_csid"], "abc");
        assert!(flat.contains_key("description"));
        assert!(!flat.contains_key("extra_attributes"));

        let back = NormalizedRecord::from_flat(flat.clone()).unwrap();
        assert_eq!(back, rec);
        assert_eq!(back.extra_attributes(), rec.extra_attributes());

        // Second pass is identical to the first.
        assert_eq!(back.to_flat(), flat);
    }

    #[test]
    fn json_round_trip() {
        let rec = sample();
        let text = rec.to_json().unwrap();
        let back: NormalizedRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn extras_never_shadow_named_fields() {
        let mut rec = NormalizedRecord::new("1", "t", 1.0);
        assert!(!rec.insert_extra("price", json!(999)));
        assert!(!rec.insert_extra("keyword", json!("other")));
        assert!(rec.extra_attributes().is_empty());
        assert_eq!(rec.to_flat()["price"], json!(1.0));
    }

    #[test]
    fn from_flat_requires_the_core_trio() {
        let mut flat = sample().to_flat();
        flat.remove("title");
        assert!(NormalizedRecord::from_flat(flat).is_err());
    }

    #[test]
    fn update_refreshes_updated_at() {
        let rec = NormalizedRecord::new("1", "t", 1.0);
        let created = rec.created_at;
        let rec = rec.update(|r| r.location = Some("上海".into()));
        assert!(rec.updated_at >= created);
        assert_eq!(rec.created_at, created);
    }
}
