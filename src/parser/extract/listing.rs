use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use serde_json::Value;

use super::labels;
use crate::parser::lookup::Lookup;
use crate::record::NormalizedRecord;

/// `clickParam.args` keys that feed named fields.
static CONSUMED_ARGS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "cCatId",
        "tbCatId",
        "item_type",
        "seller_id",
        "tag",
        "search_id",
        "biz_type",
        "publishTime",
    ]
    .into_iter()
    .collect()
});

/// Why one listing was left out of the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NotAnObject,
    MissingNode(&'static str),
    MissingField(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "listing is not an object"),
            SkipReason::MissingNode(path) => write!(f, "missing node {}", path),
            SkipReason::MissingField(name) => write!(f, "missing required field {}", name),
        }
    }
}

pub struct Listing<'a> {
    pub node: &'a Value,
    pub keyword: &'a str,
    pub keep_unmapped_args: bool,
}

impl Listing<'_> {
    /// Item id if the listing has one, for error context.
    pub fn item_id(&self) -> Option<String> {
        Lookup::new(self.node)
            .path("data.item.main.exContent.itemId")
            .text()
    }

    pub fn extract(&self) -> Result<NormalizedRecord, SkipReason> {
        if !self.node.is_object() {
            return Err(SkipReason::NotAnObject);
        }

        let main = Lookup::new(self.node).path("data.item.main");
        if main.object().is_none() {
            return Err(SkipReason::MissingNode("data.item.main"));
        }
        let ex = main.key("exContent");
        if ex.object().is_none() {
            return Err(SkipReason::MissingNode("exContent"));
        }
        let args = main.path("clickParam.args");

        let item_id = ex
            .key("itemId")
            .text()
            .filter(|s| !s.is_empty())
            .ok_or(SkipReason::MissingField("itemId"))?;
        let title = ex
            .key("title")
            .text()
            .filter(|s| !s.is_empty())
            .ok_or(SkipReason::MissingField("title"))?;

        let price = labels::price(ex);
        let tags = ex
            .path("userFishShopLabel.tagList")
            .array()
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let want = ex
            .path("fishTags.r3.tagList")
            .at(0)
            .path("data.content")
            .str();

        let mut record = NormalizedRecord::new(item_id, title, price).update(|r| {
            r.image_url = ex.key("picUrl").text();

            r.category_id = args.key("cCatId").text();
            r.platform_category_id = args.key("tbCatId").text();
            r.item_type = args.key("item_type").text();

            r.seller_id = args.key("seller_id").text();
            r.seller_nickname = ex.key("userNickName").text();
            r.seller_avatar_url = ex.key("userAvatarUrl").text();
            r.seller_review_count = Some(labels::review_count(tags));
            r.seller_rating_label = labels::rating_label(tags);

            r.want_count = Some(labels::want_count(want));
            r.is_free_shipping = labels::is_free_shipping(
                args.key("tag").str().or(main.path("clickParam.tag").str()),
            );

            r.location = ex.key("area").text();
            r.original_price = ex.key("oriPrice").text().map(|p| labels::strip_currency(&p));
            r.current_price = Some(price);

            r.keyword = self.keyword.to_string();
            r.search_session_id = args.key("search_id").text();
            r.business_type = args.key("biz_type").text();
            r.publish_time = Some(args.key("publishTime").int().unwrap_or(0));
        });

        if self.keep_unmapped_args {
            if let Some(bag) = args.object() {
                for (k, v) in bag {
                    if !CONSUMED_ARGS.contains(k.as_str()) {
                        record.insert_extra(k.clone(), v.clone());
                    }
                }
            }
        }

        Ok(record)
    }
}
