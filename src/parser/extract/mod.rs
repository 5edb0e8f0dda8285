pub mod labels;
pub mod listing;

use rayon::prelude::*;
use serde_json::Value;

use super::lookup::Lookup;
use crate::record::NormalizedRecord;
use crate::report::Reporter;
use listing::Listing;

pub use listing::SkipReason;

const KEYWORD_PATH: &str = "data.resultInfo.sqiControlFields.userInputOriginalSearchKeywords";
const LISTINGS_PATH: &str = "data.resultList";

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Copy `clickParam.args` entries no named field uses into the extras.
    pub keep_unmapped_args: bool,
    /// Fan listings out over the rayon pool. Output order is unchanged.
    pub parallel: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            keep_unmapped_args: true,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub index: usize,
    pub item_id: Option<String>,
    pub reason: SkipReason,
}

/// One batch's output: records in input order plus what was dropped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub keyword: String,
    pub records: Vec<NormalizedRecord>,
    pub skipped: Vec<Skipped>,
}

impl Extraction {
    pub fn to_flat(&self) -> Vec<serde_json::Map<String, Value>> {
        self.records.iter().map(NormalizedRecord::to_flat).collect()
    }
}

pub struct Extractor<'r> {
    reporter: &'r dyn Reporter,
    options: ExtractOptions,
}

impl<'r> Extractor<'r> {
    pub fn new(reporter: &'r dyn Reporter, options: ExtractOptions) -> Self {
        Extractor { reporter, options }
    }

    /// Never fails: a malformed batch yields an empty or partial result.
    pub fn extract(&self, payload: &Value) -> Extraction {
        let root = Lookup::new(payload);
        let keyword = root.path(KEYWORD_PATH).str().unwrap_or("").to_string();

        let listings = match root.path(LISTINGS_PATH).array() {
            Some(items) if !items.is_empty() => items,
            _ => {
                self.reporter.no_listings();
                return Extraction {
                    keyword,
                    ..Default::default()
                };
            }
        };

        let run = |(index, node): (usize, &Value)| {
            let listing = Listing {
                node,
                keyword: &keyword,
                keep_unmapped_args: self.options.keep_unmapped_args,
            };
            listing.extract().map_err(|reason| Skipped {
                index,
                item_id: listing.item_id(),
                reason,
            })
        };

        let outcomes: Vec<Result<NormalizedRecord, Skipped>> = if self.options.parallel {
            listings.par_iter().enumerate().map(run).collect()
        } else {
            listings.iter().enumerate().map(run).collect()
        };

        let mut records = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(skip) => {
                    self.reporter
                        .listing_skipped(skip.index, skip.item_id.as_deref(), &skip.reason);
                    skipped.push(skip);
                }
            }
        }

        self.reporter.batch_done(records.len(), skipped.len());
        Extraction {
            keyword,
            records,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::report::testing::Recorder;

    fn fixture() -> Value {
        let text = std::fs::read_to_string("tests/fixtures/search_response.json").unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn listing(id: &str, ex_extra: Value, args: Value) -> Value {
        let mut ex = json!({
            "itemId": id,
            "title": format!("item {}", id),
            "price": [{"text": "¥"}, {"text": "10.5"}],
        });
        if let (Some(ex), Some(extra)) = (ex.as_object_mut(), ex_extra.as_object()) {
            for (k, v) in extra {
                ex.insert(k.clone(), v.clone());
            }
        }
        json!({"data": {"item": {"main": {"exContent": ex, "clickParam": {"args": args}}}}})
    }

    fn payload(listings: Vec<Value>) -> Value {
        json!({
            "data": {
                "resultInfo": {"sqiControlFields": {"userInputOriginalSearchKeywords": "相机"}},
                "resultList": listings,
            }
        })
    }

    fn run(p: &Value) -> (Extraction, Vec<String>) {
        let rec = Recorder::default();
        let out = Extractor::new(&rec, ExtractOptions::default()).extract(p);
        (out, rec.events())
    }

    #[test]
    fn fixture_batch() {
        let (out, events) = run(&fixture());
        assert_eq!(out.keyword, "iphone13");
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].reason, SkipReason::MissingNode("exContent"));
        assert_eq!(events.last().map(String::as_str), Some("done 3 ok, 1 skipped"));

        let first = &out.records[0];
        assert_eq!(first.item_id, "735012345678");
        assert_eq!(first.price, 2999.0);
        assert_eq!(first.current_price, Some(2999.0));
        assert_eq!(first.seller_review_count, Some(126));
        assert_eq!(first.seller_rating_label.as_deref(), Some("99%"));
        assert_eq!(first.want_count.as_deref(), Some("128"));
        assert!(first.is_free_shipping);
        assert_eq!(first.original_price.as_deref(), Some("5999"));
        assert_eq!(first.location.as_deref(), Some("浙江杭州"));
        assert_eq!(first.category_id.as_deref(), Some("126862528"));
        assert_eq!(first.publish_time, Some(1_716_000_000_000));
        assert_eq!(first.keyword, "iphone13");
        assert_eq!(first.extra_attributes()["p_csid"], "11a2b3");

        let second = &out.records[1];
        assert_eq!(second.price, 0.0);
        assert_eq!(second.seller_rating_label, None);
        assert_eq!(second.want_count.as_deref(), Some("0"));
        assert!(!second.is_free_shipping);
    }

    #[test]
    fn price_is_second_token() {
        let p = payload(vec![listing("1", json!({"price": [{"text": "¥"}, {"text": "88.8"}]}), json!({}))]);
        let (out, _) = run(&p);
        assert_eq!(out.records[0].price, 88.8);
    }

    #[test]
    fn missing_price_keeps_listing() {
        let mut node = listing("1", json!({}), json!({}));
        node["data"]["item"]["main"]["exContent"]
            .as_object_mut()
            .unwrap()
            .remove("price");
        let (out, _) = run(&payload(vec![node]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].price, 0.0);
    }

    #[test]
    fn short_tag_list_has_no_rating() {
        let ex = json!({"userFishShopLabel": {"tagList": [{"data": {"content": "5条评价"}}]}});
        let (out, _) = run(&payload(vec![listing("1", ex, json!({}))]));
        assert_eq!(out.records[0].seller_review_count, Some(5));
        assert_eq!(out.records[0].seller_rating_label, None);
    }

    #[test]
    fn empty_result_list() {
        let (out, events) = run(&payload(vec![]));
        assert!(out.records.is_empty());
        assert!(out.skipped.is_empty());
        assert_eq!(out.keyword, "相机");
        assert_eq!(events, vec!["no_listings"]);
    }

    #[test]
    fn missing_structure_degrades_to_empty() {
        let (out, events) = run(&json!({"ret": ["FAIL_SYS_TOKEN_EXOIRED"]}));
        assert!(out.records.is_empty());
        assert_eq!(out.keyword, "");
        assert_eq!(events, vec!["no_listings"]);

        let (out, _) = run(&json!({"data": {"resultList": {"not": "an array"}}}));
        assert!(out.records.is_empty());
    }

    #[test]
    fn one_bad_listing_among_three() {
        let broken = json!({"data": {"item": {"main": {"clickParam": {"args": {}}}}}});
        let p = payload(vec![
            listing("1", json!({}), json!({})),
            broken,
            listing("3", json!({}), json!({})),
        ]);
        let (out, events) = run(&p);
        let ids: Vec<&str> = out.records.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].index, 1);
        assert!(events.iter().any(|e| e == "skipped #1 - (missing node exContent)"));
    }

    #[test]
    fn listing_without_title_is_dropped_with_its_id() {
        let mut node = listing("9", json!({}), json!({}));
        node["data"]["item"]["main"]["exContent"]["title"] = Value::Null;
        let (out, _) = run(&payload(vec![node]));
        assert!(out.records.is_empty());
        assert_eq!(out.skipped[0].item_id.as_deref(), Some("9"));
        assert_eq!(out.skipped[0].reason, SkipReason::MissingField("title"));
    }

    #[test]
    fn non_object_listing_is_dropped() {
        let (out, _) = run(&payload(vec![json!("oops"), listing("2", json!({}), json!({}))]));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped[0].reason, SkipReason::NotAnObject);
    }

    #[test]
    fn free_shipping_from_args_tag() {
        let p = payload(vec![
            listing("1", json!({}), json!({"tag": "xyz-freeship-promo"})),
            listing("2", json!({}), json!({})),
        ]);
        let (out, _) = run(&p);
        assert!(out.records[0].is_free_shipping);
        assert!(!out.records[1].is_free_shipping);
    }

    #[test]
    fn free_shipping_falls_back_to_click_param_tag() {
        let mut outer = listing("1", json!({}), json!({}));
        outer["data"]["item"]["main"]["clickParam"]["tag"] = json!("xyz-freeship-promo");
        let mut both = listing("2", json!({}), json!({"tag": "plain"}));
        both["data"]["item"]["main"]["clickParam"]["tag"] = json!("xyz-freeship-promo");

        let (out, _) = run(&payload(vec![outer, both]));
        assert!(out.records[0].is_free_shipping);
        // args.tag wins when both are present
        assert!(!out.records[1].is_free_shipping);
    }

    #[test]
    fn want_count_marker() {
        let want = |content: &str| json!({"fishTags": {"r3": {"tagList": [{"data": {"content": content}}]}}});
        let p = payload(vec![
            listing("1", want("128人想要"), json!({})),
            listing("2", want("热门"), json!({})),
        ]);
        let (out, _) = run(&p);
        assert_eq!(out.records[0].want_count.as_deref(), Some("128"));
        assert_eq!(out.records[1].want_count.as_deref(), Some("0"));
    }

    #[test]
    fn unmapped_args_become_extras_without_shadowing() {
        let args = json!({"cCatId": "50", "p_csid": "x1", "keyword": "spoof", "price": 1});
        let (out, _) = run(&payload(vec![listing("1", json!({}), args.clone())]));
        let rec = &out.records[0];
        assert_eq!(rec.keyword, "相机");
        assert_eq!(rec.price, 10.5);
        assert_eq!(rec.extra_attributes().len(), 1);
        assert_eq!(rec.extra_attributes()["p_csid"], "x1");

        let rec = Recorder::default();
        let opts = ExtractOptions {
            keep_unmapped_args: false,
            ..Default::default()
        };
        let out = Extractor::new(&rec, opts).extract(&payload(vec![listing("1", json!({}), args)]));
        assert!(out.records[0].extra_attributes().is_empty());
    }

    #[test]
    fn parallel_matches_sequential_order() {
        let p = payload((0..64).map(|i| listing(&i.to_string(), json!({}), json!({}))).collect());
        let rec = Recorder::default();
        let opts = ExtractOptions {
            parallel: true,
            ..Default::default()
        };
        let out = Extractor::new(&rec, opts).extract(&p);
        let ids: Vec<String> = out.records.iter().map(|r| r.item_id.clone()).collect();
        let expected: Vec<String> = (0..64).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn flat_records_carry_analysis_keys() {
        let (out, _) = run(&fixture());
        for flat in out.to_flat() {
            for key in ["price", "location", "category_id", "keyword"] {
                assert!(flat.contains_key(key), "missing {}", key);
            }
        }
    }
}
