//! End-to-end setup runs against the in-memory ad server.

use std::io::Write;

use adserver_state::fakes::{MemoryInventoryService, MemoryLineItemService, MemoryTargetingService};
use adserver_state::{KeyType, ServiceError, TargetingService};
use bidline_core::{
    expand_ranges, load_price_csv, plan_line_items, read_price_csv, run_setup, CriteriaNode,
    LogicalOperator, Operator, PriceBucket, SetupError, Settings, ValidatedSettings,
};
use tempfile::NamedTempFile;

const PRICE_CSV: &str = "\
order_name,advertiser_name,start_range,end_range,granularity,rate_rule_id
Prebid,PubMatic,1.00,3.00,1.00,1
";

fn settings(extra: &str) -> ValidatedSettings {
    let text = format!(
        r#"
order_name = "Prebid Display"
user_email = "ops@example.com"
advertiser_name = "PubMatic"
line_item_type = "PRICE_PRIORITY"
placements = ["top_leaderboard", "sidebar"]
sizes = [{{ width = 728, height = 90 }}]
bucket_csv = "unused.csv"
line_item_prefix = "PM"
{extra}
"#
    );
    Settings::from_toml_str(&text)
        .expect("parse settings")
        .validate()
        .expect("valid settings")
}

fn price_buckets() -> Vec<PriceBucket> {
    let mut file = NamedTempFile::new().expect("temp csv");
    file.write_all(PRICE_CSV.as_bytes()).expect("write csv");
    let ranges = load_price_csv(file.path()).expect("load csv");
    expand_ranges(&ranges, 1.0).expect("expand")
}

fn inventory() -> MemoryInventoryService {
    MemoryInventoryService::new()
        .with_placement("top_leaderboard", 111)
        .with_placement("sidebar", 222)
}

fn price_branch(tree: &CriteriaNode) -> &CriteriaNode {
    tree.children()
        .iter()
        .find(|c| c.is_set_of(LogicalOperator::Or) && c.children().len() == 1)
        .expect("price branch")
}

#[test]
fn plan_and_submit_full_order() {
    let svc = MemoryTargetingService::new();
    let inv = inventory();
    let li = MemoryLineItemService::new();

    let report =
        run_setup(&settings(""), &price_buckets(), 4242, &svc, &inv, &li).expect("setup succeeds");

    assert_eq!(report.order_id, 4242);
    assert_eq!(report.line_item_ids.len(), 2);

    let stored = li.stored();
    assert_eq!(stored[0].body["name"], "PM_1.50");
    assert_eq!(stored[1].body["name"], "PM_2.50");
    assert_eq!(stored[1].body["costPerUnit"]["microAmount"], 2_500_000);
    assert_eq!(
        stored[0].body["targeting"]["inventoryTargeting"]["targetedPlacementIds"],
        serde_json::json!([111, 222])
    );

    assert_eq!(svc.value_names("pwtecp"), vec!["1.", "2."]);
    assert_eq!(svc.value_names("pwtbst"), vec!["1"]);
    assert_eq!(svc.value_names("pwtplt"), vec!["display"]);
}

#[test]
fn cent_granularity_from_zero_plans_every_cent() {
    let csv = "\
order_name,advertiser_name,start_range,end_range,granularity,rate_rule_id
Prebid,PubMatic,0.00,0.10,0.01,1
";
    let ranges = read_price_csv(csv.as_bytes()).expect("read csv");
    let buckets = expand_ranges(&ranges, 1.0).expect("expand");
    let svc = MemoryTargetingService::new();

    let plan = plan_line_items(&settings(""), &buckets, 7, &svc, &inventory()).expect("plan");

    assert_eq!(plan.descriptors.len(), 9);
    let expected: Vec<String> = (1..10).map(|c| format!("0.0{c}")).collect();
    assert_eq!(svc.value_names("pwtecp"), expected);
}

#[test]
fn unresolvable_key_creates_nothing() {
    let svc = MemoryTargetingService::new();
    svc.fail_on_key("pwtecp");
    let inv = inventory();
    let li = MemoryLineItemService::new();

    let err = run_setup(&settings(""), &price_buckets(), 1, &svc, &inv, &li).unwrap_err();

    match err {
        SetupError::UnresolvableName { name, source } => {
            assert_eq!(name, "pwtecp");
            assert!(matches!(source, ServiceError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(li.stored().is_empty());
    assert_eq!(li.batches(), 0);
}

#[test]
fn unknown_placement_aborts_before_targeting() {
    let svc = MemoryTargetingService::new();
    let inv = MemoryInventoryService::new().with_placement("top_leaderboard", 111);

    let err = plan_line_items(&settings(""), &price_buckets(), 1, &svc, &inv).unwrap_err();

    assert!(matches!(err, SetupError::Service(ServiceError::NotFound { .. })));
    assert_eq!(svc.key_lookups(), 0);
}

#[test]
fn bidder_list_becomes_one_or_set() {
    let svc = MemoryTargetingService::new();
    let plan = plan_line_items(
        &settings(r#"bidder_code = ["a", "b"]"#),
        &price_buckets(),
        1,
        &svc,
        &inventory(),
    )
    .unwrap();

    let bidder_key = svc.lookup_key_id_by_name("pwtpid").unwrap();
    let tree = &plan.descriptors[0].targeting.custom_targeting;
    let bidder_sets: Vec<&CriteriaNode> = tree
        .children()
        .iter()
        .filter(|c| {
            c.is_set_of(LogicalOperator::Or)
                && c.children().iter().all(|g| g.key_id() == bidder_key)
        })
        .collect();
    assert_eq!(bidder_sets.len(), 1);
    assert_eq!(bidder_sets[0].children().len(), 2);
}

#[test]
fn no_bidder_means_no_bidder_branch() {
    let svc = MemoryTargetingService::new();
    let plan =
        plan_line_items(&settings(""), &price_buckets(), 1, &svc, &inventory()).unwrap();
    let bidder_key = svc.lookup_key_id_by_name("pwtpid").unwrap();
    for descriptor in &plan.descriptors {
        let tree = &descriptor.targeting.custom_targeting;
        assert!(tree.children().iter().all(|c| c.key_id() != bidder_key));
        assert!(svc.value_names("pwtpid").is_empty());
    }
}

#[test]
fn is_not_list_becomes_and_set() {
    let svc = MemoryTargetingService::new();
    let plan = plan_line_items(
        &settings(
            r#"custom_targeting = [{ key = "region", operator = "IS_NOT", values = ["EU", "US"] }]"#,
        ),
        &price_buckets(),
        1,
        &svc,
        &inventory(),
    )
    .unwrap();

    let tree = &plan.descriptors[0].targeting.custom_targeting;
    let custom = tree.children().last().unwrap();
    assert!(custom.is_set_of(LogicalOperator::And));
    assert_eq!(custom.children().len(), 2);
    assert!(custom
        .children()
        .iter()
        .all(|c| matches!(c, CriteriaNode::Criterion { operator: Operator::IsNot, .. })));
    assert_eq!(svc.key_type("region"), Some(KeyType::Freeform));
}

#[test]
fn shared_names_are_created_once_per_run() {
    let svc = MemoryTargetingService::new();
    let plan = plan_line_items(
        &settings(
            r#"
bidder_code = ["pubmatic", "pubmatic"]
custom_targeting = [{ key = "region", operator = "IS", values = "EU" }]
"#,
        ),
        &price_buckets(),
        1,
        &svc,
        &inventory(),
    )
    .unwrap();

    // pwtpid, pwtbst, pwtecp, pwtplt, region
    assert_eq!(svc.key_creations(), 5);
    // marker "1", platform "display", "pubmatic", "EU", two price labels
    assert_eq!(svc.value_creations(), 6);
    assert_eq!(plan.resolver_stats.values_created, 6);
    assert!(plan.resolver_stats.cache_hits > 0);

    let tree = &plan.descriptors[1].targeting.custom_targeting;
    assert_eq!(price_branch(tree).children().len(), 1);
}

#[test]
fn existing_keys_and_values_are_reused() {
    let svc = MemoryTargetingService::new()
        .with_key("pwtbst", KeyType::Predefined)
        .with_value("pwtbst", "1")
        .with_key("pwtplt", KeyType::Predefined)
        .with_value("pwtplt", "display");

    plan_line_items(&settings(""), &price_buckets(), 1, &svc, &inventory()).unwrap();

    assert_eq!(svc.key_creations(), 2);
    assert_eq!(svc.value_names("pwtbst"), vec!["1"]);
    assert_eq!(svc.value_names("pwtplt"), vec!["display"]);
}

#[test]
fn plan_digest_is_reproducible() {
    let first = plan_line_items(
        &settings(""),
        &price_buckets(),
        9,
        &MemoryTargetingService::new(),
        &inventory(),
    )
    .unwrap();
    let second = plan_line_items(
        &settings(""),
        &price_buckets(),
        9,
        &MemoryTargetingService::new(),
        &inventory(),
    )
    .unwrap();
    assert_eq!(first.digest, second.digest);

    let other_order = plan_line_items(
        &settings(""),
        &price_buckets(),
        10,
        &MemoryTargetingService::new(),
        &inventory(),
    )
    .unwrap();
    assert_ne!(first.digest, other_order.digest);
}

#[test]
fn in_app_targets_device_capabilities() {
    let svc = MemoryTargetingService::new();
    let plan = plan_line_items(
        &settings(r#"creative_type = "IN_APP""#),
        &price_buckets(),
        1,
        &svc,
        &inventory(),
    )
    .unwrap();

    let body = serde_json::to_value(&plan.descriptors[0]).unwrap();
    assert_eq!(body["roadblockingType"], "AS_MANY_AS_POSSIBLE");
    assert_eq!(
        body["targeting"]["technologyTargeting"]["deviceCapabilityTargeting"]
            ["targetedDeviceCapabilities"],
        serde_json::json!([{"id": "5000"}, {"id": "5005"}, {"id": "5006"}])
    );
    // marker and price only
    assert_eq!(plan.descriptors[0].targeting.custom_targeting.children().len(), 2);
}

#[test]
fn device_categories_target_technology() {
    let plan = plan_line_items(
        &settings(r#"device_categories = ["Desktop", "Tablet"]"#),
        &price_buckets(),
        1,
        &MemoryTargetingService::new(),
        &inventory(),
    )
    .unwrap();
    let body = serde_json::to_value(&plan.descriptors[0]).unwrap();
    assert_eq!(
        body["targeting"]["technologyTargeting"]["deviceCategoryTargeting"]
            ["targetedDeviceCategories"],
        serde_json::json!([{"id": "30000"}, {"id": "30002"}])
    );
}
