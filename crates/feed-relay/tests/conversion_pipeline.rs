use std::collections::BTreeMap;

use chrono::NaiveDate;
use feed_relay::workflows::conversion::{ConversionRunStats, FeedConverter, GroupOverride};

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 24).expect("valid run date")
}

fn offer(id: &str, building: &str, body: &str) -> String {
    format!(
        r#"  <offer internal-id="{id}">
    <building-name>{building}</building-name>
    {body}
  </offer>"#
    )
}

fn feed(offers: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<realty-feed xmlns=\"http://webmaster.yandex.ru/schemas/feed/realty/2010-06\">\n{}\n</realty-feed>",
        offers.join("\n")
    )
}

fn rules(entries: &[(&str, GroupOverride)]) -> BTreeMap<String, GroupOverride> {
    entries
        .iter()
        .map(|(name, rule)| (name.to_string(), rule.clone()))
        .collect()
}

fn ads(document: &str) -> Vec<&str> {
    document
        .split("  <Ad>")
        .skip(1)
        .map(|chunk| chunk.split("  </Ad>").next().unwrap_or_default())
        .collect()
}

fn element<'a>(ad: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = ad.find(&open)? + open.len();
    let end = ad[start..].find(&close)? + start;
    Some(&ad[start..end])
}

#[test]
fn one_bad_listing_does_not_stop_the_run() {
    let mut offers: Vec<String> = (1..=10)
        .map(|n| {
            offer(
                &format!("L-{n}"),
                "Sunrise",
                &format!("<price><value>{}</value></price><rooms>2</rooms>", n * 1_000_000),
            )
        })
        .collect();
    offers[4] = offer("L-5", "Sunrise", "<price><value>договорная</value></price>");

    let outcome = FeedConverter::new(run_date())
        .convert(feed(&offers).as_bytes(), &BTreeMap::new())
        .expect("feed converts");

    assert_eq!(
        outcome.stats,
        ConversionRunStats {
            total: 10,
            with_override_applied: 0,
            errors: 1,
            configured_groups_at_start: 0,
        }
    );
    let ads = ads(&outcome.document);
    assert_eq!(ads.len(), 9);
    assert!(ads.iter().all(|ad| element(ad, "Id") != Some("L-5")));
    assert_eq!(element(ads[0], "Id"), Some("L-1"));
    assert_eq!(element(ads[8], "Id"), Some("L-10"));
}

#[test]
fn identical_inputs_produce_identical_documents() {
    let offers = vec![
        offer("A", "Sunrise", "<new-flat>true</new-flat><image>https://cdn.example/a.jpg</image>"),
        offer("B", "River", "<rooms>studio</rooms>"),
    ];
    let overrides = rules(&[(
        "Sunrise",
        GroupOverride {
            description: "{group}: {rooms}, {price}".to_string(),
            price_modifier: "+5%".to_string(),
            development_id: "111".to_string(),
            ..GroupOverride::default()
        },
    )]);
    let converter = FeedConverter::new(run_date());

    let first = converter
        .convert(feed(&offers).as_bytes(), &overrides)
        .expect("first run");
    let second = converter
        .convert(feed(&offers).as_bytes(), &overrides)
        .expect("second run");

    assert_eq!(first, second);
    assert_eq!(first.stats.with_override_applied, 1);
}

#[test]
fn building_id_wins_over_development_id() {
    let offers = vec![
        offer("both", "Both", "<new-flat>true</new-flat>"),
        offer("dev", "DevOnly", "<new-flat>true</new-flat>"),
        offer("none", "NotNumeric", "<new-flat>true</new-flat>"),
        offer("old", "Both", ""),
    ];
    let overrides = rules(&[
        (
            "Both",
            GroupOverride {
                building_id: "222".to_string(),
                development_id: "111".to_string(),
                ..GroupOverride::default()
            },
        ),
        (
            "DevOnly",
            GroupOverride {
                development_id: "111".to_string(),
                ..GroupOverride::default()
            },
        ),
        (
            "NotNumeric",
            GroupOverride {
                building_id: "b-222".to_string(),
                development_id: "ЖК111".to_string(),
                ..GroupOverride::default()
            },
        ),
    ]);

    let outcome = FeedConverter::new(run_date())
        .convert(feed(&offers).as_bytes(), &overrides)
        .expect("feed converts");
    let ads = ads(&outcome.document);

    assert_eq!(element(ads[0], "NewDevelopmentId"), Some("222"));
    assert_eq!(element(ads[0], "MarketType"), Some("Новостройка"));
    assert_eq!(element(ads[0], "FinishType"), Some("Без отделки"));
    assert_eq!(element(ads[1], "NewDevelopmentId"), Some("111"));
    assert_eq!(element(ads[2], "NewDevelopmentId"), None);
    assert_eq!(element(ads[2], "MarketType"), Some("Вторичка"));
    assert_eq!(element(ads[3], "NewDevelopmentId"), None);
    assert_eq!(element(ads[3], "PropertyRights"), Some("Посредник"));
    assert_eq!(outcome.stats.with_override_applied, 4);
}

#[test]
fn image_and_description_limits_hold() {
    let images: String = (0..45)
        .map(|n| format!("<image>https://cdn.example/{n}.jpg</image>"))
        .collect();
    let long_description = "д".repeat(8_000);
    let offers = vec![
        offer("many", "Gallery", &images),
        offer("long", "Verbose", "<rooms>3</rooms>"),
    ];
    let overrides = rules(&[(
        "Verbose",
        GroupOverride {
            description: long_description,
            ..GroupOverride::default()
        },
    )]);

    let outcome = FeedConverter::new(run_date())
        .convert(feed(&offers).as_bytes(), &overrides)
        .expect("feed converts");
    let ads = ads(&outcome.document);

    assert_eq!(ads[0].matches("<Image url=").count(), 40);
    let description = element(ads[1], "Description").expect("description present");
    assert_eq!(description.chars().count(), 7_500);
    assert!(description.ends_with("..."));
}

#[test]
fn price_modifiers_adjust_or_fall_back() {
    let offers = vec![
        offer("pct", "Percent", "<price><value>1000000</value></price>"),
        offer("abs", "Absolute", "<price><value>1000000</value></price>"),
        offer("bad", "Broken", "<price><value>1000000</value></price>"),
    ];
    let modifier = |value: &str| GroupOverride {
        price_modifier: value.to_string(),
        ..GroupOverride::default()
    };
    let overrides = rules(&[
        ("Percent", modifier("+5%")),
        ("Absolute", modifier("-50000")),
        ("Broken", modifier("abc")),
    ]);

    let outcome = FeedConverter::new(run_date())
        .convert(feed(&offers).as_bytes(), &overrides)
        .expect("feed converts");
    let ads = ads(&outcome.document);

    assert_eq!(element(ads[0], "Price"), Some("1050000"));
    assert_eq!(element(ads[1], "Price"), Some("950000"));
    assert_eq!(element(ads[2], "Price"), Some("1000000"));
    assert_eq!(outcome.stats.errors, 0);
}

#[test]
fn description_template_fills_listing_values() {
    let offers = vec![offer(
        "tpl",
        "ЖК \"Север\"",
        "<rooms>2</rooms><area><value>54.3</value></area><floor>5</floor><floors-total>9</floors-total><price><value>7000000</value></price>",
    )];
    let overrides = rules(&[(
        "ЖК Север",
        GroupOverride {
            description: "{jk_name}: {rooms}-комн., {area} м², {floor}/{floors}, {price} ₽ {{акция}}"
                .to_string(),
            ..GroupOverride::default()
        },
    )]);

    let outcome = FeedConverter::new(run_date())
        .convert(feed(&offers).as_bytes(), &overrides)
        .expect("feed converts");
    let ads = ads(&outcome.document);

    assert_eq!(
        element(ads[0], "Description"),
        Some("ЖК Север: 2-комн., 54.3 м², 5/9, 7000000 ₽ {акция}")
    );
}

#[test]
fn malformed_feed_is_rejected_as_a_whole() {
    let result = FeedConverter::new(run_date()).convert(
        b"<realty-feed><offer internal-id=\"1\"></realty-feed>",
        &BTreeMap::new(),
    );
    assert!(result.is_err());
}
