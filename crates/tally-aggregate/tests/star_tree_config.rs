use pretty_assertions::assert_eq;
use tally_aggregate::{
    AggregationError, AggregationFunctionColumnPair, AggregationFunctionType, StarTreeIndexConfig,
};

const CONFIG: &str = r#"{
    "dimensionsSplitOrder": ["country", "browser", "locale"],
    "skipStarNodeCreationForDimensions": ["locale"],
    "functionColumnPairs": ["COUNT__*", "SUM__impressions", "MAX__latency", "SUM__impressions"],
    "maxLeafRecords": 5000
}"#;

#[test]
fn parses_and_validates_a_full_config() {
    let config = StarTreeIndexConfig::from_json(CONFIG).unwrap();
    assert_eq!(config.dimensions_split_order, vec!["country", "browser", "locale"]);
    assert_eq!(
        config.skip_star_node_creation_for_dimensions,
        Some(vec!["locale".to_string()])
    );
    assert_eq!(config.effective_max_leaf_records(), 5000);

    let pairs = config.parsed_function_column_pairs().unwrap();
    let names: Vec<String> = pairs.iter().map(|p| p.to_column_name()).collect();
    assert_eq!(names, vec!["COUNT__*", "SUM__impressions", "MAX__latency"]);
    assert_eq!(pairs[2].function_type(), AggregationFunctionType::Max);
    assert_eq!(pairs[2].column(), "latency");
}

#[test]
fn serializes_back_to_camel_case() {
    let config = StarTreeIndexConfig::from_json(CONFIG).unwrap();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["maxLeafRecords"], 5000);
    assert_eq!(json["dimensionsSplitOrder"][0], "country");
}

#[test]
fn required_fields_are_enforced() {
    assert!(matches!(
        StarTreeIndexConfig::from_json(r#"{"functionColumnPairs": ["COUNT__*"]}"#),
        Err(AggregationError::Json(_))
    ));
    assert!(matches!(
        StarTreeIndexConfig::from_json(r#"{"dimensionsSplitOrder": ["a"]}"#),
        Err(AggregationError::Json(_))
    ));
}

#[test]
fn inconsistent_configs_are_rejected() {
    for json in [
        r#"{"dimensionsSplitOrder": [], "functionColumnPairs": ["COUNT__*"]}"#,
        r#"{"dimensionsSplitOrder": ["a", "a"], "functionColumnPairs": ["COUNT__*"]}"#,
        r#"{"dimensionsSplitOrder": ["a"], "functionColumnPairs": []}"#,
        r#"{"dimensionsSplitOrder": ["a"], "skipStarNodeCreationForDimensions": ["b"], "functionColumnPairs": ["COUNT__*"]}"#,
        r#"{"dimensionsSplitOrder": ["a"], "functionColumnPairs": ["PERCENTILE__x"]}"#,
        r#"{"dimensionsSplitOrder": ["a"], "functionColumnPairs": ["SUM-x"]}"#,
    ] {
        let err = StarTreeIndexConfig::from_json(json).unwrap_err();
        assert!(matches!(err, AggregationError::InvalidConfig(_)), "{json}: {err}");
    }
}

#[test]
fn pairs_can_be_built_directly() {
    let pair =
        AggregationFunctionColumnPair::new(AggregationFunctionType::DistinctCountHll, "user_id")
            .unwrap();
    assert_eq!(pair.to_string(), "DISTINCTCOUNTHLL__user_id");
    assert!(AggregationFunctionColumnPair::new(AggregationFunctionType::Count, "x").is_err());
}
