//! Tests for the wire form of prediction results.

mod common;

use wastesort::Prediction;

use common::*;

#[test]
fn test_sentinel_serialization() -> anyhow::Result<()> {
    let json = serde_json::to_string(&PredictionSet::NoObjectDetected)?;

    assert_eq!(json, r#"[{"prediction":"no object detected","confidence":0.0}]"#);

    Ok(())
}

#[test]
fn test_prediction_serialization() -> anyhow::Result<()> {
    let set = PredictionSet::Objects(vec![
        Prediction {
            bbox: BoundingBox::new(1, 2, 30, 40),
            category: "glass".to_string(),
            confidence: Some(0.5),
        },
        Prediction {
            bbox: BoundingBox::new(5, 6, 7, 8),
            category: "trash".to_string(),
            confidence: None,
        },
    ]);

    let json = serde_json::to_string(&PredictionResponse::from(&set))?;

    assert_eq!(
        json,
        r#"{"predictions":[{"bbox":[1,2,30,40],"prediction":"glass","confidence":0.5},{"bbox":[5,6,7,8],"prediction":"trash"}]}"#
    );

    Ok(())
}

#[test]
fn test_entry_accepts_category_alias() -> anyhow::Result<()> {
    let entry: PredictionEntry =
        serde_json::from_str(r#"{"bbox":[0,0,4,4],"category":"paper","confidence":0.75}"#)?;

    assert_eq!(entry.prediction, "paper");
    assert_eq!(entry.bbox, Some([0, 0, 4, 4]));
    assert!(!entry.is_sentinel());
    assert!(PredictionEntry::sentinel().is_sentinel());

    Ok(())
}

#[test]
fn test_empty_prediction_list_becomes_sentinel() {
    let set = PredictionSet::from_predictions(Vec::new());

    assert!(set.is_empty());
    assert!(set.predictions().is_empty());
    assert_eq!(set.entries()[0].prediction, NO_OBJECT_DETECTED);
    assert_eq!(set.entries()[0].confidence, Some(0.0));
}

#[test]
fn test_bounding_box_conversion() {
    let bbox = BoundingBox::from_xyxy(10.9, 3.2, 55.99, 40.0);

    assert_eq!(bbox, BoundingBox::new(10, 3, 55, 40));
    assert_eq!((bbox.width(), bbox.height()), (45, 37));
    assert_eq!(BoundingBox::from(bbox.to_array()), bbox);
}

#[test]
fn test_bounding_box_extent_saturates() {
    let bbox = BoundingBox::from_xyxy(-2e9, -2e9, 2e9, 2e9);

    assert_eq!(bbox.width(), i32::MAX);
    assert_eq!(bbox.height(), i32::MAX);
    assert!(!bbox.is_degenerate());
}
