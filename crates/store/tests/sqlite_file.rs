use geotrail_geometry::LineStyle;
use geotrail_store::{pointz, LocationId, LocationRow, PathRefRow, PathStore, SqliteStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[tokio::test]
async fn schema_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("geotrail.db");

    let store = SqliteStore::open(&db);
    store.connect().await.unwrap();
    let ids = store
        .insert_locations(&[LocationRow {
            time: "2016-03-01T10:00:00+00:00".to_string(),
            coordinates: pointz(-122.4, 37.7, 12.0),
            heading: Some(90.0),
            speed: None,
            accuracy: Some(5.0),
        }])
        .await
        .unwrap();
    store
        .insert_path_refs(&[PathRefRow {
            filename: "_active.svg".to_string(),
            target: "truck_7".to_string(),
            locations: ids.clone(),
            line_style: LineStyle::CumulativeAngle,
        }])
        .await
        .unwrap();
    drop(store);

    let reopened = SqliteStore::open(&db);
    reopened.connect().await.unwrap();
    let refs = reopened.path_refs_for_target("truck_7").await.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].row.locations, ids);
    assert_eq!(refs[0].row.line_style, LineStyle::CumulativeAngle);

    let next = reopened
        .insert_locations(&[LocationRow {
            time: "2016-03-01T10:00:16+00:00".to_string(),
            coordinates: pointz(-122.41, 37.71, -999.0),
            heading: None,
            speed: None,
            accuracy: None,
        }])
        .await
        .unwrap();
    assert_eq!(next, vec![LocationId(2)]);
}
