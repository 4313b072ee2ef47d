use folio_types::{DocumentId, RowId, VersionId};
use proptest::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

// ── DocumentId ───────────────────────────────────────────────────

#[test]
fn document_id_new_is_unique() {
    let a = DocumentId::new();
    let b = DocumentId::new();
    assert_ne!(a, b);
}

#[test]
fn document_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = DocumentId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn document_id_display_and_parse() {
    let id = DocumentId::new();
    let parsed = DocumentId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn document_id_parse_invalid() {
    assert!(DocumentId::parse("not-a-uuid").is_err());
}

#[test]
fn document_ids_are_time_ordered() {
    let a = DocumentId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = DocumentId::new();
    assert!(a < b);
}

#[test]
fn area_id_is_deterministic_per_slug() {
    assert_eq!(DocumentId::for_area("settings"), DocumentId::for_area("settings"));
    assert_ne!(DocumentId::for_area("settings"), DocumentId::for_area("footer"));
}

#[test]
fn document_id_serializes_as_plain_string() {
    let id = DocumentId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let back: DocumentId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

// ── RowId / VersionId ────────────────────────────────────────────

#[test]
fn row_ids_hash_distinctly() {
    let set: HashSet<RowId> = (0..100).map(|_| RowId::new()).collect();
    assert_eq!(set.len(), 100);
}

#[test]
fn version_id_from_str() {
    let id = VersionId::new();
    let parsed = VersionId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

proptest! {
    #[test]
    fn arbitrary_uuid_survives_display(bits in any::<u128>()) {
        let id = RowId::from_uuid(uuid::Uuid::from_u128(bits));
        prop_assert_eq!(RowId::parse(&id.to_string()).unwrap(), id);
    }
}
