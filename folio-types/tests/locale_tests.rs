use folio_types::{Actor, Locale, parse_locale};

#[test]
fn locale_display_is_code() {
    assert_eq!(Locale::from("de-CH").to_string(), "de-CH");
}

#[test]
fn parse_locale_trims() {
    assert_eq!(parse_locale("  en ").unwrap(), Locale::new("en"));
}

#[test]
fn parse_locale_rejects_empty() {
    assert!(parse_locale("").is_err());
    assert!(parse_locale("   ").is_err());
}

#[test]
fn parse_locale_rejects_inner_whitespace() {
    assert!(parse_locale("en US").is_err());
}

#[test]
fn actor_roles() {
    let actor = Actor::new("u1").with_role("editor");
    assert!(actor.has_role("editor"));
    assert!(!actor.has_role("admin"));
}
