//! Integration tests for mask parsing and application to data.

use mask_schema::{
    apply, mask_from_headers, parse_mask, Mask, MaskError, MaskNode, MaskOptions, MaskParseError,
};
use serde_json::{json, Value};

fn leaf(name: &str) -> MaskNode {
    MaskNode::Leaf(name.to_string())
}

// === Grammar Tests ===

mod grammar {
    use super::*;

    #[test]
    fn mixed_mask_shape() {
        let mask = parse_mask("a,b{c,d},*").unwrap();
        assert_eq!(
            mask.nodes(),
            [
                leaf("a"),
                MaskNode::Nested("b".into(), vec![leaf("c"), leaf("d")]),
                MaskNode::Wildcard,
            ]
        );
    }

    #[test]
    fn outer_braces_are_optional() {
        assert_eq!(parse_mask("a,b{c}").unwrap(), parse_mask("{a,b{c}}").unwrap());
    }

    #[test]
    fn whitespace_is_ignored() {
        assert_eq!(
            parse_mask(" a , b { c } ").unwrap(),
            parse_mask("a,b{c}").unwrap()
        );
    }

    #[test]
    fn names_allow_colons_and_hyphens() {
        let mask = parse_mask("ns:field,some-name,under_score").unwrap();
        assert_eq!(
            mask.nodes(),
            [leaf("ns:field"), leaf("some-name"), leaf("under_score")]
        );
    }

    #[test]
    fn deep_nesting() {
        let mask = parse_mask("a{b{c{d{e}}}}").unwrap();
        assert_eq!(mask.to_string(), "{a{b{c{d{e}}}}}");
    }

    #[test]
    fn lone_open_bracket_fails() {
        assert!(parse_mask("{").is_err());
    }

    #[test]
    fn trailing_commas_fail() {
        assert!(matches!(
            parse_mask("field,,"),
            Err(MaskParseError::UnexpectedComma { .. })
        ));
    }

    #[test]
    fn unclosed_nested_bracket_fails() {
        assert_eq!(
            parse_mask("a{b"),
            Err(MaskParseError::MissingClosingBracket)
        );
    }

    #[test]
    fn bracket_without_name_fails() {
        assert!(matches!(
            parse_mask("a,{b}"),
            Err(MaskParseError::UnexpectedOpeningBracket { .. })
        ));
    }

    #[test]
    fn canonical_form_reparses_identically() {
        let mask = parse_mask("name, pets { name, kind }, *").unwrap();
        let text = mask.to_string();
        assert_eq!(text, "{name,pets{name,kind},*}");
        assert_eq!(text.parse::<Mask>().unwrap(), mask);
    }

    #[test]
    fn serde_uses_text_form() {
        let mask = parse_mask("a{b}").unwrap();
        assert_eq!(serde_json::to_value(&mask).unwrap(), json!("{a{b}}"));
        let back: Mask = serde_json::from_value(json!("a{b}")).unwrap();
        assert_eq!(back, mask);
    }
}

// === Application Tests ===

mod application {
    use super::*;

    fn family() -> Value {
        json!({
            "father": { "name": "John", "age": 42 },
            "mother": { "name": "Jane", "age": 42 }
        })
    }

    #[test]
    fn end_to_end_scenario() {
        let out = apply(&family(), "father{name},mother{age}", false).unwrap();
        assert_eq!(
            out,
            json!({ "father": { "name": "John" }, "mother": { "age": 42 } })
        );
    }

    #[test]
    fn idempotent() {
        let mask = "father{name},mother{age,missing}";
        let once = apply(&family(), mask, false).unwrap();
        let twice = apply(&once, mask, false).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn wildcard_is_identity() {
        assert_eq!(apply(&family(), "*", false).unwrap(), family());
    }

    #[test]
    fn empty_mask_selects_nothing() {
        assert_eq!(apply(&family(), "{}", false).unwrap(), json!({}));
    }

    #[test]
    fn wildcard_keeps_explicit_nodes_first() {
        let out = apply(&family(), "mother{name},*", false).unwrap();
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["mother", "father"]);
        assert_eq!(out["mother"], json!({ "name": "Jane" }));
        assert_eq!(out["father"], json!({ "name": "John", "age": 42 }));
    }

    #[test]
    fn sequences_map_element_wise() {
        let data = json!([{ "a": 1, "b": 2 }, { "a": 3, "b": 4 }]);
        assert_eq!(
            apply(&data, "a", false).unwrap(),
            json!([{ "a": 1 }, { "a": 3 }])
        );
    }

    #[test]
    fn nested_lists_are_masked_per_item() {
        let data = json!({ "pets": [{ "name": "Rex", "kind": "dog" }, { "name": "Tom" }] });
        assert_eq!(
            apply(&data, "pets{kind}", true).unwrap(),
            json!({ "pets": [{ "kind": "dog" }, {}] })
        );
    }

    #[test]
    fn missing_keys() {
        let data = json!({ "a": 1 });
        assert_eq!(
            apply(&data, "a,b,c{d}", false).unwrap(),
            json!({ "a": 1, "b": null, "c": null })
        );
        assert_eq!(apply(&data, "a,b,c{d}", true).unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn null_nested_value_propagates() {
        let data = json!({ "father": null });
        assert_eq!(
            apply(&data, "father{name}", true).unwrap(),
            json!({ "father": null })
        );
    }

    #[test]
    fn nesting_under_scalar_fails() {
        let data = json!({ "father": { "name": "John" } });
        match apply(&data, "father{name{first}}", false) {
            Err(MaskError::Inconsistent { path }) => assert_eq!(path, "/father/name"),
            other => panic!("expected inconsistent mask, got {other:?}"),
        }
    }

    #[test]
    fn malformed_text_fails() {
        assert!(matches!(
            apply(&family(), "father{", false),
            Err(MaskError::Parse(_))
        ));
    }

    #[test]
    fn parsed_mask_and_text_agree() {
        let mask = parse_mask("father{age}").unwrap();
        assert_eq!(
            apply(&family(), &mask, false).unwrap(),
            apply(&family(), "father{age}", false).unwrap()
        );
        assert_eq!(
            apply(&family(), mask.nodes(), false).unwrap(),
            json!({ "father": { "age": 42 } })
        );
    }
}

// === Header Tests ===

mod headers {
    use super::*;

    #[test]
    fn default_header_case_insensitive() {
        let headers = [("content-type", "application/json"), ("x-fields", "name")];
        let mask = mask_from_headers(headers, &MaskOptions::new()).unwrap();
        assert_eq!(mask, Some(parse_mask("name").unwrap()));
    }

    #[test]
    fn custom_header() {
        let options = MaskOptions::new().header("X-Mask");
        let headers = [("X-Fields", "ignored"), ("X-Mask", "a{b}")];
        let mask = mask_from_headers(headers, &options).unwrap();
        assert_eq!(mask.map(|m| m.to_string()).as_deref(), Some("{a{b}}"));
    }

    #[test]
    fn absent_or_blank_header() {
        let options = MaskOptions::new();
        assert_eq!(mask_from_headers([("Accept", "*/*")], &options).unwrap(), None);
        assert_eq!(mask_from_headers([("X-Fields", "  ")], &options).unwrap(), None);
    }

    #[test]
    fn malformed_header_value() {
        let result = mask_from_headers([("X-Fields", "a}")], &MaskOptions::new());
        assert!(matches!(
            result,
            Err(MaskParseError::UnexpectedClosingBracket { .. })
        ));
    }
}
