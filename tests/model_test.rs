//! Integration tests for models: resolution, compilation, masking, marshalling
//! and validation.

use mask_schema::{
    apply_to_field, apply_to_model, compile_definitions, compile_field, compile_model,
    definitions_document, load_registry, marshal, validate, Field, FieldType, MarshalOptions,
    Mask, MaskError, Model, ModelError, ModelRef, ModelRegistry, ValidateError,
};
use serde_json::json;

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .define(
            Model::new("Person")
                .field("name", Field::string().required())
                .field("age", Field::integer()),
        )
        .unwrap();
    registry
        .define(
            Model::new("Family")
                .field("father", Field::nested("Person"))
                .field("mother", Field::nested("Person"))
                .field("children", Field::nested_list("Person")),
        )
        .unwrap();
    registry
}

// === Resolution Tests ===

mod resolution {
    use super::*;

    #[test]
    fn parent_fields_come_first() {
        let mut registry = registry();
        registry
            .inherit("Employee", &["Person"], [("company", Field::string())])
            .unwrap();
        let resolved = registry.resolve_name("Employee").unwrap();
        let names: Vec<&str> = resolved.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["name", "age", "company"]);
    }

    #[test]
    fn child_shadows_parent() {
        let mut registry = registry();
        registry
            .inherit(
                "Adult",
                &["Person"],
                [("age", Field::integer().required())],
            )
            .unwrap();
        let resolved = registry.resolve_name("Adult").unwrap();
        assert_eq!(resolved.fields.len(), 2);
        assert!(resolved.get("age").unwrap().required);
        // Parent untouched
        assert!(!registry.lookup("Person").unwrap().get("age").unwrap().required);
    }

    #[test]
    fn later_parents_win() {
        let mut registry = ModelRegistry::new();
        registry
            .define(Model::new("A").field("x", Field::string()))
            .unwrap();
        registry
            .define(Model::new("B").field("x", Field::integer()))
            .unwrap();
        registry.inherit("C", &["A", "B"], Vec::<(String, Field)>::new()).unwrap();

        let resolved = registry.resolve_name("C").unwrap();
        assert_eq!(resolved.get("x"), Some(&Field::integer()));
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut registry = registry();
        registry
            .inherit("Employee", &["Person"], [("company", Field::string())])
            .unwrap();
        assert_eq!(
            registry.resolve_name("Employee").unwrap(),
            registry.resolve_name("Employee").unwrap()
        );
    }

    #[test]
    fn discriminator_default_is_own_name() {
        let mut registry = ModelRegistry::new();
        registry
            .define(Model::new("Pet").field("kind", Field::string().discriminator()))
            .unwrap();
        registry
            .inherit("Cat", &["Pet"], [("lives", Field::integer())])
            .unwrap();

        let resolved = registry.resolve_name("Cat").unwrap();
        assert_eq!(resolved.discriminator.as_deref(), Some("kind"));
        assert_eq!(resolved.get("kind").unwrap().default, Some(json!("Cat")));
    }

    #[test]
    fn two_discriminators_fail_at_any_depth() {
        let mut registry = ModelRegistry::new();
        registry
            .define(Model::new("Base").field("kind", Field::string().discriminator()))
            .unwrap();
        registry
            .inherit("Middle", &["Base"], [("x", Field::string())])
            .unwrap();
        registry
            .inherit("Leaf", &["Middle"], [("tag", Field::string().discriminator())])
            .unwrap();

        assert!(matches!(
            registry.resolve_name("Leaf"),
            Err(ModelError::DuplicateDiscriminator { .. })
        ));
    }

    #[test]
    fn clone_is_flat_and_detached() {
        let mut registry = registry();
        registry
            .inherit("Employee", &["Person"], [("company", Field::string())])
            .unwrap();
        registry
            .clone_model("Contractor", &["Employee"], [("rate", Field::number())])
            .unwrap();

        let contractor = registry.lookup("Contractor").unwrap();
        assert!(contractor.parents().is_empty());
        let names: Vec<&str> = contractor.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["name", "age", "company", "rate"]);
    }

    #[test]
    fn registry_rejects_duplicates_and_unknown_parents() {
        let mut registry = registry();
        assert!(matches!(
            registry.define(Model::new("Person")),
            Err(ModelError::DuplicateModel { .. })
        ));
        assert!(matches!(
            registry.inherit("Orphan", &["Nobody"], Vec::<(String, Field)>::new()),
            Err(ModelError::UnknownModel { .. })
        ));
    }
}

// === Compilation Tests ===

mod compilation {
    use super::*;

    #[test]
    fn inheritance_composition() {
        let mut registry = ModelRegistry::new();
        registry
            .define(Model::new("Parent").field("name", Field::string()))
            .unwrap();
        registry
            .inherit("Child", &["Parent"], [("extra", Field::string())])
            .unwrap();

        let child = registry.lookup("Child").unwrap();
        assert_eq!(
            compile_model(child, &registry).unwrap(),
            json!({
                "allOf": [
                    { "$ref": "#/definitions/Parent" },
                    { "type": "object", "properties": { "extra": { "type": "string" } } }
                ]
            })
        );
    }

    #[test]
    fn multiple_parents_in_declaration_order() {
        let mut registry = ModelRegistry::new();
        registry.define(Model::new("B").field("b", Field::string())).unwrap();
        registry.define(Model::new("A").field("a", Field::string())).unwrap();
        registry
            .inherit("C", &["B", "A"], [("c", Field::string())])
            .unwrap();

        let compiled = compile_model(registry.lookup("C").unwrap(), &registry).unwrap();
        assert_eq!(compiled["allOf"][0], json!({ "$ref": "#/definitions/B" }));
        assert_eq!(compiled["allOf"][1], json!({ "$ref": "#/definitions/A" }));
    }

    #[test]
    fn model_keywords() {
        let mut registry = ModelRegistry::new();
        registry
            .define(
                Model::new("Pet")
                    .field("kind", Field::string().discriminator().required())
                    .field("name", Field::string().required())
                    .with_description("A pet")
                    .with_mask(Mask::parse("name").unwrap())
                    .strict(true),
            )
            .unwrap();

        assert_eq!(
            compile_model(registry.lookup("Pet").unwrap(), &registry).unwrap(),
            json!({
                "type": "object",
                "description": "A pet",
                "properties": {
                    "kind": { "type": "string" },
                    "name": { "type": "string" }
                },
                "required": ["kind", "name"],
                "discriminator": "kind",
                "x-mask": "{name}",
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn nested_fields() {
        let registry = registry();
        assert_eq!(
            compile_field(&Field::nested("Person"), &registry).unwrap(),
            json!({ "$ref": "#/definitions/Person" })
        );
        assert_eq!(
            compile_field(&Field::nested_list("Person"), &registry).unwrap(),
            json!({ "type": "array", "items": { "$ref": "#/definitions/Person" } })
        );
        assert_eq!(
            compile_field(
                &Field::nested("Person").with_description("The owner"),
                &registry
            )
            .unwrap(),
            json!({ "allOf": [{ "$ref": "#/definitions/Person" }], "description": "The owner" })
        );
    }

    #[test]
    fn primitives_and_lists() {
        let registry = ModelRegistry::new();
        assert_eq!(
            compile_field(&Field::datetime().readonly(), &registry).unwrap(),
            json!({ "type": "string", "format": "date-time", "readOnly": true })
        );
        assert_eq!(
            compile_field(
                &Field::list(Field::integer()).with_items_bounds(Some(1), None).unique_items(),
                &registry
            )
            .unwrap(),
            json!({
                "type": "array",
                "items": { "type": "integer" },
                "minItems": 1,
                "uniqueItems": true
            })
        );
    }

    #[test]
    fn polymorph_compiles_to_common_ancestor() {
        let mut registry = ModelRegistry::new();
        registry
            .define(Model::new("Pet").field("kind", Field::string().discriminator()))
            .unwrap();
        registry.inherit("Cat", &["Pet"], [("lives", Field::integer())]).unwrap();
        registry.inherit("Dog", &["Pet"], [("good", Field::boolean())]).unwrap();

        let field = Field::polymorph([("cat", "Cat"), ("dog", "Dog")]);
        assert_eq!(
            compile_field(&field, &registry).unwrap(),
            json!({ "$ref": "#/definitions/Pet" })
        );
    }

    #[test]
    fn polymorph_without_single_ancestor_fails() {
        let registry = registry();
        let field = Field::polymorph([("a", "Person"), ("b", "Family")]);
        assert!(matches!(
            compile_field(&field, &registry),
            Err(ModelError::AmbiguousAncestor { .. })
        ));
    }

    #[test]
    fn definitions_cover_every_model() {
        let registry = registry();
        let definitions = compile_definitions(&registry).unwrap();
        let names: Vec<&String> = definitions.keys().collect();
        assert_eq!(names, ["Family", "Person"]);

        let document = definitions_document(&registry).unwrap();
        assert_eq!(
            document["definitions"]["Family"]["properties"]["children"]["items"],
            json!({ "$ref": "#/definitions/Person" })
        );
    }

    #[test]
    fn dangling_reference_fails_definitions() {
        let mut registry = registry();
        registry
            .define(Model::new("Broken").field("x", Field::nested("Missing")))
            .unwrap();
        assert!(matches!(
            compile_definitions(&registry),
            Err(ModelError::UnknownModel { name }) if name == "Missing"
        ));
    }

    #[test]
    fn output_has_no_nulls() {
        let registry = registry();
        let document = definitions_document(&registry).unwrap();
        assert!(!document.to_string().contains("null"));
    }
}

// === Model Masking Tests ===

mod model_masking {
    use super::*;

    #[test]
    fn narrows_nested_models() {
        let registry = registry();
        let family = registry.lookup("Family").unwrap();
        let masked =
            apply_to_model(family, "father{name},children{age}", &registry, false).unwrap();

        assert_eq!(masked.name(), "Family");
        let names: Vec<&str> = masked.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["father", "children"]);

        match &masked.get("father").unwrap().field_type {
            FieldType::Nested {
                model: ModelRef::Masked(inner),
                as_list: false,
            } => {
                assert_eq!(inner.name(), "Person");
                assert_eq!(inner.fields().len(), 1);
                assert!(inner.get("name").is_some());
            }
            other => panic!("expected masked nested model, got {other:?}"),
        }
        assert!(matches!(
            &masked.get("children").unwrap().field_type,
            FieldType::Nested { as_list: true, .. }
        ));
    }

    #[test]
    fn original_is_not_mutated() {
        let registry = registry();
        let before = registry.lookup("Family").unwrap().clone();
        apply_to_model(&before, "father{name}", &registry, false).unwrap();
        assert_eq!(registry.lookup("Family").unwrap(), &before);
        assert_eq!(registry.lookup("Person").unwrap().fields().len(), 2);
    }

    #[test]
    fn masked_model_compiles_by_name() {
        let registry = registry();
        let family = registry.lookup("Family").unwrap();
        let masked = apply_to_model(family, "father", &registry, false).unwrap();
        assert_eq!(
            compile_model(&masked, &registry).unwrap(),
            json!({
                "type": "object",
                "properties": { "father": { "$ref": "#/definitions/Person" } }
            })
        );
    }

    #[test]
    fn nesting_under_scalar_field_fails() {
        let registry = registry();
        let person = registry.lookup("Person").unwrap();
        assert!(matches!(
            apply_to_model(person, "name{first}", &registry, false),
            Err(MaskError::Inconsistent { path }) if path == "/name"
        ));
    }

    #[test]
    fn raw_fields_keep_the_mask() {
        let field = apply_to_field(&Field::raw(), "a{b}", &ModelRegistry::new(), false).unwrap();
        assert_eq!(field.mask.map(|m| m.to_string()).as_deref(), Some("{a{b}}"));
    }

    #[test]
    fn unknown_names() {
        let registry = registry();
        let person = registry.lookup("Person").unwrap();

        let kept = apply_to_model(person, "name,nickname", &registry, false).unwrap();
        assert_eq!(kept.get("nickname"), Some(&Field::raw()));

        let skipped = apply_to_model(person, "name,nickname", &registry, true).unwrap();
        assert!(skipped.get("nickname").is_none());
    }
}

// === Declarations End to End ===

mod declarations {
    use super::*;

    fn declared() -> ModelRegistry {
        load_registry(&json!({"models": [
            {
                "name": "Pet",
                "fields": {
                    "kind": {"type": "string", "discriminator": true},
                    "name": {"type": "string", "required": true}
                }
            },
            {"name": "Cat", "inherits": ["Pet"], "fields": {"lives": {"type": "integer"}}},
            {"name": "Dog", "inherits": ["Pet"], "fields": {"good": {"type": "boolean"}}},
            {
                "name": "Owner",
                "mask": "name,pets",
                "fields": {
                    "name": {"type": "string", "required": true},
                    "born": {"type": "date"},
                    "pets": {
                        "type": "list",
                        "items": {"type": "polymorph", "mapping": {"Cat": "Cat", "Dog": "Dog"}}
                    }
                }
            }
        ]}))
        .unwrap()
    }

    #[test]
    fn marshal_picks_concrete_models() {
        let registry = declared();
        let data = json!({
            "name": "Jane",
            "born": "1980-01-01",
            "pets": [
                {"kind": "Cat", "name": "Tom", "lives": 9, "good": false},
                {"kind": "Dog", "name": "Rex", "good": true}
            ]
        });

        let out = marshal(&data, "Owner", &registry, &MarshalOptions::new()).unwrap();
        assert_eq!(
            out,
            json!({
                "name": "Jane",
                "pets": [
                    {"kind": "Cat", "name": "Tom", "lives": 9},
                    {"kind": "Dog", "name": "Rex", "good": true}
                ]
            })
        );
    }

    #[test]
    fn validate_through_inheritance() {
        let registry = declared();
        let cat = json!({"kind": "Cat", "name": "Tom", "lives": 9});
        assert!(validate(&cat, "Cat", &registry).is_ok());
        assert!(matches!(
            validate(&json!({"kind": "Cat", "lives": 9}), "Cat", &registry),
            Err(ValidateError::Invalid { .. })
        ));
    }

    #[test]
    fn compiled_document_validates_marshalled_output() {
        let registry = declared();
        let data = json!({"name": "Jane", "pets": [{"kind": "Dog", "name": "Rex", "good": true}]});
        let out = marshal(&data, "Owner", &registry, &MarshalOptions::new()).unwrap();
        assert!(validate(&out, "Owner", &registry).is_ok());
    }
}
