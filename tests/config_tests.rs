use proptest::prelude::*;
use proptest::sample::Index;
use simviz::core::config::{declare_viz_schemas, parse_literal, Constructor, FieldSchema, Namespace};
use simviz::{ConfigStore, ConfigValue, VizError};
use std::collections::BTreeMap;

struct NoDeclarations;

impl Namespace for NoDeclarations {
    fn declare(&mut self, uid: &str, _: &Constructor) -> simviz::Result<String> {
        Err(VizError::UnknownIdentifier(uid.to_string()))
    }
}

fn literal() -> impl Strategy<Value = ConfigValue> {
    let leaf = prop_oneof![
        Just(ConfigValue::None),
        any::<bool>().prop_map(ConfigValue::Bool),
        any::<f64>().prop_filter("nan never equals itself", |n| !n.is_nan()).prop_map(ConfigValue::Number),
        "[a-zA-Z0-9 _.'\"\\\\\n\t]{0,12}".prop_map(ConfigValue::Str),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(ConfigValue::Tuple),
            prop::collection::vec(inner, 0..4).prop_map(ConfigValue::List),
        ]
    })
}

/// Type name to fields, each with its default and whether it is always written
type Schemas = BTreeMap<String, BTreeMap<String, (ConfigValue, bool)>>;

/// Instance uid to its type and the writes made to it
type Instances = BTreeMap<String, (Index, Vec<(Index, ConfigValue)>)>;

fn schemas() -> impl Strategy<Value = Schemas> {
    prop::collection::btree_map(
        "[A-Z][a-z]{0,6}",
        prop::collection::btree_map("[a-z_][a-z0-9_]{0,6}", (literal(), any::<bool>()), 1..5),
        1..4,
    )
}

fn instances() -> impl Strategy<Value = Instances> {
    prop::collection::btree_map(
        "[a-z_][a-z0-9_.]{0,8}",
        (any::<Index>(), prop::collection::vec((any::<Index>(), literal()), 0..6)),
        0..6,
    )
}

proptest! {
    #[test]
    fn literal_survives_display_and_parse(value in literal()) {
        prop_assert_eq!(parse_literal(&value.to_string()).unwrap(), value);
    }

    #[test]
    fn store_survives_dump_and_load(schemas in schemas(), instances in instances()) {
        let type_names: Vec<&String> = schemas.keys().collect();
        let mut store = ConfigStore::new();
        let mut restored = ConfigStore::new();
        for (type_name, fields) in &schemas {
            let fields: Vec<FieldSchema> = fields
                .iter()
                .map(|(name, (default, required))| {
                    if *required {
                        FieldSchema::required(name, default.clone())
                    } else {
                        FieldSchema::optional(name, default.clone())
                    }
                })
                .collect();
            store.declare(type_name, fields.clone());
            restored.declare(type_name, fields);
        }
        for (uid, (kind, writes)) in &instances {
            let type_name = kind.get(&type_names).as_str();
            store.register(uid, type_name).unwrap();
            restored.register(uid, type_name).unwrap();
            let field_names: Vec<&String> = schemas[type_name].keys().collect();
            for (field, value) in writes {
                store.set(uid, field.get(&field_names).as_str(), value.clone()).unwrap();
            }
        }

        let report = restored.load(&store.dump(|uid| uid.to_string()), &mut NoDeclarations);
        prop_assert!(report.is_clean(), "{:?}", report.errors);
        for (uid, (kind, _)) in &instances {
            for field in schemas[kind.get(&type_names).as_str()].keys() {
                prop_assert_eq!(restored.get(uid, field).unwrap(), store.get(uid, field).unwrap());
            }
        }
    }
}

#[test]
fn test_malformed_lines_are_reported_and_skipped() {
    let mut store = ConfigStore::new();
    declare_viz_schemas(&mut store);
    store.register("net", "Network").unwrap();

    let text = "\
# layout
config[net].pos = (10, 20)
config[net].pos = (10, 20
config[net].colour = 'red'

config[net].expanded = True
plot = Value(net)
";
    let report = store.load(text, &mut NoDeclarations);
    assert_eq!(report.applied, 2);
    let failed: Vec<usize> = report.errors.iter().map(|e| e.line).collect();
    assert_eq!(failed, vec![3, 4, 7]);
    assert_eq!(store.get("net", "pos").unwrap(), ConfigValue::pair(10.0, 20.0));
    assert_eq!(store.get("net", "expanded").unwrap(), ConfigValue::Bool(true));
}
