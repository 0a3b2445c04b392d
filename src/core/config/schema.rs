use crate::core::config::store::{ConfigStore, FieldSchema};
use crate::core::config::value::ConfigValue;

/// Config type names of model objects
pub const NETWORK: &str = "Network";
pub const NODE: &str = "Node";
pub const ENSEMBLE: &str = "Ensemble";

/// Declare the schemas of every model object type and component kind
pub fn declare_viz_schemas(store: &mut ConfigStore) {
    for type_name in [NODE, ENSEMBLE] {
        store.declare(
            type_name,
            [
                FieldSchema::optional("pos", ConfigValue::None),
                FieldSchema::optional("size", ConfigValue::None),
            ],
        );
    }
    store.declare(
        NETWORK,
        [
            FieldSchema::optional("pos", ConfigValue::None),
            FieldSchema::optional("size", ConfigValue::None),
            FieldSchema::required("expanded", ConfigValue::Bool(false)),
            FieldSchema::required("has_layout", ConfigValue::Bool(false)),
        ],
    );

    store.declare("NetGraph", []);
    store.declare(
        "SimControl",
        [
            FieldSchema::optional("shown_time", ConfigValue::Number(0.5)),
            FieldSchema::optional("kept_time", ConfigValue::Number(4.0)),
        ],
    );

    for type_name in ["Slider", "Value", "XYValue", "Raster", "Pointer"] {
        store.declare(type_name, layout_fields());
    }
    store.declare(
        "Value",
        [
            FieldSchema::required("miny", ConfigValue::Number(-1.0)),
            FieldSchema::required("maxy", ConfigValue::Number(1.0)),
        ],
    );
    store.declare(
        "XYValue",
        [
            FieldSchema::required("min_value", ConfigValue::Number(-1.0)),
            FieldSchema::required("max_value", ConfigValue::Number(1.0)),
            FieldSchema::required("index_x", ConfigValue::Number(0.0)),
            FieldSchema::required("index_y", ConfigValue::Number(1.0)),
        ],
    );
    store.declare(
        "Slider",
        [
            FieldSchema::required("min_value", ConfigValue::Number(-1.0)),
            FieldSchema::required("max_value", ConfigValue::Number(1.0)),
        ],
    );
    store.declare("Raster", [FieldSchema::optional("n_neurons", ConfigValue::None)]);
    store.declare("Pointer", [FieldSchema::optional("show_pairs", ConfigValue::Bool(false))]);
}

fn layout_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::required("x", ConfigValue::Number(0.0)),
        FieldSchema::required("y", ConfigValue::Number(0.0)),
        FieldSchema::required("width", ConfigValue::Number(100.0)),
        FieldSchema::required("height", ConfigValue::Number(100.0)),
        FieldSchema::required("label_visible", ConfigValue::Bool(true)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_layout_defaults() {
        let mut store = ConfigStore::new();
        declare_viz_schemas(&mut store);
        store.register("value0", "Value").unwrap();
        assert_eq!(store.get("value0", "width").unwrap(), ConfigValue::Number(100.0));
        assert_eq!(store.get("value0", "maxy").unwrap(), ConfigValue::Number(1.0));
        assert!(store.get("value0", "index_x").is_err());
    }

    #[test]
    fn test_network_layout_always_dumped() {
        let mut store = ConfigStore::new();
        declare_viz_schemas(&mut store);
        store.register("net", NETWORK).unwrap();
        assert_eq!(
            store.dump(|_| 0),
            "config[net].expanded = False\nconfig[net].has_layout = False"
        );
    }
}
