// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value nodes, one per value type.

use super::core_type;
use crate::node::{Node, NodeBehavior, NodeKind, NodeType};
use crate::value::ValueType;

const VALUE_TYPES: [ValueType; 6] = [
    ValueType::Bool,
    ValueType::Int,
    ValueType::Float,
    ValueType::String,
    ValueType::Vec3,
    ValueType::Actor,
];

/// Value node types
pub fn node_types() -> Vec<NodeType> {
    VALUE_TYPES
        .iter()
        .map(|value_type| {
            core_type(
                value_type.name(),
                NodeKind::Value,
                &format!("Holds a {} value", value_type.name()),
            )
        })
        .collect()
}

pub(crate) fn create(name: &str) -> Option<Box<dyn NodeBehavior>> {
    VALUE_TYPES
        .iter()
        .find(|value_type| value_type.name() == name)
        .map(|&value_type| Box::new(ValueHolder(value_type)) as Box<dyn NodeBehavior>)
}

/// A value slot of a fixed type
#[derive(Debug, Clone, Copy)]
pub struct ValueHolder(pub ValueType);

impl NodeBehavior for ValueHolder {
    fn init(&self, node: &mut Node) {
        node.set_value_slot(self.0.default_value());
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::core_director;
    use crate::value::{Value, ValueType};

    #[test]
    fn test_value_nodes_hold_typed_defaults() {
        let mut director = core_director();
        let root = director.root_graph();
        let vector = director.create_node("Vec3", &root).unwrap();
        let text = director.create_node("Core.String", &root).unwrap();

        let node = director.node(&vector).unwrap();
        assert!(node.kind().is_value());
        assert!(node.inputs().is_empty() && node.outputs().is_empty());
        assert_eq!(node.value_type(), Some(ValueType::Vec3));
        assert_eq!(director.value(&text), Some(Value::from("")));
    }

    #[test]
    fn test_reset_restores_initial_value() {
        let mut director = core_director();
        let root = director.root_graph();
        let counter = director.create_node("Int", &root).unwrap();
        director.set_initial_value(&counter, 5);
        director.set_value(&counter, 9);

        director.reset_values();

        assert_eq!(director.value(&counter), Some(Value::Int(5)));
    }
}
