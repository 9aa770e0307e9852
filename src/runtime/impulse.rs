use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::runtime::value::{Value, ValueType};

/// A named broadcast with a positional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseDefinition {
    pub name: String,
    pub values: Vec<Value>,
}

impl ImpulseDefinition {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Checks the payload against a receiver signature, position by position.
    pub fn check_signature(&self, types: &[ValueType]) -> Result<()> {
        let fits = self.values.len() == types.len()
            && self.values.iter().zip(types).all(|(v, ty)| v.fits(*ty));
        if fits {
            Ok(())
        } else {
            Err(GraphError::ImpulseMismatch {
                name: self.name.clone(),
                expected: types.to_vec(),
                actual: self.values.iter().map(Value::value_type).collect(),
            })
        }
    }
}
