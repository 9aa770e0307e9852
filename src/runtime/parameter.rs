use serde::{Deserialize, Serialize};

use crate::runtime::value::{Value, ValueType};

/// A parameter value pushed into the graph by the host (e.g. an OSC listener).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedParameter {
    pub name: String,
    pub value: Value,
}

impl ReceivedParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Returns the value when it has the requested type.
    pub fn value_as(&self, ty: ValueType) -> Option<&Value> {
        self.value.fits(ty).then_some(&self.value)
    }

    /// Parses a `name=value` pair. The value is read as bool, int, float and
    /// finally string.
    pub fn parse_assignment(s: &str) -> Option<Self> {
        let (name, raw) = s.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let raw = raw.trim();
        let value = [ValueType::Bool, ValueType::Int, ValueType::Float]
            .into_iter()
            .find_map(|ty| Value::parse(ty, raw))
            .unwrap_or_else(|| Value::String(raw.to_string()));
        Some(Self::new(name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments_by_precedence() {
        let p = ReceivedParameter::parse_assignment("VRCEmote=3").unwrap();
        assert_eq!(p.value, Value::Int(3));
        let p = ReceivedParameter::parse_assignment("AFK = true").unwrap();
        assert_eq!(p.name, "AFK");
        assert_eq!(p.value, Value::Bool(true));
        let p = ReceivedParameter::parse_assignment("Angle=0.5").unwrap();
        assert_eq!(p.value, Value::Float(0.5));
        let p = ReceivedParameter::parse_assignment("Msg=hello world").unwrap();
        assert_eq!(p.value, Value::String("hello world".into()));
        assert!(ReceivedParameter::parse_assignment("novalue").is_none());
    }

    #[test]
    fn value_as_checks_type() {
        let p = ReceivedParameter::new("x", 1.5);
        assert!(p.value_as(ValueType::Float).is_some());
        assert!(p.value_as(ValueType::Int).is_none());
        assert!(p.value_as(ValueType::Any).is_some());
    }
}
