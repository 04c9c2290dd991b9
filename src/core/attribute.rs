use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Diagnostics, StreamError};

/// Value held by an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// One of a fixed set of choices
    Enum(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "boolean",
            AttrValue::Int(_) => "integer",
            AttrValue::Float(_) => "number",
            AttrValue::Enum(_) => "enum",
            AttrValue::IntList(_) => "integer list",
            AttrValue::FloatList(_) => "number list",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Enum(v.to_string())
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::IntList(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::FloatList(v)
    }
}

/// Named, typed configuration value of a module
#[derive(Debug, Clone)]
pub struct Attribute {
    name: &'static str,
    description: &'static str,
    value: AttrValue,
    default: AttrValue,
    min: Option<f64>,
    max: Option<f64>,
    choices: &'static [&'static str],
    triggers_renegotiation: bool,
}

impl Attribute {
    pub fn new(name: &'static str, default: AttrValue) -> Self {
        Self {
            name,
            description: "",
            value: default.clone(),
            default,
            min: None,
            max: None,
            choices: &[],
            triggers_renegotiation: false,
        }
    }

    pub fn bool(name: &'static str, default: bool) -> Self {
        Self::new(name, AttrValue::Bool(default))
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, AttrValue::Int(default))
    }

    pub fn float(name: &'static str, default: f64) -> Self {
        Self::new(name, AttrValue::Float(default))
    }

    pub fn choice(name: &'static str, choices: &'static [&'static str], default: &str) -> Self {
        let mut attr = Self::new(name, AttrValue::Enum(default.to_string()));
        attr.choices = choices;
        attr
    }

    /// Free text
    pub fn text(name: &'static str, default: &str) -> Self {
        Self::new(name, AttrValue::Enum(default.to_string()))
    }

    pub fn int_list(name: &'static str) -> Self {
        Self::new(name, AttrValue::IntList(Vec::new()))
    }

    pub fn float_list(name: &'static str) -> Self {
        Self::new(name, AttrValue::FloatList(Vec::new()))
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Bounds applied by [`Attribute::sanitize`], per element for lists
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn renegotiates(mut self) -> Self {
        self.triggers_renegotiation = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    pub fn default_value(&self) -> &AttrValue {
        &self.default
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn choices(&self) -> &'static [&'static str] {
        self.choices
    }

    pub fn triggers_renegotiation(&self) -> bool {
        self.triggers_renegotiation
    }

    /// Type-checked store. Integers are accepted for numbers and integral
    /// numbers for integers; scalars are accepted for lists.
    fn store(&mut self, value: AttrValue) -> Result<(), StreamError> {
        let type_error = || StreamError::AttributeType {
            name: self.name.to_string(),
            expected: self.default.type_name().to_string(),
        };

        let coerced = match (&self.default, value) {
            (AttrValue::Bool(_), AttrValue::Bool(b)) => AttrValue::Bool(b),
            (AttrValue::Bool(_), AttrValue::Int(i)) => AttrValue::Bool(i != 0),
            (AttrValue::Int(_), AttrValue::Int(i)) => AttrValue::Int(i),
            (AttrValue::Int(_), AttrValue::Float(f)) if f.fract() == 0.0 => AttrValue::Int(f as i64),
            (AttrValue::Float(_), AttrValue::Float(f)) => AttrValue::Float(f),
            (AttrValue::Float(_), AttrValue::Int(i)) => AttrValue::Float(i as f64),
            (AttrValue::Enum(_), AttrValue::Enum(s)) => {
                if !self.choices.is_empty() && !self.choices.contains(&s.as_str()) {
                    return Err(StreamError::InvalidAttribute {
                        name: self.name.to_string(),
                        reason: format!("'{}' is not one of {:?}", s, self.choices),
                    });
                }
                AttrValue::Enum(s)
            }
            (AttrValue::Enum(_), AttrValue::Int(i)) => match usize::try_from(i).ok().and_then(|i| self.choices.get(i)) {
                Some(choice) => AttrValue::Enum(choice.to_string()),
                None => {
                    return Err(StreamError::InvalidAttribute {
                        name: self.name.to_string(),
                        reason: format!("choice index {} out of range", i),
                    })
                }
            },
            (AttrValue::IntList(_), AttrValue::IntList(l)) => AttrValue::IntList(l),
            (AttrValue::IntList(_), AttrValue::Int(i)) => AttrValue::IntList(vec![i]),
            (AttrValue::FloatList(_), AttrValue::FloatList(l)) => AttrValue::FloatList(l),
            (AttrValue::FloatList(_), AttrValue::IntList(l)) => {
                AttrValue::FloatList(l.into_iter().map(|i| i as f64).collect())
            }
            (AttrValue::FloatList(_), other) => match other.as_f64() {
                Some(f) => AttrValue::FloatList(vec![f]),
                None => return Err(type_error()),
            },
            _ => return Err(type_error()),
        };

        self.value = coerced;
        Ok(())
    }

    /// Clamp numeric values into the declared range. Returns a warning
    /// message when the stored value had to be rewritten.
    pub fn sanitize(&mut self) -> Option<String> {
        let (lo, hi) = (self.min.unwrap_or(f64::NEG_INFINITY), self.max.unwrap_or(f64::INFINITY));
        let clamp = |v: f64| if v.is_nan() { 0.0f64.max(lo).min(hi) } else { v.max(lo).min(hi) };

        let corrected = match &self.value {
            AttrValue::Int(v) => {
                let c = clamp(*v as f64) as i64;
                (c != *v).then_some(AttrValue::Int(c))
            }
            AttrValue::Float(v) => {
                let c = clamp(*v);
                (c != *v).then_some(AttrValue::Float(c))
            }
            AttrValue::IntList(l) => {
                let c: Vec<i64> = l.iter().map(|v| clamp(*v as f64) as i64).collect();
                (c != *l).then_some(AttrValue::IntList(c))
            }
            AttrValue::FloatList(l) => {
                let c: Vec<f64> = l.iter().map(|v| clamp(*v)).collect();
                (c != *l).then_some(AttrValue::FloatList(c))
            }
            _ => None,
        }?;

        let message = format!(
            "attribute '{}' value {:?} out of range, corrected to {:?}",
            self.name, self.value, corrected
        );
        self.value = corrected;
        Some(message)
    }
}

/// Schema entry of one attribute, as listed by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub default: AttrValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub choices: Vec<String>,
    pub triggers_renegotiation: bool,
    pub description: String,
}

/// Attributes declared by one module
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    attrs: Vec<Attribute>,
    /// Some value changed since the module last looked
    dirty: bool,
    /// A non-silent set touched an attribute that reshapes the output
    renegotiate: bool,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.find(name).map(|a| &a.value)
    }

    fn find(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Attribute, StreamError> {
        self.attrs
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| StreamError::UnknownAttribute { name: name.to_string() })
    }

    /// Set a value. A silent set updates storage without requesting
    /// renegotiation, even for attributes that normally trigger it.
    pub fn set(&mut self, name: &str, value: AttrValue, silent: bool) -> Result<(), StreamError> {
        let attr = self.find_mut(name)?;
        attr.store(value)?;
        let renegotiate = attr.triggers_renegotiation && !silent;
        self.dirty = true;
        self.renegotiate |= renegotiate;
        Ok(())
    }

    /// Clamp every attribute into its range, quietly rewriting corrected
    /// values and raising one warning per correction.
    pub fn sanitize(&mut self, diag: &Diagnostics) {
        for attr in &mut self.attrs {
            if let Some(message) = attr.sanitize() {
                diag.warning(message);
            }
        }
    }

    pub fn needs_renegotiation(&self) -> bool {
        self.renegotiate
    }

    /// Acknowledge a completed negotiation
    pub fn clear_renegotiation(&mut self) {
        self.renegotiate = false;
    }

    /// Returns whether any value changed since the previous call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn f64(&self, name: &str) -> Result<f64, StreamError> {
        match self.get(name) {
            Some(AttrValue::Float(v)) => Ok(*v),
            Some(AttrValue::Int(v)) => Ok(*v as f64),
            Some(_) => Err(self.type_error(name, "number")),
            None => Err(StreamError::UnknownAttribute { name: name.to_string() }),
        }
    }

    pub fn i64(&self, name: &str) -> Result<i64, StreamError> {
        match self.get(name) {
            Some(AttrValue::Int(v)) => Ok(*v),
            Some(_) => Err(self.type_error(name, "integer")),
            None => Err(StreamError::UnknownAttribute { name: name.to_string() }),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, StreamError> {
        match self.get(name) {
            Some(AttrValue::Bool(v)) => Ok(*v),
            Some(_) => Err(self.type_error(name, "boolean")),
            None => Err(StreamError::UnknownAttribute { name: name.to_string() }),
        }
    }

    /// Index of the selected choice
    pub fn choice(&self, name: &str) -> Result<usize, StreamError> {
        let attr = self
            .find(name)
            .ok_or_else(|| StreamError::UnknownAttribute { name: name.to_string() })?;
        match &attr.value {
            AttrValue::Enum(s) => attr.choices.iter().position(|c| c == s).ok_or_else(|| {
                StreamError::InvalidAttribute {
                    name: name.to_string(),
                    reason: format!("'{}' is not a valid choice", s),
                }
            }),
            _ => Err(self.type_error(name, "enum")),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, StreamError> {
        match self.get(name) {
            Some(AttrValue::Enum(s)) => Ok(s),
            Some(_) => Err(self.type_error(name, "string")),
            None => Err(StreamError::UnknownAttribute { name: name.to_string() }),
        }
    }

    pub fn i64_list(&self, name: &str) -> Result<&[i64], StreamError> {
        match self.get(name) {
            Some(AttrValue::IntList(v)) => Ok(v),
            Some(_) => Err(self.type_error(name, "integer list")),
            None => Err(StreamError::UnknownAttribute { name: name.to_string() }),
        }
    }

    pub fn f64_list(&self, name: &str) -> Result<&[f64], StreamError> {
        match self.get(name) {
            Some(AttrValue::FloatList(v)) => Ok(v),
            Some(_) => Err(self.type_error(name, "number list")),
            None => Err(StreamError::UnknownAttribute { name: name.to_string() }),
        }
    }

    fn type_error(&self, name: &str, expected: &str) -> StreamError {
        StreamError::AttributeType {
            name: name.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Apply a JSON object of `name: value` pairs (non-silent)
    pub fn apply_json(&mut self, config: &Value) -> Result<(), StreamError> {
        let object = match config {
            Value::Null => return Ok(()),
            Value::Object(map) => map,
            _ => {
                return Err(StreamError::Config {
                    reason: "module config must be an object".to_string(),
                })
            }
        };

        for (name, value) in object {
            let value = json_to_value(name, value)?;
            self.set(name, value, false)?;
        }
        Ok(())
    }

    pub fn schema(&self) -> Vec<AttributeSchema> {
        self.attrs
            .iter()
            .map(|a| AttributeSchema {
                name: a.name.to_string(),
                value_type: a.default.type_name().to_string(),
                default: a.default.clone(),
                min: a.min,
                max: a.max,
                choices: a.choices.iter().map(|c| c.to_string()).collect(),
                triggers_renegotiation: a.triggers_renegotiation,
                description: a.description.to_string(),
            })
            .collect()
    }
}

fn json_to_value(name: &str, value: &Value) -> Result<AttrValue, StreamError> {
    let unsupported = || StreamError::AttributeType {
        name: name.to_string(),
        expected: "boolean, number, string or list of numbers".to_string(),
    };

    match value {
        Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(AttrValue::Int(i)),
            None => n.as_f64().map(AttrValue::Float).ok_or_else(unsupported),
        },
        Value::String(s) => Ok(AttrValue::Enum(s.clone())),
        Value::Array(items) => {
            if items.iter().all(|v| v.is_i64()) {
                Ok(AttrValue::IntList(items.iter().filter_map(Value::as_i64).collect()))
            } else if items.iter().all(Value::is_number) {
                Ok(AttrValue::FloatList(items.iter().filter_map(Value::as_f64).collect()))
            } else {
                Err(unsupported())
            }
        }
        _ => Err(unsupported()),
    }
}
