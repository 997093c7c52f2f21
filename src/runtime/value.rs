use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    Array(ArrayValue),
    Void,
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayValue::from_vec(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "NUMBER",
            Value::Bool(_) => "BOOL",
            Value::Str(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Void => "VOID",
        }
    }

    /// Structural equality used by `==` and `!=`.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if a.same_handle(b) {
                    return true;
                }
                let left = a.snapshot();
                let right = b.snapshot();
                left.len() == right.len() && left.iter().zip(&right).all(|(l, r)| l.equals(r))
            }
            (Value::Void, Value::Void) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", format_number(*v)),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Array(array) => {
                write!(f, "[")?;
                for (idx, value) in array.snapshot().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Void => write!(f, "void"),
        }
    }
}

/// Integral values print without a fractional part; everything else uses the
/// shortest representation that round-trips.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

/// Array storage shared by every copy of the value.
#[derive(Clone, Debug)]
pub struct ArrayValue {
    items: Arc<Mutex<Vec<Value>>>,
}

impl ArrayValue {
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    pub fn items(&self) -> MutexGuard<'_, Vec<Value>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.items().clone()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items().get(index).cloned()
    }

    /// Stores `value` at `index`, returning false when out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn same_handle(&self, other: &ArrayValue) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}
