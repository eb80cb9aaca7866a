use crate::error::DecodeError;

/// A value passed to, or read back from, a driver.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    fn mismatch(&self, expected: &'static str) -> DecodeError {
        DecodeError::Type {
            expected,
            found: self.kind(),
        }
    }

    pub fn int(&self) -> Result<i32, DecodeError> {
        Ok(i32::try_from(self.int64()?)?)
    }

    pub fn int64(&self) -> Result<i64, DecodeError> {
        match self {
            Value::Integer(v) => Ok(*v),
            _ => Err(self.mismatch("INTEGER")),
        }
    }

    pub fn double(&self) -> Result<f64, DecodeError> {
        match self {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            _ => Err(self.mismatch("REAL")),
        }
    }

    pub fn text(&self) -> Result<&str, DecodeError> {
        match self {
            Value::Text(v) => Ok(v),
            _ => Err(self.mismatch("TEXT")),
        }
    }

    pub fn blob(&self) -> &[u8] {
        match self {
            Value::Blob(v) => v,
            Value::Text(v) => v.as_bytes(),
            _ => &[],
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
