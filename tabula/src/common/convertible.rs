use crate::common::Value;
use crate::errors::{ErrorKind, TabulaError, TabulaResult};

/// Conversion between a Rust type and a cell [`Value`].
///
/// Implemented for the primitive types a column can hold. `Option<T>` maps
/// `None` to `NULL`; every other implementation rejects `NULL`.
pub trait Convertible: Sized {
    fn to_value(&self) -> TabulaResult<Value>;
    fn from_value(value: &Value) -> TabulaResult<Self>;
}

fn mismatch(value: &Value, expected: &str) -> TabulaError {
    log::error!("Value {} is not {}", value, expected);
    TabulaError::new(
        &format!("Value of type {} is not {}", value.type_name(), expected),
        ErrorKind::InvalidDataType,
    )
}

impl Convertible for i64 {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::Integer(*self))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        value.as_integer().ok_or_else(|| mismatch(value, "an integer"))
    }
}

impl Convertible for i32 {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::Integer(*self as i64))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        let i = i64::from_value(value)?;
        i32::try_from(i).map_err(|_| {
            TabulaError::new(
                &format!("Integer {} does not fit in an i32", i),
                ErrorKind::InvalidDataType,
            )
        })
    }
}

impl Convertible for u32 {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::Integer(*self as i64))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        let i = i64::from_value(value)?;
        u32::try_from(i).map_err(|_| {
            TabulaError::new(
                &format!("Integer {} does not fit in a u32", i),
                ErrorKind::InvalidDataType,
            )
        })
    }
}

impl Convertible for bool {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::from(*self))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        Ok(i64::from_value(value)? != 0)
    }
}

impl Convertible for f64 {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::Real(*self))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        value.as_real().ok_or_else(|| mismatch(value, "a real"))
    }
}

impl Convertible for String {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| mismatch(value, "a text"))
    }
}

impl Convertible for Vec<u8> {
    fn to_value(&self) -> TabulaResult<Value> {
        Ok(Value::Blob(self.clone()))
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch(value, "a blob"))
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn to_value(&self) -> TabulaResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> TabulaResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
