use serde_json::Value;

// MMSI llega como número en MetaData y en PositionReport.UserID, pero algunos
// feeds lo envían como string. Lo normalizamos siempre a string.
pub fn value_to_identifier(value: &Value) -> Result<String, ConversionError> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(v.to_string())
            } else if let Some(v) = n.as_i64() {
                Ok(v.to_string())
            } else {
                // 123456789.0 -> "123456789"
                let f = n.as_f64().ok_or(ConversionError::InvalidNumber)?;
                if f.is_finite() && f.fract() == 0.0 && f >= 0.0 {
                    Ok(format!("{:.0}", f))
                } else {
                    Err(ConversionError::InvalidIdentifier(n.to_string()))
                }
            }
        }
        Value::Null => Ok(String::new()),
        other => Err(ConversionError::InvalidIdentifier(other.to_string())),
    }
}

// ShipType: código numérico AIS (0-99). Strings numéricos también se aceptan.
pub fn value_to_ship_type(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

// Para coordenadas y cinemática
pub fn finite_or_none(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid number")]
    InvalidNumber,
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}
