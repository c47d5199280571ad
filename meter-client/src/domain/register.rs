use super::{ParseUnitError, Unit};

/// A single measured channel of a reading.
///
/// The real value is `value * 10^scale`, expressed in `unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    pub reading_id: i64,
    pub code: String,
    pub value: i64,
    pub scale: i16,
    pub unit: Unit,
}

impl Register {
    pub fn real_value(&self) -> f64 {
        self.value as f64 * 10f64.powi(i32::from(self.scale))
    }

    /// Copy of this register attached to another reading.
    pub fn reassigned(&self, reading_id: i64) -> Self {
        Self {
            reading_id,
            ..self.clone()
        }
    }
}

/// Raw register row as stored; the unit is kept as its text symbol.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegisterRow {
    pub reading_id: i64,
    pub code: String,
    pub value: i64,
    pub scale: i16,
    pub unit: String,
}

impl TryFrom<RegisterRow> for Register {
    type Error = ParseUnitError;

    fn try_from(row: RegisterRow) -> Result<Self, Self::Error> {
        Ok(Register {
            reading_id: row.reading_id,
            code: row.code,
            value: row.value,
            scale: row.scale,
            unit: row.unit.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_value_applies_scale() {
        let r = Register {
            reading_id: 1,
            code: "1.0.1.8.0.255".to_string(),
            value: 12345,
            scale: -3,
            unit: Unit::WattHour,
        };
        assert!((r.real_value() - 12.345).abs() < 1e-9);
    }

    #[test]
    fn row_with_unknown_unit_is_rejected() {
        let row = RegisterRow {
            reading_id: 1,
            code: "1.0.1.8.0.255".to_string(),
            value: 1,
            scale: 0,
            unit: "furlong".to_string(),
        };
        assert!(Register::try_from(row).is_err());
    }
}
