//! Typed parameter slots, values, and list verification.
//!
//! A [`ParamType`] describes one named slot (value kind, optional bounds,
//! allowed values, default). A [`Param`] is a concrete `(name, value)` pair.
//! [`verify_params`] checks a supplied list against its governing types and
//! fills in defaults, producing the final form in which params are
//! persisted.

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// The value kind a [`ParamType`] expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Uuid,
    String,
    StringList,
    Int,
    Uint,
    Double,
    Bool,
    Color,
    Time,
    Object,
    /// Accepts any value.
    Variant,
}

/// An RGB color value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// A single typed parameter value.
///
/// Serialized externally tagged (`{"int": 42}`), so values round-trip
/// through storage without collapsing `Uint` into `Int` or `Double`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Uuid(uuid::Uuid),
    String(String),
    StringList(Vec<String>),
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    Color(Color),
    /// Seconds since midnight.
    Time(u32),
    Object(serde_json::Value),
}

impl ParamValue {
    /// The kind this value naturally belongs to.
    #[must_use]
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Uuid(_) => ParamKind::Uuid,
            Self::String(_) => ParamKind::String,
            Self::StringList(_) => ParamKind::StringList,
            Self::Int(_) => ParamKind::Int,
            Self::Uint(_) => ParamKind::Uint,
            Self::Double(_) => ParamKind::Double,
            Self::Bool(_) => ParamKind::Bool,
            Self::Color(_) => ParamKind::Color,
            Self::Time(_) => ParamKind::Time,
            Self::Object(_) => ParamKind::Object,
        }
    }

    /// Whether this value is acceptable for a slot of the given kind.
    ///
    /// `Variant` slots accept everything. Integers are accepted across the
    /// signed/unsigned boundary when the value fits, and any integer is
    /// acceptable where a `Double` is expected.
    #[must_use]
    pub fn matches_kind(&self, kind: ParamKind) -> bool {
        if kind == ParamKind::Variant {
            return true;
        }
        match (self, kind) {
            (Self::Int(v), ParamKind::Uint) => *v >= 0,
            (Self::Uint(v), ParamKind::Int) => i64::try_from(*v).is_ok(),
            (Self::Int(_) | Self::Uint(_), ParamKind::Double) => true,
            _ => self.kind() == kind,
        }
    }

    /// The value on the shared numeric axis, if it is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Uint(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// A named typed parameter slot with optional constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamType {
    pub name: String,
    pub kind: ParamKind,
    pub min_value: Option<ParamValue>,
    pub max_value: Option<ParamValue>,
    pub allowed_values: Vec<ParamValue>,
    pub default_value: Option<ParamValue>,
}

impl ParamType {
    /// Create an unconstrained slot of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min_value: None,
            max_value: None,
            allowed_values: Vec::new(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn min_value(mut self, value: ParamValue) -> Self {
        self.min_value = Some(value);
        self
    }

    #[must_use]
    pub fn max_value(mut self, value: ParamValue) -> Self {
        self.max_value = Some(value);
        self
    }

    #[must_use]
    pub fn allowed_values(mut self, values: Vec<ParamValue>) -> Self {
        self.allowed_values = values;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: ParamValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A concrete `(name, value)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Look up a param value by name in a list.
#[must_use]
pub fn param_value<'a>(params: &'a [Param], name: &str) -> Option<&'a ParamValue> {
    params.iter().find(|p| p.name == name).map(|p| &p.value)
}

/// Verify a single param against its governing type.
///
/// # Errors
///
/// Returns [`DeviceError::InvalidParameter`] when the name does not match,
/// the value kind is not acceptable, a numeric bound is violated, or the
/// value is not among the allowed values.
pub fn verify_param(param_type: &ParamType, param: &Param) -> Result<(), DeviceError> {
    if param_type.name != param.name {
        return Err(DeviceError::InvalidParameter);
    }
    if !param.value.matches_kind(param_type.kind) {
        return Err(DeviceError::InvalidParameter);
    }
    if let (Some(value), Some(max)) = (param.value.as_f64(), bound(&param_type.max_value)) {
        if value > max {
            return Err(DeviceError::InvalidParameter);
        }
    }
    if let (Some(value), Some(min)) = (param.value.as_f64(), bound(&param_type.min_value)) {
        if value < min {
            return Err(DeviceError::InvalidParameter);
        }
    }
    if !param_type.allowed_values.is_empty()
        && !param_type.allowed_values.contains(&param.value)
    {
        return Err(DeviceError::InvalidParameter);
    }
    Ok(())
}

fn bound(value: &Option<ParamValue>) -> Option<f64> {
    value.as_ref().and_then(ParamValue::as_f64)
}

/// Verify a param list against its governing types, filling in defaults.
///
/// Each supplied param must name exactly one type and satisfy its
/// constraints. With `require_all`, every type absent from the list must
/// carry a default (which is appended) or the whole verification fails.
/// The first violation is reported; no partial repair is made. The returned
/// list is the final, persisted form, and re-verifying it is a no-op.
///
/// # Errors
///
/// Returns [`DeviceError::InvalidParameter`] for an unknown name or a
/// constraint violation, and [`DeviceError::MissingParameter`] when
/// `require_all` finds an absent type without a default.
pub fn verify_params(
    param_types: &[ParamType],
    params: &[Param],
    require_all: bool,
) -> Result<Vec<Param>, DeviceError> {
    for param in params {
        let param_type = param_types
            .iter()
            .find(|t| t.name == param.name)
            .ok_or(DeviceError::InvalidParameter)?;
        verify_param(param_type, param)?;
    }

    let mut filled = params.to_vec();
    if !require_all {
        return Ok(filled);
    }

    for param_type in param_types {
        if params.iter().any(|p| p.name == param_type.name) {
            continue;
        }
        match &param_type.default_value {
            Some(default) => filled.push(Param::new(param_type.name.clone(), default.clone())),
            None => return Err(DeviceError::MissingParameter),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_and_port_types() -> Vec<ParamType> {
        vec![
            ParamType::new("host", ParamKind::String),
            ParamType::new("port", ParamKind::Int).default_value(ParamValue::Int(80)),
        ]
    }

    #[test]
    fn should_accept_matching_param() {
        let param_type = ParamType::new("host", ParamKind::String);
        let param = Param::new("host", ParamValue::String("10.0.0.5".into()));
        assert!(verify_param(&param_type, &param).is_ok());
    }

    #[test]
    fn should_reject_param_with_wrong_kind() {
        let param_type = ParamType::new("host", ParamKind::String);
        let param = Param::new("host", ParamValue::Int(5));
        assert_eq!(
            verify_param(&param_type, &param),
            Err(DeviceError::InvalidParameter)
        );
    }

    #[test]
    fn should_reject_param_with_mismatching_name() {
        let param_type = ParamType::new("host", ParamKind::String);
        let param = Param::new("address", ParamValue::String("x".into()));
        assert_eq!(
            verify_param(&param_type, &param),
            Err(DeviceError::InvalidParameter)
        );
    }

    #[test]
    fn should_accept_int_where_double_expected() {
        let param_type = ParamType::new("level", ParamKind::Double);
        let param = Param::new("level", ParamValue::Int(3));
        assert!(verify_param(&param_type, &param).is_ok());
    }

    #[test]
    fn should_reject_negative_int_where_uint_expected() {
        let param_type = ParamType::new("count", ParamKind::Uint);
        let param = Param::new("count", ParamValue::Int(-1));
        assert_eq!(
            verify_param(&param_type, &param),
            Err(DeviceError::InvalidParameter)
        );
    }

    #[test]
    fn should_enforce_numeric_range() {
        let param_type = ParamType::new("level", ParamKind::Int)
            .min_value(ParamValue::Int(0))
            .max_value(ParamValue::Int(100));

        let ok = Param::new("level", ParamValue::Int(50));
        assert!(verify_param(&param_type, &ok).is_ok());

        let too_high = Param::new("level", ParamValue::Int(150));
        assert_eq!(
            verify_param(&param_type, &too_high),
            Err(DeviceError::InvalidParameter)
        );

        let too_low = Param::new("level", ParamValue::Int(-3));
        assert_eq!(
            verify_param(&param_type, &too_low),
            Err(DeviceError::InvalidParameter)
        );
    }

    #[test]
    fn should_enforce_allowed_values() {
        let param_type = ParamType::new("mode", ParamKind::String).allowed_values(vec![
            ParamValue::String("eco".into()),
            ParamValue::String("boost".into()),
        ]);

        let ok = Param::new("mode", ParamValue::String("eco".into()));
        assert!(verify_param(&param_type, &ok).is_ok());

        let bad = Param::new("mode", ParamValue::String("turbo".into()));
        assert_eq!(
            verify_param(&param_type, &bad),
            Err(DeviceError::InvalidParameter)
        );
    }

    #[test]
    fn should_accept_anything_for_variant_slot() {
        let param_type = ParamType::new("value", ParamKind::Variant);
        assert!(verify_param(&param_type, &Param::new("value", ParamValue::Bool(true))).is_ok());
        assert!(verify_param(
            &param_type,
            &Param::new("value", ParamValue::String("x".into()))
        )
        .is_ok());
    }

    #[test]
    fn should_fill_default_when_param_absent() {
        let filled = verify_params(
            &host_and_port_types(),
            &[Param::new("host", ParamValue::String("10.0.0.5".into()))],
            true,
        )
        .unwrap();

        assert_eq!(filled.len(), 2);
        assert_eq!(
            param_value(&filled, "host"),
            Some(&ParamValue::String("10.0.0.5".into()))
        );
        assert_eq!(param_value(&filled, "port"), Some(&ParamValue::Int(80)));
    }

    #[test]
    fn should_not_duplicate_default_when_param_supplied() {
        let filled = verify_params(
            &host_and_port_types(),
            &[
                Param::new("host", ParamValue::String("10.0.0.5".into())),
                Param::new("port", ParamValue::Int(8080)),
            ],
            true,
        )
        .unwrap();

        assert_eq!(filled.len(), 2);
        assert_eq!(param_value(&filled, "port"), Some(&ParamValue::Int(8080)));
    }

    #[test]
    fn should_report_missing_parameter_without_default() {
        let result = verify_params(&host_and_port_types(), &[], true);
        assert_eq!(result, Err(DeviceError::MissingParameter));
    }

    #[test]
    fn should_not_require_absent_params_when_require_all_is_false() {
        let filled = verify_params(&host_and_port_types(), &[], false).unwrap();
        assert!(filled.is_empty());
    }

    #[test]
    fn should_reject_unknown_param_name() {
        let result = verify_params(
            &host_and_port_types(),
            &[Param::new("username", ParamValue::String("x".into()))],
            true,
        );
        assert_eq!(result, Err(DeviceError::InvalidParameter));
    }

    #[test]
    fn should_be_idempotent_on_own_output() {
        let types = host_and_port_types();
        let once = verify_params(
            &types,
            &[Param::new("host", ParamValue::String("10.0.0.5".into()))],
            true,
        )
        .unwrap();
        let twice = verify_params(&types, &once, true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn should_roundtrip_param_value_through_serde_json_preserving_kind() {
        let values = [
            ParamValue::Uuid(uuid::Uuid::new_v4()),
            ParamValue::String("hello".into()),
            ParamValue::StringList(vec!["a".into(), "b".into()]),
            ParamValue::Int(-7),
            ParamValue::Uint(7),
            ParamValue::Double(2.5),
            ParamValue::Bool(true),
            ParamValue::Color(Color {
                red: 255,
                green: 128,
                blue: 0,
            }),
            ParamValue::Time(3600),
            ParamValue::Object(serde_json::json!({"nested": 1})),
        ];

        for value in &values {
            let json = serde_json::to_string(value).unwrap();
            let parsed: ParamValue = serde_json::from_str(&json).unwrap();
            assert_eq!(&parsed, value);
            assert_eq!(parsed.kind(), value.kind());
        }
    }
}
