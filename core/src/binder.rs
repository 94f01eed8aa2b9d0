#![deny(missing_docs)]

//! # Parameter Binder
//!
//! Reads path, query, header and cookie values into the typed input.
//!
//! [`InputSpec::collect`] inspects the input descriptor once, at
//! registration, and fixes for each parameter its wire name, conversion,
//! default and schema. [`bind`] then runs per request. It converts every
//! parameter in declaration order and validates converted values against the
//! field constraints. Failures are appended to the shared result and never
//! stop the remaining parameters.

use crate::context::Context;
use crate::descriptor::{FieldDescriptor, FieldLocation, ParamSource, Shape};
use crate::error::{AppError, AppResult};
use crate::errors::{ErrorDetail, ValidateResult};
use crate::operation::{Operation, Parameter};
use crate::path::PathBuffer;
use crate::registry::{is_required, Registry};
use crate::schema::{number_value, Schema};
use crate::validate::{validate, Mode};
use crate::TypeDescriptor;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How a raw parameter string becomes a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// `true`/`false` and the usual short forms.
    Boolean,
    /// Whole numbers.
    Integer,
    /// Any number.
    Number,
    /// Used as is.
    Text,
    /// A timestamp, RFC 3339 unless a strftime format is given.
    DateTime(Option<&'static str>),
    /// A calendar date, `%Y-%m-%d` unless a strftime format is given.
    Date(Option<&'static str>),
    /// A list of converted items.
    List(Box<Conversion>),
}

/// One bindable parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Serde key of the input field.
    pub key: &'static str,
    /// Where the value is read from.
    pub source: ParamSource,
    /// Wire name.
    pub name: &'static str,
    /// Conversion from the raw string.
    pub conversion: Conversion,
    /// An absent value is an error.
    pub required: bool,
    /// Value used when the request omits the parameter.
    pub default: Option<Value>,
    /// Lists come from repeated occurrences instead of comma splitting.
    pub explode: bool,
    /// Constraints checked after conversion.
    pub schema: Schema,
}

/// The request body slot of an input.
#[derive(Debug, Clone)]
pub struct BodySpec {
    /// Serde key of the input field.
    pub key: &'static str,
    /// An empty body is an error.
    pub required: bool,
    /// Schema the decoded body is validated against.
    pub schema: Arc<Schema>,
}

/// Everything the binder needs to know about one input type.
#[derive(Debug, Clone, Default)]
pub struct InputSpec {
    /// Parameters in declaration order.
    pub params: Vec<ParamSpec>,
    /// The body, if declared.
    pub body: Option<BodySpec>,
}

impl InputSpec {
    /// Derives the binding plan for `input`, registering the schemas it uses.
    ///
    /// `hint` names anonymous body types.
    pub fn collect(
        registry: &Registry,
        input: &TypeDescriptor,
        op: &Operation,
        hint: &str,
    ) -> AppResult<Self> {
        let mut spec = InputSpec::default();
        match &input.shape {
            Shape::Record(record) => spec.add_fields(registry, &record.fields, hint)?,
            Shape::Null => {}
            _ => {
                return Err(AppError::Registration(format!(
                    "input type {} must be a record",
                    input.type_name
                )))
            }
        }

        let template = op.path_params();
        for param in spec.params.iter().filter(|p| p.source == ParamSource::Path) {
            if !template.contains(&param.name) {
                return Err(AppError::Registration(format!(
                    "path parameter '{}' is not part of path {}",
                    param.name, op.path
                )));
            }
        }
        Ok(spec)
    }

    fn add_fields(
        &mut self,
        registry: &Registry,
        fields: &[FieldDescriptor],
        hint: &str,
    ) -> AppResult<()> {
        for field in fields {
            match field.location {
                FieldLocation::Param(source, name) => {
                    let param = param_spec(registry, field, source, name, hint)?;
                    self.params.push(param);
                }
                FieldLocation::Body => {
                    if self.body.is_some() {
                        return Err(AppError::Registration(format!(
                            "input declares more than one body ('{}')",
                            field.ident
                        )));
                    }
                    let ty = (field.ty)();
                    self.body = Some(BodySpec {
                        key: field.key,
                        required: is_required(&ty, &field.meta),
                        schema: Arc::new(registry.field_schema(field, hint)?),
                    });
                }
                FieldLocation::Flatten => {
                    let embedded = (field.ty)().unwrap_optional();
                    let Shape::Record(record) = &embedded.shape else {
                        return Err(AppError::Registration(format!(
                            "field '{}' is flattened but {} is not a record",
                            field.ident, embedded.type_name
                        )));
                    };
                    self.add_fields(registry, &record.fields, hint)?;
                }
                FieldLocation::Property | FieldLocation::Status => {}
            }
        }
        Ok(())
    }

    /// The parameters in the shape stored on [`Operation`].
    pub fn parameters(&self) -> Vec<Parameter> {
        self.params
            .iter()
            .map(|p| Parameter {
                name: p.name.to_string(),
                source: p.source,
                required: p.required,
                schema: p.schema.clone(),
            })
            .collect()
    }
}

fn param_spec(
    registry: &Registry,
    field: &FieldDescriptor,
    source: ParamSource,
    name: &'static str,
    hint: &str,
) -> AppResult<ParamSpec> {
    let ty = (field.ty)();
    let conversion = conversion_for(&ty, field.meta.time_format).ok_or_else(|| {
        AppError::Registration(format!(
            "parameter '{}' has unsupported type {}",
            name, ty.type_name
        ))
    })?;

    // Defaults are written the way clients send them, so they go through the
    // parameter conversion rather than the JSON literal parser.
    let mut plain = field.clone();
    plain.meta.default = None;
    let mut schema = registry.field_schema(&plain, hint)?;
    let default = match field.meta.default {
        Some(raw) => {
            let value = convert_all(&conversion, &[raw], false).map_err(|(message, _)| {
                AppError::Registration(format!(
                    "parameter '{}': default '{}': {}",
                    name, raw, message
                ))
            })?;
            schema.default = Some(value.clone());
            Some(value)
        }
        None => None,
    };

    let required = match source {
        ParamSource::Path => true,
        _ => default.is_none() && is_required(&ty, &field.meta),
    };

    Ok(ParamSpec {
        key: field.key,
        source,
        name,
        conversion,
        required,
        default,
        explode: field.meta.explode,
        schema,
    })
}

fn conversion_for(ty: &TypeDescriptor, time_format: Option<&'static str>) -> Option<Conversion> {
    let conversion = match ty.unwrap_optional().shape {
        Shape::Boolean => Conversion::Boolean,
        Shape::Integer { .. } => Conversion::Integer,
        Shape::Number { .. } => Conversion::Number,
        Shape::String {
            format: Some("date-time"),
        } => Conversion::DateTime(time_format),
        Shape::String {
            format: Some("date"),
        } => Conversion::Date(time_format),
        Shape::String { .. } | Shape::Enum(_) => Conversion::Text,
        Shape::Array { items, .. } => match conversion_for(&items(), time_format)? {
            Conversion::List(_) => return None,
            inner => Conversion::List(Box::new(inner)),
        },
        _ => return None,
    };
    Some(conversion)
}

/// Binds every parameter of `spec`, returning the converted values keyed by
/// serde field key.
pub fn bind(
    spec: &InputSpec,
    registry: &Registry,
    ctx: &dyn Context,
    path: &mut PathBuffer,
    result: &mut ValidateResult,
) -> Map<String, Value> {
    let mut out = Map::new();
    for param in &spec.params {
        let location = format!("{}.{}", param.source, param.name);
        let raws: Vec<&str> = read_raw(param, ctx)
            .into_iter()
            .filter(|raw| !raw.is_empty())
            .collect();

        if raws.is_empty() {
            if let Some(default) = &param.default {
                out.insert(param.key.to_string(), default.clone());
            } else if param.required {
                result.add_absent(
                    location,
                    format!("required {} parameter is missing", param.source),
                );
            }
            continue;
        }

        match convert_all(&param.conversion, &raws, param.explode) {
            Ok(value) => {
                path.push(param.source.as_str());
                path.push(param.name);
                validate(registry, &param.schema, path, Mode::WriteToServer, &value, result);
                path.pop();
                path.pop();
                out.insert(param.key.to_string(), value);
            }
            Err((message, raw)) => {
                result.push(
                    ErrorDetail::new(message)
                        .with_location(location)
                        .with_value(raw),
                );
            }
        }
    }
    out
}

fn read_raw<'c>(param: &ParamSpec, ctx: &'c dyn Context) -> Vec<&'c str> {
    match param.source {
        ParamSource::Path => ctx.param(param.name).into_iter().collect(),
        ParamSource::Query if param.explode => ctx.query_all(param.name),
        ParamSource::Query => ctx.query(param.name).into_iter().collect(),
        ParamSource::Header => ctx.header(param.name).into_iter().collect(),
        ParamSource::Cookie => ctx.cookie(param.name).into_iter().collect(),
    }
}

/// Converts the raw occurrences of one parameter. On failure returns the
/// message and the offending raw string.
fn convert_all(
    conversion: &Conversion,
    raws: &[&str],
    explode: bool,
) -> Result<Value, (String, String)> {
    let Conversion::List(item) = conversion else {
        return convert(conversion, raws[0]).map_err(|m| (m, raws[0].to_string()));
    };
    let parts: Vec<&str> = if explode {
        raws.to_vec()
    } else {
        raws[0].split(',').map(str::trim).collect()
    };
    parts
        .into_iter()
        .map(|part| convert(item, part).map_err(|m| (m, part.to_string())))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn convert(conversion: &Conversion, raw: &str) -> Result<Value, String> {
    match conversion {
        Conversion::Boolean => match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
            _ => Err("invalid boolean".to_string()),
        },
        Conversion::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .map_err(|_| "invalid integer".to_string()),
        Conversion::Number => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(number_value(n)),
            _ => Err("invalid number".to_string()),
        },
        Conversion::Text => Ok(Value::String(raw.to_string())),
        Conversion::DateTime(format) => parse_datetime(raw, *format)
            .map(Value::String)
            .ok_or_else(|| {
                format!(
                    "invalid date/time for format {}",
                    format.unwrap_or("RFC 3339")
                )
            }),
        Conversion::Date(format) => {
            let format = format.unwrap_or(DATE_FORMAT);
            NaiveDate::parse_from_str(raw, format)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .map_err(|_| format!("invalid date for format {}", format))
        }
        Conversion::List(_) => Err("nested lists are not supported".to_string()),
    }
}

/// Parses `raw` into an RFC 3339 string. Custom formats without an offset are
/// read as UTC; date-only formats resolve to midnight.
fn parse_datetime(raw: &str, format: Option<&str>) -> Option<String> {
    let Some(format) = format else {
        return DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.to_rfc3339());
    };
    if let Ok(dt) = DateTime::parse_from_str(raw, format) {
        return Some(dt.to_rfc3339());
    }
    let naive = NaiveDateTime::parse_from_str(raw, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(Utc.from_utc_datetime(&naive).to_rfc3339())
}
