//! Tool parameter schemas and argument validation
//!
//! A [`ToolSpec`] carries an ordered list of [`ParamSpec`]s. The spec is
//! rendered to a JSON Schema object for the model, and the same schema is used
//! to validate incoming arguments after coercion and default filling.

use super::ToolError;
use jsonschema::Validator;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Primitive parameter types understood by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    StringArray,
}

impl ParamType {
    fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::StringArray => "array",
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub allowed: Vec<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl ParamSpec {
    fn new(name: &str, param_type: ParamType, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required,
            default: None,
            allowed: Vec::new(),
            minimum: None,
            maximum: None,
        }
    }

    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self::new(name, param_type, description, true)
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self::new(name, param_type, description, false)
    }

    /// Value used when the argument is absent or null
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    /// JSON Schema fragment for this parameter
    fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.param_type.json_type()));
        if !self.description.is_empty() {
            schema.insert("description".to_string(), json!(self.description));
        }
        if self.param_type == ParamType::StringArray {
            schema.insert("items".to_string(), json!({"type": "string"}));
        }
        if !self.allowed.is_empty() {
            schema.insert("enum".to_string(), json!(self.allowed));
        }
        if let Some(minimum) = self.minimum {
            schema.insert("minimum".to_string(), number_value(minimum, self.param_type));
        }
        if let Some(maximum) = self.maximum {
            schema.insert("maximum".to_string(), number_value(maximum, self.param_type));
        }
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }
        Value::Object(schema)
    }
}

fn number_value(value: f64, param_type: ParamType) -> Value {
    if param_type == ParamType::Integer {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Lazily compiled validator for a spec's JSON Schema
#[derive(Clone, Default)]
struct CompiledSchema(OnceCell<Arc<Validator>>);

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.get().is_some() { "compiled" } else { "pending" };
        f.debug_tuple("CompiledSchema").field(&state).finish()
    }
}

// Derived from the parameters, so it never affects equality
impl PartialEq for CompiledSchema {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Tool name, description and ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    compiled: CompiledSchema,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            compiled: CompiledSchema::default(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self.compiled = CompiledSchema::default();
        self
    }

    /// Compiled JSON Schema validator, built on first use and reused after
    pub fn validator(&self) -> Result<&Validator, ToolError> {
        self.compiled
            .0
            .get_or_try_init(|| {
                jsonschema::validator_for(&self.json_schema())
                    .map(Arc::new)
                    .map_err(|e| ToolError::Validation(format!("Schema compilation error: {e}")))
            })
            .map(Arc::as_ref)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Render the parameter list as a JSON Schema object
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

/// Validate raw arguments against a spec
///
/// Null values count as absent. Present values are coerced to the declared
/// type, absent ones take their default, and the result is checked against
/// the rendered JSON Schema. The returned map contains only declared keys.
pub fn validate_arguments(spec: &ToolSpec, arguments: &Value) -> Result<Map<String, Value>, ToolError> {
    let empty = Map::new();
    let provided = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::Validation(format!(
                "Arguments for '{}' must be a JSON object, got {}",
                spec.name,
                type_name(other)
            )))
        }
    };

    if let Some(unknown) = provided.keys().find(|k| spec.parameter(k).is_none()) {
        return Err(ToolError::Validation(format!(
            "Unknown parameter '{unknown}' for tool '{}'",
            spec.name
        )));
    }

    let mut normalized = Map::new();
    for param in &spec.parameters {
        match provided.get(&param.name).filter(|v| !v.is_null()) {
            Some(value) => {
                normalized.insert(param.name.clone(), coerce_value(param, value)?);
            }
            None => match &param.default {
                Some(default) => {
                    normalized.insert(param.name.clone(), default.clone());
                }
                None if param.required => {
                    return Err(ToolError::Validation(format!(
                        "Missing required parameter '{}'",
                        param.name
                    )));
                }
                None => {}
            },
        }
    }

    let validator = spec.validator()?;
    let instance = Value::Object(normalized);
    if let Err(errors) = validator.validate(&instance) {
        let error_messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        return Err(ToolError::Validation(error_messages.join("; ")));
    }

    match instance {
        Value::Object(map) => Ok(map),
        other => Err(ToolError::Validation(format!(
            "Arguments must be an object, got {other}"
        ))),
    }
}

/// Deserialize validated arguments into a tool's parameter struct
pub fn parse_params<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ToolError::Validation(format!("Invalid arguments: {e}")))
}

/// Coerce a provided value to the declared type (pure function)
fn coerce_value(param: &ParamSpec, value: &Value) -> Result<Value, ToolError> {
    let mismatch = || {
        ToolError::Validation(format!(
            "Parameter '{}' expected {}, got {}",
            param.name,
            param.param_type.json_type(),
            type_name(value)
        ))
    };

    match param.param_type {
        ParamType::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(json!(n.to_string())),
            Value::Bool(b) => Ok(json!(b.to_string())),
            _ => Err(mismatch()),
        },
        ParamType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(json!(f as i64)),
                _ => Err(mismatch()),
            },
            Value::String(s) => s.trim().parse::<i64>().map(|i| json!(i)).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| json!(f))
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(json!(true)),
                "false" => Ok(json!(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamType::StringArray => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => Ok(value.clone()),
            Value::String(s) => Ok(json!(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>())),
            _ => Err(mismatch()),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_spec() -> ToolSpec {
        ToolSpec::new("search", "Search things")
            .param(ParamSpec::required("query", ParamType::String, "Search query"))
            .param(
                ParamSpec::optional("num_results", ParamType::Integer, "How many")
                    .with_default(json!(10))
                    .range(1.0, 100.0),
            )
            .param(
                ParamSpec::optional("sort_by", ParamType::String, "Order")
                    .with_default(json!("relevance"))
                    .one_of(&["relevance", "date"]),
            )
            .param(ParamSpec::optional("include_news", ParamType::Boolean, ""))
            .param(ParamSpec::optional("airlines", ParamType::StringArray, ""))
    }

    #[test]
    fn test_validator_is_compiled_once() {
        let spec = search_spec();
        let first = spec.validator().unwrap() as *const Validator;

        validate_arguments(&spec, &json!({"query": "rust"})).unwrap();
        validate_arguments(&spec, &json!({"query": "tokio", "num_results": 3})).unwrap();

        assert!(std::ptr::eq(first, spec.validator().unwrap()));
        assert!(format!("{spec:?}").contains("compiled"));
    }

    #[test]
    fn test_adding_a_param_recompiles() {
        let spec = search_spec();
        spec.validator().unwrap();

        let spec = spec.param(ParamSpec::optional("page", ParamType::Integer, "Result page"));
        let args = validate_arguments(&spec, &json!({"query": "x", "page": 2})).unwrap();
        assert_eq!(args["page"], 2);
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = search_spec().json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["num_results"]["type"], "integer");
        assert_eq!(schema["properties"]["num_results"]["minimum"], 1);
        assert_eq!(schema["properties"]["num_results"]["default"], 10);
        assert_eq!(schema["properties"]["sort_by"]["enum"], json!(["relevance", "date"]));
        assert_eq!(schema["properties"]["airlines"]["items"]["type"], "string");
        assert!(schema["properties"]["include_news"].get("description").is_none());
    }

    #[test]
    fn test_defaults_are_filled() {
        let args = validate_arguments(&search_spec(), &json!({"query": "rust"})).unwrap();

        assert_eq!(args["query"], "rust");
        assert_eq!(args["num_results"], 10);
        assert_eq!(args["sort_by"], "relevance");
        assert!(!args.contains_key("include_news"));
    }

    #[test]
    fn test_missing_required_parameter() {
        let result = validate_arguments(&search_spec(), &json!({"num_results": 5}));
        match result {
            Err(ToolError::Validation(msg)) => assert!(msg.contains("query")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_null_counts_as_absent() {
        let args =
            validate_arguments(&search_spec(), &json!({"query": "x", "sort_by": null})).unwrap();
        assert_eq!(args["sort_by"], "relevance");

        let result = validate_arguments(&search_spec(), &json!({"query": null}));
        assert!(matches!(result, Err(ToolError::Validation(_))));
    }

    #[test]
    fn test_string_encoded_values_are_coerced() {
        let args = validate_arguments(
            &search_spec(),
            &json!({"query": 42, "num_results": "7", "include_news": "TRUE", "airlines": "UA, DL"}),
        )
        .unwrap();

        assert_eq!(args["query"], "42");
        assert_eq!(args["num_results"], 7);
        assert_eq!(args["include_news"], true);
        assert_eq!(args["airlines"], json!(["UA", "DL"]));
    }

    #[test]
    fn test_whole_float_coerces_to_integer() {
        let args =
            validate_arguments(&search_spec(), &json!({"query": "x", "num_results": 5.0})).unwrap();
        assert_eq!(args["num_results"], 5);

        let result = validate_arguments(&search_spec(), &json!({"query": "x", "num_results": 5.5}));
        assert!(matches!(result, Err(ToolError::Validation(_))));
    }

    #[test]
    fn test_enum_and_range_violations() {
        let result =
            validate_arguments(&search_spec(), &json!({"query": "x", "sort_by": "popularity"}));
        assert!(matches!(result, Err(ToolError::Validation(_))));

        let result =
            validate_arguments(&search_spec(), &json!({"query": "x", "num_results": 500}));
        match result {
            Err(ToolError::Validation(msg)) => assert!(msg.contains("num_results")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let result = validate_arguments(&search_spec(), &json!({"query": "x", "page": 2}));
        match result {
            Err(ToolError::Validation(msg)) => assert!(msg.contains("page")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let result = validate_arguments(&search_spec(), &json!(["query"]));
        assert!(matches!(result, Err(ToolError::Validation(_))));
    }

    #[test]
    fn test_parse_params_into_struct() {
        #[derive(serde::Deserialize)]
        struct Params {
            query: String,
            num_results: u32,
        }

        let args = validate_arguments(&search_spec(), &json!({"query": "rust"})).unwrap();
        let params: Params = parse_params(args).unwrap();
        assert_eq!(params.query, "rust");
        assert_eq!(params.num_results, 10);
    }
}
