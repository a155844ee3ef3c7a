//! # Contract Parameter Validation
//!
//! [`ParamChecker`] holds the contract metadata published by the platform and
//! checks method inputs against it before a transaction is submitted.
//!
//! Type strings follow Solidity: `uint256`, `address[]`, `struct Person[2][]`.
//! Array dimensions are read innermost-last, so `T[][2]` is a fixed pair of
//! dynamic arrays. A dimension of `0` means dynamically sized.

use core_auth::Login;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::context::SimbaContext;
use crate::error::Result;
use crate::filter::QueryParams;
use crate::paths::ApiPath;
use crate::request::{RequestOptions, SimbaRequest};

const BUNDLE_HASH: &str = "_bundleHash";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Unknown contract method: {0}")]
    UnknownMethod(String),

    #[error("Missing value for parameter: {0}")]
    MissingParam(String),

    #[error("Expected a list for key: {key} and an array of type: {data_type}")]
    ExpectedArray { key: String, data_type: String },

    #[error("Unexpected length for key: {key}. Expected {expected} but got {actual}")]
    LengthMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected an object for struct key: {key} of type: {data_type}")]
    ExpectedObject { key: String, data_type: String },

    #[error("Unknown struct type: {0}")]
    UnknownType(String),

    #[error("Values cannot be null for key: {key} and data type {data_type}")]
    NullValue { key: String, data_type: String },

    #[error("Expected boolean for key: {0}")]
    ExpectedBool(String),

    #[error("Expected int or string for key: {key} but got {value}")]
    ExpectedInteger { key: String, value: String },

    #[error("Expected non negative int but got {value} for key: {key}")]
    Negative { key: String, value: String },

    #[error("Expected string to be hex encoded but got {value} for key: {key}")]
    NotHex { key: String, value: String },

    #[error("Expected string for key: {key} but got {value}")]
    ExpectedString { key: String, value: String },

    #[error("Invalid contract metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid type declaration: {0}")]
    InvalidType(String),
}

type ParamResult<T> = std::result::Result<T, ParamError>;

/// A parsed type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub base: String,
    pub is_struct: bool,
    /// Outermost dimension first
    pub dimensions: Vec<usize>,
}

/// Split a declaration such as `struct Addr[2][]` into its parts.
pub fn parse_type(declaration: &str) -> ParamResult<TypeInfo> {
    let (is_struct, rest) = match declaration.strip_prefix("struct ") {
        Some(rest) => (true, rest),
        None => (false, declaration),
    };

    let Some(open) = rest.find('[').filter(|_| rest.ends_with(']')) else {
        return Ok(TypeInfo {
            base: rest.to_string(),
            is_struct,
            dimensions: Vec::new(),
        });
    };

    let mut dimensions = Vec::new();
    for dim in rest[open..].split('[').filter(|d| !d.is_empty()) {
        let size = dim
            .strip_suffix(']')
            .ok_or_else(|| ParamError::InvalidType(declaration.to_string()))?;
        let size = if size.is_empty() {
            0
        } else {
            size.parse::<usize>()
                .map_err(|_| ParamError::InvalidType(declaration.to_string()))?
        };
        dimensions.insert(0, size);
    }

    Ok(TypeInfo {
        base: rest[..open].to_string(),
        is_struct,
        dimensions,
    })
}

/// Validates method inputs against contract metadata.
#[derive(Debug, Clone)]
pub struct ParamChecker {
    metadata: Value,
}

impl ParamChecker {
    pub fn new(metadata: Value) -> Self {
        Self { metadata }
    }

    /// Fetch the metadata for `contract` in `app`.
    #[instrument(skip(ctx, login))]
    pub async fn fetch(
        ctx: &SimbaContext,
        app: &str,
        contract: &str,
        login: Option<Login>,
    ) -> Result<Self> {
        let response = Self::metadata_request(ctx, app, contract, login)?
            .send(RequestOptions::new())
            .await?;
        Self::from_response(response)
    }

    /// Blocking variant of [`fetch`](Self::fetch).
    #[instrument(skip(ctx, login))]
    pub fn fetch_blocking(
        ctx: &SimbaContext,
        app: &str,
        contract: &str,
        login: Option<Login>,
    ) -> Result<Self> {
        let response = Self::metadata_request(ctx, app, contract, login)?
            .send_blocking(RequestOptions::new())?;
        Self::from_response(response)
    }

    fn metadata_request<'a>(
        ctx: &'a SimbaContext,
        app: &str,
        contract: &str,
        login: Option<Login>,
    ) -> Result<SimbaRequest<'a>> {
        let mut query = QueryParams::new();
        query.insert("format".to_string(), "json".to_string());
        Ok(
            SimbaRequest::get(ctx, ApiPath::AppContract.create(&[app, contract])?)
                .with_query(query)
                .with_login(login),
        )
    }

    fn from_response(mut response: Value) -> Result<Self> {
        match response.get_mut("metadata").map(Value::take) {
            Some(metadata @ Value::Object(_)) => Ok(Self::new(metadata)),
            _ => Err(ParamError::InvalidMetadata(
                "response has no metadata object".to_string(),
            )
            .into()),
        }
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    fn contract(&self) -> &Value {
        &self.metadata["contract"]
    }

    /// Check `inputs` against the declared parameters of `method`.
    pub fn validate_params(&self, method: &str, inputs: &Map<String, Value>) -> ParamResult<()> {
        let params = self.contract()["methods"]
            .get(method)
            .filter(|m| !m.is_null())
            .ok_or_else(|| ParamError::UnknownMethod(method.to_string()))?
            .get("params");
        self.validate(inputs, params)
    }

    fn validate(&self, inputs: &Map<String, Value>, params: Option<&Value>) -> ParamResult<()> {
        let params = match params {
            Some(Value::Array(params)) => params,
            Some(Value::Null) | None => return Ok(()),
            Some(other) => {
                return Err(ParamError::InvalidMetadata(format!(
                    "params must be a list, got {}",
                    other
                )))
            }
        };

        for param in params {
            let name = param["name"].as_str().unwrap_or_default();
            if name == BUNDLE_HASH {
                continue;
            }
            let declaration = param["type"].as_str().ok_or_else(|| {
                ParamError::InvalidMetadata(format!("parameter {} has no type", name))
            })?;
            let input = inputs
                .get(name)
                .filter(|v| !v.is_null())
                .ok_or_else(|| ParamError::MissingParam(name.to_string()))?;

            let info = parse_type(declaration)?;
            self.validate_param(name, input, &info.base, info.is_struct, &info.dimensions)?;
        }
        Ok(())
    }

    fn validate_param(
        &self,
        key: &str,
        input: &Value,
        data_type: &str,
        is_struct: bool,
        dimensions: &[usize],
    ) -> ParamResult<()> {
        debug!(key, data_type, is_struct, ?dimensions, "Validating parameter");

        if let Some((&length, inner)) = dimensions.split_first() {
            let items = input.as_array().ok_or_else(|| ParamError::ExpectedArray {
                key: key.to_string(),
                data_type: data_type.to_string(),
            })?;
            if length > 0 && items.len() != length {
                return Err(ParamError::LengthMismatch {
                    key: key.to_string(),
                    expected: length,
                    actual: items.len(),
                });
            }
            return items
                .iter()
                .try_for_each(|item| self.validate_param(key, item, data_type, is_struct, inner));
        }

        if is_struct {
            let fields = input.as_object().ok_or_else(|| ParamError::ExpectedObject {
                key: key.to_string(),
                data_type: data_type.to_string(),
            })?;
            let components = self.metadata["contract"]["types"]
                .get(data_type)
                .ok_or_else(|| ParamError::UnknownType(data_type.to_string()))?
                .get("components");
            return self.validate(fields, components);
        }

        expect_scalar(key, data_type, input)
    }
}

fn expect_scalar(key: &str, data_type: &str, value: &Value) -> ParamResult<()> {
    if value.is_null() {
        return Err(ParamError::NullValue {
            key: key.to_string(),
            data_type: data_type.to_string(),
        });
    }

    if data_type.starts_with("bool") {
        if !value.is_boolean() {
            return Err(ParamError::ExpectedBool(key.to_string()));
        }
    } else if data_type.starts_with("uint") {
        expect_unsigned(key, value)?;
    } else if data_type.starts_with("int") {
        match value {
            Value::Number(n) if is_integral(n) => {}
            Value::String(s) => expect_hex(key, s)?,
            other => {
                return Err(ParamError::ExpectedInteger {
                    key: key.to_string(),
                    value: other.to_string(),
                })
            }
        }
    } else if data_type == "address" || data_type.starts_with("byte") || data_type.starts_with("sbyte")
    {
        let s = value.as_str().ok_or_else(|| ParamError::ExpectedString {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        expect_hex(key, s)?;
    }
    Ok(())
}

fn expect_unsigned(key: &str, value: &Value) -> ParamResult<()> {
    let negative = || ParamError::Negative {
        key: key.to_string(),
        value: value.to_string(),
    };
    let not_integer = || ParamError::ExpectedInteger {
        key: key.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Number(n) if n.is_u64() => Ok(()),
        Value::Number(n) if n.is_i64() => Err(negative()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f < 0.0 => Err(negative()),
            // uint256 values past u64::MAX arrive as floats
            Some(_) if is_integral(n) => Ok(()),
            _ => Err(not_integer()),
        },
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Ok(());
                }
                return Err(not_integer());
            }
            let digits = s.trim();
            match digits.strip_prefix('-') {
                Some(rest) if is_decimal(rest) => Err(negative()),
                Some(_) => Err(not_integer()),
                None if is_decimal(digits.strip_prefix('+').unwrap_or(digits)) => Ok(()),
                None => Err(not_integer()),
            }
        }
        _ => Err(not_integer()),
    }
}

fn is_integral(n: &Number) -> bool {
    n.is_u64()
        || n.is_i64()
        || n.as_f64()
            .is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn expect_hex(key: &str, value: &str) -> ParamResult<()> {
    if value.starts_with("0x") {
        Ok(())
    } else {
        Err(ParamError::NotHex {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, StubTransport};
    use serde_json::json;

    fn metadata() -> Value {
        json!({
            "contract": {
                "name": "my_api",
                "methods": {
                    "structTest_5": {
                        "params": [{"name": "person", "type": "struct Person"}]
                    },
                    "nested_arr_1": {
                        "params": [{"name": "first", "type": "uint256[][]"}]
                    },
                    "nested_arr_2": {
                        "params": [{"name": "first", "type": "uint256[][2]"}]
                    },
                    "fixed_people": {
                        "params": [{"name": "people", "type": "struct Person[2]"}]
                    },
                    "scalars": {
                        "params": [
                            {"name": "flag", "type": "bool"},
                            {"name": "delta", "type": "int256"},
                            {"name": "owner", "type": "address"},
                            {"name": "data", "type": "bytes32"},
                            {"name": "_bundleHash", "type": "string"}
                        ]
                    }
                },
                "types": {
                    "Person": {
                        "components": [
                            {"name": "name", "type": "string"},
                            {"name": "age", "type": "uint256"},
                            {"name": "addr", "type": "struct Addr"}
                        ]
                    },
                    "Addr": {
                        "components": [
                            {"name": "street", "type": "string"},
                            {"name": "number", "type": "uint256"},
                            {"name": "town", "type": "string"}
                        ]
                    }
                }
            }
        })
    }

    fn inputs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("inputs must be an object"),
        }
    }

    fn person(number: i64) -> Value {
        json!({
            "name": "The Laughing Gnome",
            "age": 32,
            "addr": {"street": "Happy Street", "number": number, "town": "Funsville"}
        })
    }

    #[test]
    fn test_parse_type_dimensions() {
        let info = parse_type("uint256").unwrap();
        assert_eq!(info.base, "uint256");
        assert!(info.dimensions.is_empty());

        let info = parse_type("struct Person[2][]").unwrap();
        assert!(info.is_struct);
        assert_eq!(info.base, "Person");
        assert_eq!(info.dimensions, vec![0, 2]);

        assert_eq!(parse_type("uint8[][4]").unwrap().dimensions, vec![4, 0]);
        assert!(matches!(
            parse_type("uint8[x]"),
            Err(ParamError::InvalidType(_))
        ));
    }

    #[test]
    fn test_nested_struct_rejects_negative_uint() {
        let checker = ParamChecker::new(metadata());
        checker
            .validate_params("structTest_5", &inputs(json!({"person": person(10)})))
            .unwrap();

        let err = checker
            .validate_params("structTest_5", &inputs(json!({"person": person(-10)})))
            .unwrap_err();
        assert!(err.to_string().contains("Expected non negative int but got -10"));
    }

    #[test]
    fn test_struct_given_list_is_rejected() {
        let checker = ParamChecker::new(metadata());
        let err = checker
            .validate_params("structTest_5", &inputs(json!({"person": [1, 2]})))
            .unwrap_err();
        assert!(matches!(err, ParamError::ExpectedObject { .. }));
    }

    #[test]
    fn test_array_dimensions() {
        let checker = ParamChecker::new(metadata());
        checker
            .validate_params(
                "nested_arr_1",
                &inputs(json!({"first": [[1, 2], [1, 2, 3, 4], [2], [], [1, 2, 3, 4, 5, 6, 7]]})),
            )
            .unwrap();
        checker
            .validate_params(
                "nested_arr_2",
                &inputs(json!({"first": [[1, 2, 3, 4], [1, 2, 3, 4]]})),
            )
            .unwrap();

        let err = checker
            .validate_params(
                "nested_arr_2",
                &inputs(json!({"first": [[1, 2], [1, 2], [3]]})),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ParamError::LengthMismatch {
                key: "first".to_string(),
                expected: 2,
                actual: 3,
            }
        );
        assert!(err.to_string().contains("Expected 2 but got 3"));

        let err = checker
            .validate_params("nested_arr_1", &inputs(json!({"first": 5})))
            .unwrap_err();
        assert!(matches!(err, ParamError::ExpectedArray { .. }));
    }

    #[test]
    fn test_fixed_struct_array() {
        let checker = ParamChecker::new(metadata());
        checker
            .validate_params(
                "fixed_people",
                &inputs(json!({"people": [person(1), person(2)]})),
            )
            .unwrap();

        let err = checker
            .validate_params("fixed_people", &inputs(json!({"people": [person(1)]})))
            .unwrap_err();
        assert!(matches!(err, ParamError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_scalar_rules() {
        let checker = ParamChecker::new(metadata());
        let valid = json!({"flag": false, "delta": "0x-1", "owner": "0xabc", "data": "0x00"});
        checker.validate_params("scalars", &inputs(valid)).unwrap();

        let cases = [
            (json!({"flag": "yes", "delta": -1, "owner": "0xabc", "data": "0x00"}), "ExpectedBool"),
            (json!({"flag": true, "delta": "12", "owner": "0xabc", "data": "0x00"}), "NotHex"),
            (json!({"flag": true, "delta": 1, "owner": 42, "data": "0x00"}), "ExpectedString"),
            (json!({"flag": true, "delta": 1, "owner": "0xabc", "data": "ff"}), "NotHex"),
            (json!({"flag": true, "delta": 1, "owner": "0xabc"}), "MissingParam"),
        ];
        for (input, expected) in cases {
            let err = checker.validate_params("scalars", &inputs(input)).unwrap_err();
            assert!(
                format!("{err:?}").starts_with(expected),
                "expected {expected}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_unsigned_strings() {
        assert!(expect_unsigned("n", &json!("42")).is_ok());
        assert!(expect_unsigned("n", &json!("0x2a")).is_ok());
        assert!(matches!(
            expect_unsigned("n", &json!("-3")),
            Err(ParamError::Negative { .. })
        ));
        assert!(matches!(
            expect_unsigned("n", &json!("four")),
            Err(ParamError::ExpectedInteger { .. })
        ));
        assert!(matches!(
            expect_unsigned("n", &json!(1.5)),
            Err(ParamError::ExpectedInteger { .. })
        ));
    }

    #[test]
    fn test_large_and_fractional_numbers() {
        let huge: Value = serde_json::from_str("100000000000000000000").unwrap();
        assert!(expect_scalar("number", "uint256", &huge).is_ok());
        assert!(expect_scalar("delta", "int256", &huge).is_ok());

        let fraction: Value = serde_json::from_str("1.5").unwrap();
        assert!(matches!(
            expect_scalar("delta", "int256", &fraction),
            Err(ParamError::ExpectedInteger { .. })
        ));
        assert!(expect_scalar("delta", "int256", &json!(-7)).is_ok());

        let huge_negative: Value = serde_json::from_str("-100000000000000000000").unwrap();
        assert!(matches!(
            expect_scalar("number", "uint256", &huge_negative),
            Err(ParamError::Negative { .. })
        ));

        let checker = ParamChecker::new(metadata());
        let big_addr = serde_json::from_str(
            r#"{"person": {"name": "n", "age": 1,
                "addr": {"street": "s", "number": 100000000000000000000, "town": "t"}}}"#,
        )
        .unwrap();
        checker
            .validate_params("structTest_5", &inputs(big_addr))
            .unwrap();
    }

    #[test]
    fn test_unknown_method() {
        let checker = ParamChecker::new(metadata());
        assert_eq!(
            checker.validate_params("nope", &Map::new()).unwrap_err(),
            ParamError::UnknownMethod("nope".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_reads_metadata() {
        let stub = StubTransport::new();
        let body = json!({"name": "my_api", "metadata": metadata()}).to_string();
        stub.route("/v2/apps/my_app/contract/my_api/", 200, &body);
        let ctx = context(&stub);

        let checker = ParamChecker::fetch(&ctx, "my_app", "my_api", None)
            .await
            .unwrap();
        assert!(checker.metadata()["contract"]["methods"]["structTest_5"].is_object());

        let sent = &stub.requests_to("/v2/apps/my_app/contract/my_api/")[0];
        assert!(sent.url.ends_with("?format=json"));
    }

    #[test]
    fn test_fetch_without_metadata_fails() {
        let stub = StubTransport::new();
        stub.route("/v2/apps/my_app/contract/my_api/", 200, r#"{"name":"my_api"}"#);
        let ctx = context(&stub);

        let err = ParamChecker::fetch_blocking(&ctx, "my_app", "my_api", None).unwrap_err();
        assert!(matches!(
            err,
            crate::error::SimbaError::Validation(ParamError::InvalidMetadata(_))
        ));
    }
}
