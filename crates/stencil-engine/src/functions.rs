//! Function registry and built-in template functions
//!
//! Functions receive their arguments as JSON values. In a pipeline the piped
//! value arrives as the last argument, so `{{ .Values.x | default "a" }}`
//! calls `default` with `["a", x]`.

use base64::Engine as _;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a template function
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct FunctionError {
    pub message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type FunctionResult = Result<JsonValue, FunctionError>;

/// Callable stored in the registry
pub type Function = Arc<dyn Fn(&[JsonValue]) -> FunctionResult + Send + Sync>;

/// A registered function
#[derive(Clone)]
pub struct Builtin {
    func: Function,
    accepts_missing: bool,
}

impl Builtin {
    pub fn call(&self, args: &[JsonValue]) -> FunctionResult {
        (self.func)(args)
    }

    /// Whether undefined values may be passed in strict mode
    ///
    /// Such functions see undefined arguments as `null`.
    pub fn accepts_missing(&self) -> bool {
        self.accepts_missing
    }
}

/// Name to function mapping used by the evaluator
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Builtin>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in function
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("toYaml", to_yaml);
        registry.register("toJson", to_json);
        registry.register("toPrettyJson", to_pretty_json);
        registry.register("indent", indent);
        registry.register("nindent", nindent);
        registry.register("quote", quote);
        registry.register("squote", squote);
        registry.register("upper", upper);
        registry.register("lower", lower);
        registry.register("trim", trim);
        registry.register("trimPrefix", trim_prefix);
        registry.register("trimSuffix", trim_suffix);
        registry.register("trunc", trunc);
        registry.register("replace", replace);
        registry.register("b64enc", b64enc);
        registry.register("b64dec", b64dec);
        registry.register("sha256sum", sha256sum);
        registry.register("printf", printf);
        registry.register("toString", to_string);

        registry.register_accepting_missing("default", default);
        registry.register_accepting_missing("required", required);
        registry.register_accepting_missing("empty", empty);
        registry.register_accepting_missing("coalesce", coalesce);

        registry
    }

    /// Register (or replace) a function
    pub fn register<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[JsonValue]) -> FunctionResult + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(func), false);
    }

    /// Register a function that receives undefined values as `null`
    pub fn register_accepting_missing<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[JsonValue]) -> FunctionResult + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(func), true);
    }

    fn insert(&mut self, name: &str, func: Function, accepts_missing: bool) {
        self.functions.insert(
            name.to_string(),
            Builtin {
                func,
                accepts_missing,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.functions.get(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Printed form of a value
///
/// Strings verbatim, numbers canonical, `null` as nothing, and
/// maps/lists as compact JSON.
pub fn print_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Emptiness as understood by `default`, `empty` and `coalesce`
pub fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
    }
}

fn expect_args(args: &[JsonValue], count: usize) -> Result<(), FunctionError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(FunctionError::new(format!(
            "expected {} argument{}, got {}",
            count,
            if count == 1 { "" } else { "s" },
            args.len()
        )))
    }
}

fn int_arg(value: &JsonValue) -> Result<i64, FunctionError> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| FunctionError::new(format!("expected an integer, got {}", n))),
        JsonValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| FunctionError::new(format!("expected an integer, got \"{}\"", s))),
        other => Err(FunctionError::new(format!(
            "expected an integer, got {}",
            print_value(other)
        ))),
    }
}

fn string_result(s: impl Into<String>) -> FunctionResult {
    Ok(JsonValue::String(s.into()))
}

/// Convert a value to a YAML block
///
/// Usage: {{ toYaml .Values.resources | nindent 12 }}
pub fn to_yaml(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    let yaml = serde_yaml::to_string(&args[0]).map_err(|e| FunctionError::new(e.to_string()))?;
    string_result(yaml.trim_start_matches("---\n").trim_end_matches('\n'))
}

/// Usage: {{ toJson .Values.labels }}
pub fn to_json(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    serde_json::to_string(&args[0])
        .map(JsonValue::String)
        .map_err(|e| FunctionError::new(e.to_string()))
}

/// Usage: {{ toPrettyJson .Values.config }}
pub fn to_pretty_json(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    serde_json::to_string_pretty(&args[0])
        .map(JsonValue::String)
        .map_err(|e| FunctionError::new(e.to_string()))
}

fn indent_lines(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Widest indentation `indent` and `nindent` accept
const MAX_INDENT: usize = 1024;

fn indent_width(value: &JsonValue) -> Result<usize, FunctionError> {
    let n = int_arg(value)?;
    let width = usize::try_from(n)
        .map_err(|_| FunctionError::new(format!("indent width must not be negative, got {}", n)))?;
    if width > MAX_INDENT {
        return Err(FunctionError::new(format!(
            "indent width must be at most {}, got {}",
            MAX_INDENT, width
        )));
    }
    Ok(width)
}

/// Indent every non-empty line
///
/// Usage: {{ .Values.script | indent 4 }}
pub fn indent(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 2)?;
    string_result(indent_lines(&print_value(&args[1]), indent_width(&args[0])?))
}

/// Newline followed by `indent`
///
/// Usage: {{ toYaml .Values.resources | nindent 12 }}
pub fn nindent(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 2)?;
    let indented = indent_lines(&print_value(&args[1]), indent_width(&args[0])?);
    string_result(format!("\n{}", indented))
}

/// Double-quote and escape a string
pub(crate) fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote each argument, skipping nulls, joined by spaces
///
/// Usage: {{ .Values.name | quote }}
pub fn quote(args: &[JsonValue]) -> FunctionResult {
    let quoted: Vec<String> = args
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| go_quote(&print_value(v)))
        .collect();
    string_result(quoted.join(" "))
}

/// Usage: {{ .Values.name | squote }}
pub fn squote(args: &[JsonValue]) -> FunctionResult {
    let quoted: Vec<String> = args
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| format!("'{}'", print_value(v)))
        .collect();
    string_result(quoted.join(" "))
}

/// The given value, or the fallback when it is empty or undefined
///
/// Usage: {{ .Values.image.pullPolicy | default "IfNotPresent" }}
pub fn default(args: &[JsonValue]) -> FunctionResult {
    match args {
        [fallback] => Ok(fallback.clone()),
        [fallback, given] => Ok(if is_empty(given) {
            fallback.clone()
        } else {
            given.clone()
        }),
        _ => Err(FunctionError::new(format!(
            "expected 1 or 2 arguments, got {}",
            args.len()
        ))),
    }
}

/// Fail rendering with `message` when the value is null or an empty string
///
/// Usage: {{ required "image.tag is required" .Values.image.tag }}
pub fn required(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 2)?;
    match &args[1] {
        JsonValue::Null => Err(FunctionError::new(print_value(&args[0]))),
        JsonValue::String(s) if s.is_empty() => Err(FunctionError::new(print_value(&args[0]))),
        value => Ok(value.clone()),
    }
}

/// Usage: {{ empty .Values.tolerations }}
pub fn empty(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    Ok(JsonValue::Bool(is_empty(&args[0])))
}

/// First non-empty argument, or null
///
/// Usage: {{ coalesce .Values.namespace .Release.Namespace "default" }}
pub fn coalesce(args: &[JsonValue]) -> FunctionResult {
    Ok(args
        .iter()
        .find(|v| !is_empty(v))
        .cloned()
        .unwrap_or(JsonValue::Null))
}

pub fn upper(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    string_result(print_value(&args[0]).to_uppercase())
}

pub fn lower(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    string_result(print_value(&args[0]).to_lowercase())
}

pub fn trim(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    string_result(print_value(&args[0]).trim())
}

/// Usage: {{ .Values.image.tag | trimPrefix "v" }}
pub fn trim_prefix(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 2)?;
    let prefix = print_value(&args[0]);
    let value = print_value(&args[1]);
    string_result(value.strip_prefix(prefix.as_str()).unwrap_or(&value))
}

/// Usage: {{ .Values.host | trimSuffix "." }}
pub fn trim_suffix(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 2)?;
    let suffix = print_value(&args[0]);
    let value = print_value(&args[1]);
    string_result(value.strip_suffix(suffix.as_str()).unwrap_or(&value))
}

/// First `n` characters; a negative `n` keeps the last `-n`
///
/// Usage: {{ .Release.Name | trunc 63 }}
pub fn trunc(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 2)?;
    let n = int_arg(&args[0])?;
    let value = print_value(&args[1]);
    let len = value.chars().count();

    let truncated: String = if n >= 0 {
        value.chars().take(n as usize).collect()
    } else {
        let keep = n.unsigned_abs() as usize;
        value.chars().skip(len.saturating_sub(keep)).collect()
    };
    string_result(truncated)
}

/// Usage: {{ .Values.name | replace "_" "-" }}
pub fn replace(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 3)?;
    let old = print_value(&args[0]);
    let new = print_value(&args[1]);
    string_result(print_value(&args[2]).replace(old.as_str(), &new))
}

/// Usage: {{ .Values.password | b64enc }}
pub fn b64enc(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    string_result(base64::engine::general_purpose::STANDARD.encode(print_value(&args[0])))
}

pub fn b64dec(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(print_value(&args[0]).as_bytes())
        .map_err(|e| FunctionError::new(format!("base64 decode error: {}", e)))?;
    let text = String::from_utf8(decoded)
        .map_err(|e| FunctionError::new(format!("UTF-8 decode error: {}", e)))?;
    string_result(text)
}

/// Hex-encoded SHA-256 digest
///
/// Usage: {{ toYaml .Values.config | sha256sum }}
pub fn sha256sum(args: &[JsonValue]) -> FunctionResult {
    use sha2::{Digest, Sha256};

    expect_args(args, 1)?;
    let mut hasher = Sha256::new();
    hasher.update(print_value(&args[0]).as_bytes());
    string_result(format!("{:x}", hasher.finalize()))
}

pub fn to_string(args: &[JsonValue]) -> FunctionResult {
    expect_args(args, 1)?;
    string_result(print_value(&args[0]))
}

/// Printf-style formatting
///
/// Usage: {{ printf "%s:%s" .Values.image.repository .Values.image.tag }}
///
/// Supports `%s`, `%d`, `%v`, `%q` and `%%`. `%d` only takes numbers.
pub fn printf(args: &[JsonValue]) -> FunctionResult {
    let Some((format, rest)) = args.split_first() else {
        return Err(FunctionError::new("expected a format string"));
    };
    let format = print_value(format);

    let mut result = String::with_capacity(format.len() + rest.len() * 8);
    let mut chars = format.chars();
    let mut next_arg = rest.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }

        let verb = chars
            .next()
            .ok_or_else(|| FunctionError::new("format string ends with a lone '%'"))?;
        if verb == '%' {
            result.push('%');
            continue;
        }

        let arg = next_arg
            .next()
            .ok_or_else(|| FunctionError::new(format!("missing argument for %{}", verb)))?;

        match verb {
            's' | 'v' => result.push_str(&print_value(arg)),
            'd' if arg.is_number() => result.push_str(&int_arg(arg)?.to_string()),
            'd' => {
                return Err(FunctionError::new(format!(
                    "%d expects a number, got {}",
                    go_quote(&print_value(arg))
                )));
            }
            'q' => result.push_str(&go_quote(&print_value(arg))),
            other => {
                return Err(FunctionError::new(format!("unsupported verb %{}", other)));
            }
        }
    }

    let extra = next_arg.count();
    if extra > 0 {
        return Err(FunctionError::new(format!(
            "{} argument{} not used by the format string",
            extra,
            if extra == 1 { "" } else { "s" }
        )));
    }

    string_result(result)
}
