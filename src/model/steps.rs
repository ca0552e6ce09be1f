use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub const MAX_STEP_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Function,
    Control,
    Unknown(String),
}

impl<'de> Deserialize<'de> for StepKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "function" => Self::Function,
            "control" => Self::Control,
            _ => Self::Unknown(raw),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    For,
    If,
}

impl ControlKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::For => "Loop",
            Self::If => "Condition",
        }
    }
}

/// Step as the code generator writes it. Only trusted after [`validate_steps`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    #[serde(rename = "type", default)]
    pub kind: Option<StepKind>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub control_type: Option<ControlKind>,
    #[serde(default)]
    pub control_value: Option<Value>,
    #[serde(default)]
    pub control_description: Option<String>,
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    Function(FunctionStep),
    Control(ControlStep),
}

impl WorkflowStep {
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Function(step) => step.function_name.as_deref(),
            Self::Control(_) => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            Self::Function(step) => step.disabled,
            Self::Control(step) => step.disabled,
        }
    }

    pub fn children(&self) -> &[WorkflowStep] {
        match self {
            Self::Function(_) => &[],
            Self::Control(step) => &step.steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub control_type: ControlKind,
    pub control_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_description: Option<String>,
    pub disabled: bool,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("steps must be a list, got {0}")]
    NotAList(&'static str),
    #[error("steps are not valid JSON: {0}")]
    Malformed(String),
    #[error("unknown step type `{kind}` at {path}")]
    UnknownKind { path: String, kind: String },
    #[error("control step at {path} is missing `control_type`")]
    MissingControlType { path: String },
    #[error("step at {path} nests deeper than {max}")]
    NestingTooDeep { path: String, max: usize },
}

/// Validated step list of a message or chat.
///
/// Deserialization never fails: an invalid list becomes an empty one that
/// remembers why, so one malformed row cannot poison a whole fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Steps {
    items: Vec<WorkflowStep>,
    error: Option<StepError>,
}

impl Steps {
    pub fn new(items: Vec<WorkflowStep>) -> Self {
        Self { items, error: None }
    }

    pub fn from_value(value: &Value) -> Self {
        match parse_steps(value) {
            Ok(items) => Self::new(items),
            Err(error) => {
                tracing::warn!(%error, "discarding invalid workflow steps");
                Self {
                    items: Vec::new(),
                    error: Some(error),
                }
            }
        }
    }

    pub fn items(&self) -> &[WorkflowStep] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }
}

impl<'de> Deserialize<'de> for Steps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.map(|value| Self::from_value(&value)).unwrap_or_default())
    }
}

impl Serialize for Steps {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.items.serialize(serializer)
    }
}

pub fn parse_steps(value: &Value) -> Result<Vec<WorkflowStep>, StepError> {
    let raw: Vec<RawStep> = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(value.clone())
            .map_err(|err| StepError::Malformed(err.to_string()))?,
        // Some writers store the list as an encoded JSON string.
        Value::String(text) if text.trim().is_empty() => return Ok(Vec::new()),
        Value::String(text) => {
            let decoded: Value =
                serde_json::from_str(text).map_err(|err| StepError::Malformed(err.to_string()))?;
            if !decoded.is_array() {
                return Err(StepError::NotAList(json_type_name(&decoded)));
            }
            return parse_steps(&decoded);
        }
        other => return Err(StepError::NotAList(json_type_name(other))),
    };
    validate_steps(&raw)
}

pub fn validate_steps(raw: &[RawStep]) -> Result<Vec<WorkflowStep>, StepError> {
    validate_level(raw, "", 1)
}

fn validate_level(raw: &[RawStep], prefix: &str, depth: usize) -> Result<Vec<WorkflowStep>, StepError> {
    let mut steps = Vec::with_capacity(raw.len());
    for (index, step) in raw.iter().enumerate() {
        let path = if prefix.is_empty() {
            format!("step {index}")
        } else {
            format!("{prefix}.{index}")
        };
        if depth > MAX_STEP_DEPTH {
            return Err(StepError::NestingTooDeep {
                path,
                max: MAX_STEP_DEPTH,
            });
        }

        let kind = match &step.kind {
            Some(kind) => kind.clone(),
            None if step.control_type.is_some() => StepKind::Control,
            None => StepKind::Function,
        };

        let validated = match kind {
            StepKind::Function => WorkflowStep::Function(FunctionStep {
                id: step.id.clone(),
                function_name: step
                    .function_name
                    .clone()
                    .filter(|name| !name.trim().is_empty()),
                description: step.description.clone(),
                input: step.input.clone(),
                output: step.output.clone(),
                disabled: step.disabled,
            }),
            StepKind::Control => {
                let control_type = step
                    .control_type
                    .ok_or_else(|| StepError::MissingControlType { path: path.clone() })?;
                WorkflowStep::Control(ControlStep {
                    id: step.id.clone(),
                    control_type,
                    control_value: step.control_value.clone().unwrap_or(Value::Null),
                    control_description: step.control_description.clone(),
                    disabled: step.disabled,
                    steps: validate_level(&step.steps, &path, depth + 1)?,
                })
            }
            StepKind::Unknown(kind) => {
                return Err(StepError::UnknownKind { path, kind });
            }
        };
        steps.push(validated);
    }
    Ok(steps)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
