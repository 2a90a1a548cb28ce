use anyhow::Result;
use entropic_protocol::{ErrorCode, ErrorEnvelope};
use entropic_runtime::RuntimeError;
use entropic_sketchbook::SketchbookError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    /// Echoed back so `serve` clients can match responses to requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl CommandRequest {
    pub fn new(action: CommandAction, payload: Value) -> Self {
        Self {
            action,
            payload,
            id: None,
        }
    }
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Capabilities,
    ListSketches,
    CreateSketch,
    LoadSketch,
    SaveSketch,
    RenameSketch,
    DeleteSketch,
    ListVariants,
    StageVariant,
    LoadVariant,
    SaveVariant,
    RenameVariant,
    DeleteVariant,
    RestoreVariant,
    ListBin,
    RestoreBinItem,
    DeleteBinItem,
    EmptyBin,
    SweepBin,
    ListStars,
    ToggleStar,
    CheckRuntime,
    RunSketch,
    StopSketch,
    CheckLibraries,
    LibraryDir,
}

impl CommandAction {
    pub const ALL: [CommandAction; 26] = [
        CommandAction::Capabilities,
        CommandAction::ListSketches,
        CommandAction::CreateSketch,
        CommandAction::LoadSketch,
        CommandAction::SaveSketch,
        CommandAction::RenameSketch,
        CommandAction::DeleteSketch,
        CommandAction::ListVariants,
        CommandAction::StageVariant,
        CommandAction::LoadVariant,
        CommandAction::SaveVariant,
        CommandAction::RenameVariant,
        CommandAction::DeleteVariant,
        CommandAction::RestoreVariant,
        CommandAction::ListBin,
        CommandAction::RestoreBinItem,
        CommandAction::DeleteBinItem,
        CommandAction::EmptyBin,
        CommandAction::SweepBin,
        CommandAction::ListStars,
        CommandAction::ToggleStar,
        CommandAction::CheckRuntime,
        CommandAction::RunSketch,
        CommandAction::StopSketch,
        CommandAction::CheckLibraries,
        CommandAction::LibraryDir,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CommandAction::Capabilities => "capabilities",
            CommandAction::ListSketches => "list_sketches",
            CommandAction::CreateSketch => "create_sketch",
            CommandAction::LoadSketch => "load_sketch",
            CommandAction::SaveSketch => "save_sketch",
            CommandAction::RenameSketch => "rename_sketch",
            CommandAction::DeleteSketch => "delete_sketch",
            CommandAction::ListVariants => "list_variants",
            CommandAction::StageVariant => "stage_variant",
            CommandAction::LoadVariant => "load_variant",
            CommandAction::SaveVariant => "save_variant",
            CommandAction::RenameVariant => "rename_variant",
            CommandAction::DeleteVariant => "delete_variant",
            CommandAction::RestoreVariant => "restore_variant",
            CommandAction::ListBin => "list_bin",
            CommandAction::RestoreBinItem => "restore_bin_item",
            CommandAction::DeleteBinItem => "delete_bin_item",
            CommandAction::EmptyBin => "empty_bin",
            CommandAction::SweepBin => "sweep_bin",
            CommandAction::ListStars => "list_stars",
            CommandAction::ToggleStar => "toggle_star",
            CommandAction::CheckRuntime => "check_runtime",
            CommandAction::RunSketch => "run_sketch",
            CommandAction::StopSketch => "stop_sketch",
            CommandAction::CheckLibraries => "check_libraries",
            CommandAction::LibraryDir => "library_dir",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl CommandResponse {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn ok(data: Value, meta: ResponseMeta) -> Self {
        Self {
            id: None,
            success: true,
            data,
            error: None,
            meta,
        }
    }

    pub fn failure(error: ErrorEnvelope, meta: ResponseMeta) -> Self {
        Self {
            id: None,
            success: false,
            data: Value::Null,
            error: Some(error),
            meta,
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub data: Value,
}

impl CommandOutcome {
    pub fn from_value<T: Serialize>(value: T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(value)?,
        })
    }
}

pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(Into::into)
}

/// A failed `run_sketch` together with the output collected before it failed.
#[derive(Debug)]
pub struct RunFailed {
    pub source: RuntimeError,
    pub output: Value,
}

impl std::fmt::Display for RunFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for RunFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Maps an error chain onto the wire envelope. Library errors keep their own
/// code; payload decoding failures are `invalid_request`.
pub fn classify_error(err: &anyhow::Error) -> ErrorEnvelope {
    let mut code = ErrorCode::Internal;
    let mut details = None;
    let mut hint = None;

    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<SketchbookError>() {
            code = err.code();
            break;
        }
        if let Some(err) = cause.downcast_ref::<RuntimeError>() {
            code = err.code();
            match err {
                RuntimeError::ToolchainMissing(_) => {
                    hint = Some(
                        "Install Processing or place a JDK under <resources>/jdk and the Processing jars under <resources>/processing; see check_runtime"
                            .to_string(),
                    );
                }
                RuntimeError::CompileFailure { exit_code, stderr } => {
                    details = Some(json!({ "exit_code": exit_code, "stderr": stderr }));
                }
                _ => {}
            }
            break;
        }
        if cause.downcast_ref::<serde_json::Error>().is_some() {
            code = ErrorCode::InvalidRequest;
            break;
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            code = ErrorCode::IoError;
            break;
        }
    }

    if let Some(failed) = err.downcast_ref::<RunFailed>() {
        let mut merged = details.unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut merged {
            map.insert("output".to_string(), failed.output.clone());
        }
        details = Some(merged);
    }

    ErrorEnvelope {
        code,
        message: root_message(err),
        details,
        hint,
    }
}

fn root_message(err: &anyhow::Error) -> String {
    let mut parts: Vec<String> = err.chain().map(ToString::to_string).collect();
    parts.dedup();
    parts.join(": ")
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CreateSketchPayload {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SketchIdPayload {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSketchPayload {
    pub id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameSketchPayload {
    pub id: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SketchRefPayload {
    pub sketch_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageVariantPayload {
    pub sketch_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantRefPayload {
    pub sketch_id: String,
    pub variant_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveVariantPayload {
    pub sketch_id: String,
    pub variant_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameVariantPayload {
    pub sketch_id: String,
    pub variant_id: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreVariantPayload {
    pub sketch_id: String,
    pub variant_id: String,
    #[serde(default)]
    pub backup: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleStarPayload {
    pub id: String,
}

/// Either inline `code` or the id of a saved sketch.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RunSketchPayload {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub sketch_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckLibrariesPayload {
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn action_names_round_trip_through_serde() {
        for action in CommandAction::ALL {
            let encoded = serde_json::to_value(action).expect("encode");
            assert_eq!(encoded, Value::String(action.as_str().to_string()));
        }
    }

    #[test]
    fn request_payload_defaults_to_empty_object() {
        let request: CommandRequest =
            serde_json::from_str(r#"{"action":"list_sketches"}"#).expect("parse");
        assert_eq!(request.action, CommandAction::ListSketches);
        assert_eq!(request.payload, json!({}));
    }

    #[test]
    fn library_errors_keep_their_code() {
        let err = anyhow::Error::new(SketchbookError::NotFound("sketch 'x'".to_string()))
            .context("load_sketch");
        let envelope = classify_error(&err);
        assert_eq!(envelope.code, ErrorCode::NotFound);
        assert!(envelope.message.starts_with("load_sketch: "));
    }

    #[test]
    fn compile_failures_carry_stderr_details() {
        let err = anyhow::Error::new(RuntimeError::CompileFailure {
            exit_code: Some(1),
            stderr: "oops".to_string(),
        });
        let envelope = classify_error(&err);
        assert_eq!(envelope.code, ErrorCode::CompileFailure);
        assert_eq!(
            envelope.details,
            Some(json!({ "exit_code": 1, "stderr": "oops" }))
        );
    }

    #[test]
    fn bad_payload_is_invalid_request() {
        let err = parse_payload::<SketchIdPayload>(json!({ "nope": 1 })).expect_err("reject");
        assert_eq!(classify_error(&err).code, ErrorCode::InvalidRequest);
    }
}
