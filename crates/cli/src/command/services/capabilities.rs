use crate::command::domain::{CommandAction, CommandOutcome};
use anyhow::Result;
use entropic_protocol::{Capabilities, CapabilitiesServer, CAPABILITIES_SCHEMA_VERSION};
use entropic_sketchbook::BIN_RETENTION_DAYS;
use serde_json::Value;

pub(crate) struct CapabilitiesService;

impl CapabilitiesService {
    pub fn run(&self, _payload: Value) -> Result<CommandOutcome> {
        let output = Capabilities {
            schema_version: CAPABILITIES_SCHEMA_VERSION,
            server: CapabilitiesServer {
                name: "entropic".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            actions: CommandAction::ALL
                .iter()
                .map(|action| action.as_str().to_string())
                .collect(),
            bin_retention_days: BIN_RETENTION_DAYS,
        };
        CommandOutcome::from_value(output)
    }
}
