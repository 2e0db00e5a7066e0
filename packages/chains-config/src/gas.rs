use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Gas options exactly as they are written in the chains info file or passed on the command line.
///
/// Validation against the allowed fields happens when the options are resolved for a transaction,
/// so an invalid stored entry only fails the chains that actually use it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawGasOptions(pub Map<String, Value>);

impl RawGasOptions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for RawGasOptions {
    fn from(map: Map<String, Value>) -> Self {
        RawGasOptions(map)
    }
}
