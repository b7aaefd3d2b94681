use serde::{Deserialize, Deserializer, Serialize};

/// Model block of the session descriptor piped in on stdin
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct HookModel {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct HookWorkspace {
    pub current_dir: Option<String>,
    pub project_dir: Option<String>,
}

/// Session descriptor sent by Claude Code on each statusline tick.
/// Every field is optional; unknown fields are ignored.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct HookJson {
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
    pub cwd: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub model: HookModel,
    #[serde(deserialize_with = "null_as_default")]
    pub workspace: HookWorkspace,
    pub version: Option<String>,
}

impl HookJson {
    /// Parse raw stdin; empty input is an empty descriptor, not an error
    pub fn parse(raw: &[u8]) -> serde_json::Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw)
    }

    pub fn model_id(&self) -> &str {
        non_empty(self.model.id.as_deref()).unwrap_or("opus")
    }

    pub fn model_display_name(&self) -> &str {
        non_empty(self.model.display_name.as_deref()).unwrap_or(crate::DEFAULT_MODEL_LABEL)
    }

    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or("")
    }

    pub fn current_dir(&self) -> Option<&str> {
        non_empty(self.workspace.current_dir.as_deref()).or(non_empty(self.cwd.as_deref()))
    }

    pub fn version(&self) -> Option<&str> {
        non_empty(self.version.as_deref())
    }
}

/// `"field": null` reads the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
