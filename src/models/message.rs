use serde::Deserialize;

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
}

impl MessageUsage {
    /// Input + cache writes + cache reads + output for one turn
    pub fn total(&self) -> u64 {
        [
            self.input_tokens,
            self.cache_creation_input_tokens,
            self.cache_read_input_tokens,
            self.output_tokens,
        ]
        .into_iter()
        .map(|n| n.unwrap_or(0))
        .fold(0u64, u64::saturating_add)
    }
}

#[derive(Deserialize, Debug)]
pub struct MessageObj {
    pub usage: Option<MessageUsage>,
}

/// One JSONL record of a session transcript
#[derive(Deserialize, Debug)]
pub struct TranscriptLine {
    pub r#type: Option<String>,
    pub message: Option<MessageObj>,
}

impl TranscriptLine {
    /// Usage block of an assistant turn, if this record is one
    pub fn assistant_usage(&self) -> Option<MessageUsage> {
        if self.r#type.as_deref() != Some("assistant") {
            return None;
        }
        self.message.as_ref()?.usage
    }
}
