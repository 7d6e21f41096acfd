/// Limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}

/// An in-memory file attached to an outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn text(file_name: impl Into<String>, text: &str) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: text.as_bytes().to_vec(),
        }
    }
}
