//! Messages shared by every command.

pub struct CommonMessages {
    /// Final line printed before a non-zero exit.
    pub error_generic: &'static str,
}

pub const COMMON_MESSAGES: CommonMessages = CommonMessages {
    error_generic: "❌ Error: {error}",
};
