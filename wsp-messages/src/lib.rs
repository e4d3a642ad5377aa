//! wsp-messages
//!
//! Centralized messaging for the wsp CLI: message templates and the
//! `msg!` builder that fills in their `{variable}` placeholders.

pub mod builder;
pub mod macros;
pub mod messages;

pub use messages::MESSAGES;
