//! Central registry for all user-facing message templates.
//!
//! - `ingress` - reverse proxy and workspace routing messages
//! - `common` - shared/reusable messages across commands
//!
//! Templates use `{variable}` syntax for runtime values, which are
//! substituted by the `MessageBuilder`:
//!
//! ```rust
//! use wsp_messages::{msg, MESSAGES};
//!
//! let text = msg!(MESSAGES.ingress.routes_found, count = "2");
//! assert_eq!(text, "Found 2 route(s)");
//! ```

mod common;
mod ingress;

pub use common::{CommonMessages, COMMON_MESSAGES};
pub use ingress::{IngressMessages, INGRESS_MESSAGES};

pub struct Messages {
    pub ingress: IngressMessages,
    pub common: CommonMessages,
}

pub const MESSAGES: Messages = Messages {
    ingress: INGRESS_MESSAGES,
    common: COMMON_MESSAGES,
};
