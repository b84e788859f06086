//! The radio side: payload encoding, the modem link, and the reporter that
//! ties them to the battery filter.
//!
//! A report is two command lines with a settle delay after each:
//!
//! ```text
//! AT$RC
//! <reset delay>
//! AT$SF=<payload hex>
//! <post-send delay>
//! ```

mod payload;
mod reporter;
mod transport;

pub use payload::{rot47, rot47_byte, HexCase, UplinkPayload, WireEncoding, RESET_COMMAND, SEND_FRAME_PREFIX};
pub use reporter::{ReporterState, SendOutcome, SkipReason, TransmissionGate, UplinkReporter};
pub use transport::{SerialTransport, UplinkTransport, LINE_TERMINATOR};
