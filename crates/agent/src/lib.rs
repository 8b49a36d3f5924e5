//! Message handling for chatrelay.
//!
//! Every inbound message goes through the same steps:
//!
//! 1. **Gate** — commands, access control and activation checks
//! 2. **Command** — `/start` and `/stop` flip the chat's activation
//! 3. **Converse** — append the user turn, send the sender's history to the
//!    provider, append the reply
//! 4. **Deliver** — the dispatcher sends the reply through the channel
//!
//! The dispatcher runs messages on a bounded worker pool; one user's
//! exchanges are serialized, different users proceed in parallel.

pub mod dispatch;
pub mod gate;
pub mod replies;
pub mod router;

#[cfg(test)]
mod test_support;

pub use dispatch::Dispatcher;
pub use gate::{Command, GateDecision, GateInput, Rejection};
pub use router::MessageRouter;
