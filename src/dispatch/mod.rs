//! Command dispatch.
//!
//! A [`Dispatcher`] turns protocol lines into operations on the shared
//! [`Instrument`]. Handlers are grouped into [`CommandSet`]s tried in order:
//!
//! 1. [`GeneratorCommands`]: `AWG:*`, checked first because it reuses
//!    channel keywords such as `RANGE` and `OFFS`
//! 2. [`CommonCommands`]: the shared bridge surface (channels, timing,
//!    trigger, acquisition)
//! 3. [`InstrumentCommands`]: oscilloscope-specific extras (`BITS`,
//!    `BWLIM`, `PRESENT?`, readback queries)
//!
//! The instrument lock is held for the whole of one command, so hardware
//! calls never interleave with the data plane. Unknown commands are logged at
//! debug level and produce no reply.

mod awg;
mod common;
pub mod request;
mod specific;

pub use awg::GeneratorCommands;
pub use common::CommonCommands;
pub use request::Request;
pub use specific::InstrumentCommands;

use crate::addressing::{AddressResolver, Subject};
use crate::instrument::{Instrument, SharedInstrument};
use tracing::debug;

/// Result of handling one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Command applied; queries carry their reply
    Handled(Option<String>),
    /// Unknown command or wrong arguments
    NotHandled,
    /// Client asked to close the session
    Exit,
}

impl Outcome {
    /// Handled command with no reply.
    pub fn done() -> Self {
        Outcome::Handled(None)
    }

    /// Handled query.
    pub fn reply(text: impl Into<String>) -> Self {
        Outcome::Handled(Some(text.into()))
    }

    /// Handled unless `applied` is false.
    pub fn applied(applied: bool) -> Self {
        if applied {
            Outcome::done()
        } else {
            Outcome::NotHandled
        }
    }
}

/// Everything a handler needs to know about the line being dispatched.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub request: &'a Request,
    /// Resolved subject, `None` for subject-less lines
    pub subject: Option<Subject>,
    pub resolver: &'a AddressResolver,
}

/// A group of protocol handlers.
///
/// # Contract
///
/// - Return [`Outcome::NotHandled`] for anything outside the set, including a
///   known keyword with the wrong argument count, so the next set can try.
/// - Never fail the session; hardware errors are logged by the instrument.
pub trait CommandSet: Send + Sync {
    /// Set name for diagnostics
    fn name(&self) -> &'static str;

    /// Try to handle one request with the instrument locked.
    fn handle(&self, ctx: &Context<'_>, instrument: &mut Instrument) -> Outcome;
}

/// Routes parsed lines to command sets.
pub struct Dispatcher {
    instrument: SharedInstrument,
    resolver: AddressResolver,
    sets: Vec<Box<dyn CommandSet>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.sets.iter().map(|s| s.name()).collect();
        f.debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .field("sets", &names)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with the standard command sets.
    pub fn new(instrument: SharedInstrument) -> Self {
        Self::with_sets(
            instrument,
            vec![
                Box::new(GeneratorCommands),
                Box::new(CommonCommands),
                Box::new(InstrumentCommands),
            ],
        )
    }

    /// Dispatcher with a custom handler chain, tried in order.
    pub fn with_sets(instrument: SharedInstrument, sets: Vec<Box<dyn CommandSet>>) -> Self {
        let resolver = AddressResolver::new(instrument.lock().analog_channel_count());
        Self {
            instrument,
            resolver,
            sets,
        }
    }

    /// The instrument commands are applied to.
    pub fn instrument(&self) -> &SharedInstrument {
        &self.instrument
    }

    /// Parse and dispatch one raw line.
    pub fn dispatch_line(&self, line: &str) -> Outcome {
        match Request::parse(line) {
            Some(request) => self.dispatch(&request),
            None => Outcome::NotHandled,
        }
    }

    /// Dispatch a parsed request.
    pub fn dispatch(&self, request: &Request) -> Outcome {
        if request.subject.is_none() && request.command == "EXIT" && request.no_args() {
            return Outcome::Exit;
        }

        let subject = match request.subject.as_deref() {
            None => None,
            Some(token) => match self.resolver.resolve(token) {
                Some(subject) => Some(subject),
                None => {
                    debug!(subject = token, command = %request.command, "unrecognized subject");
                    return Outcome::NotHandled;
                }
            },
        };
        let ctx = Context {
            request,
            subject,
            resolver: &self.resolver,
        };

        let mut instrument = self.instrument.lock();
        for set in &self.sets {
            let outcome = set.handle(&ctx, &mut instrument);
            if outcome != Outcome::NotHandled {
                return outcome;
            }
        }
        drop(instrument);

        debug!(
            subject = request.subject.as_deref().unwrap_or(""),
            command = %request.command,
            args = ?request.args,
            query = request.is_query,
            "unrecognized command"
        );
        Outcome::NotHandled
    }
}

/// Comma-terminated list reply (`v1,v2,...,`).
pub(crate) fn list_reply(values: &[u64]) -> String {
    values.iter().map(|v| format!("{v},")).collect()
}
