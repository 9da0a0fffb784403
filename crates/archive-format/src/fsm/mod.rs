//! Sans-I/O state machines: callers drive these by feeding bytes and asking
//! "do you want more input", never handing the parser a `Read`/`AsyncRead`
//! directly. This keeps the core usable from blocking, async, and HTTP-range
//! callers alike.

pub mod archive;
pub mod entry;

/// Take `this` by value, replacing it with `Default::default()` in place —
/// used so a `State::Transitioning` placeholder never observably leaks to a
/// caller: a `process(&mut self)` method that needs to move out of a field
/// behind `&mut self` uses `std::mem::take` via this macro instead of
/// juggling `Option`s everywhere.
macro_rules! transition {
    ($state: expr => { $($state_pat:pat => $body:expr),* $(,)? }) => {
        match std::mem::take($state) {
            $($state_pat => $body,)*
        }
    };
}
pub(crate) use transition;

/// The outcome of one `process()` step on a state machine: either it needs
/// more input/output space (`Continue`, carrying the updated machine), or it
/// has produced its final result (`Done`).
#[derive(Debug)]
pub enum FsmResult<M, R> {
    /// The machine needs another `fill()`/`process()` round.
    Continue(M),
    /// The machine has finished; no more input will be consumed.
    Done(R),
}
