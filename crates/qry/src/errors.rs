//! 🏷️ The errors with names — the ones callers actually match on.
//!
//! Most of quarry speaks fluent `anyhow` with theatrical `.context(...)`
//! strings, because most failures just need to be reported at 3am with
//! enough detail to file a reasonable postmortem. These four are different:
//! the retry loop, the prep loop, and the query loop all change their
//! behavior based on WHICH error they got. So these get real types.
//!
//! # Scoping contract 📜
//! - [`CommandFailure`] — internal fuel for the retry loop; the transient
//!   flavor never escapes the submitter.
//! - [`DiscoveryError`] — fatal to one data-prep or query entry. The run
//!   moves on to the next entry.
//! - [`ExportError`] — fatal to one group. Sibling groups keep going.
//! - [`UnsupportedQueryError`] — fatal to one query entry. The rest still run.
//!
//! One bad blob should never take down an evening's worth of configured work.

use thiserror::Error;

/// 💥 A warehouse control-command or query failure, classified.
///
/// `transient == true` means "blind resubmission can plausibly succeed" —
/// throttling, a shard having a rough morning, the network being the network.
/// `transient == false` means the command itself is wrong and retrying it
/// is just yelling the same sentence louder.
#[derive(Debug, Clone, Error)]
#[error("warehouse command failed (transient = {transient}): {message}")]
pub struct CommandFailure {
    pub transient: bool,
    pub message: String,
}

impl CommandFailure {
    pub(crate) fn transient(message: impl Into<String>) -> Self {
        Self { transient: true, message: message.into() }
    }

    pub(crate) fn permanent(message: impl Into<String>) -> Self {
        Self { transient: false, message: message.into() }
    }
}

/// 🔭 The listing itself failed — wrong host, wrong credential, wrong life
/// choices. Nothing downstream of enumeration can run for this entry.
#[derive(Debug, Error)]
#[error("could not enumerate '{location}': {message}")]
pub struct DiscoveryError {
    pub location: String,
    pub message: String,
}

/// 📤 One group's export died a permanent death. The command was submitted,
/// the warehouse said no, and the classification said "don't bother again".
#[derive(Debug, Error)]
#[error("export to '{destination}' failed permanently")]
pub struct ExportError {
    pub destination: String,
    #[source]
    pub source: CommandFailure,
}

/// 🏷️ Someone configured a query-type tag we've never heard of.
/// Fails that entry, spares the rest.
#[derive(Debug, Error)]
#[error("query type '{tag}' is not supported")]
pub struct UnsupportedQueryError {
    pub tag: String,
}
