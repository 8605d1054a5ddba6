//! Correlation engine: maps fire-and-forget mutations to durable identifiers.
//!
//! Two strategies share the [`poll_until`] primitive. Name resolution polls a
//! listing until an entry with the submitted name appears. Diff resolution
//! snapshots a machine's disk handles, runs the mutation, then polls the
//! machine's detail until a handle not present in the snapshot shows up.
//! Once the mutation has been accepted, failed reads are treated like "not
//! found yet" until the deadline and the last one is reported with the
//! timeout. A failed snapshot read before the mutation is terminal.

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ObjectStorageApi, VirtualMachineApi};
use crate::model::{MoRef, Specification, VmId};
use crate::poll::{PollError, PollSettings, poll_until};

/// How a resolver reacts when more than one candidate matches.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AmbiguityPolicy {
    /// Return the first candidate in listing order and log a warning.
    #[default]
    FirstMatch,
    /// Fail with [`CorrelationError::Ambiguous`].
    Reject,
}

impl AmbiguityPolicy {
    /// Configuration spelling of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstMatch => "first-match",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when an ambiguity policy name is not recognised.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown ambiguity policy `{0}`; expected `first-match` or `reject`")]
pub struct UnknownAmbiguityPolicy(pub String);

impl FromStr for AmbiguityPolicy {
    type Err = UnknownAmbiguityPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "first-match" => Ok(Self::FirstMatch),
            "reject" => Ok(Self::Reject),
            other => Err(UnknownAmbiguityPolicy(other.to_owned())),
        }
    }
}

/// Poll window and tie-break rule for one resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CorrelationPolicy {
    /// Interval and deadline.
    pub settings: PollSettings,
    /// Tie-break rule for multiple candidates.
    pub ambiguity: AmbiguityPolicy,
}

impl CorrelationPolicy {
    /// Bundles poll settings with an ambiguity policy.
    #[must_use]
    pub const fn new(settings: PollSettings, ambiguity: AmbiguityPolicy) -> Self {
        Self {
            settings,
            ambiguity,
        }
    }
}

/// Errors raised by the resolvers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CorrelationError<E> {
    /// Nothing matched within the window. Distinct from a read failure so
    /// callers can decide to extend the window.
    #[error(
        "timed out after {waited:?} ({attempts} attempts) waiting for {subject}{}",
        read_failure_note(.last_error.as_deref())
    )]
    Timeout {
        /// What was being resolved.
        subject: String,
        /// Time elapsed since the first attempt.
        waited: Duration,
        /// Attempts made.
        attempts: u32,
        /// Most recent read failure swallowed while polling, if any.
        last_error: Option<String>,
    },
    /// More than one candidate matched and the policy rejects ambiguity.
    #[error("ambiguous correlation for {subject}: candidates {candidates:?}")]
    Ambiguous {
        /// What was being resolved.
        subject: String,
        /// Every candidate, in listing order.
        candidates: Vec<String>,
    },
    /// The cancellation token fired.
    #[error("cancelled while waiting for {subject}")]
    Cancelled {
        /// What was being resolved.
        subject: String,
    },
    /// The snapshot read taken before a mutation failed.
    #[error("read failed while resolving: {0}")]
    Read(#[source] E),
    /// The mutation whose result is being resolved failed.
    #[error("mutation failed before resolving: {0}")]
    Mutation(#[source] E),
}

fn read_failure_note(last_error: Option<&str>) -> String {
    last_error.map_or_else(String::new, |message| {
        format!("; last read error: {message}")
    })
}

impl<E> CorrelationError<E> {
    fn from_poll(subject: String, err: PollError<Self>, failures: &ReadFailures) -> Self {
        match err {
            PollError::TimedOut { attempts, waited } => Self::Timeout {
                subject,
                waited,
                attempts,
                last_error: failures.take(),
            },
            PollError::Cancelled { .. } => Self::Cancelled { subject },
            PollError::Failed(inner) => inner,
        }
    }
}

/// Remembers the most recent read failure swallowed by a poll loop.
#[derive(Debug, Default)]
struct ReadFailures(Mutex<Option<String>>);

impl ReadFailures {
    fn record(&self, subject: &str, err: &dyn StdError) {
        warn!(subject, error = %err, "read failed while polling, retrying");
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Turns a failed read into "not yet", keeping the error for the timeout.
    fn swallow<T>(&self, subject: &str, read: Result<T, impl StdError>) -> Option<T> {
        read.inspect_err(|err| self.record(subject, err)).ok()
    }
}

/// Applies the ambiguity policy to the candidates seen by one attempt.
fn choose<T, E>(
    subject: &str,
    candidates: Vec<T>,
    policy: AmbiguityPolicy,
) -> Result<Option<T>, CorrelationError<E>>
where
    T: fmt::Display,
{
    if candidates.len() > 1 {
        let labels: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        if policy == AmbiguityPolicy::Reject {
            return Err(CorrelationError::Ambiguous {
                subject: subject.to_owned(),
                candidates: labels,
            });
        }
        warn!(subject, candidates = ?labels, "ambiguous correlation, using first match");
    }
    Ok(candidates.into_iter().next())
}

/// Polls the tenant listing until an entry named `name` appears.
///
/// # Errors
///
/// Returns [`CorrelationError::Timeout`] when no entry appears in the window,
/// carrying the last listing failure if reads kept failing,
/// [`CorrelationError::Ambiguous`] under [`AmbiguityPolicy::Reject`] and
/// [`CorrelationError::Cancelled`].
pub async fn resolve_by_name<A>(
    api: &A,
    name: &str,
    client_id: u64,
    policy: &CorrelationPolicy,
    cancel: &CancellationToken,
) -> Result<VmId, CorrelationError<A::Error>>
where
    A: VirtualMachineApi + ?Sized,
{
    let subject = format!("virtual machine `{name}` in scope {client_id}");
    let label = subject.as_str();
    let ambiguity = policy.ambiguity;
    let failures = ReadFailures::default();
    let seen = &failures;
    let resolved = poll_until(policy.settings, cancel, |_| async move {
        let Some(listing) = seen.swallow(label, api.list_vms(client_id).await) else {
            return Ok(None);
        };
        let matches: Vec<VmId> = listing
            .into_iter()
            .filter(|entry| entry.name == name)
            .map(|entry| entry.id)
            .collect();
        choose(label, matches, ambiguity)
    })
    .await
    .map_err(|err| CorrelationError::from_poll(subject, err, &failures))?;

    info!(vm_id = %resolved, name, client_id, "resolved virtual machine by name");
    Ok(resolved)
}

/// Handles present in `updated` but absent from `initial`, in listing order.
#[must_use]
pub fn disk_difference(initial: &BTreeSet<MoRef>, updated: &Specification) -> Vec<MoRef> {
    updated
        .disk_handles()
        .filter(|handle| !initial.contains(*handle))
        .cloned()
        .collect()
}

/// Snapshots the machine's disks, runs `mutate`, then polls for the new disk.
///
/// # Errors
///
/// Returns [`CorrelationError::Mutation`] when `mutate` fails,
/// [`CorrelationError::Timeout`] when no new handle appears in the window,
/// [`CorrelationError::Ambiguous`] under [`AmbiguityPolicy::Reject`],
/// [`CorrelationError::Cancelled`] and [`CorrelationError::Read`] when the
/// snapshot read before the mutation fails.
pub async fn resolve_new_disk_by_diff<A, M, Fut>(
    api: &A,
    vm_id: &VmId,
    mutate: M,
    policy: &CorrelationPolicy,
    cancel: &CancellationToken,
) -> Result<MoRef, CorrelationError<A::Error>>
where
    A: VirtualMachineApi + ?Sized,
    M: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), A::Error>>,
{
    let subject = format!("new disk on virtual machine {vm_id}");
    let initial_detail = api.vm_detail(vm_id).await.map_err(CorrelationError::Read)?;
    let initial: BTreeSet<MoRef> = initial_detail.specification.disk_handles().cloned().collect();

    if cancel.is_cancelled() {
        return Err(CorrelationError::Cancelled { subject });
    }
    mutate().await.map_err(CorrelationError::Mutation)?;
    info!(vm_id = %vm_id, known_disks = initial.len(), "disk creation submitted");

    let known = &initial;
    let label = subject.as_str();
    let ambiguity = policy.ambiguity;
    let failures = ReadFailures::default();
    let seen = &failures;
    let resolved = poll_until(policy.settings, cancel, |_| async move {
        let Some(detail) = seen.swallow(label, api.vm_detail(vm_id).await) else {
            return Ok(None);
        };
        choose(label, disk_difference(known, &detail.specification), ambiguity)
    })
    .await
    .map_err(|err| CorrelationError::from_poll(subject, err, &failures))?;

    info!(vm_id = %vm_id, mo_ref = %resolved, "resolved new disk by diff");
    Ok(resolved)
}

/// Polls the tenant's object storage until a bucket named `bucket_name` appears.
///
/// # Errors
///
/// Same as [`resolve_by_name`].
pub async fn resolve_bucket_by_name<A>(
    api: &A,
    tenant_id: u64,
    bucket_name: &str,
    policy: &CorrelationPolicy,
    cancel: &CancellationToken,
) -> Result<String, CorrelationError<A::Error>>
where
    A: ObjectStorageApi + ?Sized,
{
    let subject = format!("bucket `{bucket_name}` in tenant {tenant_id}");
    let label = subject.as_str();
    let ambiguity = policy.ambiguity;
    let failures = ReadFailures::default();
    let seen = &failures;
    let resolved = poll_until(policy.settings, cancel, |_| async move {
        let Some(names) = seen.swallow(label, api.list_bucket_names(tenant_id).await) else {
            return Ok(None);
        };
        let matches: Vec<String> = names
            .into_iter()
            .filter(|candidate| candidate == bucket_name)
            .collect();
        choose(label, matches, ambiguity)
    })
    .await
    .map_err(|err| CorrelationError::from_poll(subject, err, &failures))?;

    info!(bucket = %resolved, tenant_id, "resolved bucket by name");
    Ok(resolved)
}
