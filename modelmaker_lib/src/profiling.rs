//! Implementation details for the [`profile`](crate::profile) macro
//!
//! Every thread records its scopes in a thread local [`Profiler`]. A scope is identified by its
//! path, the names of all enclosing scopes from the root down to the scope itself. Scopes with the
//! same path are accumulated over calls and threads when the report is written.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::error::Error;
use std::io;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use thread_local::ThreadLocal;

/// Thread local storage of the [`Profiler`]s of all threads
pub static PROFILER: LazyLock<ThreadLocal<RwLock<Profiler>>> = LazyLock::new(ThreadLocal::new);

/// Implementation of the profile macro, use [`profile`](crate::profile) instead
#[doc(hidden)]
#[macro_export]
macro_rules! profile_impl {
    ($name:expr) => {
        let (_profiling_scope_guard, _) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .write()
            .enter($name, None);
    };
    ($scope_id:ident, $name:expr) => {
        let (_profiling_scope_guard, $scope_id) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .write()
            .enter($name, None);
    };
    ($name:expr, parent = $parent_id:ident) => {
        let (_profiling_scope_guard, _) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .write()
            .enter($name, Some(&$parent_id));
    };
    ($scope_id:ident, $name:expr, parent = $parent_id:ident) => {
        let (_profiling_scope_guard, $scope_id) = $crate::profiling::PROFILER
            .get_or(Default::default)
            .write()
            .enter($name, Some(&$parent_id));
    };
}

/// Path of a scope in the profiling hierarchy, can be sent to other threads to attach child scopes
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId {
    path: Arc<[&'static str]>,
}

impl ScopeId {
    fn child(parent: Option<&ScopeId>, name: &'static str) -> Self {
        let mut path = parent.map(|p| p.path.to_vec()).unwrap_or_default();
        path.push(name);
        Self { path: path.into() }
    }

    fn depth(&self) -> usize {
        self.path.len() - 1
    }

    fn name(&self) -> &'static str {
        self.path.last().copied().unwrap_or("")
    }

    fn is_child_of(&self, parent: &ScopeId) -> bool {
        self.path.len() == parent.path.len() + 1 && self.path.starts_with(&parent.path)
    }
}

/// Accumulated timings of one scope
#[derive(Copy, Clone, Debug)]
struct ScopeStats {
    num_calls: usize,
    total: Duration,
    first_call: Instant,
}

impl ScopeStats {
    fn new() -> Self {
        Self {
            num_calls: 0,
            total: Duration::ZERO,
            first_call: Instant::now(),
        }
    }

    fn merge(&mut self, other: &ScopeStats) {
        self.num_calls += other.num_calls;
        self.total += other.total;
        self.first_call = self.first_call.min(other.first_call);
    }
}

/// A scope guard recording the elapsed time of the scope when it is dropped
pub struct Guard {
    enter_time: Instant,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let elapsed = self.enter_time.elapsed();
        if let Some(profiler) = PROFILER.get() {
            profiler.write().leave(elapsed);
        }
    }
}

/// Profiler storing the scopes entered on one thread and the stack of currently open scopes
#[derive(Default)]
pub struct Profiler {
    scopes: BTreeMap<ScopeId, ScopeStats>,
    stack: Vec<ScopeId>,
}

impl Profiler {
    /// Enters a scope below the given parent, or below the innermost open scope of this thread
    pub fn enter(&mut self, name: &'static str, parent: Option<&ScopeId>) -> (Guard, ScopeId) {
        let id = ScopeId::child(parent.or(self.stack.last()), name);
        self.scopes
            .entry(id.clone())
            .or_insert_with(ScopeStats::new);
        self.stack.push(id.clone());
        (
            Guard {
                enter_time: Instant::now(),
            },
            id,
        )
    }

    fn leave(&mut self, elapsed: Duration) {
        if let Some(id) = self.stack.pop() {
            if let Some(stats) = self.scopes.get_mut(&id) {
                stats.num_calls += 1;
                stats.total += elapsed;
            }
        }
    }

    /// Removes all recorded scopes of this profiler
    pub fn reset(&mut self) {
        self.scopes.clear();
        self.stack.clear();
    }
}

fn write_scope<W: io::Write>(
    out: &mut W,
    scopes: &[(ScopeId, ScopeStats)],
    (id, stats): &(ScopeId, ScopeStats),
    parent_total: Option<Duration>,
) -> io::Result<()> {
    let total_secs = stats.total.as_secs_f64();
    let percent = parent_total
        .map(|p| total_secs / p.as_secs_f64().max(f64::EPSILON) * 100.0)
        .unwrap_or(100.0);

    writeln!(
        out,
        "{:indent$}{}: {:.2}%, {:.2}ms avg, {} {} (total: {:.3}s)",
        "",
        id.name(),
        percent,
        total_secs * 1000.0 / stats.num_calls.max(1) as f64,
        stats.num_calls,
        if stats.num_calls == 1 { "call" } else { "calls" },
        total_secs,
        indent = 2 * id.depth(),
    )?;

    // Children that ran in parallel may sum up to more than the parent
    let children_total: Duration = scopes
        .iter()
        .filter(|(c, _)| c.is_child_of(id))
        .map(|(_, s)| s.total)
        .sum();
    let reference = children_total.max(stats.total);

    for child in scopes.iter().filter(|(c, _)| c.is_child_of(id)) {
        write_scope(out, scopes, child, Some(reference))?;
    }

    Ok(())
}

/// Pretty prints the timings collected on all threads to the given writer
pub fn write<W: io::Write>(out: &mut W) -> io::Result<()> {
    let mut merged = BTreeMap::<ScopeId, ScopeStats>::new();
    for profiler in PROFILER.iter() {
        for (id, stats) in &profiler.read().scopes {
            merged
                .entry(id.clone())
                .and_modify(|s| s.merge(stats))
                .or_insert(*stats);
        }
    }

    let mut scopes = merged.into_iter().collect::<Vec<_>>();
    scopes.sort_by_key(|(_, s)| s.first_call);

    for root in scopes.iter().filter(|(id, _)| id.depth() == 0) {
        write_scope(out, &scopes, root, None)?;
    }

    Ok(())
}

/// Returns the pretty printed timings of all threads as a `String`
pub fn write_to_string() -> Result<String, Box<dyn Error>> {
    let mut buffer = Vec::new();
    write(&mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Resets the timings of all thread local profilers, should be called outside of any scope
pub fn reset() {
    for profiler in PROFILER.iter() {
        profiler.write().reset();
    }
}
