//! Provides the [`profile`](crate::profile) macro or a dummy implementation depending on the selected feature

#[cfg(feature = "profiling")]
/// Opens a named profiling scope that lasts until the end of the enclosing block
///
/// The timings are recorded per thread by the [`Profiler`](crate::profiling::Profiler)s in
/// [`PROFILER`](static@crate::profiling::PROFILER) and can be printed with
/// [`write`](crate::profiling::write) or [`write_to_string`](crate::profiling::write_to_string).
/// Without the `profiling` feature the macro expands to nothing.
///
/// The guard of the scope is stored in a local variable called `_profiling_scope_guard`.
///
/// Supported forms:
///  - `profile!("name")`: child of the innermost open scope of the current thread
///  - `profile!(id, "name")`: additionally binds the [`ScopeId`](crate::profiling::ScopeId) to `id`
///  - `profile!("name", parent = id)`: child of an explicitly given scope, e.g. from another thread
///  - `profile!(id, "name", parent = parent_id)`: both of the above
#[macro_export]
#[cfg_attr(docsrs, doc(cfg(feature = "profiling")))]
macro_rules! profile {
    ($name:expr) => {
        $crate::profile_impl!($name);
    };
    ($scope_id:ident, $name:expr) => {
        $crate::profile_impl!($scope_id, $name);
    };
    ($name:expr, parent = $parent_id:ident) => {
        $crate::profile_impl!($name, parent = $parent_id);
    };
    ($scope_id:ident, $name:expr, parent = $parent_id:ident) => {
        $crate::profile_impl!($scope_id, $name, parent = $parent_id);
    };
}

#[cfg(not(feature = "profiling"))]
/// No-op macro if profiling is disabled
#[macro_export]
macro_rules! profile {
    ($name:expr) => {};
    ($scope_id:ident, $name:expr) => {};
    ($name:expr, parent = $parent_id:ident) => {};
    ($scope_id:ident, $name:expr, parent = $parent_id:ident) => {};
}
