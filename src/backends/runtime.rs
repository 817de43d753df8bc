//! An explicitly owned handle to a heavyweight external
//! runtime (an embedded interpreter, a helper process, a
//! virtual machine) shared by several plane sources.
//!
//! The `RuntimeOwner` starts the runtime and stops it;
//! every source that needs it holds a `RuntimeHandle`.
//! Handles are reference counted, and `stop` refuses to shut
//! the runtime down while any are alive unless forced. Once
//! stopped, a runtime is never restarted: many such runtimes
//! (the JVM being the classic example) cannot be started twice
//! in one process.
//!
//! Only one `RuntimeOwner` should exist per runtime kind. It
//! is an ordinary value, so enforcing that is up to whoever
//! creates it; `ExternalRuntime::start` may refuse a second
//! instance.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::data::pixel::PixelArray;
use crate::metadata::PlaneMetadata;
use crate::source::{Backend, Coords, PlaneSource};
use crate::utils::{FramesError, FramesResult};

/// A runtime that can be started once and shut down once.
pub trait ExternalRuntime : Send + Sized {
    fn start() -> anyhow::Result<Self>;

    fn shutdown(&mut self) -> anyhow::Result<()>;
}

enum RuntimeState<R> {
    NotStarted,
    Running(R),
    Stopped,
}

/// Owns the lifecycle of one runtime.
pub struct RuntimeOwner<R : ExternalRuntime> {
    state : Arc<Mutex<RuntimeState<R>>>,
}

/// Shared access to a running runtime. Cloning a handle
/// increments the count `stop` checks.
pub struct RuntimeHandle<R : ExternalRuntime> {
    state : Arc<Mutex<RuntimeState<R>>>,
}

impl<R : ExternalRuntime> Clone for RuntimeHandle<R> {
    fn clone(&self) -> Self {
        RuntimeHandle { state : Arc::clone(&self.state) }
    }
}

/// A poisoned lock means a call into the runtime panicked;
/// the runtime is treated as gone.
fn lock<R>(state : &Mutex<RuntimeState<R>>) -> FramesResult<MutexGuard<'_, RuntimeState<R>>> {
    state.lock().map_err(|_| FramesError::RuntimeStopped)
}

impl<R : ExternalRuntime> Default for RuntimeOwner<R> {
    fn default() -> Self {
        RuntimeOwner::new()
    }
}

impl<R : ExternalRuntime> RuntimeOwner<R> {
    /// An owner whose runtime has not been started yet
    pub fn new() -> Self {
        RuntimeOwner { state : Arc::new(Mutex::new(RuntimeState::NotStarted)) }
    }

    /// Starts the runtime if needed and returns a new handle.
    /// Calling this again while running just hands out another
    /// handle to the same instance.
    ///
    /// ## Errors
    ///
    /// * `FramesError::RuntimeStopped` if the runtime was
    /// already stopped; it cannot be restarted.
    /// * `FramesError::RuntimeStart` if starting it failed.
    pub fn start(&self) -> FramesResult<RuntimeHandle<R>> {
        let mut state = lock(&self.state)?;
        match *state {
            RuntimeState::Running(_) => {},
            RuntimeState::Stopped => return Err(FramesError::RuntimeStopped),
            RuntimeState::NotStarted => {
                let runtime = R::start().map_err(FramesError::RuntimeStart)?;
                tracing::info!("external runtime started");
                *state = RuntimeState::Running(runtime);
            },
        }
        Ok(RuntimeHandle { state : Arc::clone(&self.state) })
    }

    pub fn is_running(&self) -> bool {
        matches!(lock(&self.state).as_deref(), Ok(RuntimeState::Running(_)))
    }

    /// Number of live handles
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.state) - 1
    }

    /// Shuts the runtime down. Refuses with `RuntimeInUse` while
    /// handles are alive, unless `force` is set, in which case
    /// every remaining handle starts failing with
    /// `RuntimeStopped`. Stopping twice is a no-op.
    pub fn stop(&self, force : bool) -> FramesResult<()> {
        // `start` hands out handles under this lock, so the count
        // cannot grow until the state is `Stopped`
        let mut state = lock(&self.state)?;
        let handles = self.handles();
        if handles > 0 && !force {
            return Err(FramesError::RuntimeInUse(handles));
        }

        if let RuntimeState::Running(runtime) = &mut *state {
            if let Err(err) = runtime.shutdown() {
                tracing::warn!(error = %err, "external runtime did not shut down cleanly");
            }
            tracing::info!(handles, "external runtime stopped");
        }
        *state = RuntimeState::Stopped;
        Ok(())
    }
}

impl<R : ExternalRuntime> RuntimeHandle<R> {
    /// Runs `f` with exclusive access to the runtime.
    pub fn with<T>(&self, f : impl FnOnce(&mut R) -> T) -> FramesResult<T> {
        let mut state = lock(&self.state)?;
        match &mut *state {
            RuntimeState::Running(runtime) => Ok(f(runtime)),
            _ => Err(FramesError::RuntimeStopped),
        }
    }
}

type RuntimeReadFn<R> = fn(&mut R, &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)>;

/// A backend whose planes come out of an external runtime.
/// The axes are given up front (typically queried through
/// the same runtime); every read locks the runtime.
pub struct RuntimeSource<R : ExternalRuntime> {
    name : String,
    handle : RuntimeHandle<R>,
    axes : Vec<(String, usize)>,
    read : RuntimeReadFn<R>,
}

impl<R : ExternalRuntime> RuntimeSource<R> {
    pub fn new(
        name : &str,
        handle : RuntimeHandle<R>,
        axes : Vec<(String, usize)>,
        read : RuntimeReadFn<R>,
    ) -> Self {
        RuntimeSource { name : name.to_string(), handle, axes, read }
    }

    pub fn handle(&self) -> &RuntimeHandle<R> {
        &self.handle
    }
}

impl<R : ExternalRuntime> PlaneSource for RuntimeSource<R> {
    fn read_plane(&self, coords : &Coords) -> anyhow::Result<(PixelArray, PlaneMetadata)> {
        self.handle.with(|runtime| (self.read)(runtime, coords))?
    }
}

impl<R : ExternalRuntime> Backend for RuntimeSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover_axes(&self) -> FramesResult<Vec<(String, usize)>> {
        Ok(self.axes.clone())
    }

    fn default_iter_axes(&self) -> Vec<String> {
        self.axes.first().map(|(a, _)| vec![a.clone()]).unwrap_or_default()
    }
}
