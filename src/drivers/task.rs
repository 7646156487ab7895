//! Named worker threads.
//!
//! The control loop stays on the caller's thread; acquisition and the
//! operator console run beside it. Names show up in panics and `top -H`.

use std::io;
use std::thread::{self, JoinHandle};

/// Spawn a named thread with an explicit stack size.
pub fn spawn_named<T: Send + 'static>(
    name: &'static str,
    stack_kb: usize,
    f: impl FnOnce() -> T + Send + 'static,
) -> io::Result<JoinHandle<T>> {
    log::info!("Spawning '{}' (stack={}KB)", name, stack_kb);
    thread::Builder::new()
        .name(name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
