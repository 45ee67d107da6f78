//! # Background Work
//!
//! The frame loop itself is single-threaded. Heavy, self-contained jobs
//! (asset loading, streaming, path searches) go to the [`ThreadPool`] and
//! their results are picked up on a later frame:
//!
//! ```text
//! Frame N:    handle = pool.enqueue(load_chunk)
//! Frame N+1:  handle.try_take() -> None        (still running)
//! Frame N+2:  handle.try_take() -> Some(chunk) (integrate on main thread)
//! ```

mod thread_pool;

pub use thread_pool::{TaskHandle, ThreadPool};
