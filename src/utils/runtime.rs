// src/utils/runtime.rs

use anyhow::{Context, Result};
use std::future::Future;
use tokio::runtime::{Handle, Runtime};
use tokio::task::block_in_place;

/// Drive an async request from synchronous code.
///
/// Uses the given handle when we are outside any runtime, `block_in_place` when we are
/// already on a worker thread, and an ad-hoc runtime as a last resort.
pub fn block_on_result<F, T>(handle: Option<&Handle>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match Handle::try_current() {
        Ok(current) => block_in_place(|| current.block_on(fut)),
        Err(_) => match handle {
            Some(h) => h.block_on(fut),
            None => {
                let rt = Runtime::new().context("failed to build ad-hoc Tokio runtime")?;
                rt.block_on(fut)
            }
        },
    }
}
