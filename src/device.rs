// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Compute backends that run one kernel over every cell of a field.

use rayon::prelude::*;

use crate::config::BackendPreference;
use crate::error::{AcousticError, Result};

/// Cells handed to a worker per task.
const CHUNK_CELLS: usize = 4096;

/// A per-cell update rule.
///
/// Implementations read only from buffers they borrow immutably, so any partition
/// of the output may be evaluated concurrently.
pub trait CellKernel: Sync {
    /// Write the new values for cells `offset..offset + out.len()`.
    fn eval_range(&self, offset: usize, out: &mut [f64]);
}

/// A backend able to evaluate a [`CellKernel`] over an output buffer.
pub trait ComputeDevice: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Evaluate `kernel` for every cell of `out`.
    fn dispatch(&self, kernel: &dyn CellKernel, out: &mut [f64]);

    /// Block until all dispatched work is visible to the host.
    ///
    /// CPU backends finish inside `dispatch`, so the default is a no-op.
    fn synchronize(&self) {}
}

/// Single-threaded reference backend.
#[derive(Debug, Default)]
pub struct SerialDevice;

impl ComputeDevice for SerialDevice {
    fn name(&self) -> &str {
        "serial"
    }

    fn dispatch(&self, kernel: &dyn CellKernel, out: &mut [f64]) {
        for (c, chunk) in out.chunks_mut(CHUNK_CELLS).enumerate() {
            kernel.eval_range(c * CHUNK_CELLS, chunk);
        }
    }
}

/// Rayon thread-pool backend.
pub struct ParallelDevice {
    pool: rayon::ThreadPool,
    name: String,
}

impl ParallelDevice {
    /// Build a pool with `threads` workers, or one per core when `None`.
    ///
    /// # Errors
    /// Returns [`AcousticError::BackendUnavailable`] if the pool cannot be created.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fdtd-worker-{}", i))
            .build()
            .map_err(|e| AcousticError::BackendUnavailable(e.to_string()))?;
        Ok(ParallelDevice {
            pool,
            name: format!("parallel({} threads)", threads),
        })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ComputeDevice for ParallelDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, kernel: &dyn CellKernel, out: &mut [f64]) {
        self.pool.install(|| {
            out.par_chunks_mut(CHUNK_CELLS)
                .enumerate()
                .for_each(|(c, chunk)| kernel.eval_range(c * CHUNK_CELLS, chunk));
        });
    }
}

/// Create the preferred backend, falling back to [`SerialDevice`] when the
/// parallel pool cannot be built and fallback is allowed.
///
/// # Errors
/// Returns [`AcousticError::BackendUnavailable`] when the parallel backend fails
/// and fallback is disabled.
pub fn select_device(
    preference: BackendPreference,
    threads: Option<usize>,
    allow_fallback: bool,
) -> Result<Box<dyn ComputeDevice>> {
    match preference {
        BackendPreference::Serial => Ok(Box::new(SerialDevice)),
        BackendPreference::Parallel => resolve(ParallelDevice::new(threads), allow_fallback),
    }
}

fn resolve(
    parallel: Result<ParallelDevice>,
    allow_fallback: bool,
) -> Result<Box<dyn ComputeDevice>> {
    match parallel {
        Ok(device) => Ok(Box::new(device)),
        Err(e) if allow_fallback => {
            log::warn!("parallel backend unavailable ({}); falling back to serial", e);
            Ok(Box::new(SerialDevice))
        }
        Err(e) => Err(e),
    }
}
