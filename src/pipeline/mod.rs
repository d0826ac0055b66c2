//! Pipeline stages for batch conversion.
//!
//! Each submodule implements one step. The coordinator-side stages run in
//! the `docbatch` process; the worker-side stages run inside each worker
//! process.
//!
//! ## Data Flow
//!
//! ```text
//! coordinator:  enumerate ──▶ dispatch ═══════════════════════════▶ report
//!                               ║  protocol (JSON lines)              ▲
//! worker:                       ╚═▶ worker: sniff ─▶ OCR ─▶ convert ─▶ mirror
//! ```
//!
//! 1. [`enumerate`] expands the target into ordered jobs
//! 2. [`dispatch`] fans jobs out to worker processes; the only stage that
//!    spawns processes
//! 3. [`protocol`] is the wire format between coordinator and workers
//! 4. [`worker`] converts one job inside a worker process
//!    ([`sniff`] validates the input, [`mirror`] places the output)
//! 5. [`report`] writes the CSV summary and computes the run status

pub mod dispatch;
pub mod enumerate;
pub mod mirror;
pub mod protocol;
pub mod report;
pub mod sniff;
pub mod worker;
