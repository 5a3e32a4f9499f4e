/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Github:   https://github.com/samwilcox/pawx
 *
 * License: dual MIT / Apache-2.0, see LICENSE files.
 * ==========================================================================
 */

//! A narrow sync/async bridge.
//!
//! The evaluator's public surface (`Evaluator::eval`, the `FunctionExecutor`
//! and `ReceiveInvoker` trait impls) is synchronous, matching the
//! dispatcher's own `FunctionExecutor` contract so that neither
//! the dispatcher nor a receive body needs to be rewritten in terms of
//! futures. Spawning a server and sending to one are unavoidably async
//! (mailboxes are tokio channels with timeouts), so the handful of call
//! sites that need to cross that boundary do it here, once, instead of
//! scattering `block_in_place`/`block_on` pairs through `interpreter/` and
//! `builtins/`.

/// Runs `fut` to completion from synchronous code already inside a
/// multi-threaded tokio runtime. Requires `rt-multi-thread` (see Cargo.toml)
/// since `block_in_place` panics on a current-thread runtime.
pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
}
