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

//! The Relay language runtime core: a tree-walking evaluator, a
//! server-actor subsystem, and a unified message router bridging local
//! calls, HTTP JSON-RPC, and WebSocket P2P transports.

pub mod actor;
pub mod ast;
pub mod builtins;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod gateway;
pub mod interpreter;
pub mod rt;
pub mod transport;
pub mod value;
