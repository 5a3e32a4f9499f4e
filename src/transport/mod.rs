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

//! Wire-format adapters that translate to and from the router's
//! `RouteRequest`/`RouteResponse` shapes.

pub mod jsonrpc;
pub mod value_json;
pub mod ws;
