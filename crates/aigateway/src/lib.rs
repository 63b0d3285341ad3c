//! An AI gateway data plane: request routing and protocol translation between the OpenAI wire
//! surface and a fleet of upstream model providers, plus an MCP multiplexing proxy.
//!
//! The crate is organized as the host proxy sees it: [`extproc`] drives the per-request state
//! machine, [`llm`] holds the schema model and the per-backend translators, [`mcp`] multiplexes
//! JSON-RPC across upstream MCP servers, and [`telemetry`] records GenAI metrics.

pub mod cel;
pub mod extproc;
pub mod http;
pub mod llm;
pub mod mcp;
pub mod parse;
pub mod serdes;
pub mod telemetry;
pub mod types;
