//! Chat client WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the browser adapters, hands them to the chat store and
//! exports the store to JavaScript as `ChatClient`.

mod client;

pub use client::ChatClient;

use wasm_bindgen::prelude::*;

/// Runs once when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Chat client WASM loaded");
}
