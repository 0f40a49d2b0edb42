// SolveIt API Library
//
// HTTP surface of the realtime hub: websocket upgrades and publish endpoints

pub mod http;

pub use http::{create_router, AppState};
