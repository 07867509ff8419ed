pub mod cache;
pub mod cli;
pub mod collect;
pub mod extract;
pub mod fetch;
pub mod kst;
pub mod schedule;
pub mod server;
