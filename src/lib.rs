//! Watch a script's directory, re-run the script on every change, and explain
//! failures with a remote language model.
//!
//! The control loop is: [`watcher`] (subscribe + debounce) drives
//! [`runner`] (execute) and [`classify`] (success / parsed / unparsed), inside
//! a [`session::WatchSession`] worker that reports back over a channel.

pub mod classify;
pub mod config;
pub mod error;
pub mod explain;
pub mod output;
pub mod runner;
pub mod session;
pub mod target;
pub mod watcher;
