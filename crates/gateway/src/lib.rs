pub mod api;
pub mod binder;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod hub;
pub mod state;
pub mod web;
