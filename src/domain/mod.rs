//! Domain types shared by the purge log, the ingress and the worker.

pub mod error;
pub mod position;
pub mod purge;
