//! Application services: the queue facade, the ingress and the purge worker.

pub mod error;
pub mod ingress;
pub mod purger;
pub mod queue;
pub mod repos;
pub mod worker;
