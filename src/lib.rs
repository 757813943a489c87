//! aerowal - write-ahead log, checkpoint and replay engine
//!
//! Commits become durable by appending one entry per transaction to a
//! single active log file, written by one flush thread. Checkpoints bound
//! how much of the log a restart has to replay.

pub mod bg_task;
pub mod catalog;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod crash_point;
pub mod observability;
pub mod recovery;
pub mod wal;
