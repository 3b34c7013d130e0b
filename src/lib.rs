//! `stocksync` applies a supplier's emailed stock position spreadsheet
//! to the product catalogue and mails back a log of the run.
//!
//! This crate provides the mailbox, spreadsheet, store and SMTP pieces
//! and the [`reconcile::Reconciler`] that drives them.

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod model;
pub mod reconcile;
pub mod sheet;
pub mod smtp;
pub mod store;
