//! # Controller
//!
//! Reconciliation logic for the Cloudship custom resources.

pub mod reconciler;
