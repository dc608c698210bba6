#![doc = "s3-delivery-core: core logic library for s3-delivery."]

//! This crate contains the data model and pipeline for delivering marketing
//! data files into the dataset- and date-partitioned delivery bucket.
//! No object-store client lives here; the CLI crate plugs one in through
//! [`contract::ObjectStore`].
//!
//! # Usage
//! Build a [`delivery::DeliveryRequest`], then [`delivery::plan`] and
//! [`delivery::deliver`] it against any store.

pub mod contract;
pub mod convert;
pub mod dataset;
pub mod delivery;
pub mod destination;
pub mod error;
pub mod store;

pub use dataset::Dataset;
pub use error::{ConfigError, FormatError, TransferError};
