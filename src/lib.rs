//! `sylva` is the core of a family of crates growing decision trees and tree ensembles on
//! tabular data.
//!
//! This crate holds everything the learners share:
//!
//! * the tabular data source ([`Table`](dataset::Table)) with typed columns, row keys and
//!   missing cells, and an in-memory implementation ([`DataTable`](dataset::DataTable))
//! * the row and attribute sampling used to decorrelate ensemble members
//!   ([`RowSample`](sample::RowSample), [`AttributeSampler`](sample::AttributeSampler))
//! * the [`Fit`](traits::Fit) and [`Predict`](traits::Predict) traits and the
//!   [`ParamGuard`] pattern for hyperparameter validation
//! * the common [`Error`](error::Error) type, [`Warning`]s and cooperative cancellation
//! * classification and regression [metrics]
//!
//! The algorithms live in their own crates:
//!
//! | Name | Purpose |
//! | :--- | :--- |
//! | `sylva-trees` | decision and regression trees |
//! | `sylva-ensemble` | random forests with out-of-bag evaluation |

pub mod benchmarks;
pub mod bitset;
pub mod cancel;
pub mod dataset;
pub mod error;
pub mod metrics;
mod param_guard;
pub mod prelude;
pub mod sample;
pub mod traits;
pub mod warning;

pub use bitset::BitSet;
pub use cancel::CancelToken;
pub use dataset::{Cell, ColumnSpec, ColumnType, DataTable, Table};
pub use param_guard::ParamGuard;
pub use warning::Warning;
