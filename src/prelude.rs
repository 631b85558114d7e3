//! Sylva prelude.
//!
//! This module contains the most used types, type aliases, traits and
//! functions that you can import easily as a group.
//!

#[doc(no_inline)]
pub use crate::error::{Error, Result};

#[doc(no_inline)]
pub use crate::traits::*;

#[doc(no_inline)]
pub use crate::param_guard::ParamGuard;

#[doc(no_inline)]
pub use crate::dataset::{Cell, ColumnSpec, ColumnType, DataTable, Table};

#[doc(no_inline)]
pub use crate::sample::{AttributeSampleMode, AttributeSampleSize, RowSample};

#[doc(no_inline)]
pub use crate::metrics::ConfusionMatrix;

#[doc(no_inline)]
pub use crate::{cancel::CancelToken, warning::Warning};
