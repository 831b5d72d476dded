//! Error conversions at the infrastructure boundary.

mod conversions;

pub(crate) use conversions::{join_error, IntoStoreError, IntoTransportError};
