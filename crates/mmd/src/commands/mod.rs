//! CLI command implementations.

pub(crate) mod activate;
pub(crate) mod scan;

pub(crate) use activate::ActivateArgs;
pub(crate) use scan::ScanArgs;
