//! Low-level readers shared by the spreadsheet module.
pub(crate) mod xml;
pub(crate) mod zip;
