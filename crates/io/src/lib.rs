// Lead record sources

pub mod csv;

pub use csv::{read_leads, read_leads_from, SourceError, HEADER};
