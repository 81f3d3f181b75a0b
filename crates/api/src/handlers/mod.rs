pub mod export;
pub mod scans;
