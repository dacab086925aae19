pub mod auction_log;
pub mod runtime_logger;
