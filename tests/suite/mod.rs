mod analyzer_map;
mod cancellation;
mod dedup;
mod fault_isolation;
mod scenarios;
