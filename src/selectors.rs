//! Shared Selectors

use once_cell::sync::Lazy;
use scraper::Selector;

/// Selector for the citation summary table in the profile sidebar.
pub static METRICS_TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#gsc_rsb_st").expect("valid metrics table selector"));

/// Selector for table rows.
pub static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("valid row selector"));

/// Selector for data cells.
pub static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("valid cell selector"));

/// Selector for the per-metric value cells, used when the table id is gone.
pub static METRIC_VALUE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".gsc_rsb_std").expect("valid metric value selector"));
