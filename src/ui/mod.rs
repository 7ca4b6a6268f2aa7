pub mod chat;
pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use chat::{format_event, TerminalSink};
pub use icons::Icons;
pub use output::{header, muted, sql_block, status, success, summary_row, warn};
pub use progress::Spinner;
pub use table::{exemplar_table, result_table, stats_table};
pub use theme::{theme, Theme};
