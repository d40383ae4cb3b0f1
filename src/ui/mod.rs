pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, header, info, muted, section, success, summary_row, timing, warn};
pub use progress::Spinner;
pub use table::{FindingRow, TableBuilder, findings_table};
pub use theme::{theme, Theme};
