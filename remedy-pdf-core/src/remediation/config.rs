//! Remediation configuration.

/// Options for a remediation run. Injected per request; there is no
/// global state in the engine.
#[derive(Debug, Clone)]
pub struct RemediationConfig {
    /// Title written when too little text exists to generate one
    pub title_placeholder: String,
    /// Language written when detection fails
    pub default_primary_language: String,
    /// Demote small header-less tables to Div
    pub demote_small_tables_without_headers: bool,
    /// A table with at most this many rows may be a layout table
    pub max_layout_table_rows: usize,
    /// ... or with at most this many cells in every row
    pub max_layout_table_cells_per_row: usize,
    /// Generate alt text for Link structure elements
    pub generate_link_alt_text: bool,
    /// Placeholder written to figures that never received alt text;
    /// also treated as "missing" when re-running over prior output
    pub image_alt_sentinel: String,
    /// Same for links
    pub link_alt_sentinel: String,
    /// Rasterization density for vector-figure crops
    pub vector_figure_dpi: u32,
    /// Characters of page text handed to the generator on each side
    pub alt_context_chars: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            title_placeholder: "Untitled PDF document".to_string(),
            default_primary_language: "en-US".to_string(),
            demote_small_tables_without_headers: false,
            max_layout_table_rows: 1,
            max_layout_table_cells_per_row: 2,
            generate_link_alt_text: false,
            image_alt_sentinel: "alt text for image".to_string(),
            link_alt_sentinel: "alt text for link".to_string(),
            vector_figure_dpi: 216,
            alt_context_chars: 800,
        }
    }
}

/// Maximum characters kept of a generated or existing title.
pub const MAX_TITLE_CHARS: usize = 200;
/// Maximum characters of a bookmark title.
pub const MAX_BOOKMARK_TITLE_CHARS: usize = 200;
/// Maximum number of bookmarks built from headings.
pub const MAX_BOOKMARKS: usize = 2000;
/// Words needed before the title generator is consulted.
pub const TITLE_MIN_WORDS: usize = 100;
/// Words needed before language detection runs.
pub const LANGUAGE_MIN_WORDS: usize = 20;
/// Pages scanned when gathering early-page text.
pub const EARLY_TEXT_MAX_PAGES: usize = 5;
