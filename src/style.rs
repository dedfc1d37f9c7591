//! Terminal styling utilities
//!
//! One color scheme for all CLI output:
//! - Semantic colors for status (green/yellow/red)
//! - Cyan for headers and technical terms
//! - Bold for record names, dim for secondary information

use crossterm::style::Stylize;

/// Extension trait for consistent devchooser styling
///
/// Use these methods instead of direct color calls.
///
/// # Examples
///
/// ```
/// use devchooser::style::ChooserStyle;
///
/// println!("{}", "SINKS:".header());
/// println!("{}", "Running".success());
/// println!("{}", "tcp:studio:4713".technical());
/// ```
pub trait ChooserStyle: Stylize {
    /// Section headers like "SINKS:" or "Daemon" (cyan bold)
    fn header(self) -> <<Self as Stylize>::Styled as Stylize>::Styled
    where
        Self: Sized,
        <Self as Stylize>::Styled: Stylize,
    {
        self.cyan().bold()
    }

    /// Positive states: "Running", the active record, success messages (green)
    fn success(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.green()
    }

    /// Problems: "Not running", error messages (red)
    fn error(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.red()
    }

    /// Requested but not discovered ("Other") and other partial states (yellow)
    fn warning(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.yellow()
    }

    /// Server addresses, device names, paths (cyan)
    fn technical(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.cyan()
    }
}

impl<T: Stylize> ChooserStyle for T {}
