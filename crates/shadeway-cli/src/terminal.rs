//! Terminal styling and color utilities.
//!
//! ANSI escape codes and capability detection for text output. Shade ratios
//! are colored from sunny (orange) to shaded (green).

/// ANSI escape codes for text styling and colors.
pub mod colors {
    /// Reset all styling.
    pub const RESET: &str = "\x1b[0m";
    /// Bright bold white for emphasis (headings, totals).
    pub const WHITE_BOLD: &str = "\x1b[1;97m";
    /// Gray for secondary elements (indices, footers).
    pub const GRAY: &str = "\x1b[90m";
    /// Green for well shaded points.
    pub const GREEN: &str = "\x1b[32m";
    /// Yellow for partial shade.
    pub const YELLOW: &str = "\x1b[33m";
    /// Orange (256-color) for points in full sun.
    pub const ORANGE: &str = "\x1b[38;5;208m";
    /// Red for points inside a building.
    pub const RED: &str = "\x1b[31m";
}

/// Resolved color codes, either ANSI sequences or empty strings when color is
/// disabled.
#[derive(Debug, Clone, Copy)]
pub struct ColorPalette {
    pub reset: &'static str,
    pub white_bold: &'static str,
    pub gray: &'static str,
    pub shaded: &'static str,
    pub partial: &'static str,
    pub sunny: &'static str,
    pub blocked: &'static str,
}

impl ColorPalette {
    #[must_use]
    pub const fn colored() -> Self {
        Self {
            reset: colors::RESET,
            white_bold: colors::WHITE_BOLD,
            gray: colors::GRAY,
            shaded: colors::GREEN,
            partial: colors::YELLOW,
            sunny: colors::ORANGE,
            blocked: colors::RED,
        }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self {
            reset: "",
            white_bold: "",
            gray: "",
            shaded: "",
            partial: "",
            sunny: "",
            blocked: "",
        }
    }

    /// `colored()` when the terminal supports ANSI colors, otherwise `plain()`.
    #[must_use]
    pub fn detect() -> Self {
        if supports_color() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    /// Color for a shade ratio in `[0, 1]`.
    #[must_use]
    pub fn for_shade(&self, ratio: f64) -> &'static str {
        if ratio >= 0.6 {
            self.shaded
        } else if ratio >= 0.3 {
            self.partial
        } else {
            self.sunny
        }
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::detect()
    }
}

/// Whether ANSI colors should be used.
///
/// Respects `NO_COLOR` (https://no-color.org/) and `TERM=dumb`.
#[must_use]
pub fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if let Ok(term) = std::env::var("TERM") {
        if term.eq_ignore_ascii_case("dumb") {
            return false;
        }
    }
    true
}

/// Format a number with thousand separators, e.g. `1,234,567`.
///
/// ```
/// # use shadeway_cli::terminal::format_with_separators;
/// assert_eq!(format_with_separators(999), "999");
/// assert_eq!(format_with_separators(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_with_separators(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Ten-character bar, `#` for shade and `.` for sun.
#[must_use]
pub fn shade_bar(ratio: f64) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * 10.0).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators() {
        assert_eq!(format_with_separators(0), "0");
        assert_eq!(format_with_separators(999), "999");
        assert_eq!(format_with_separators(1000), "1,000");
        assert_eq!(format_with_separators(1_234_567), "1,234,567");
        assert_eq!(
            format_with_separators(u64::MAX),
            "18,446,744,073,709,551,615"
        );
    }

    #[test]
    fn plain_palette_is_empty() {
        let p = ColorPalette::plain();
        assert!(p.reset.is_empty());
        assert!(p.for_shade(0.9).is_empty());
    }

    #[test]
    fn shade_colors_follow_thresholds() {
        let p = ColorPalette::colored();
        assert_eq!(p.for_shade(0.8), colors::GREEN);
        assert_eq!(p.for_shade(0.4), colors::YELLOW);
        assert_eq!(p.for_shade(0.1), colors::ORANGE);
    }

    #[test]
    fn shade_bar_scales_and_clamps() {
        assert_eq!(shade_bar(0.0), "..........");
        assert_eq!(shade_bar(0.44), "####......");
        assert_eq!(shade_bar(1.7), "##########");
    }
}
