use crate::ui::ToastLevel;
use ratatui::style::{Color, Modifier, Style};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Light,
    Dark,
}

/// Colors by role. Widgets go through the style helpers below rather than
/// picking colors themselves.
#[derive(Clone, Debug)]
pub struct Theme {
    pub mode: ThemeMode,
    pub bg: Color,
    pub fg: Color,
    pub heading: Color,
    pub highlight: Color,
    pub border: Color,
    pub border_active: Color,
    pub badge: Color,
    pub info: Color,
    pub ok: Color,
    pub bad: Color,
    pub dim: Color,
    syntax: &'static str,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bg: Color::Rgb(22, 25, 31),
            fg: Color::Rgb(216, 222, 233),
            heading: Color::Rgb(136, 192, 208),
            highlight: Color::Rgb(235, 203, 139),
            border: Color::Rgb(67, 76, 94),
            border_active: Color::Rgb(129, 161, 193),
            badge: Color::Rgb(180, 142, 173),
            info: Color::Rgb(94, 129, 172),
            ok: Color::Rgb(163, 190, 140),
            bad: Color::Rgb(191, 97, 106),
            dim: Color::Rgb(110, 118, 135),
            syntax: "base16-ocean.dark",
        }
    }

    pub fn light() -> Self {
        Self {
            mode: ThemeMode::Light,
            bg: Color::Rgb(250, 250, 248),
            fg: Color::Rgb(36, 41, 47),
            heading: Color::Rgb(5, 80, 174),
            highlight: Color::Rgb(154, 103, 0),
            border: Color::Rgb(208, 215, 222),
            border_active: Color::Rgb(9, 105, 218),
            badge: Color::Rgb(130, 80, 223),
            info: Color::Rgb(9, 105, 218),
            ok: Color::Rgb(26, 127, 55),
            bad: Color::Rgb(207, 34, 46),
            dim: Color::Rgb(110, 119, 129),
            syntax: "InspiredGitHub",
        }
    }

    /// `light` or `dark`; anything else falls back to dark.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()) {
            Some(n) if n == "light" => Self::light(),
            Some(n) if n != "dark" && !n.is_empty() => {
                log::warn!("unknown theme '{n}', using dark");
                Self::dark()
            }
            _ => Self::dark(),
        }
    }

    /// Name of the bundled syntect theme used for previews.
    pub fn syntax_theme(&self) -> &'static str {
        self.syntax
    }

    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.border_active)
    }

    pub fn border_unfocused(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn text_active_bold(&self) -> Style {
        Style::default().fg(self.info).add_modifier(Modifier::BOLD)
    }

    pub fn text_editing_bold(&self) -> Style {
        Style::default()
            .fg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn text_error(&self) -> Style {
        Style::default().fg(self.bad)
    }

    /// Highlighted row in lists, palettes and dropdowns.
    pub fn list_cursor_style(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.heading)
            .add_modifier(Modifier::BOLD)
    }

    pub fn accessory_style(&self) -> Style {
        Style::default().fg(self.badge)
    }

    pub fn toast_color(&self, level: ToastLevel) -> Color {
        match level {
            ToastLevel::Success => self.ok,
            ToastLevel::Error => self.bad,
            ToastLevel::Info => self.info,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_names_resolve() {
        assert_eq!(Theme::from_name(Some("Light")).mode, ThemeMode::Light);
        assert_eq!(Theme::from_name(Some("dark")).mode, ThemeMode::Dark);
        assert_eq!(Theme::from_name(Some("neon")).mode, ThemeMode::Dark);
        assert_eq!(Theme::from_name(None).mode, ThemeMode::Dark);
    }
}
