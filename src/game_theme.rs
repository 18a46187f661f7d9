use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Named cosmetic bundle. Purely visual; never affects physics. The chosen
/// theme is persisted through the session store and restored at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameTheme {
    #[default]
    Monokai,
    Solarized,
    Dracula,
    Nord,
    HighContrast,
}

pub struct ThemeColors {
    pub background: Color,
    pub border: Color,
    pub text: Color,
    pub accent: Color,
    pub paddle: Color,
    pub ball: Color,
    pub net: Color,
}

impl GameTheme {
    pub fn colors(&self) -> ThemeColors {
        match self {
            GameTheme::Monokai => ThemeColors {
                background: Color::Reset,
                border: Color::Rgb(249, 38, 114), // Monokai pink
                text: Color::Rgb(248, 248, 242),  // Monokai foreground
                accent: Color::Rgb(166, 226, 46), // Monokai green
                paddle: Color::Rgb(102, 217, 239), // Monokai cyan
                ball: Color::Rgb(255, 95, 135),   // Monokai light pink
                net: Color::Rgb(117, 113, 94),    // Monokai comment grey
            },
            GameTheme::Solarized => ThemeColors {
                background: Color::Reset,
                border: Color::Rgb(38, 139, 210), // Solarized blue
                text: Color::Rgb(101, 123, 131),  // Solarized base00
                accent: Color::Rgb(42, 161, 152), // Solarized cyan
                paddle: Color::Rgb(133, 153, 0),  // Solarized green
                ball: Color::Rgb(220, 50, 47),    // Solarized red
                net: Color::Rgb(88, 110, 117),    // Solarized base01
            },
            GameTheme::Dracula => ThemeColors {
                background: Color::Reset,
                border: Color::Rgb(255, 121, 198), // Dracula pink
                text: Color::Rgb(248, 248, 242),   // Dracula foreground
                accent: Color::Rgb(189, 147, 249), // Dracula purple
                paddle: Color::Rgb(80, 250, 123),  // Dracula green
                ball: Color::Rgb(255, 85, 85),     // Dracula red
                net: Color::Rgb(98, 114, 164),     // Dracula comment
            },
            GameTheme::Nord => ThemeColors {
                background: Color::Reset,
                border: Color::Rgb(136, 192, 208),
                text: Color::Rgb(216, 222, 233),
                accent: Color::Rgb(143, 188, 187),
                paddle: Color::Rgb(94, 129, 172),
                ball: Color::Rgb(191, 97, 106),
                net: Color::Rgb(76, 86, 106),
            },
            GameTheme::HighContrast => ThemeColors {
                background: Color::Black,
                border: Color::White,
                text: Color::White,
                accent: Color::Yellow,
                paddle: Color::Rgb(0, 255, 255),
                ball: Color::Rgb(255, 0, 0),
                net: Color::White,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GameTheme::Monokai => "Monokai",
            GameTheme::Solarized => "Solarized",
            GameTheme::Dracula => "Dracula",
            GameTheme::Nord => "Nord",
            GameTheme::HighContrast => "High Contrast",
        }
    }

    pub fn next(&self) -> GameTheme {
        match self {
            GameTheme::Monokai => GameTheme::Solarized,
            GameTheme::Solarized => GameTheme::Dracula,
            GameTheme::Dracula => GameTheme::Nord,
            GameTheme::Nord => GameTheme::HighContrast,
            GameTheme::HighContrast => GameTheme::Monokai,
        }
    }

    pub fn previous(&self) -> GameTheme {
        match self {
            GameTheme::Monokai => GameTheme::HighContrast,
            GameTheme::Solarized => GameTheme::Monokai,
            GameTheme::Dracula => GameTheme::Solarized,
            GameTheme::Nord => GameTheme::Dracula,
            GameTheme::HighContrast => GameTheme::Nord,
        }
    }
}
