use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Theme {
    pub font_family: String,
    pub font_size: f64,
    pub title_size: f64,
    pub text_color: String,
    pub axis_color: String,
    pub grid_color: String,
    pub background: String,
    pub label_background: Option<String>,
    pub palette: Vec<String>,
}

impl Theme {
    pub fn standard() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 11.0,
            title_size: 15.0,
            text_color: "#1C2430".to_string(),
            axis_color: "#7A8AA6".to_string(),
            grid_color: "#B0B8C8".to_string(),
            background: "#FFFFFF".to_string(),
            label_background: None,
            palette: vec![
                "#4e79a7".to_string(),
                "#f28e2c".to_string(),
                "#e15759".to_string(),
                "#76b7b2".to_string(),
                "#59a14f".to_string(),
                "#edc949".to_string(),
                "#af7aa1".to_string(),
                "#ff9da7".to_string(),
            ],
        }
    }

    pub fn dark() -> Self {
        Self {
            text_color: "#E6EAF2".to_string(),
            axis_color: "#8892A6".to_string(),
            grid_color: "#4A5366".to_string(),
            background: "#161B22".to_string(),
            label_background: Some("#161B22".to_string()),
            ..Self::standard()
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "default" | "light" => Some(Self::standard()),
            "dark" => Some(Self::dark()),
            _ => None,
        }
    }

    /// Series color, cycling through the palette.
    pub fn color(&self, index: usize) -> &str {
        if self.palette.is_empty() {
            return &self.text_color;
        }
        &self.palette[index % self.palette.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_cycles() {
        let theme = Theme::standard();
        assert_eq!(theme.color(0), theme.color(theme.palette.len()));
    }

    #[test]
    fn named_themes_resolve() {
        assert_eq!(Theme::by_name("Dark").unwrap().background, "#161B22");
        assert!(Theme::by_name("neon").is_none());
    }
}
