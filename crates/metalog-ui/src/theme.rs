use metalog_core::TaskStatus;
use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Color = Color::Rgb(146, 131, 116);
pub const FOCUS_BORDER: Color = Color::Cyan;

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Submitted => Color::Cyan,
        TaskStatus::Running => Color::Yellow,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Cached => Color::Blue,
        TaskStatus::Unknown => MUTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_have_distinct_colors() {
        assert_eq!(status_color(TaskStatus::Submitted), Color::Cyan);
        assert_eq!(status_color(TaskStatus::Cached), Color::Blue);
        let colors: Vec<Color> = TaskStatus::KNOWN.into_iter().map(status_color).collect();
        for (i, color) in colors.iter().enumerate() {
            assert!(!colors[i + 1..].contains(color), "{color:?} reused");
        }
    }
}
