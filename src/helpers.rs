use std::time::{SystemTime, UNIX_EPOCH};

use ratatui::layout::Rect;

pub fn centered_rect_with_percentage(percent_x: u16, percent_y: u16, cols: u16, rows: u16) -> Rect {
    let width = cols * percent_x / 100;
    let height = std::cmp::min(std::cmp::max(rows * percent_y / 100, 5), rows);
    Rect::new((cols - width) / 2, (rows - height) / 2, width, height)
}

pub fn centered_rect(width: u16, height: u16, cols: u16, rows: u16) -> Rect {
    let actual_width = std::cmp::min(width, cols);
    let actual_height = std::cmp::min(height, rows);

    // Safely calculate center position, avoiding underflow
    let x = if cols >= actual_width {
        (cols - actual_width) / 2
    } else {
        0
    };
    let y = if rows >= actual_height {
        (rows - actual_height) / 2
    } else {
        0
    };

    Rect::new(x, y, actual_width, actual_height)
}

/// Wall-clock milliseconds since the epoch, the timestamp base of every
/// wire message.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
