use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Paragraph, Widget, Wrap},
};

/// Drawn in place of the dashboard body when a frame could not be composed
pub struct ErrorPanel<'a> {
    error: &'a eyre::Report,
}

impl<'a> ErrorPanel<'a> {
    pub fn new(error: &'a eyre::Report) -> Self {
        Self { error }
    }
}

impl Widget for ErrorPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer)
    where
        Self: Sized,
    {
        Paragraph::new(format!("Error updating display: {:#}", self.error))
            .style(
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            )
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title("Error")
                    .border_style(Style::default().fg(Color::Red)),
            )
            .render(area, buf);
    }
}
