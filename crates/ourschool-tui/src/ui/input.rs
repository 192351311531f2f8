use crossterm::event::{Event, KeyCode, KeyEvent, MouseEventKind};

use ourschool_core::ActivitySignal;

use crate::app::{App, AppState};

/// Map a terminal event to the interaction it represents, if any.
///
/// Clicks stand in for touches; resizes and focus changes are not activity.
pub fn activity_signal(event: &Event) -> Option<ActivitySignal> {
    match event {
        Event::Key(_) | Event::Paste(_) => Some(ActivitySignal::KeyPress),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ActivitySignal::PointerMove),
            MouseEventKind::ScrollUp
            | MouseEventKind::ScrollDown
            | MouseEventKind::ScrollLeft
            | MouseEventKind::ScrollRight => Some(ActivitySignal::Scroll),
            MouseEventKind::Down(_) | MouseEventKind::Up(_) => Some(ActivitySignal::Touch),
        },
        _ => None,
    }
}

pub async fn handle_input(app: &mut App, key: KeyEvent) {
    if app.state == AppState::ShowingHelp {
        app.toggle_help();
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Char('e') => app.extend().await,
        KeyCode::Char('d') => app.dismiss_warning(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('?') => app.toggle_help(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyModifiers, MouseButton, MouseEvent};

    use super::*;

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_activity_signal_mapping() {
        let key = Event::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(activity_signal(&key), Some(ActivitySignal::KeyPress));
        assert_eq!(
            activity_signal(&mouse(MouseEventKind::Moved)),
            Some(ActivitySignal::PointerMove)
        );
        assert_eq!(
            activity_signal(&mouse(MouseEventKind::ScrollDown)),
            Some(ActivitySignal::Scroll)
        );
        assert_eq!(
            activity_signal(&mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(ActivitySignal::Touch)
        );
        assert_eq!(activity_signal(&Event::Resize(80, 24)), None);
        assert_eq!(activity_signal(&Event::FocusGained), None);
    }
}
