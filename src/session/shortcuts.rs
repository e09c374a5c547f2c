use crate::annotations::Tool;
use crate::session::messages::Command;

/// A key as reported by the host toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Character(char),
    Enter,
    Escape,
    Other,
}

/// Modifier state accompanying a key press
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub control: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        control: false,
        shift: false,
    };

    pub fn control() -> Self {
        Self {
            control: true,
            shift: false,
        }
    }

    pub fn control_shift() -> Self {
        Self {
            control: true,
            shift: true,
        }
    }
}

/// Map a key press to a command
///
/// `drawing` is true while a gesture is in progress; tool letters are
/// ignored then so typing never silently drops a half-drawn shape.
pub fn handle_key_event(key: Key, modifiers: Modifiers, drawing: bool) -> Option<Command> {
    match key {
        // Undo/redo shortcuts
        Key::Character(c)
            if c.eq_ignore_ascii_case(&'z') && modifiers.control && !modifiers.shift =>
        {
            Some(Command::undo())
        }
        Key::Character(c)
            if (c.eq_ignore_ascii_case(&'y') && modifiers.control)
                || (c.eq_ignore_ascii_case(&'z') && modifiers.control && modifiers.shift) =>
        {
            Some(Command::redo())
        }
        Key::Enter if modifiers.control => Some(Command::Save),
        // Plain Enter closes a polygon or curve
        Key::Enter if drawing => Some(Command::FinishPath),
        Key::Escape if drawing => Some(Command::CancelGesture),
        Key::Character(c) if !modifiers.control && !drawing => {
            tool_for_letter(c.to_ascii_lowercase()).map(Command::select_tool)
        }
        _ => None,
    }
}

fn tool_for_letter(c: char) -> Option<Tool> {
    let tool = match c {
        'r' => Tool::Rectangle,
        'e' => Tool::Ellipse,
        'a' => Tool::Arrow,
        'l' => Tool::Line,
        'c' => Tool::Curve,
        'p' => Tool::Polygon,
        'f' => Tool::Freehand,
        't' => Tool::Text,
        'o' => Tool::Callout,
        'h' => Tool::Highlight,
        _ => return None,
    };
    Some(tool)
}
